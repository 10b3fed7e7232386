//! Chat transport boundary: inbound events, outbound replies, and the
//! trait a concrete transport implements.
//!
//! The engine consumes events of `{user identity, chat identity, text}`
//! and produces plain text replies, optionally with a keyboard hint.
//! Rendering is the transport's concern; the engine never formats for a
//! specific chat product.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};

/// One inbound chat event.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Stable identity of the sending user.
    pub user_id: String,
    /// Identity of the conversation to reply into.
    pub chat_id: String,
    /// The message text, command or free text.
    pub text: String,
}

/// One outbound reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// The reply text.
    pub text: String,
    /// Optional keyboard hint: rows of button labels.
    pub keyboard: Option<Vec<Vec<String>>>,
}

impl Reply {
    /// Creates a plain text reply.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    /// Creates a reply with a keyboard hint.
    #[must_use]
    pub fn with_keyboard(text: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(rows),
        }
    }
}

/// Failure to deliver a reply.
#[derive(Debug, thiserror::Error)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

/// A chat transport: the collaborator that delivers inbound text and
/// renders outbound replies.
#[async_trait]
pub trait ChatTransport: Send {
    /// Waits for the next inbound event. `None` means the transport has
    /// shut down.
    async fn next_event(&mut self) -> Option<InboundEvent>;

    /// Delivers a reply into a conversation.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the reply could not be delivered.
    async fn deliver(&mut self, chat_id: &str, reply: Reply) -> Result<(), TransportError>;
}

/// Line-based console transport for local runs: every stdin line is an
/// event from a single local user, replies go to stdout.
#[derive(Debug)]
pub struct ConsoleTransport {
    lines: Lines<BufReader<Stdin>>,
    stdout: Stdout,
}

impl ConsoleTransport {
    /// Creates a transport over this process's stdin/stdout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            stdout: tokio::io::stdout(),
        }
    }
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for ConsoleTransport {
    async fn next_event(&mut self) -> Option<InboundEvent> {
        loop {
            let line = self.lines.next_line().await.ok().flatten()?;
            if line.trim().is_empty() {
                continue;
            }
            return Some(InboundEvent {
                user_id: "local".to_owned(),
                chat_id: "console".to_owned(),
                text: line,
            });
        }
    }

    async fn deliver(&mut self, _chat_id: &str, reply: Reply) -> Result<(), TransportError> {
        let mut out = reply.text;
        if let Some(rows) = reply.keyboard {
            for row in rows {
                out.push_str("\n  [");
                out.push_str(&row.join("] ["));
                out.push(']');
            }
        }
        out.push('\n');
        self.stdout
            .write_all(out.as_bytes())
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        self.stdout
            .flush()
            .await
            .map_err(|e| TransportError(e.to_string()))
    }
}
