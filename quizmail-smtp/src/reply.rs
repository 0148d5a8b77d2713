//! SMTP reply parsing.
//!
//! Replies are line-oriented: each line starts with a three-digit code,
//! and a multi-line reply continues for as long as the fourth character
//! is `-`. The final line's code is the reply's code. [`ReplyReader`]
//! wraps any buffered stream, so tests can drive the full dialogue from
//! canned bytes without a socket.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::error::{ClientError, Result};

/// A complete (possibly multi-line) SMTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// The three-digit reply code of the final line.
    pub code: u16,
    /// The text of every line, codes stripped.
    pub lines: Vec<String>,
}

impl Reply {
    #[must_use]
    pub const fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// All reply text joined with newlines.
    #[must_use]
    pub fn message(&self) -> String {
        self.lines.join("\n")
    }

    /// 2xx completion.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code >= 200 && self.code < 300
    }

    /// 4xx transient failure.
    #[must_use]
    pub const fn is_transient_error(&self) -> bool {
        self.code >= 400 && self.code < 500
    }

    /// 5xx permanent failure.
    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code >= 500 && self.code < 600
    }
}

/// One parsed reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ReplyLine {
    code: u16,
    is_last: bool,
    text: String,
}

fn parse_line(line: &str) -> Result<ReplyLine> {
    let code = line
        .get(..3)
        .and_then(|prefix| prefix.parse::<u16>().ok())
        .ok_or_else(|| ClientError::Parse(format!("invalid reply code in '{line}'")))?;

    let is_last = match line.as_bytes().get(3) {
        None | Some(b' ') => true,
        Some(b'-') => false,
        Some(&c) => {
            return Err(ClientError::Parse(format!(
                "invalid separator '{}' after reply code",
                char::from(c)
            )));
        }
    };

    let text = line.get(4..).unwrap_or_default().to_string();

    Ok(ReplyLine {
        code,
        is_last,
        text,
    })
}

/// Buffered line reader that assembles complete replies.
#[derive(Debug)]
pub struct ReplyReader<R> {
    inner: R,
}

impl<R: AsyncBufRead + Unpin> ReplyReader<R> {
    pub const fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read one raw line, CRLF stripped.
    ///
    /// # Errors
    /// [`ClientError::ConnectionClosed`] on EOF, [`ClientError::Io`] on
    /// read failure.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let n = self.inner.read_line(&mut line).await?;
        if n == 0 {
            return Err(ClientError::ConnectionClosed);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }

    /// Read a complete reply, following continuation lines until a line
    /// whose fourth character is not `-`.
    ///
    /// # Errors
    /// Propagates [`Self::read_line`] errors; [`ClientError::Parse`] on
    /// malformed lines or a code change mid-reply.
    pub async fn read_reply(&mut self) -> Result<Reply> {
        let mut lines = Vec::new();
        let mut code = None;

        loop {
            let raw = self.read_line().await?;
            let parsed = parse_line(&raw)?;

            match code {
                None => code = Some(parsed.code),
                Some(expected) if expected != parsed.code => {
                    return Err(ClientError::Parse(format!(
                        "reply code changed mid-reply: {expected} then {}",
                        parsed.code
                    )));
                }
                Some(_) => {}
            }

            lines.push(parsed.text);
            if parsed.is_last {
                break;
            }
        }

        // code is always set after at least one iteration
        let code = code.ok_or_else(|| ClientError::Parse("empty reply".to_string()))?;
        Ok(Reply::new(code, lines))
    }
}
