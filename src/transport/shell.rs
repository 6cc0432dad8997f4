//! Interactive shell channel with prompt-based response framing.
//!
//! Commands are literal text lines; there is no length-prefixed wire
//! format. A response is complete when the issued command has been
//! echoed back and the accumulated output ends with the device prompt.

use async_trait::async_trait;
use log::trace;
use regex::bytes::Regex;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};

use super::buffer::PromptBuffer;
use crate::error::TransportError;

/// Trailing privileged-exec prompt: a non-whitespace run immediately
/// followed by `#`, optionally with trailing whitespace.
pub(crate) const PROMPT_PATTERN: &str = r"\S+#\s*$";

/// One interactive shell stream.
///
/// This is the seam between the session's command executor and the
/// underlying transport; tests substitute scripted implementations.
#[async_trait]
pub trait Shell: Send {
    /// Write one command line and read until the response is framed.
    ///
    /// Cancel-safe: the caller may race this against a deadline. Any
    /// partial response is discarded on the next call.
    async fn run_command(&mut self, command: &str) -> Result<String, TransportError>;

    /// Release the shell stream. Must not block indefinitely.
    async fn close(&mut self);
}

/// Shell implementation over a russh PTY channel.
pub struct ShellChannel {
    channel: Channel<Msg>,
    buffer: PromptBuffer,
    prompt: Regex,
}

impl ShellChannel {
    /// Wrap an open PTY/shell channel. `search_depth` bounds the prompt
    /// search to the buffer tail.
    pub fn new(channel: Channel<Msg>, search_depth: usize) -> Self {
        Self {
            channel,
            buffer: PromptBuffer::new(search_depth),
            prompt: Regex::new(PROMPT_PATTERN).expect("prompt pattern is valid"),
        }
    }
}

#[async_trait]
impl Shell for ShellChannel {
    async fn run_command(&mut self, command: &str) -> Result<String, TransportError> {
        // Drop any leftovers from a command that timed out mid-read.
        self.buffer.clear();

        let line = format!("{command}\n");
        self.channel
            .data(line.as_bytes())
            .await
            .map_err(TransportError::Ssh)?;

        let echo = command.as_bytes();
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    self.buffer.extend(&data);
                    if self.buffer.response_complete(echo, &self.prompt) {
                        break;
                    }
                }
                Some(ChannelMsg::ExtendedData { data, .. }) => {
                    self.buffer.extend(&data);
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    return Err(TransportError::Disconnected);
                }
                Some(msg) => {
                    trace!("ignoring channel message: {msg:?}");
                }
            }
        }

        Ok(self.buffer.take_text())
    }

    async fn close(&mut self) {
        let _ = self.channel.eof().await;
        let _ = self.channel.close().await;
    }
}
