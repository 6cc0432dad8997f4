//! Session transport: SSH connection lifecycle, prompt-based command
//! framing, circuit breaking and adaptive timeouts.

mod breaker;
mod buffer;
mod session;
mod shell;
mod ssh;

#[cfg(test)]
pub(crate) mod testing;

pub use breaker::CircuitBreaker;
pub use buffer::PromptBuffer;
pub use session::{Session, SessionOptions};
pub use shell::{Shell, ShellChannel};
pub use ssh::{HostKeyVerification, SshTransport};
