//! The device session a script drives.
//!
//! The interpreter talks to the remote side through the [`Connection`]
//! trait: send a line and collect the response. [`EchoConnection`] is the
//! offline implementation used by the CLI and the tests; it replays
//! scripted responses, or echoes the command back when none are queued.

use std::collections::VecDeque;

use thiserror::Error;

/// Transport failures. `try` blocks catch exactly these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("connection closed by peer")]
    Closed,
    #[error("timed out waiting for a response")]
    Timeout,
    #[error("{0}")]
    Io(String),
}

pub trait Connection {
    /// Send `command` and wait for the device to answer. Returns the
    /// response with the echoed command and trailing prompt stripped.
    fn execute(&mut self, command: &str) -> Result<String, ConnectionError>;

    /// Send `text` without waiting for a response.
    fn send(&mut self, text: &str) -> Result<(), ConnectionError>;

    /// Best-effort name of the remote operating system, for
    /// `connection.guess_os()`.
    fn guess_os(&self) -> &str {
        "unknown"
    }
}

/// In-memory connection for running scripts without a device.
#[derive(Debug, Default)]
pub struct EchoConnection {
    responses: VecDeque<String>,
    sent: Vec<String>,
    os: Option<String>,
}

impl EchoConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a canned response; consumed in order, one per `execute`.
    pub fn push_response(&mut self, response: impl Into<String>) {
        self.responses.push_back(response.into());
    }

    pub fn set_os(&mut self, os: impl Into<String>) {
        self.os = Some(os.into());
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> &[String] {
        &self.sent
    }
}

impl Connection for EchoConnection {
    fn execute(&mut self, command: &str) -> Result<String, ConnectionError> {
        self.sent.push(command.to_string());
        Ok(self
            .responses
            .pop_front()
            .unwrap_or_else(|| command.to_string()))
    }

    fn send(&mut self, text: &str) -> Result<(), ConnectionError> {
        self.sent.push(text.to_string());
        Ok(())
    }

    fn guess_os(&self) -> &str {
        self.os.as_deref().unwrap_or("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echoes_the_command_when_no_response_is_queued() {
        let mut conn = EchoConnection::new();
        assert_eq!(conn.execute("show version").unwrap(), "show version");
        assert_eq!(conn.sent(), ["show version"]);
    }

    #[test]
    fn replays_queued_responses_in_order() {
        let mut conn = EchoConnection::new();
        conn.push_response("IOS 15.2");
        conn.push_response("up 3 days");
        assert_eq!(conn.execute("show version").unwrap(), "IOS 15.2");
        assert_eq!(conn.execute("show uptime").unwrap(), "up 3 days");
        assert_eq!(conn.execute("anything").unwrap(), "anything");
    }
}
