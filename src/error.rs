//! Error types shared across the crate.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Rejected node configuration.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Identity is not one of `1-9`, `A-Z`, `a-z`.
    InvalidNodeId(char),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidNodeId(id) => {
                write!(f, "invalid node identity {id:?}, expected 1-9, A-Z or a-z")
            }
        }
    }
}

impl StdError for ConfigError {}

/// Failure of the line transport underneath a node or a client.
#[derive(Debug)]
pub enum TransportError {
    /// The stream ended.
    Closed,
    /// Nothing arrived within the port timeout.
    Timeout,
    Io(io::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Closed => write!(f, "transport closed"),
            TransportError::Timeout => write!(f, "transport timed out"),
            TransportError::Io(e) => write!(f, "transport I/O error: {e}"),
        }
    }
}

impl StdError for TransportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            TransportError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportError::Timeout,
            io::ErrorKind::UnexpectedEof => TransportError::Closed,
            _ => TransportError::Io(e),
        }
    }
}

/// Failure of a master-side request.
#[derive(Debug)]
pub enum ClientError {
    Transport(TransportError),
    /// Reply did not start with `/0`.
    InvalidResponse(String),
    /// Reply started with `/0` but had no `#` terminator.
    IncompleteResponse(String),
    /// Reply echoed a different opcode than the one sent.
    UnexpectedResponse { opcode: char, response: String },
    /// The `a` reply did not hold five readings.
    InvalidReadings(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Transport(e) => write!(f, "{e}"),
            ClientError::InvalidResponse(txt) => write!(f, "invalid RS485 response: {txt:?}"),
            ClientError::IncompleteResponse(txt) => {
                write!(f, "incomplete RS485 response: {txt:?}")
            }
            ClientError::UnexpectedResponse { opcode, response } => {
                write!(f, "unexpected response to '{opcode}': {response:?}")
            }
            ClientError::InvalidReadings(txt) => write!(f, "cannot parse ADC readings: {txt:?}"),
        }
    }
}

impl StdError for ClientError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ClientError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(e: TransportError) -> Self {
        ClientError::Transport(e)
    }
}

impl From<io::Error> for ClientError {
    fn from(e: io::Error) -> Self {
        ClientError::Transport(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_timeouts_map_to_transport_timeout() {
        let e: TransportError = io::Error::new(io::ErrorKind::TimedOut, "slow").into();
        assert!(matches!(e, TransportError::Timeout));
        let e: TransportError = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
        assert!(matches!(e, TransportError::Io(_)));
    }

    #[test]
    fn client_error_messages_carry_the_reply() {
        let e = ClientError::InvalidResponse("garbage".into());
        assert_eq!(e.to_string(), "invalid RS485 response: \"garbage\"");
    }
}
