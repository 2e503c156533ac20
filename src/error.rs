//! Error types for link session handling.
//!
//! All errors implement `std::error::Error` and carry enough context for a host
//! to report a rejected command or a dropped link without inspecting internals.
//!
//! ## Error Categories
//!
//! - **Transport Errors**: connect, bind, send or receive failures on the socket
//! - **Checksum Errors**: corrupted frames; always non-fatal, surfaced as diagnostics
//! - **Protocol State Errors**: commands issued in the wrong link state
//! - **Config Errors**: unreadable or invalid configuration files
//! - **Parse Errors**: malformed host commands or frame payloads
//!
//! ## Retry Policy
//!
//! The session never retries on its own. [`LinkError::is_retryable`] only tells
//! the host whether issuing the same command again could succeed:
//!
//! ```rust
//! use mavsession::LinkError;
//!
//! let error = LinkError::transport("connection refused");
//! assert!(error.is_retryable());
//! assert!(!LinkError::NotConnected.is_retryable());
//! ```

use std::path::PathBuf;
use thiserror::Error;

use crate::protocol::ChecksumFailure;
use crate::types::LinkState;

/// Result type alias for link operations.
pub type Result<T, E = LinkError> = std::result::Result<T, E>;

/// Main error type for link operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LinkError {
    #[error("Transport error: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Checksum mismatch on message {message_id}: expected {expected:#06x}, got {actual:#06x}")]
    Checksum { message_id: u32, expected: u16, actual: u16 },

    #[error("Link is already {state}")]
    AlreadyConnected { state: LinkState },

    #[error("Link is not connected")]
    NotConnected,

    #[error("Configuration error in {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Session task has shut down")]
    SessionClosed,
}

impl LinkError {
    /// Returns whether issuing the same operation again could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LinkError::Transport { .. } => true,
            LinkError::SessionClosed => true,
            LinkError::AlreadyConnected { .. } => true,
            LinkError::Checksum { .. } => false,
            LinkError::NotConnected => false,
            LinkError::Config { .. } => false,
            LinkError::Parse { .. } => false,
        }
    }

    /// Whether the error belongs to the protocol-state category.
    ///
    /// These are rejections of a host command and never change vehicle state.
    pub fn is_protocol_state(&self) -> bool {
        matches!(self, LinkError::AlreadyConnected { .. } | LinkError::NotConnected)
    }

    /// Helper constructor for transport errors without an io source.
    pub fn transport(reason: impl Into<String>) -> Self {
        LinkError::Transport { reason: reason.into(), source: None }
    }

    /// Helper constructor for transport errors wrapping an io error.
    pub fn transport_io(reason: impl Into<String>, source: std::io::Error) -> Self {
        LinkError::Transport { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for parse errors.
    pub fn parse(context: impl Into<String>, details: impl Into<String>) -> Self {
        LinkError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        LinkError::Config { path: path.into(), reason: reason.into() }
    }
}

impl From<ChecksumFailure> for LinkError {
    fn from(failure: ChecksumFailure) -> Self {
        let ChecksumFailure { message_id, expected, actual } = failure;
        LinkError::Checksum { message_id, expected, actual }
    }
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::Transport { reason: err.to_string(), source: Some(err) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn error_messages_carry_their_context(
            reason in "[a-z ]{1,32}",
            context in "[a-z]{1,16}",
            details in "[a-z0-9 ]{1,32}",
            message_id in 0u32..0xFF_FFFF,
        ) {
            let transport = LinkError::transport(reason.clone());
            prop_assert!(transport.to_string().contains(&reason));

            let parse = LinkError::parse(context.clone(), details.clone());
            let msg = parse.to_string();
            prop_assert!(msg.contains(&context));
            prop_assert!(msg.contains(&details));

            let checksum = LinkError::from(ChecksumFailure { message_id, expected: 0xBEEF, actual: 0x1234 });
            let msg = checksum.to_string();
            prop_assert!(msg.contains(&message_id.to_string()));
            prop_assert!(msg.contains("0xbeef"));
        }
    }

    #[test]
    fn io_errors_become_transport_errors() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: LinkError = io_err.into();
        match err {
            LinkError::Transport { source: Some(source), .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::ConnectionRefused);
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[test]
    fn checksum_failures_convert_without_becoming_retryable() {
        let err = LinkError::from(ChecksumFailure { message_id: 30, expected: 0x00AB, actual: 0x1234 });
        assert!(matches!(err, LinkError::Checksum { message_id: 30, expected: 0x00AB, actual: 0x1234 }));
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Checksum mismatch on message 30: expected 0x00ab, got 0x1234");
    }

    #[test]
    fn classification() {
        assert!(LinkError::transport("x").is_retryable());
        assert!(!LinkError::NotConnected.is_retryable());
        assert!(LinkError::NotConnected.is_protocol_state());
        assert!(
            LinkError::AlreadyConnected { state: LinkState::Connecting }.is_protocol_state()
        );
        assert!(!LinkError::transport("x").is_protocol_state());
        assert_eq!(
            LinkError::AlreadyConnected { state: LinkState::Connected }.to_string(),
            "Link is already connected"
        );
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<LinkError>();
    }
}
