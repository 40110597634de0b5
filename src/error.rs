//! Error types for the IRC client engine.
//!
//! This module defines error types for line framing, message parsing
//! and session management failures.

use thiserror::Error;

use crate::event::SessionId;

/// Convenience type alias for Results using [`ClientError`].
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Errors raised by the line codec.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An inbound line exceeded the codec limit.
    #[error("line too long: {actual} bytes (limit {limit})")]
    MessageTooLong {
        /// Bytes seen before the line was abandoned.
        actual: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Illegal control character in an outbound line.
    #[error("illegal control character: {0:?}")]
    IllegalControlChar(char),

    /// Failed to parse an IRC line.
    #[error("invalid message: {string}")]
    InvalidMessage {
        /// The raw line.
        string: String,
        /// The underlying parse error.
        #[source]
        cause: MessageParseError,
    },
}

/// Why a raw line could not be turned into a [`Message`](crate::Message).
///
/// Malformed lines are never fatal: the session pipeline logs them and moves on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Line was empty after stripping the line terminator.
    #[error("empty message")]
    EmptyMessage,

    /// A source marker was not followed by a source.
    #[error("empty source")]
    EmptySource,

    /// No command token after tags and source.
    #[error("missing command")]
    MissingCommand,

    /// Parsing error with context information.
    #[error("parsing failed at position {position}: {context}")]
    ParseContext {
        /// Byte position where parsing failed.
        position: usize,
        /// Description of what was being parsed.
        context: String,
    },
}

/// Errors returned by [`SessionManager`](crate::SessionManager) operations.
///
/// `Clone` so that coalesced `connect` callers can share one outcome.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClientError {
    /// No session with this id exists.
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    /// The transport could not be opened.
    #[error("connection to {address} failed: {reason}")]
    Connect {
        /// `host:port` of the server.
        address: String,
        /// Transport error text.
        reason: String,
    },

    /// The server closed or rejected the connection before `001`.
    #[error("registration with {address} failed: {reason}")]
    Registration {
        /// `host:port` of the server.
        address: String,
        /// What ended the attempt.
        reason: String,
    },

    /// No `001` arrived within the registration timeout.
    #[error("registration with {address} timed out")]
    RegistrationTimeout {
        /// `host:port` of the server.
        address: String,
    },

    /// The connection attempt was abandoned before completing.
    #[error("connection to {address} was cancelled")]
    Cancelled {
        /// `host:port` of the server.
        address: String,
    },

    /// A server address string could not be understood.
    #[error("invalid server address: {0}")]
    InvalidAddress(String),
}
