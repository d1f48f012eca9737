//! Error types raised by the ingest server itself.
//!
//! Per-message domain failures live next to the domain in [`crate::sku`];
//! they are absorbed into the report and never surface here.

use crate::shutdown::StopReason;
use std::io;
use thiserror::Error;

/// Failure of a single accept-and-read attempt.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The run's time budget elapsed before a line arrived.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The listener can no longer accept connections.
    #[error("listener failed: {0}")]
    Fatal(#[source] io::Error),

    /// One accepted connection could not be read to a line.
    #[error("connection failed: {0}")]
    Connection(#[source] io::Error),

    /// Shutdown began while still waiting for a client.
    #[error("read cancelled by shutdown")]
    Cancelled,
}

impl ReadError {
    /// Reason this failure stops admission, if it does.
    ///
    /// Every failure except a cancelled wait ends the run; a cancelled
    /// wait only happens once a stop is already under way.
    pub fn stop_reason(&self) -> Option<StopReason> {
        match self {
            ReadError::DeadlineExceeded => Some(StopReason::DeadlineExceeded),
            ReadError::Fatal(_) => Some(StopReason::ListenerFatal),
            ReadError::Connection(_) => Some(StopReason::ReadFailed),
            ReadError::Cancelled => None,
        }
    }

    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ReadError::DeadlineExceeded => "deadline_exceeded",
            ReadError::Fatal(_) => "listener_fatal",
            ReadError::Connection(_) => "connection_error",
            ReadError::Cancelled => "cancelled",
        }
    }
}

/// Errors preventing the server from starting.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("cannot resolve listen address '{addr}': {source}")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to bind '{addr}': {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
}
