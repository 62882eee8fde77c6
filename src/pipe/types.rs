/*!
 * Pipe Types
 * Common types, errors, and the listener contract for pipes
 */

use crate::core::types::Size;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipe error types
#[derive(Debug, Error)]
pub enum PipeError {
    #[error("Pipe not found: {0}")]
    NotFound(String),

    #[error("Pipe already exists: {0}")]
    AlreadyExists(String),

    #[error("Pipe closed")]
    Closed,

    #[error("Operation timed out after {elapsed_ms}ms (timeout: {}ms)", timeout_ms.map(|t| t.to_string()).unwrap_or_else(|| "none".to_string()))]
    Timeout {
        elapsed_ms: u64,
        timeout_ms: Option<u64>,
    },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// Observer for buffer stall conditions
///
/// Notified while a writer is blocked on a full buffer (overflow) or a reader
/// is blocked on an empty one that has not reached end of stream (underflow).
/// Callbacks are invoked without the pipe lock held and are re-delivered once
/// per wait slice for as long as the stall persists, so a consumer can keep a
/// buffering indicator alive.
pub trait PipeListener: Send + Sync {
    /// The writer cannot fit more bytes; the buffer is full
    fn on_overflow(&self);

    /// The reader wants bytes; the buffer is empty and not at end of stream
    fn on_underflow(&self);
}

fn is_false(v: &bool) -> bool {
    !*v
}

fn is_zero(v: &Size) -> bool {
    *v == 0
}

/// Pipe statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipeStats {
    pub name: String,
    pub capacity: Size,
    #[serde(skip_serializing_if = "is_zero")]
    pub buffered: Size,
    /// Active holders of the pipe (registry reference excluded)
    pub holders: Size,
    #[serde(skip_serializing_if = "is_false")]
    pub closed: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub eof: bool,
}
