/*!
 * VFS Types
 * Errors for the file-like pipe facade
 */

use crate::pipe::PipeError;
use std::io;
use thiserror::Error;

/// VFS operation result
pub type VfsResult<T> = Result<T, VfsError>;

/// VFS errors
#[derive(Error, Debug)]
pub enum VfsError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Closed")]
    Closed,

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<PipeError> for VfsError {
    fn from(err: PipeError) -> Self {
        match err {
            PipeError::NotFound(name) => VfsError::NotFound(name),
            PipeError::AlreadyExists(name) => VfsError::AlreadyExists(name),
            PipeError::Closed => VfsError::Closed,
            PipeError::Timeout { elapsed_ms, .. } => VfsError::Timeout { elapsed_ms },
            PipeError::InvalidOperation(msg) => VfsError::IoError(msg),
        }
    }
}

impl From<VfsError> for io::Error {
    fn from(err: VfsError) -> Self {
        let kind = match &err {
            VfsError::NotFound(_) => io::ErrorKind::NotFound,
            VfsError::AlreadyExists(_) => io::ErrorKind::AlreadyExists,
            VfsError::Closed => io::ErrorKind::BrokenPipe,
            VfsError::NotSupported(_) => io::ErrorKind::Unsupported,
            VfsError::Timeout { .. } => io::ErrorKind::TimedOut,
            VfsError::IoError(_) => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
