/*!
 * Pipe Module
 * Named in-process pipes for streaming bytes between producer and consumer
 */

pub mod manager;
pub mod pipe;
pub mod types;

// Re-export public API
pub use manager::PipesManager;
pub use pipe::Pipe;
pub use types::{PipeError, PipeListener, PipeStats};
