/*!
 * Core Types
 * Common types used across the crate
 */

/// Size type for buffer operations
pub type Size = usize;
