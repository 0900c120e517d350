//! Internal error type for the boundary between the allocator core and the
//! heap provider.
//!
//! None of this is part of the public surface: [`crate::allocator::Allocator`]
//! collapses every [`AllocError`] to `null`/`false` per the error taxonomy,
//! it just gives the internal plumbing (and the logs) a typed reason first.

use thiserror::Error;

/// A failure internal to the allocator core or one of its heap providers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocError {
  /// The heap provider refused to grow the managed region.
  #[error("heap provider refused to grow the managed region")]
  OutOfMemory,
  /// An internal invariant the caller is responsible for was violated.
  #[error("invalid internal request: {0}")]
  InvalidRequest(&'static str),
}
