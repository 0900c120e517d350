//! Heap provider: the external collaborator that grows the managed region.
//!
//! The core allocator is built against the [`HeapProvider`] trait only; it
//! never calls `sbrk` (or anything else) directly. [`SbrkHeap`] extends the
//! process break via `libc::sbrk`. [`VecHeap`] is a deterministic, in-process
//! stand-in used by the test suite so tests never perturb the test binary's
//! actual program break.

use log::warn;
use std::ptr;

use crate::error::AllocError;

/// Grows a managed region by `n` bytes and reports its current bounds.
/// Implementations never shrink the region.
pub trait HeapProvider {
  /// Advances the managed region by `bytes` and returns the start address
  /// of the newly added bytes.
  fn grow(&mut self, bytes: usize) -> Result<*mut u8, AllocError>;

  /// Inclusive low bound of the currently managed region.
  fn low(&self) -> *mut u8;

  /// Inclusive high bound of the currently managed region.
  fn high(&self) -> *mut u8;
}

/// A [`HeapProvider`] backed by the process's real data segment via `sbrk(2)`.
pub struct SbrkHeap {
  base: *mut u8,
  brk: *mut u8,
}

impl SbrkHeap {
  /// Creates a provider that has not yet requested any memory.
  pub const fn new() -> Self {
    Self { base: ptr::null_mut(), brk: ptr::null_mut() }
  }
}

impl Default for SbrkHeap {
  fn default() -> Self {
    Self::new()
  }
}

impl HeapProvider for SbrkHeap {
  fn grow(&mut self, bytes: usize) -> Result<*mut u8, AllocError> {
    let addr = unsafe { libc::sbrk(bytes as libc::intptr_t) };
    if addr == usize::MAX as *mut libc::c_void {
      warn!("SbrkHeap::grow({bytes}) failed: sbrk returned -1");
      return Err(AllocError::OutOfMemory);
    }

    let start = addr as *mut u8;
    if self.base.is_null() {
      self.base = start;
    }
    self.brk = unsafe { start.add(bytes) };
    Ok(start)
  }

  fn low(&self) -> *mut u8 {
    self.base
  }

  fn high(&self) -> *mut u8 {
    unsafe { self.brk.sub(1) }
  }
}

/// A [`HeapProvider`] backed by a fixed-capacity in-process buffer, used by
/// the test suite so allocator tests are hermetic.
pub struct VecHeap {
  storage: Vec<u8>,
  used: usize,
}

impl VecHeap {
  /// Reserves `capacity` bytes of backing storage up front; `grow` never
  /// reallocates, so returned addresses stay stable for the provider's
  /// lifetime.
  pub fn with_capacity(capacity: usize) -> Self {
    Self { storage: vec![0u8; capacity], used: 0 }
  }
}

impl HeapProvider for VecHeap {
  fn grow(&mut self, bytes: usize) -> Result<*mut u8, AllocError> {
    if self.used + bytes > self.storage.len() {
      warn!(
        "VecHeap::grow({bytes}) failed: capacity exhausted ({}/{})",
        self.used,
        self.storage.len()
      );
      return Err(AllocError::OutOfMemory);
    }

    let start = unsafe { self.storage.as_mut_ptr().add(self.used) };
    self.used += bytes;
    Ok(start)
  }

  fn low(&self) -> *mut u8 {
    self.storage.as_ptr() as *mut u8
  }

  fn high(&self) -> *mut u8 {
    unsafe { self.storage.as_ptr().add(self.used.max(1) - 1) as *mut u8 }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn vec_heap_grows_contiguously() {
    let mut heap = VecHeap::with_capacity(4096);
    let a = heap.grow(64).unwrap();
    let b = heap.grow(128).unwrap();
    assert_eq!(unsafe { a.add(64) }, b);
  }

  #[test]
  fn vec_heap_reports_out_of_memory_without_mutating() {
    let mut heap = VecHeap::with_capacity(64);
    let first = heap.grow(64).unwrap();
    let err = heap.grow(1).unwrap_err();
    assert_eq!(err, AllocError::OutOfMemory);
    assert_eq!(heap.low(), first);
  }
}
