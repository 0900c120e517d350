//! The segregated free-list index: size-class bucketing, insertion and
//! unlinking.
//!
//! The index is an array of [`CLASSES`] word-sized bucket roots living at
//! the very start of the managed region (see [`crate::allocator`]). Each
//! bucket is a doubly-linked list threaded through the first two payload
//! words of its free blocks, via [`block::read_link_next`] /
//! [`block::write_link_prev`] and friends.

use log::trace;
use std::ptr;

use crate::block::{self, WORD};

/// Number of size classes in the segregated index.
pub const CLASSES: usize = 12;

/// Size class for a block of payload size `size`: class 0 covers `<= 32`,
/// class `i` covers `(32 * 2^(i-1), 32 * 2^i]`, class 11 is unbounded above.
#[inline]
pub const fn class_of(size: usize) -> usize {
  let mut class = 0;
  let mut threshold = 32;
  while size > threshold && class < CLASSES - 1 {
    threshold *= 2;
    class += 1;
  }
  class
}

/// Reads the root of bucket `class` from the index starting at `buckets`.
///
/// # Safety
/// `buckets` must point at a live array of at least [`CLASSES`] words.
#[inline]
pub unsafe fn bucket_root(buckets: *mut u8, class: usize) -> *mut u8 {
  unsafe { (buckets.add(class * WORD) as *mut *mut u8).read() }
}

/// Writes the root of bucket `class` in the index starting at `buckets`.
///
/// # Safety
/// `buckets` must point at a live array of at least [`CLASSES`] words.
#[inline]
pub unsafe fn set_bucket_root(buckets: *mut u8, class: usize, bp: *mut u8) {
  unsafe { (buckets.add(class * WORD) as *mut *mut u8).write(bp) }
}

/// Links free block `bp` (of `size` bytes) at the head of its bucket. O(1).
///
/// # Safety
/// `bp` must be the payload address of a free block not already linked into
/// any bucket, and `buckets` must point at a live index of [`CLASSES`] words.
pub unsafe fn insert(buckets: *mut u8, bp: *mut u8, size: usize) {
  let class = class_of(size);
  let head = unsafe { bucket_root(buckets, class) };

  unsafe {
    block::write_link_next(bp, head);
    block::write_link_prev(bp, ptr::null_mut());
    if !head.is_null() {
      block::write_link_prev(head, bp);
    }
    set_bucket_root(buckets, class, bp);
  }

  trace!("seglist: insert bp={bp:p} size={size} class={class}");
}

/// Unlinks free block `bp` (of `size` bytes) from its bucket. O(1).
///
/// Canonical four-case form on (prev, next) nullity: both null empties the
/// bucket; one side null rewires the other end to null; both non-null
/// splices `bp` out of the middle.
///
/// # Safety
/// `bp` must currently be linked into the bucket `class_of(size)`, and
/// `buckets` must point at a live index of [`CLASSES`] words.
pub unsafe fn unlink(buckets: *mut u8, bp: *mut u8, size: usize) {
  let class = class_of(size);
  let prev = unsafe { block::read_link_prev(bp) };
  let next = unsafe { block::read_link_next(bp) };

  match (prev.is_null(), next.is_null()) {
    (true, true) => unsafe { set_bucket_root(buckets, class, ptr::null_mut()) },
    (true, false) => unsafe {
      set_bucket_root(buckets, class, next);
      block::write_link_prev(next, ptr::null_mut());
    },
    (false, true) => unsafe { block::write_link_next(prev, ptr::null_mut()) },
    (false, false) => unsafe {
      block::write_link_next(prev, next);
      block::write_link_prev(next, prev);
    },
  }

  trace!("seglist: unlink bp={bp:p} size={size} class={class}");
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn class_boundaries() {
    assert_eq!(class_of(1), 0);
    assert_eq!(class_of(32), 0);
    assert_eq!(class_of(33), 1);
    assert_eq!(class_of(64), 1);
    assert_eq!(class_of(65), 2);
    assert_eq!(class_of(128), 2);
    assert_eq!(class_of(32768), 10);
    assert_eq!(class_of(32769), 11);
    assert_eq!(class_of(1 << 30), 11);
  }

  #[test]
  fn insert_then_unlink_single_element_empties_bucket() {
    let mut buckets = [0usize; CLASSES];
    let buckets_ptr = buckets.as_mut_ptr() as *mut u8;
    let mut block_storage = [0u8; 64];
    let bp = unsafe { block_storage.as_mut_ptr().add(WORD) };

    unsafe {
      insert(buckets_ptr, bp, 48);
      assert_eq!(bucket_root(buckets_ptr, class_of(48)), bp);
      unlink(buckets_ptr, bp, 48);
      assert!(bucket_root(buckets_ptr, class_of(48)).is_null());
    }
  }

  #[test]
  fn insert_links_lifo_and_unlink_middle_splices() {
    let mut buckets = [0usize; CLASSES];
    let buckets_ptr = buckets.as_mut_ptr() as *mut u8;
    let mut a_storage = [0u8; 64];
    let mut b_storage = [0u8; 64];
    let mut c_storage = [0u8; 64];
    let a = unsafe { a_storage.as_mut_ptr().add(WORD) };
    let b = unsafe { b_storage.as_mut_ptr().add(WORD) };
    let c = unsafe { c_storage.as_mut_ptr().add(WORD) };

    unsafe {
      insert(buckets_ptr, a, 40);
      insert(buckets_ptr, b, 40);
      insert(buckets_ptr, c, 40);
      // LIFO: head is the most recently inserted.
      assert_eq!(bucket_root(buckets_ptr, class_of(40)), c);
      assert_eq!(block::read_link_next(c), b);
      assert_eq!(block::read_link_next(b), a);
      assert!(block::read_link_next(a).is_null());

      unlink(buckets_ptr, b, 40);
      assert_eq!(block::read_link_next(c), a);
      assert_eq!(block::read_link_prev(a), c);
    }
  }
}
