//! Immediate coalescing: merging a just-freed block with its free address-order
//! neighbors.

use log::debug;

use crate::block;
use crate::seglist;

/// Merges `bp` (already linked into its bucket) with any free neighbors.
///
/// Returns the payload address of the resulting block: `bp` itself if no
/// merge happened or only the next neighbor merged in, or the preceding
/// block's address if a merge absorbed it.
///
/// # Safety
/// `bp` must be the payload address of a free block already inserted into
/// the segregated index rooted at `buckets`, with valid neighbors on both
/// sides (the prologue and epilogue sentinels guarantee this at the ends of
/// the region).
pub unsafe fn coalesce(buckets: *mut u8, bp: *mut u8) -> *mut u8 {
  let header = unsafe { block::read_header(bp) };
  let size = block::size_of_word(header);
  let prev_alloc = block::is_prev_alloc(header);

  let next = unsafe { block::next_block(bp) };
  let next_header = unsafe { block::read_header(next) };
  let next_alloc = block::is_alloc(next_header);

  if prev_alloc && next_alloc {
    debug!("coalesce: bp={bp:p} no merge");
    return bp;
  }

  if prev_alloc && !next_alloc {
    let next_size = block::size_of_word(next_header);
    let merged_size = size + next_size;
    unsafe {
      seglist::unlink(buckets, bp, size);
      seglist::unlink(buckets, next, next_size);
      block::write_block(bp, merged_size, false, true);
      seglist::insert(buckets, bp, merged_size);
    }
    debug!("coalesce: bp={bp:p} merged with next -> size={merged_size}");
    return bp;
  }

  let prev = unsafe { block::prev_block(bp) };
  let prev_header = unsafe { block::read_header(prev) };
  let prev_size = block::size_of_word(prev_header);
  let prev_prev_alloc = block::is_prev_alloc(prev_header);

  if !prev_alloc && next_alloc {
    let merged_size = prev_size + size;
    unsafe {
      seglist::unlink(buckets, bp, size);
      seglist::unlink(buckets, prev, prev_size);
      block::write_block(prev, merged_size, false, prev_prev_alloc);
      seglist::insert(buckets, prev, merged_size);
    }
    debug!("coalesce: bp={bp:p} merged with prev -> size={merged_size}");
    return prev;
  }

  // Both neighbors free.
  let next_size = block::size_of_word(next_header);
  let merged_size = prev_size + size + next_size;
  unsafe {
    seglist::unlink(buckets, bp, size);
    seglist::unlink(buckets, prev, prev_size);
    seglist::unlink(buckets, next, next_size);
    block::write_block(prev, merged_size, false, prev_prev_alloc);
    seglist::insert(buckets, prev, merged_size);
  }
  debug!("coalesce: bp={bp:p} merged with both neighbors -> size={merged_size}");
  prev
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::seglist::CLASSES;

  /// A tiny hand-built region: prologue-less, just three adjacent blocks
  /// followed by a sentinel allocated block, enough to exercise all four
  /// coalesce cases without going through `Allocator::init`.
  struct Region {
    buckets: Vec<usize>,
    storage: Vec<u8>,
  }

  impl Region {
    fn new(total: usize) -> Self {
      Self { buckets: vec![0usize; CLASSES], storage: vec![0u8; total] }
    }

    fn buckets_ptr(&mut self) -> *mut u8 {
      self.buckets.as_mut_ptr() as *mut u8
    }

    fn bp(&mut self, word_offset: usize) -> *mut u8 {
      unsafe { self.storage.as_mut_ptr().add(word_offset * block::WORD) }
    }
  }

  #[test]
  fn no_merge_when_both_neighbors_allocated() {
    let mut region = Region::new(256);
    let buckets = region.buckets_ptr();
    // header | payload(32) | header(next, allocated, size 0 sentinel)
    let bp = region.bp(1);
    unsafe {
      block::write_block(bp, 32, false, true);
      let next = block::next_block(bp);
      block::write_block(next, 0, true, false);
      seglist::insert(buckets, bp, 32);

      let result = coalesce(buckets, bp);
      assert_eq!(result, bp);
      assert_eq!(seglist::bucket_root(buckets, seglist::class_of(32)), bp);
    }
  }

  #[test]
  fn merges_with_free_next_neighbor() {
    let mut region = Region::new(256);
    let buckets = region.buckets_ptr();
    let bp = region.bp(1);
    unsafe {
      block::write_block(bp, 32, false, true);
      let next = block::next_block(bp);
      block::write_block(next, 32, false, false);
      let sentinel = block::next_block(next);
      block::write_block(sentinel, 0, true, false);

      seglist::insert(buckets, bp, 32);
      seglist::insert(buckets, next, 32);

      let result = coalesce(buckets, bp);
      assert_eq!(result, bp);
      let merged_hdr = block::read_header(bp);
      assert_eq!(block::size_of_word(merged_hdr), 64);
      assert!(block::is_prev_alloc(merged_hdr));
    }
  }

  #[test]
  fn merges_with_free_prev_neighbor() {
    let mut region = Region::new(256);
    let buckets = region.buckets_ptr();
    let prev = region.bp(1);
    unsafe {
      block::write_block(prev, 32, false, true);
      let bp = block::next_block(prev);
      block::write_block(bp, 32, false, false);
      let sentinel = block::next_block(bp);
      block::write_block(sentinel, 0, true, false);

      seglist::insert(buckets, prev, 32);
      seglist::insert(buckets, bp, 32);

      let result = coalesce(buckets, bp);
      assert_eq!(result, prev);
      let merged_hdr = block::read_header(prev);
      assert_eq!(block::size_of_word(merged_hdr), 64);
      assert!(block::is_prev_alloc(merged_hdr));
    }
  }

  #[test]
  fn merges_with_both_neighbors() {
    let mut region = Region::new(256);
    let buckets = region.buckets_ptr();
    let prev = region.bp(1);
    unsafe {
      block::write_block(prev, 32, false, true);
      let bp = block::next_block(prev);
      block::write_block(bp, 32, false, false);
      let next = block::next_block(bp);
      block::write_block(next, 32, false, false);
      let sentinel = block::next_block(next);
      block::write_block(sentinel, 0, true, false);

      seglist::insert(buckets, prev, 32);
      seglist::insert(buckets, bp, 32);
      seglist::insert(buckets, next, 32);

      let result = coalesce(buckets, bp);
      assert_eq!(result, prev);
      let merged_hdr = block::read_header(prev);
      assert_eq!(block::size_of_word(merged_hdr), 96);
    }
  }
}
