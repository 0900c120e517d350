//! Committing a chosen free block to an allocation, splitting when the
//! leftover slack is large enough to host another block.

use log::debug;

use crate::block;
use crate::seglist;

/// Places an allocation of `asize` bytes into the free block `bp` (which must
/// already be large enough), splitting off the tail as a new free block when
/// at least [`block::MIN_BLOCK_SIZE`] bytes of slack remain.
///
/// # Safety
/// `bp` must be the payload address of a free block linked into the
/// segregated index rooted at `buckets`, with `size(bp's header) >= asize`.
pub unsafe fn place(buckets: *mut u8, bp: *mut u8, asize: usize) {
  let header = unsafe { block::read_header(bp) };
  let csize = block::size_of_word(header);
  let prev_alloc = block::is_prev_alloc(header);

  unsafe { seglist::unlink(buckets, bp, csize) };

  if csize - asize >= block::MIN_BLOCK_SIZE {
    unsafe {
      block::write_block(bp, asize, true, prev_alloc);
      let tail = block::next_block(bp);
      let tail_size = csize - asize;
      block::write_block(tail, tail_size, false, true);
      seglist::insert(buckets, tail, tail_size);
    }
    debug!("place: bp={bp:p} split asize={asize} csize={csize} tail_size={}", csize - asize);
  } else {
    unsafe {
      block::write_block(bp, csize, true, prev_alloc);
      let next = block::next_block(bp);
      let next_header = block::read_header(next);
      let next_size = block::size_of_word(next_header);
      let next_this_alloc = block::is_alloc(next_header);
      block::write_header(next, block::pack(next_size, block::flags(next_this_alloc, true)));
    }
    debug!("place: bp={bp:p} no split csize={csize}");
  }
}
