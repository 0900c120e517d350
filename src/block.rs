//! Block header/footer codec and the narrow unsafe raw-pointer surface.
//!
//! This is the only module in the crate that reads or writes heap memory
//! directly. Every other component (`seglist`, `coalesce`, `find_fit`,
//! `place`, `allocator`) operates on payload addresses (`*mut u8`) and
//! treats the functions here as primitives; none of them ever read or write
//! a header/footer word themselves.
//!
//! A block's header (and, when free, its footer) is one machine word:
//!
//! ```text
//! bits [63:3]  block size in bytes, always a multiple of 16
//! bit  1       prev-alloc: 1 if the preceding block is allocated
//! bit  0       this-alloc: 1 if this block is allocated
//! ```

use std::mem;

/// Size of one machine word, and of a header or footer.
pub const WORD: usize = mem::size_of::<usize>();
/// Size of two machine words (the smallest unit a split can produce).
pub const DWORD: usize = 2 * WORD;
/// Minimum block size: header + two free-list link words + footer.
pub const MIN_BLOCK_SIZE: usize = 2 * DWORD;

const THIS_ALLOC_BIT: usize = 0b01;
const PREV_ALLOC_BIT: usize = 0b10;
const SIZE_MASK: usize = !0b111;

/// Packs a block size and flag bits into one header/footer word.
#[inline]
pub const fn pack(size: usize, flags: usize) -> usize {
  size | flags
}

/// Builds the flag bits for [`pack`] from this-block and prev-block alloc status.
#[inline]
pub const fn flags(this_alloc: bool, prev_alloc: bool) -> usize {
  (this_alloc as usize) | ((prev_alloc as usize) << 1)
}

/// Extracts the size field from a header/footer word.
#[inline]
pub const fn size_of_word(word: usize) -> usize {
  word & SIZE_MASK
}

/// Extracts this block's allocation bit from a header/footer word.
#[inline]
pub const fn is_alloc(word: usize) -> bool {
  word & THIS_ALLOC_BIT != 0
}

/// Extracts the preceding block's allocation bit from a header/footer word.
#[inline]
pub const fn is_prev_alloc(word: usize) -> bool {
  word & PREV_ALLOC_BIT != 0
}

#[inline]
unsafe fn read_word(p: *mut u8) -> usize {
  unsafe { (p as *mut usize).read() }
}

#[inline]
unsafe fn write_word(p: *mut u8, value: usize) {
  unsafe { (p as *mut usize).write(value) }
}

/// Address of the header word belonging to the block whose payload is `bp`.
#[inline]
pub fn header_addr(bp: *mut u8) -> *mut u8 {
  unsafe { bp.sub(WORD) }
}

/// Address of the footer word of a block of the given `size`, whose payload is `bp`.
///
/// Only meaningful while the block is free (allocated blocks omit the footer).
#[inline]
pub fn footer_addr(bp: *mut u8, size: usize) -> *mut u8 {
  unsafe { bp.add(size - DWORD) }
}

/// Reads the header word of the block at `bp`.
///
/// # Safety
/// `bp` must be a live payload address within the managed region.
#[inline]
pub unsafe fn read_header(bp: *mut u8) -> usize {
  unsafe { read_word(header_addr(bp)) }
}

/// Writes the header word of the block at `bp`.
///
/// # Safety
/// `bp` must be a live payload address within the managed region.
#[inline]
pub unsafe fn write_header(bp: *mut u8, word: usize) {
  unsafe { write_word(header_addr(bp), word) }
}

/// Reads the footer word of a free block of the given `size` at `bp`.
///
/// # Safety
/// `bp` must be the payload address of a free block whose size is `size`.
#[inline]
pub unsafe fn read_footer(bp: *mut u8, size: usize) -> usize {
  unsafe { read_word(footer_addr(bp, size)) }
}

/// Writes header (and, if free, footer) for a block of `size` at `bp`.
///
/// # Safety
/// `bp` must be a live payload address with at least `size` bytes available
/// ahead of it within the managed region.
pub unsafe fn write_block(bp: *mut u8, size: usize, this_alloc: bool, prev_alloc: bool) {
  let word = pack(size, flags(this_alloc, prev_alloc));
  unsafe {
    write_header(bp, word);
    if !this_alloc {
      write_word(footer_addr(bp, size), word);
    }
  }
}

/// Payload address of the block immediately following `bp` in address order.
///
/// # Safety
/// `bp`'s header must already hold a valid size.
#[inline]
pub unsafe fn next_block(bp: *mut u8) -> *mut u8 {
  let size = size_of_word(unsafe { read_header(bp) });
  unsafe { bp.add(size) }
}

/// Payload address of the block immediately preceding `bp`.
///
/// # Safety
/// Only valid when `bp`'s prev-alloc bit is clear (the preceding block is
/// free, and therefore has a footer to read its size from).
#[inline]
pub unsafe fn prev_block(bp: *mut u8) -> *mut u8 {
  let prev_footer = unsafe { bp.sub(DWORD) };
  let prev_size = size_of_word(unsafe { read_word(prev_footer) });
  unsafe { bp.sub(prev_size) }
}

/// Reads the "next free block" link stored in a free block's payload.
///
/// # Safety
/// `bp` must be the payload address of a free block.
#[inline]
pub unsafe fn read_link_next(bp: *mut u8) -> *mut u8 {
  unsafe { (bp as *mut *mut u8).read() }
}

/// Writes the "next free block" link stored in a free block's payload.
///
/// # Safety
/// `bp` must be the payload address of a free block.
#[inline]
pub unsafe fn write_link_next(bp: *mut u8, next: *mut u8) {
  unsafe { (bp as *mut *mut u8).write(next) }
}

/// Reads the "previous free block" link stored in a free block's payload.
///
/// # Safety
/// `bp` must be the payload address of a free block.
#[inline]
pub unsafe fn read_link_prev(bp: *mut u8) -> *mut u8 {
  unsafe { (bp.add(WORD) as *mut *mut u8).read() }
}

/// Writes the "previous free block" link stored in a free block's payload.
///
/// # Safety
/// `bp` must be the payload address of a free block.
#[inline]
pub unsafe fn write_link_prev(bp: *mut u8, prev: *mut u8) {
  unsafe { (bp.add(WORD) as *mut *mut u8).write(prev) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pack_and_unpack_roundtrip() {
    let word = pack(4096, flags(true, false));
    assert_eq!(size_of_word(word), 4096);
    assert!(is_alloc(word));
    assert!(!is_prev_alloc(word));

    let word = pack(32, flags(false, true));
    assert_eq!(size_of_word(word), 32);
    assert!(!is_alloc(word));
    assert!(is_prev_alloc(word));
  }

  #[test]
  fn write_block_mirrors_footer_only_when_free() {
    let mut buf = [0u8; 64];
    let bp = unsafe { buf.as_mut_ptr().add(WORD) };

    unsafe { write_block(bp, 48, false, true) };
    let hdr = unsafe { read_header(bp) };
    let ftr = unsafe { read_footer(bp, 48) };
    assert_eq!(hdr, ftr);
    assert_eq!(size_of_word(hdr), 48);
    assert!(!is_alloc(hdr));
    assert!(is_prev_alloc(hdr));
  }

  #[test]
  fn next_block_follows_size() {
    let mut buf = [0u8; 64];
    let bp = unsafe { buf.as_mut_ptr().add(WORD) };
    unsafe { write_block(bp, 32, true, true) };
    let next = unsafe { next_block(bp) };
    assert_eq!(next, unsafe { bp.add(32) });
  }
}
