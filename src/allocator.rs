//! The public surface: `init` / `allocate` / `free` / `resize` / `zero_init`,
//! and the debug invariant checker, wired on top of the segregated index,
//! the coalescer, the best-fit finder and the placer.
//!
//! # Region layout
//!
//! ```text
//!   [index: 12 words] [pad: 1 word] [prologue hdr] [prologue ftr]
//!     [ ... user blocks ... ] [epilogue hdr]
//! ```
//!
//! The prologue is a fake allocated 16-byte block that lets every real block
//! treat "the one before me" uniformly, without a special case at the low
//! end of the heap. The epilogue is a zero-sized allocated header; heap
//! traversal stops the moment it reads a header whose size field is zero.

use log::{error, info, warn};
use std::ptr;

use crate::align;
use crate::block::{self, DWORD, WORD};
use crate::coalesce;
use crate::error::AllocError;
use crate::find_fit;
use crate::heap::HeapProvider;
use crate::place;
use crate::seglist::{self, CLASSES};

/// The first extension `init` performs, before any allocation request has
/// been seen.
const INITIAL_CHUNK_BYTES: usize = 4096;

/// A segregated-free-list, best-fit, immediately-coalescing allocator over
/// a single managed region supplied by a [`HeapProvider`].
pub struct Allocator<H: HeapProvider> {
  heap: H,
  buckets: *mut u8,
  first_block: *mut u8,
  initialized: bool,
}

impl<H: HeapProvider> Allocator<H> {
  /// Builds an allocator over `heap`. Nothing is requested from the
  /// provider until [`Allocator::init`] is called.
  pub fn new(heap: H) -> Self {
    Self { heap, buckets: ptr::null_mut(), first_block: ptr::null_mut(), initialized: false }
  }

  /// Lays out the segregated index and the prologue/epilogue sentinels,
  /// then performs the initial 4096-byte extension. Returns `false` (and
  /// leaves the allocator unusable) if the heap provider refuses to grow.
  pub fn init(&mut self) -> bool {
    let buckets = match self.heap.grow(CLASSES * WORD) {
      Ok(addr) => addr,
      Err(err) => {
        warn!("init: failed to reserve segregated index: {err}");
        return false;
      }
    };
    for class in 0..CLASSES {
      unsafe { seglist::set_bucket_root(buckets, class, ptr::null_mut()) };
    }
    self.buckets = buckets;

    let sentinels = match self.heap.grow(4 * WORD) {
      Ok(addr) => addr,
      Err(err) => {
        warn!("init: failed to reserve prologue/epilogue: {err}");
        return false;
      }
    };
    unsafe {
      let pad = sentinels as *mut usize;
      let prologue_hdr = sentinels.add(WORD) as *mut usize;
      let prologue_ftr = sentinels.add(2 * WORD) as *mut usize;
      let epilogue_hdr = sentinels.add(3 * WORD) as *mut usize;

      pad.write(0);
      prologue_hdr.write(block::pack(DWORD, block::flags(true, true)));
      prologue_ftr.write(block::pack(DWORD, block::flags(true, true)));
      // prev-alloc = true: the block immediately before this slot is the
      // (allocated) prologue, until `extend` overwrites it for a real block.
      epilogue_hdr.write(block::pack(0, block::flags(true, true)));

      self.first_block = sentinels.add(4 * WORD);
    }

    self.initialized = true;
    match self.extend(INITIAL_CHUNK_BYTES) {
      Some(_) => {
        info!("init: ready, first_block={:p}", self.first_block);
        true
      }
      None => {
        self.initialized = false;
        warn!("init: initial extend of {INITIAL_CHUNK_BYTES} bytes failed");
        false
      }
    }
  }

  /// Grows the region by `bytes` (aligned up to 16), installs a new free
  /// block and epilogue, coalesces with the previous tail if it was free,
  /// and returns the (possibly merged) free block's payload address.
  fn extend(&mut self, bytes: usize) -> Option<*mut u8> {
    let size = align::align_up(bytes);
    let bp = match self.heap.grow(size) {
      Ok(addr) => addr,
      Err(err) => {
        warn!("extend({size}) failed: {err}");
        return None;
      }
    };

    // `bp`'s header slot currently holds the old epilogue's header word;
    // its prev-alloc bit is the only part of it we still need.
    let prev_alloc = block::is_prev_alloc(unsafe { block::read_header(bp) });

    unsafe {
      block::write_block(bp, size, false, prev_alloc);
      seglist::insert(self.buckets, bp, size);
      let epilogue = block::next_block(bp);
      block::write_header(epilogue, block::pack(0, block::flags(true, false)));
    }

    info!("extend: +{size} bytes at {bp:p}");
    Some(unsafe { coalesce::coalesce(self.buckets, bp) })
  }

  /// Allocates `request` bytes, returning a 16-byte-aligned payload address
  /// or null on invalid input or out-of-memory.
  pub fn allocate(&mut self, request: usize) -> *mut u8 {
    if !self.initialized || request == 0 {
      return ptr::null_mut();
    }

    let asize = align::align_up(request + DWORD);

    let bp = unsafe { find_fit::find_fit(self.buckets, asize) };
    if !bp.is_null() {
      unsafe { place::place(self.buckets, bp, asize) };
      return bp;
    }

    match self.extend(asize) {
      Some(bp) => {
        unsafe { place::place(self.buckets, bp, asize) };
        bp
      }
      None => ptr::null_mut(),
    }
  }

  /// Frees a previously allocated (and not yet freed) payload address.
  /// `free(null)` is a no-op.
  pub fn free(&mut self, bp: *mut u8) {
    if bp.is_null() {
      return;
    }

    unsafe {
      let header = block::read_header(bp);
      let size = block::size_of_word(header);
      let prev_alloc = block::is_prev_alloc(header);
      block::write_block(bp, size, false, prev_alloc);

      let next = block::next_block(bp);
      let next_header = block::read_header(next);
      let next_size = block::size_of_word(next_header);
      let next_this_alloc = block::is_alloc(next_header);
      block::write_header(next, block::pack(next_size, block::flags(next_this_alloc, false)));

      seglist::insert(self.buckets, bp, size);
      coalesce::coalesce(self.buckets, bp);
    }
  }

  /// Resizes the allocation at `bp` to `new_size` bytes, preserving
  /// `min(new_size, old_usable_size)` leading bytes of content.
  ///
  /// `resize(null, n)` behaves as `allocate(n)`; `resize(bp, 0)` behaves as
  /// `free(bp)` followed by returning null.
  pub fn resize(&mut self, bp: *mut u8, new_size: usize) -> *mut u8 {
    if bp.is_null() {
      return self.allocate(new_size);
    }
    if new_size == 0 {
      self.free(bp);
      return ptr::null_mut();
    }

    let old_usable = block::size_of_word(unsafe { block::read_header(bp) }) - WORD;

    let new_bp = self.allocate(new_size);
    if new_bp.is_null() {
      return ptr::null_mut();
    }

    let copy_len = old_usable.min(new_size);
    unsafe { ptr::copy_nonoverlapping(bp, new_bp, copy_len) };
    self.free(bp);
    new_bp
  }

  /// Allocates space for `count` elements of `size` bytes each and
  /// zero-fills it.
  pub fn zero_init(&mut self, count: usize, size: usize) -> *mut u8 {
    let total = count.saturating_mul(size);
    let bp = self.allocate(total);
    if !bp.is_null() {
      unsafe { ptr::write_bytes(bp, 0, total) };
    }
    bp
  }

  /// Walks the full heap and segregated index and returns `true` if every
  /// invariant in the data model holds. Logs each violation at `error!`
  /// before returning, tagging them with the caller-supplied `line_hint`.
  pub fn check_invariants(&self, line_hint: u32) -> bool {
    let violations = self.check_invariants_verbose();
    for violation in &violations {
      error!("check_invariants (near line {line_hint}): {violation}");
    }
    violations.is_empty()
  }

  /// As [`Allocator::check_invariants`], but returns every violation found
  /// instead of stopping at the first (or collapsing to a bool). Exposed for
  /// the test suite.
  pub fn check_invariants_verbose(&self) -> Vec<String> {
    let mut violations = Vec::new();

    if !self.initialized {
      violations.push("allocator not initialized".to_string());
      return violations;
    }

    let mut heap_free: Vec<(*mut u8, usize)> = Vec::new();
    let mut bp = self.first_block;
    let mut prev_was_alloc = true; // the prologue is allocated.
    let mut total_size = 0usize;

    loop {
      let header = unsafe { block::read_header(bp) };
      let size = block::size_of_word(header);
      if size == 0 {
        break; // epilogue reached.
      }
      if size % align::ALIGNMENT != 0 || size < block::MIN_BLOCK_SIZE {
        let err = AllocError::InvalidRequest("block size read from header is not a valid block size");
        error!("check_invariants: block {bp:p}: {err}");
        violations.push(format!("block {bp:p}: {err}"));
        break;
      }

      let this_alloc = block::is_alloc(header);
      let prev_alloc_bit = block::is_prev_alloc(header);

      if prev_alloc_bit != prev_was_alloc {
        violations.push(format!(
          "block {bp:p}: prev-alloc bit is {prev_alloc_bit} but preceding block's alloc bit is {prev_was_alloc}"
        ));
      }

      if this_alloc {
        if (bp as usize) % align::ALIGNMENT != 0 {
          violations.push(format!("block {bp:p}: payload is not 16-byte aligned"));
        }
      } else {
        let footer = unsafe { block::read_footer(bp, size) };
        if footer != header {
          violations.push(format!("block {bp:p}: header {header:#x} != footer {footer:#x}"));
        }
        if !prev_was_alloc {
          violations.push(format!("block {bp:p}: adjacent free blocks were not coalesced"));
        }
        heap_free.push((bp, size));
      }

      total_size += size;
      prev_was_alloc = this_alloc;
      bp = unsafe { block::next_block(bp) };
    }

    let managed_extent = (self.heap.high() as usize) - (self.first_block as usize) + 1;
    if total_size != managed_extent {
      violations.push(format!(
        "sum of block sizes {total_size} does not match managed extent {managed_extent}"
      ));
    }

    let mut bucket_free: Vec<(*mut u8, usize)> = Vec::new();
    for class in 0..CLASSES {
      let mut curr = unsafe { seglist::bucket_root(self.buckets, class) };
      while !curr.is_null() {
        let size = block::size_of_word(unsafe { block::read_header(curr) });
        if block::is_alloc(unsafe { block::read_header(curr) }) {
          violations.push(format!("bucket {class}: block {curr:p} is marked allocated"));
        }
        if seglist::class_of(size) != class {
          violations.push(format!(
            "bucket {class}: block {curr:p} of size {size} belongs in class {}",
            seglist::class_of(size)
          ));
        }
        if (curr as usize) < (self.heap.low() as usize) || (curr as usize) > (self.heap.high() as usize)
        {
          violations.push(format!("bucket {class}: block {curr:p} lies outside heap bounds"));
        }
        bucket_free.push((curr, size));
        curr = unsafe { block::read_link_next(curr) };
      }
    }

    if heap_free.len() != bucket_free.len() {
      violations.push(format!(
        "heap walk found {} free blocks but the segregated index holds {}",
        heap_free.len(),
        bucket_free.len()
      ));
    }
    for (addr, size) in &heap_free {
      if !bucket_free.contains(&(*addr, *size)) {
        violations.push(format!("free block {addr:p} (size {size}) is missing from its bucket"));
      }
    }

    violations
  }
}
