//! Best-fit search across the segregated index.

use log::trace;
use std::ptr;

use crate::block;
use crate::seglist;

/// Finds the smallest free block of at least `asize` bytes, searching bucket
/// classes from `class_of(asize)` upward and returning the first bucket that
/// yields a fit (best-fit within that bucket). Returns null if no block in
/// any bucket is large enough.
///
/// # Safety
/// `buckets` must point at a live segregated index of [`seglist::CLASSES`]
/// words, every block reachable from it must be free and well-formed.
pub unsafe fn find_fit(buckets: *mut u8, asize: usize) -> *mut u8 {
  let start_class = seglist::class_of(asize);

  for class in start_class..seglist::CLASSES {
    let mut curr = unsafe { seglist::bucket_root(buckets, class) };
    let mut best: *mut u8 = ptr::null_mut();
    let mut best_slack = usize::MAX;

    while !curr.is_null() {
      let size = block::size_of_word(unsafe { block::read_header(curr) });
      if size >= asize {
        let slack = size - asize;
        if slack < best_slack {
          best = curr;
          best_slack = slack;
          if slack == 0 {
            break;
          }
        }
      }
      curr = unsafe { block::read_link_next(curr) };
    }

    if !best.is_null() {
      trace!("find_fit: asize={asize} found bp={best:p} class={class} slack={best_slack}");
      return best;
    }
  }

  trace!("find_fit: asize={asize} no fit in any class");
  ptr::null_mut()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::block::WORD;

  fn bucket_storage() -> Vec<usize> {
    vec![0usize; seglist::CLASSES]
  }

  #[test]
  fn returns_null_on_empty_index() {
    let mut buckets = bucket_storage();
    let buckets_ptr = buckets.as_mut_ptr() as *mut u8;
    unsafe {
      assert!(find_fit(buckets_ptr, 64).is_null());
    }
  }

  #[test]
  fn picks_exact_match_over_larger_blocks() {
    let mut buckets = bucket_storage();
    let buckets_ptr = buckets.as_mut_ptr() as *mut u8;

    let mut big_storage = [0u8; 256];
    let mut exact_storage = [0u8; 256];
    let big = unsafe { big_storage.as_mut_ptr().add(WORD) };
    let exact = unsafe { exact_storage.as_mut_ptr().add(WORD) };

    unsafe {
      block::write_block(big, 128, false, true);
      block::write_block(exact, 80, false, true);
      seglist::insert(buckets_ptr, big, 128);
      seglist::insert(buckets_ptr, exact, 80);

      let found = find_fit(buckets_ptr, 80);
      assert_eq!(found, exact);
    }
  }

  #[test]
  fn falls_back_to_larger_class_when_own_class_has_no_fit() {
    let mut buckets = bucket_storage();
    let buckets_ptr = buckets.as_mut_ptr() as *mut u8;

    // A 200-byte block lands in class 3 (128, 256], but we ask for asize=80,
    // which starts searching from class 2. Class 2 is empty, so the
    // search must fall through to class 3.
    let mut storage = [0u8; 256];
    let bp = unsafe { storage.as_mut_ptr().add(WORD) };
    unsafe {
      block::write_block(bp, 200, false, true);
      seglist::insert(buckets_ptr, bp, 200);

      let found = find_fit(buckets_ptr, 80);
      assert_eq!(found, bp);
    }
  }
}
