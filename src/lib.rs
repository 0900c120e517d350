//! # seglloc - A Segregated Free-List Memory Allocator
//!
//! This crate provides a **segregated free-list allocator** with best-fit
//! placement and immediate coalescing, managing memory pulled from a
//! pluggable [`HeapProvider`] backend (a real `sbrk`-backed heap in
//! production, an in-process buffer in tests).
//!
//! ## Overview
//!
//! Free blocks are bucketed by size class into a small array of linked-list
//! roots. An allocation request searches its size class and upward for the
//! tightest fit, splits off unused slack when it's large enough to host
//! another block, and on release immediately merges with any free neighbor:
//!
//! ```text
//!   Segregated free lists:
//!
//!   class 0 (<=32)   -> [bp] -> [bp] -> null
//!   class 1 (<=64)   -> null
//!   class 2 (<=128)  -> [bp] -> null
//!   ...
//!   class 11 (huge)  -> [bp] -> null
//! ```
//!
//! Each block carries a boundary-tag header (and, while free, a footer) so
//! that a block's left neighbor can be located and coalescing stays O(1).
//!
//! ## Crate Structure
//!
//! ```text
//!   seglloc
//!   ├── align      - Alignment helpers
//!   ├── block      - Block header/footer codec (internal, unsafe surface)
//!   ├── seglist    - Segregated free-list bucket index
//!   ├── coalesce   - Immediate coalescing of freed blocks
//!   ├── find_fit   - Best-fit search across buckets
//!   ├── place      - Committing a fit to an allocation, with splitting
//!   ├── heap       - Pluggable heap backends (HeapProvider, SbrkHeap, VecHeap)
//!   ├── error      - Internal error type
//!   └── allocator  - Allocator<H>: the public surface
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use seglloc::{Allocator, SbrkHeap};
//!
//! fn main() {
//!     let mut alloc = Allocator::new(SbrkHeap::new());
//!
//!     unsafe {
//!         let ptr = alloc.allocate(64) as *mut u64;
//!         *ptr = 42;
//!         println!("Value: {}", *ptr);
//!         alloc.free(ptr as *mut u8);
//!     }
//! }
//! ```
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory management.
//! Unsafe raw-pointer access is confined to [`block`] and the functions in
//! [`seglist`], [`coalesce`], [`find_fit`] and [`place`] that operate on
//! block pointers; [`allocator::Allocator`] is the only public entry point
//! and every unsafe precondition is documented at the function that needs it.

pub mod align;
mod block;
mod coalesce;
mod find_fit;
mod place;
mod seglist;

pub mod error;
pub mod heap;

mod allocator;

pub use allocator::Allocator;
pub use error::AllocError;
pub use heap::{HeapProvider, SbrkHeap, VecHeap};
