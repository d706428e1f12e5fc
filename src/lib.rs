//! # tagalloc - A Boundary-Tag Heap Allocator
//!
//! This crate provides a dynamic memory allocator that manages a single,
//! contiguous, growable heap region: an **implicit free list** with
//! **boundary-tag coalescing** and **next-fit** placement.
//!
//! ## Overview
//!
//! Every block, free or allocated, carries its size and allocated bit twice:
//! in a header word before the payload and in a footer word at its end. The
//! blocks tile the heap with no gaps, so the list of blocks is implicit in
//! their sizes.
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌──────┬──────────┬──────────┬─────────────────────────────┬──────────┐
//!   │ pad  │ hdr(8:a) │ ftr(8:a) │   zero or more user blocks  │ hdr(0:a) │
//!   └──────┴──────────┴──────────┴─────────────────────────────┴──────────┘
//!          │       prologue      │                             │ epilogue │
//!
//!   A single block:
//!
//!   ┌────────────┬───────────────────────────────────┬────────────┐
//!   │ size | a/f │              payload              │ size | a/f │
//!   └────────────┴───────────────────────────────────┴────────────┘
//!     4 bytes    ▲                                      4 bytes
//!                └── BlockPtr handed to the caller (8-byte aligned)
//! ```
//!
//! The prologue and epilogue are permanently allocated, so neither walking
//! forward nor looking back from a block ever needs a bounds check.
//!
//! ## Crate Structure
//!
//! ```text
//!   tagalloc
//!   ├── align    - Alignment macros (align!, align_to!)
//!   ├── block    - Header/footer codec and block navigation
//!   ├── check    - Heap consistency checker
//!   ├── config   - HeapConfig and the default constants
//!   ├── error    - HeapError
//!   ├── guard    - Live-allocation tracking for checked heaps (internal)
//!   ├── heap     - Heap: init, malloc, free, realloc
//!   └── memlib   - MemLib, the sbrk-style backing region
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tagalloc::Heap;
//!
//! let mut heap = Heap::new().expect("failed to reserve heap");
//!
//! let bp = heap.malloc(100).expect("out of memory");
//! heap.payload_mut(bp)[..5].copy_from_slice(b"hello");
//!
//! let bp = heap.realloc(bp, 400);
//! assert_eq!(&heap.payload(bp)[..5], b"hello");
//!
//! heap.free(bp);
//! assert!(heap.check_heap(false).is_empty());
//! ```
//!
//! ## How It Works
//!
//! **Allocation** rounds the request up to a multiple of 8 bytes plus 8 bytes
//! of tags (16 bytes at least), then searches for a free block that is large
//! enough. The search starts where the previous one stopped and wraps around
//! once:
//!
//! ```text
//!   ┌────┬────┬────┬────┬────┬────┬────┬────┐
//!   │ A  │ f  │ A  │ A  │ f  │ A  │ f  │ A  │
//!   └────┴────┴────┴────┴────┴────┴────┴────┘
//!                  ▲
//!                rover ──────────────────► epilogue, then
//!   heap start ───►│ (up to where the rover began)
//! ```
//!
//! A fitting block is split when the leftover can hold a block of its own.
//! When nothing fits, the region is extended by the larger of the request
//! and the chunk size (4 KiB by default).
//!
//! **Free** clears the allocated bit and merges the block with free
//! neighbours, found in O(1) through the neighbours' header and footer:
//!
//! ```text
//!   before:  │ free │ freed │ free │      after:  │        free         │
//! ```
//!
//! Heap extension ends with the same merge, so new space joins a free block
//! that ended at the old top of the heap.
//!
//! **Realloc** always allocates a new block, copies the payload and frees the
//! old block.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: a [`Heap`] has no internal locking
//! - **Grow-only**: memory is never returned to the operating system
//! - **32-bit tags**: a block can hold at most about 4 GiB
//! - **Unix-only**: the region is reserved with `mmap(2)` through `libc`
//!
//! ## Safety
//!
//! Blocks are addressed with [`BlockPtr`] offsets and every access goes
//! through bounds-checked slices. Passing a `BlockPtr` that did not come
//! from the same heap, or one already freed, corrupts the heap unless
//! [`HeapConfig::checked`] is set, in which case it panics.

pub mod align;
mod block;
mod check;
mod config;
mod error;
mod guard;
mod heap;
mod memlib;

pub use block::{BlockInfo, BlockPtr, Blocks, DSIZE, MAX_BLOCK, MIN_BLOCK, WSIZE};
pub use check::HeapFault;
pub use config::{CHUNKSIZE, HeapConfig, MAX_HEAP};
pub use error::{HeapError, Result};
pub use heap::Heap;
pub use memlib::MemLib;
