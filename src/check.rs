use std::fmt;

use log::warn;

use crate::{
  block::{BlockPtr, DSIZE, MIN_BLOCK, WSIZE, size_of},
  heap::Heap,
};

/// A structural problem found by [`Heap::check_heap`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeapFault {
  BadPrologue,
  BadEpilogue,
  /// Payload address not on a double-word boundary.
  Misaligned(BlockPtr),
  /// Header and footer disagree.
  TagMismatch { bp: BlockPtr, header: u32, footer: u32 },
  /// Size below the minimum block or not a multiple of [`DSIZE`].
  BadSize { bp: BlockPtr, size: usize },
  /// Two physically adjacent free blocks escaped coalescing.
  AdjacentFree(BlockPtr),
  /// A block's tags reach past the top of the heap.
  OutOfBounds(BlockPtr),
  /// The search cursor is not on a block boundary.
  RoverOutOfHeap(BlockPtr),
}

impl fmt::Display for HeapFault {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      HeapFault::BadPrologue => write!(f, "bad prologue header"),
      HeapFault::BadEpilogue => write!(f, "bad epilogue header"),
      HeapFault::Misaligned(bp) => write!(f, "{:#x} is not doubleword aligned", bp.offset()),
      HeapFault::TagMismatch { bp, header, footer } => write!(
        f,
        "{:#x}: header {:#x} does not match footer {:#x}",
        bp.offset(),
        header,
        footer
      ),
      HeapFault::BadSize { bp, size } => write!(f, "{:#x}: bad block size {}", bp.offset(), size),
      HeapFault::AdjacentFree(bp) => {
        write!(f, "{:#x}: free block follows another free block", bp.offset())
      }
      HeapFault::OutOfBounds(bp) => write!(f, "{:#x}: block extends past the heap", bp.offset()),
      HeapFault::RoverOutOfHeap(bp) => {
        write!(f, "search cursor {:#x} is not on a block boundary", bp.offset())
      }
    }
  }
}

fn tag(word: u32) -> String {
  format!("[{}:{}]", size_of(word), if word & 1 != 0 { 'a' } else { 'f' })
}

impl Heap {
  /// Walks the heap and reports every structural fault found. Nothing is
  /// repaired. With `verbose` set, each block is printed to stdout.
  pub fn check_heap(
    &self,
    verbose: bool,
  ) -> Vec<HeapFault> {
    let heap = self.region();
    let prologue = self.prologue();
    let rover = self.rover();
    let mut faults = Vec::new();

    if verbose {
      println!("Heap ({:p}):", self.as_ptr(prologue));
    }

    if prologue.size(heap) != DSIZE || !prologue.is_allocated(heap) {
      faults.push(HeapFault::BadPrologue);
    }

    let mut bp = prologue;
    let mut prev_free = false;
    let mut rover_seen = false;
    let mut truncated = false;

    loop {
      if bp.offset() > heap.len() {
        faults.push(HeapFault::OutOfBounds(bp));
        truncated = true;
        break;
      }

      let header = bp.header(heap);
      let size = size_of(header);
      if size == 0 {
        break;
      }
      if bp.offset() + size - WSIZE > heap.len() {
        faults.push(HeapFault::OutOfBounds(bp));
        truncated = true;
        break;
      }

      let footer = bp.footer(heap);
      if verbose {
        println!("{:#x}: header: {} footer: {}", bp.offset(), tag(header), tag(footer));
      }

      if self.as_ptr(bp) as usize % DSIZE != 0 {
        faults.push(HeapFault::Misaligned(bp));
      }
      if header != footer {
        faults.push(HeapFault::TagMismatch { bp, header, footer });
      }
      if bp != prologue && (size < MIN_BLOCK || size % DSIZE != 0) {
        faults.push(HeapFault::BadSize { bp, size });
      }

      let free = header & 1 == 0;
      if free && prev_free {
        faults.push(HeapFault::AdjacentFree(bp));
      }
      prev_free = free;
      rover_seen |= bp == rover;

      bp = bp.next(heap);
    }

    if !truncated {
      if verbose {
        println!("{:#x}: EOL", bp.offset());
      }
      rover_seen |= bp == rover;
      if !bp.is_allocated(heap) || bp.offset() != heap.len() {
        faults.push(HeapFault::BadEpilogue);
      }
    }

    if !truncated && !rover_seen {
      faults.push(HeapFault::RoverOutOfHeap(rover));
    }

    for fault in &faults {
      warn!("heap check: {}", fault);
    }

    faults
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    HeapConfig,
    block::{pack, put},
  };

  fn heap() -> Heap {
    Heap::with_config(HeapConfig::default().with_checked(true)).unwrap()
  }

  #[test]
  fn test_fresh_heap_is_clean() {
    let heap = heap();
    assert_eq!(heap.check_heap(true), vec![]);
  }

  #[test]
  fn test_busy_heap_is_clean() {
    let mut heap = heap();
    let blocks: Vec<_> = (1..40).map(|i| heap.malloc(i * 13).unwrap()).collect();
    for bp in blocks.iter().step_by(3) {
      heap.free(*bp);
    }
    assert_eq!(heap.check_heap(false), vec![]);
  }

  #[test]
  fn test_detects_tag_mismatch() {
    let mut heap = heap();
    let a = heap.malloc(32).unwrap();
    let ftrp = a.offset() + 40 - DSIZE;
    put(heap.region_mut(), ftrp, pack(48, true));

    assert_eq!(
      heap.check_heap(false),
      vec![HeapFault::TagMismatch { bp: a, header: pack(40, true), footer: pack(48, true) }]
    );
  }

  #[test]
  fn test_detects_adjacent_free_blocks() {
    let mut heap = heap();
    let a = heap.malloc(32).unwrap();
    // Flip the allocated bit behind the heap's back so no coalescing happens.
    a.set_tags(heap.region_mut(), 40, false);

    assert!(heap.check_heap(false).contains(&HeapFault::AdjacentFree(BlockPtr::new(56))));
  }

  #[test]
  fn test_detects_bad_sentinels() {
    let mut heap = heap();
    let top = heap.heap_size();
    put(heap.region_mut(), top - WSIZE, pack(0, false));
    put(heap.region_mut(), 4, pack(16, true));

    let faults = heap.check_heap(false);
    assert!(faults.contains(&HeapFault::BadPrologue));
    assert!(faults.contains(&HeapFault::BadEpilogue));
  }

  #[test]
  fn test_detects_block_past_the_top() {
    let mut heap = heap();
    put(heap.region_mut(), 12, pack(8192, false));

    assert!(heap.check_heap(false).contains(&HeapFault::OutOfBounds(BlockPtr::new(16))));
  }
}
