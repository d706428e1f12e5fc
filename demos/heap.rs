use std::io::Read;

use tagalloc::{BlockPtr, Heap, HeapConfig};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap` or
/// `gdb`, or just follow how each step reshapes the heap.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints one line per block plus the heap size and free bytes.
fn print_heap(
  label: &str,
  heap: &Heap,
) {
  println!(
    "[{}] heap size = {} bytes, free = {} bytes",
    label,
    heap.heap_size(),
    heap.free_bytes()
  );
  let faults = heap.check_heap(true);
  if !faults.is_empty() {
    println!("[{}] heap check found {} fault(s): {:?}", label, faults.len(), faults);
  }
}

fn print_alloc(
  heap: &Heap,
  size: usize,
  bp: BlockPtr,
) {
  println!(
    "Allocated {} bytes, offset = {:#x}, address = {:?}, usable = {}",
    size,
    bp.offset(),
    heap.as_ptr(bp),
    heap.usable_size(bp)
  );
}

fn main() {
  // A heap holds the reserved region, the prologue/epilogue sentinels and the
  // roaming search cursor. It starts with one free 4 KiB block.
  let mut heap = match Heap::with_config(HeapConfig::default().with_checked(true)) {
    Ok(heap) => heap,
    Err(err) => {
      eprintln!("failed to initialise heap: {}", err);
      std::process::exit(1);
    }
  };

  print_heap("start", &heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Allocate 100 bytes. The block is 112 bytes: payload rounded to a
  //    double word plus header and footer. The rest of the chunk is split
  //    off as a free block.
  // --------------------------------------------------------------------
  let Some(first) = heap.malloc(100) else {
    eprintln!("malloc(100) failed");
    return;
  };
  println!("\n[1] Allocate 100 bytes");
  print_alloc(&heap, 100, first);
  heap.payload_mut(first)[..4].copy_from_slice(&0xDEADBEEFu32.to_ne_bytes());
  print_heap("1", &heap);

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Allocate 50 bytes. It lands right after the first block.
  // --------------------------------------------------------------------
  let Some(second) = heap.malloc(50) else {
    eprintln!("malloc(50) failed");
    return;
  };
  println!("\n[2] Allocate 50 bytes");
  print_alloc(&heap, 50, second);
  heap.payload_mut(second)[..50].fill(0xAB);
  print_heap("2", &heap);

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Free the first block. Its neighbours are the prologue and the
  //    second block, both allocated, so nothing merges.
  // --------------------------------------------------------------------
  heap.free(first);
  println!("\n[3] Freed first block at {:#x}", first.offset());
  print_heap("3", &heap);

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Free the second block. It merges with the free space on both
  //    sides, leaving one free block again.
  // --------------------------------------------------------------------
  heap.free(second);
  println!("\n[4] Freed second block at {:#x}", second.offset());
  print_heap("4", &heap);

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) Allocate 64 KiB. Nothing fits, so the heap grows by the request
  //    itself rather than by the 4 KiB chunk size.
  // --------------------------------------------------------------------
  let before = heap.heap_size();
  let Some(big) = heap.malloc(64 * 1024) else {
    eprintln!("malloc(64 KiB) failed");
    return;
  };
  println!("\n[5] Allocate 64 KiB");
  print_alloc(&heap, 64 * 1024, big);
  println!("[5] heap grew by {} bytes", heap.heap_size() - before);

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 6) Shrink it with realloc. The first bytes survive the move.
  // --------------------------------------------------------------------
  heap.payload_mut(big)[..8].copy_from_slice(b"tagalloc");
  let small = heap.realloc(big, 16);
  println!("\n[6] Realloc 64 KiB -> 16 bytes");
  print_alloc(&heap, 16, small);
  println!(
    "[6] first bytes = {:?}",
    String::from_utf8_lossy(&heap.payload(small)[..8])
  );
  print_heap("6", &heap);

  println!("\n[7] End of example. The region is unmapped when the heap is dropped.");
}
