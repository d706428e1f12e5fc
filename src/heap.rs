use log::{debug, error, trace};

use crate::{
  align,
  block::{self, BlockInfo, BlockPtr, Blocks, DSIZE, MAX_BLOCK, MIN_BLOCK, WSIZE, get, pack, put},
  config::HeapConfig,
  error::{HeapError, Result},
  guard::LiveSet,
  memlib::MemLib,
};

/// An implicit free-list heap with boundary-tag coalescing and next-fit
/// placement.
///
/// All state lives here: the backing region, the traversal start (the
/// prologue) and the roaming search cursor. Nothing is global, so separate
/// heaps are fully independent. A `Heap` is `Send` but has no internal
/// locking: move it into a thread, or share it behind your own `Mutex`.
pub struct Heap {
  mem: MemLib,
  /// Payload position of the prologue, where every full walk starts.
  heap_listp: BlockPtr,
  /// Where the next search resumes.
  rover: BlockPtr,
  config: HeapConfig,
  live: Option<LiveSet>,
}

/// Block size needed to serve a `size`-byte payload, or `None` when it cannot
/// be encoded in a tag.
pub(crate) fn adjusted_size(size: usize) -> Option<usize> {
  let asize = if size <= DSIZE {
    MIN_BLOCK
  } else {
    DSIZE * (size.checked_add(DSIZE + (DSIZE - 1))? / DSIZE)
  };

  (asize <= MAX_BLOCK).then_some(asize)
}

impl Heap {
  /// Creates a heap with the default configuration.
  pub fn new() -> Result<Self> {
    Self::with_config(HeapConfig::default())
  }

  /// Reserves the region, lays out the sentinels and carves the first free
  /// block of `chunk_size` bytes.
  ///
  /// ```text
  ///   0        4          8          12         16
  ///   ┌────────┬──────────┬──────────┬──────────┐
  ///   │  pad   │ hdr(8:a) │ ftr(8:a) │ hdr(0:a) │
  ///   └────────┴──────────┴──────────┴──────────┘
  ///                       ▲ heap_listp   epilogue
  /// ```
  pub fn with_config(config: HeapConfig) -> Result<Self> {
    let config = config.validate()?;
    let mut mem = MemLib::new(config.max_heap)?;

    let start = mem.sbrk(4 * WSIZE)?;
    let heap = mem.heap_mut();
    put(heap, start, 0);
    put(heap, start + WSIZE, pack(DSIZE, true));
    put(heap, start + 2 * WSIZE, pack(DSIZE, true));
    put(heap, start + 3 * WSIZE, pack(0, true));

    let heap_listp = BlockPtr::new(start + 2 * WSIZE);
    let mut this = Self {
      mem,
      heap_listp,
      rover: heap_listp,
      config,
      live: config.checked.then(LiveSet::default),
    };

    this.extend_heap(config.chunk_size)?;
    debug!(
      "heap initialised at {:p}: chunk {} bytes, limit {} bytes, checked {}",
      this.mem.heap_lo(),
      config.chunk_size,
      config.max_heap,
      config.checked
    );

    Ok(this)
  }

  /// Grows the region by `bytes` (rounded to an even number of words), turns
  /// the new space into one free block and merges it with a free predecessor.
  fn extend_heap(
    &mut self,
    bytes: usize,
  ) -> Result<BlockPtr> {
    let size = align!(bytes);

    // The old epilogue header becomes the new block's header.
    let bp = BlockPtr::new(self.mem.sbrk(size)?);
    debug!("extending heap by {} bytes at offset {:#x}", size, bp.offset());

    let heap = self.mem.heap_mut();
    bp.set_tags(heap, size, false);
    let epilogue = bp.next(heap);
    put(heap, epilogue.hdrp(), pack(0, true));

    Ok(self.coalesce(bp))
  }

  /// Next-fit search: from the cursor to the epilogue, then from the start up
  /// to where the cursor was.
  fn find_fit(
    &mut self,
    asize: usize,
  ) -> Option<BlockPtr> {
    let heap = self.mem.heap();
    let start = self.rover;

    let fits = |bp: BlockPtr| {
      let header = bp.header(heap);
      !block::is_allocated(header) && asize <= block::size_of(header)
    };

    let mut bp = start;
    while bp.size(heap) > 0 {
      if fits(bp) {
        self.rover = bp;
        return Some(bp);
      }
      bp = bp.next(heap);
    }

    let mut bp = self.heap_listp;
    while bp < start {
      if fits(bp) {
        self.rover = bp;
        return Some(bp);
      }
      bp = bp.next(heap);
    }

    None
  }

  /// Marks `asize` bytes of the free block `bp` allocated, splitting off the
  /// tail when it can stand as a block of its own.
  fn place(
    &mut self,
    bp: BlockPtr,
    asize: usize,
  ) {
    let heap = self.mem.heap_mut();
    let csize = bp.size(heap);

    if csize - asize >= MIN_BLOCK {
      bp.set_tags(heap, asize, true);
      let rest = bp.next(heap);
      rest.set_tags(heap, csize - asize, false);
    } else {
      bp.set_tags(heap, csize, true);
    }

    if self.rover == bp {
      self.rover = bp.next(heap);
    }
  }

  /// Boundary-tag coalescing of the free block `bp` with its immediate
  /// neighbours. Returns the start of the merged block.
  fn coalesce(
    &mut self,
    bp: BlockPtr,
  ) -> BlockPtr {
    let heap = self.mem.heap_mut();
    let prev_alloc = block::is_allocated(get(heap, bp.offset() - DSIZE));
    let next = bp.next(heap);
    let next_alloc = next.is_allocated(heap);
    let mut size = bp.size(heap);

    let merged = match (prev_alloc, next_alloc) {
      (true, true) => bp,
      (true, false) => {
        size += next.size(heap);
        bp.set_tags(heap, size, false);
        bp
      }
      (false, true) => {
        let prev = bp.prev(heap);
        size += prev.size(heap);
        prev.set_tags(heap, size, false);
        prev
      }
      (false, false) => {
        let prev = bp.prev(heap);
        size += prev.size(heap) + next.size(heap);
        prev.set_tags(heap, size, false);
        prev
      }
    };

    // The cursor must not point into the middle of the merged block.
    if self.rover > merged && self.rover < merged.next(heap) {
      self.rover = merged;
    }

    merged
  }

  /// Allocates a block with at least `size` usable bytes.
  ///
  /// Returns `None` for a zero-byte request or when the region cannot grow
  /// any further.
  pub fn malloc(
    &mut self,
    size: usize,
  ) -> Option<BlockPtr> {
    if size == 0 {
      return None;
    }

    let Some(asize) = adjusted_size(size) else {
      debug!("malloc({}) exceeds the largest encodable block", size);
      return None;
    };

    let bp = match self.find_fit(asize) {
      Some(bp) => bp,
      None => match self.extend_heap(asize.max(self.config.chunk_size)) {
        Ok(bp) => bp,
        Err(err) => {
          debug!("malloc({}) failed: {}", size, err);
          return None;
        }
      },
    };

    self.place(bp, asize);
    if let Some(live) = &mut self.live {
      live.insert(bp);
    }

    trace!("malloc({}) -> {:#x} ({} byte block)", size, bp.offset(), asize);
    Some(bp)
  }

  /// Returns `bp` to the heap.
  ///
  /// `bp` must come from [`malloc`](Self::malloc) or
  /// [`realloc`](Self::realloc) on this heap and must not have been freed
  /// already. With [`HeapConfig::checked`] set, a violation panics; otherwise
  /// it corrupts the heap.
  pub fn free(
    &mut self,
    bp: BlockPtr,
  ) {
    if let Some(live) = &mut self.live {
      live.release(bp, "free");
    }

    let heap = self.mem.heap_mut();
    let size = bp.size(heap);
    bp.set_tags(heap, size, false);
    trace!("free({:#x}) ({} byte block)", bp.offset(), size);

    self.coalesce(bp);
  }

  /// Moves the payload of `bp` into a fresh block of `size` bytes.
  ///
  /// Always allocates, copies `min(size, usable_size(bp))` bytes, then frees
  /// the old block. On failure the old block is left untouched.
  pub fn try_realloc(
    &mut self,
    bp: BlockPtr,
    size: usize,
  ) -> Result<BlockPtr> {
    if let Some(live) = &self.live {
      live.ensure(bp, "realloc");
    }
    if size == 0 {
      return Err(HeapError::ZeroSize);
    }

    let newp = self.malloc(size).ok_or_else(|| HeapError::OutOfMemory {
      requested: size,
      available: self.mem.capacity() - self.mem.heapsize(),
    })?;

    let copy = size.min(self.usable_size(bp));
    self
      .mem
      .heap_mut()
      .copy_within(bp.offset()..bp.offset() + copy, newp.offset());
    self.free(bp);

    trace!("realloc({:#x}, {}) -> {:#x}", bp.offset(), size, newp.offset());
    Ok(newp)
  }

  /// [`try_realloc`](Self::try_realloc) that aborts the process when no
  /// replacement block can be obtained.
  pub fn realloc(
    &mut self,
    bp: BlockPtr,
    size: usize,
  ) -> BlockPtr {
    match self.try_realloc(bp, size) {
      Ok(newp) => newp,
      Err(err) => {
        error!("realloc({:#x}, {}) failed: {}", bp.offset(), size, err);
        std::process::abort();
      }
    }
  }

  /// Usable bytes of an allocated block.
  pub fn usable_size(
    &self,
    bp: BlockPtr,
  ) -> usize {
    bp.size(self.mem.heap()) - DSIZE
  }

  pub fn payload(
    &self,
    bp: BlockPtr,
  ) -> &[u8] {
    let len = self.usable_size(bp);
    &self.mem.heap()[bp.offset()..bp.offset() + len]
  }

  pub fn payload_mut(
    &mut self,
    bp: BlockPtr,
  ) -> &mut [u8] {
    let len = self.usable_size(bp);
    &mut self.mem.heap_mut()[bp.offset()..bp.offset() + len]
  }

  /// Real address of a block's payload. Stable for the life of the heap.
  pub fn as_ptr(
    &self,
    bp: BlockPtr,
  ) -> *mut u8 {
    self.mem.heap_lo().wrapping_add(bp.offset())
  }

  /// Finds the allocated block whose payload starts exactly at `ptr`.
  ///
  /// Pointers into the middle of a payload, into free blocks or outside the
  /// heap give `None`. Walks the heap, so this is O(blocks).
  pub fn block_at(
    &self,
    ptr: *const u8,
  ) -> Option<BlockPtr> {
    let offset = (ptr as usize).checked_sub(self.mem.heap_lo() as usize)?;
    if offset % DSIZE != 0 || offset >= self.mem.heapsize() {
      return None;
    }

    self
      .blocks()
      .take_while(|info| info.bp.offset() <= offset)
      .find(|info| info.bp.offset() == offset && info.allocated)
      .map(|info| info.bp)
  }

  /// Every block between the prologue and the epilogue, in address order.
  pub fn blocks(&self) -> Blocks<'_> {
    let heap = self.mem.heap();
    Blocks::new(heap, self.heap_listp.next(heap))
  }

  /// Bytes held in free blocks, tags included.
  pub fn free_bytes(&self) -> usize {
    self
      .blocks()
      .filter(|info: &BlockInfo| !info.allocated)
      .map(|info| info.size)
      .sum()
  }

  /// Bytes granted by the region so far, sentinels included.
  pub fn heap_size(&self) -> usize {
    self.mem.heapsize()
  }

  pub fn config(&self) -> &HeapConfig {
    &self.config
  }

  /// Number of tracked live allocations, when checking is enabled.
  pub fn live_allocations(&self) -> Option<usize> {
    self.live.as_ref().map(LiveSet::len)
  }

  pub(crate) fn region(&self) -> &[u8] {
    self.mem.heap()
  }

  pub(crate) fn prologue(&self) -> BlockPtr {
    self.heap_listp
  }

  pub(crate) fn rover(&self) -> BlockPtr {
    self.rover
  }

  #[cfg(test)]
  pub(crate) fn region_mut(&mut self) -> &mut [u8] {
    self.mem.heap_mut()
  }
}
