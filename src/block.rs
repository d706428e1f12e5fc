//! Boundary-tag codec.
//!
//! Every block carries a header word before its payload and a footer word at
//! its last word, both holding `size | allocated`. Sizes are multiples of
//! [`DSIZE`], so the low three bits of a tag are free and bit 0 stores the
//! allocated flag.
//!
//! ```text
//!          bp.hdrp()   bp                          bp.ftrp()   bp.next()
//!              │       │                               │           │
//!   ┌──────────▼───────▼───────────────────────────────▼───────────▼──
//!   │ ...      │ size|a │        payload               │ size|a │ size|a ...
//!   └──────────┴────────┴──────────────────────────────┴────────┴──────
//!              ◄──────────────────── size ──────────────────────►
//! ```
//!
//! This layer does no validation of its own: offsets are checked only by
//! slice indexing.

/// Header/footer word size in bytes.
pub const WSIZE: usize = 4;

/// Double word size in bytes; payloads are aligned to this.
pub const DSIZE: usize = 8;

/// Smallest block that can exist: header, footer and one double word.
pub const MIN_BLOCK: usize = 2 * DSIZE;

const ALLOC_BIT: u32 = 0x1;
const SIZE_MASK: u32 = !0x7;

/// Largest block size a tag word can encode.
pub const MAX_BLOCK: usize = SIZE_MASK as usize;

/// Address of a block, expressed as the offset of its payload from the start
/// of the heap region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockPtr(usize);

impl BlockPtr {
  pub(crate) const fn new(offset: usize) -> Self {
    Self(offset)
  }

  /// Byte offset of the payload from the heap base.
  pub const fn offset(self) -> usize {
    self.0
  }

  /// Offset of this block's header word.
  pub(crate) const fn hdrp(self) -> usize {
    self.0 - WSIZE
  }

  /// Offset of this block's footer word.
  pub(crate) fn ftrp(
    self,
    heap: &[u8],
  ) -> usize {
    self.0 + self.size(heap) - DSIZE
  }

  pub(crate) fn header(
    self,
    heap: &[u8],
  ) -> u32 {
    get(heap, self.hdrp())
  }

  pub(crate) fn footer(
    self,
    heap: &[u8],
  ) -> u32 {
    get(heap, self.ftrp(heap))
  }

  pub(crate) fn size(
    self,
    heap: &[u8],
  ) -> usize {
    size_of(self.header(heap))
  }

  pub(crate) fn is_allocated(
    self,
    heap: &[u8],
  ) -> bool {
    is_allocated(self.header(heap))
  }

  /// Writes the same tag into the header and the footer.
  ///
  /// The header goes first: the footer position is derived from it.
  pub(crate) fn set_tags(
    self,
    heap: &mut [u8],
    size: usize,
    allocated: bool,
  ) {
    put(heap, self.hdrp(), pack(size, allocated));
    let ftrp = self.ftrp(heap);
    put(heap, ftrp, pack(size, allocated));
  }

  /// The physically following block.
  pub(crate) fn next(
    self,
    heap: &[u8],
  ) -> BlockPtr {
    BlockPtr(self.0 + self.size(heap))
  }

  /// The physically preceding block, located through its footer.
  pub(crate) fn prev(
    self,
    heap: &[u8],
  ) -> BlockPtr {
    BlockPtr(self.0 - size_of(get(heap, self.0 - DSIZE)))
  }
}

/// Combines a size and an allocated flag into a tag word.
pub(crate) fn pack(
  size: usize,
  allocated: bool,
) -> u32 {
  debug_assert_eq!(size & 0x7, 0, "block size {size} is not double-word aligned");
  debug_assert!(size <= MAX_BLOCK, "block size {size} does not fit a tag");
  size as u32 | allocated as u32
}

pub(crate) fn get(
  heap: &[u8],
  at: usize,
) -> u32 {
  let mut word = [0u8; WSIZE];
  word.copy_from_slice(&heap[at..at + WSIZE]);
  u32::from_ne_bytes(word)
}

pub(crate) fn put(
  heap: &mut [u8],
  at: usize,
  word: u32,
) {
  heap[at..at + WSIZE].copy_from_slice(&word.to_ne_bytes());
}

pub(crate) const fn size_of(word: u32) -> usize {
  (word & SIZE_MASK) as usize
}

pub(crate) const fn is_allocated(word: u32) -> bool {
  word & ALLOC_BIT != 0
}

/// A decoded view of one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
  pub bp: BlockPtr,
  pub size: usize,
  pub allocated: bool,
}

/// Walks blocks in address order until the epilogue.
pub struct Blocks<'a> {
  heap: &'a [u8],
  bp: BlockPtr,
}

impl<'a> Blocks<'a> {
  pub(crate) fn new(
    heap: &'a [u8],
    first: BlockPtr,
  ) -> Self {
    Self { heap, bp: first }
  }
}

impl Iterator for Blocks<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<BlockInfo> {
    let header = self.bp.header(self.heap);
    if size_of(header) == 0 {
      return None;
    }

    let info = BlockInfo {
      bp: self.bp,
      size: size_of(header),
      allocated: is_allocated(header),
    };
    self.bp = self.bp.next(self.heap);
    Some(info)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  /// pad | prologue 8:a | block 24:a | block 32:f | epilogue 0:a
  fn sample_heap() -> Vec<u8> {
    let mut heap = vec![0u8; 72];
    put(&mut heap, 4, pack(DSIZE, true));
    put(&mut heap, 8, pack(DSIZE, true));
    BlockPtr::new(16).set_tags(&mut heap, 24, true);
    BlockPtr::new(40).set_tags(&mut heap, 32, false);
    put(&mut heap, 68, pack(0, true));
    heap
  }

  #[test]
  fn test_pack_and_unpack() {
    let word = pack(4096, true);
    assert_eq!(size_of(word), 4096);
    assert!(is_allocated(word));

    let word = pack(24, false);
    assert_eq!(size_of(word), 24);
    assert!(!is_allocated(word));

    assert_eq!(pack(0, true), 1);
  }

  #[test]
  fn test_get_put() {
    let mut heap = vec![0u8; 16];
    put(&mut heap, 8, 0xDEAD_BEE8);
    assert_eq!(get(&heap, 8), 0xDEAD_BEE8);
    assert_eq!(get(&heap, 4), 0);
  }

  #[test]
  fn test_header_and_footer_positions() {
    let heap = sample_heap();
    let bp = BlockPtr::new(16);

    assert_eq!(bp.hdrp(), 12);
    assert_eq!(bp.ftrp(&heap), 32);
    assert_eq!(bp.header(&heap), bp.footer(&heap));
    assert_eq!(bp.size(&heap), 24);
    assert!(bp.is_allocated(&heap));
  }

  #[test]
  fn test_neighbours() {
    let heap = sample_heap();
    let first = BlockPtr::new(16);
    let second = first.next(&heap);

    assert_eq!(second, BlockPtr::new(40));
    assert!(!second.is_allocated(&heap));
    assert_eq!(second.prev(&heap), first);
    assert_eq!(first.prev(&heap), BlockPtr::new(8));
    assert_eq!(second.next(&heap).size(&heap), 0);
  }

  #[test]
  fn test_blocks_iterator_stops_at_epilogue() {
    let heap = sample_heap();
    let blocks: Vec<_> = Blocks::new(&heap, BlockPtr::new(16)).collect();

    assert_eq!(
      blocks,
      vec![
        BlockInfo { bp: BlockPtr::new(16), size: 24, allocated: true },
        BlockInfo { bp: BlockPtr::new(40), size: 32, allocated: false },
      ]
    );
  }
}
