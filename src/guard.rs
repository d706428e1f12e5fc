use std::collections::BTreeSet;

use crate::block::BlockPtr;

/// Payloads currently handed out, used to catch frees of addresses the heap
/// never returned and double frees.
#[derive(Debug, Default)]
pub(crate) struct LiveSet {
  live: BTreeSet<BlockPtr>,
}

impl LiveSet {
  pub(crate) fn insert(
    &mut self,
    bp: BlockPtr,
  ) {
    let fresh = self.live.insert(bp);
    debug_assert!(fresh, "block {:#x} handed out twice", bp.offset());
  }

  /// Panics unless `bp` is live.
  pub(crate) fn ensure(
    &self,
    bp: BlockPtr,
    op: &str,
  ) {
    if !self.live.contains(&bp) {
      panic!(
        "{op} of block {:#x}, which is not a live allocation (double free or foreign address)",
        bp.offset()
      );
    }
  }

  /// Forgets `bp`, panicking if it is not live.
  pub(crate) fn release(
    &mut self,
    bp: BlockPtr,
    op: &str,
  ) {
    self.ensure(bp, op);
    self.live.remove(&bp);
  }

  pub(crate) fn len(&self) -> usize {
    self.live.len()
  }
}
