use crate::{
  align,
  block::{DSIZE, MAX_BLOCK, WSIZE},
  error::{HeapError, Result},
};

/// Bytes requested from the region whenever the heap has to grow.
pub const CHUNKSIZE: usize = 1 << 12;

/// Default hard limit of the backing region.
pub const MAX_HEAP: usize = 20 * (1 << 20);

/// Tunables for a [`Heap`](crate::Heap).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapConfig {
  /// Minimum growth step, also the size of the first free block.
  pub chunk_size: usize,
  /// Bytes reserved up front; the break never passes this.
  pub max_heap: usize,
  /// Track live payloads and panic on foreign or double frees.
  pub checked: bool,
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self {
      chunk_size: CHUNKSIZE,
      max_heap: MAX_HEAP,
      checked: false,
    }
  }
}

impl HeapConfig {
  pub fn with_chunk_size(
    mut self,
    chunk_size: usize,
  ) -> Self {
    self.chunk_size = chunk_size;
    self
  }

  pub fn with_max_heap(
    mut self,
    max_heap: usize,
  ) -> Self {
    self.max_heap = max_heap;
    self
  }

  pub fn with_checked(
    mut self,
    checked: bool,
  ) -> Self {
    self.checked = checked;
    self
  }

  /// Normalizes the chunk size to double words and checks the limits.
  pub fn validate(self) -> Result<Self> {
    if self.chunk_size == 0 {
      return Err(HeapError::InvalidConfig("chunk size must be non-zero"));
    }
    if self.chunk_size > MAX_BLOCK {
      return Err(HeapError::InvalidConfig("chunk size does not fit a block tag"));
    }

    let chunk_size = align!(self.chunk_size);
    let sentinels = 4 * WSIZE;
    if self.max_heap < sentinels + chunk_size {
      return Err(HeapError::InvalidConfig(
        "max heap cannot hold the sentinels and one chunk",
      ));
    }
    if self.max_heap > MAX_BLOCK {
      return Err(HeapError::InvalidConfig("max heap exceeds the 32-bit size encoding"));
    }

    debug_assert_eq!(chunk_size % DSIZE, 0);
    Ok(Self { chunk_size, ..self })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_is_valid() {
    let config = HeapConfig::default().validate().unwrap();
    assert_eq!(config.chunk_size, 4096);
    assert_eq!(config.max_heap, 20 * 1024 * 1024);
    assert!(!config.checked);
  }

  #[test]
  fn test_chunk_size_is_rounded() {
    let config = HeapConfig::default().with_chunk_size(100).validate().unwrap();
    assert_eq!(config.chunk_size, 104);
  }

  #[test]
  fn test_rejects_bad_limits() {
    assert!(matches!(
      HeapConfig::default().with_chunk_size(0).validate(),
      Err(HeapError::InvalidConfig(_))
    ));
    assert!(matches!(
      HeapConfig::default().with_max_heap(4096).validate(),
      Err(HeapError::InvalidConfig(_))
    ));
    assert!(
      HeapConfig::default()
        .with_max_heap(4096 + 16)
        .validate()
        .is_ok()
    );
  }
}
