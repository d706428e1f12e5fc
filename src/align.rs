/// Rounds a byte count up to the allocator's double-word alignment (8 bytes).
///
/// # Examples
///
/// ```rust
/// use tagalloc::align;
///
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(16), 16);
/// assert_eq!(align!(1), 8);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, $crate::DSIZE)
  };
}

/// Rounds `value` up to the next multiple of `align`, which must be a power of two.
///
/// ```rust
/// use tagalloc::align_to;
///
/// assert_eq!(align_to!(5, 4), 8);
/// assert_eq!(align_to!(4096, 4096), 4096);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $align:expr) => {
    ($value + $align - 1) & !($align - 1)
  };
}

#[cfg(test)]
mod tests {
  use crate::DSIZE;

  #[test]
  fn test_align() {
    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (DSIZE * i + 1)..=(DSIZE * (i + 1));

      let expected_alignment = DSIZE * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align!(size));
      }
    }
  }

  #[test]
  fn test_align_to_word() {
    assert_eq!(align_to!(0usize, 4), 0);
    assert_eq!(align_to!(1usize, 4), 4);
    assert_eq!(align_to!(6usize, 4), 8);
    assert_eq!(align_to!(8usize, 4), 8);
  }
}
