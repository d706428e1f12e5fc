use std::{error, fmt, io};

/// Failures surfaced by the heap and its backing region.
#[derive(Debug)]
pub enum HeapError {
  /// The backing region could not be reserved from the operating system.
  Reserve(io::Error),
  /// The break cannot move past the reserved region.
  OutOfMemory { requested: usize, available: usize },
  /// A [`HeapConfig`](crate::HeapConfig) that cannot produce a working heap.
  InvalidConfig(&'static str),
  /// A zero-byte request where a block is required.
  ZeroSize,
}

impl fmt::Display for HeapError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      HeapError::Reserve(err) => write!(f, "failed to reserve heap region: {err}"),
      HeapError::OutOfMemory { requested, available } => write!(
        f,
        "out of memory: requested {requested} bytes, {available} bytes left in the region"
      ),
      HeapError::InvalidConfig(reason) => write!(f, "invalid heap configuration: {reason}"),
      HeapError::ZeroSize => write!(f, "zero-sized request"),
    }
  }
}

impl error::Error for HeapError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      HeapError::Reserve(err) => Some(err),
      _ => None,
    }
  }
}

impl From<io::Error> for HeapError {
  fn from(err: io::Error) -> Self {
    HeapError::Reserve(err)
  }
}

pub type Result<T> = std::result::Result<T, HeapError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_display() {
    let err = HeapError::OutOfMemory { requested: 4096, available: 16 };
    assert_eq!(
      err.to_string(),
      "out of memory: requested 4096 bytes, 16 bytes left in the region"
    );
    assert_eq!(HeapError::ZeroSize.to_string(), "zero-sized request");
  }

  #[test]
  fn test_source_only_for_os_errors() {
    use std::error::Error;

    let err = HeapError::from(io::Error::from_raw_os_error(libc::ENOMEM));
    assert!(err.source().is_some());
    assert!(HeapError::InvalidConfig("x").source().is_none());
  }
}
