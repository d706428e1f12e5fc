use std::{io, ptr::NonNull, slice};

use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, c_void};
use log::debug;

use crate::error::{HeapError, Result};

/// A contiguous memory region with a movable break, in the manner of `sbrk(2)`.
///
/// The whole region is reserved once with an anonymous `mmap`, so every grant
/// is contiguous with the previous ones and the base never moves. Pages are
/// only committed by the kernel when first touched.
///
/// ```text
///   base                         brk                        base + max
///    │◄────── granted ──────────►│◄──────── reserved ───────────►│
///    └───────────────────────────┴───────────────────────────────┘
/// ```
pub struct MemLib {
  base: NonNull<u8>,
  brk: usize,
  max: usize,
}

impl MemLib {
  /// Reserves `max` bytes of zero-filled memory.
  pub fn new(max: usize) -> Result<Self> {
    let addr = unsafe {
      libc::mmap(
        std::ptr::null_mut(),
        max,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if addr == MAP_FAILED {
      return Err(HeapError::Reserve(io::Error::last_os_error()));
    }

    let base = NonNull::new(addr as *mut u8)
      .ok_or_else(|| HeapError::Reserve(io::Error::from_raw_os_error(libc::ENOMEM)))?;

    debug!("reserved {} bytes at {:?}", max, base);

    Ok(Self { base, brk: 0, max })
  }

  /// Extends the granted region by `incr` bytes and returns the old break as
  /// an offset from the base. The break is left alone on failure.
  pub fn sbrk(
    &mut self,
    incr: usize,
  ) -> Result<usize> {
    let available = self.max - self.brk;
    if incr > available {
      return Err(HeapError::OutOfMemory { requested: incr, available });
    }

    let old = self.brk;
    self.brk += incr;
    Ok(old)
  }

  /// Rewinds the break to an empty region.
  pub fn reset_brk(&mut self) {
    self.heap_mut().fill(0);
    self.brk = 0;
  }

  /// The granted bytes.
  pub fn heap(&self) -> &[u8] {
    unsafe { slice::from_raw_parts(self.base.as_ptr(), self.brk) }
  }

  pub fn heap_mut(&mut self) -> &mut [u8] {
    unsafe { slice::from_raw_parts_mut(self.base.as_ptr(), self.brk) }
  }

  /// Address of the first heap byte.
  pub fn heap_lo(&self) -> *mut u8 {
    self.base.as_ptr()
  }

  /// Address of the last granted byte.
  pub fn heap_hi(&self) -> *mut u8 {
    self.base.as_ptr().wrapping_add(self.brk).wrapping_sub(1)
  }

  pub fn heapsize(&self) -> usize {
    self.brk
  }

  pub fn capacity(&self) -> usize {
    self.max
  }

  /// System page size, or 4096 when `sysconf` cannot report it.
  pub fn pagesize() -> usize {
    match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
      size if size > 0 => size as usize,
      _ => 4096,
    }
  }
}

// The mapping is owned exclusively and only reached through `&self`/`&mut self`.
unsafe impl Send for MemLib {}

impl Drop for MemLib {
  fn drop(&mut self) {
    unsafe {
      libc::munmap(self.base.as_ptr() as *mut c_void, self.max);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_sbrk_returns_old_break() {
    let mut mem = MemLib::new(1 << 16).unwrap();

    assert_eq!(mem.sbrk(16).unwrap(), 0);
    assert_eq!(mem.sbrk(4096).unwrap(), 16);
    assert_eq!(mem.sbrk(0).unwrap(), 4112);
    assert_eq!(mem.heapsize(), 4112);
    assert_eq!(mem.heap().len(), 4112);
  }

  #[test]
  fn test_sbrk_fails_past_the_limit() {
    let mut mem = MemLib::new(4096).unwrap();

    mem.sbrk(4000).unwrap();
    match mem.sbrk(100) {
      Err(HeapError::OutOfMemory { requested, available }) => {
        assert_eq!(requested, 100);
        assert_eq!(available, 96);
      }
      other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
    assert_eq!(mem.heapsize(), 4000);
    assert_eq!(mem.sbrk(96).unwrap(), 4000);
  }

  #[test]
  fn test_region_is_page_aligned_and_zeroed() {
    let mut mem = MemLib::new(1 << 16).unwrap();
    mem.sbrk(64).unwrap();

    assert_eq!(mem.heap_lo() as usize % MemLib::pagesize(), 0);
    assert!(mem.heap().iter().all(|&b| b == 0));
    assert_eq!(mem.heap_hi() as usize - mem.heap_lo() as usize, 63);
  }

  #[test]
  fn test_pagesize_is_a_power_of_two() {
    let pagesize = MemLib::pagesize();
    assert!(pagesize >= 4096);
    assert!(pagesize.is_power_of_two());
  }

  #[test]
  fn test_region_moves_to_another_thread() {
    let mut mem = MemLib::new(1 << 16).unwrap();
    mem.sbrk(8).unwrap();
    mem.heap_mut()[0] = 0x42;

    let mem = std::thread::spawn(move || {
      assert_eq!(mem.heap()[0], 0x42);
      mem
    })
    .join()
    .unwrap();
    assert_eq!(mem.heapsize(), 8);
  }

  #[test]
  fn test_reset_brk() {
    let mut mem = MemLib::new(1 << 16).unwrap();
    mem.sbrk(32).unwrap();
    mem.heap_mut()[0] = 0xAB;

    mem.reset_brk();
    assert_eq!(mem.heapsize(), 0);
    mem.sbrk(32).unwrap();
    assert_eq!(mem.heap()[0], 0);
  }
}
