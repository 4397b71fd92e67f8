//! Executable memory owned by patches.
use crate::arch;
use crate::error::{Error, Result};
use crate::process::Process;
use std::fmt;

mod search;

/// An owned range of executable memory in the patched process.
///
/// The backing pages are released exactly once, when the region is dropped.
/// Regions cannot be cloned, so a double release is unrepresentable.
pub struct ExecutableRegion {
  map: mmap::MemoryMap,
}

impl ExecutableRegion {
  pub(crate) fn new(map: mmap::MemoryMap) -> Self {
    ExecutableRegion { map }
  }

  /// Returns the base address of the region.
  pub fn as_ptr(&self) -> *const u8 {
    self.map.data()
  }

  /// Returns the size of the region in bytes.
  pub fn len(&self) -> usize {
    self.map.len()
  }

  /// Returns true if the region is empty.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl fmt::Debug for ExecutableRegion {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(
      f,
      "ExecutableRegion {{ base: {:p}, len: {} }}",
      self.as_ptr(),
      self.len()
    )
  }
}

/// Allocates executable memory anywhere in the address space.
pub fn allocate<P: Process>(process: &P, size: usize) -> Result<ExecutableRegion> {
  unsafe { process.alloc(size, None) }
}

/// Allocates executable memory within branch reach of `origin`.
///
/// Candidate addresses are probed outwards from the origin, alternating
/// above and below in page-sized steps, bounded by the application address
/// range. The first mapping that actually lands within reach wins; a hinted
/// mapping placed elsewhere is released and the search continues.
pub fn allocate_near<P: Process>(
  process: &P,
  origin: *const (),
  size: usize,
) -> Result<ExecutableRegion> {
  if cfg!(target_pointer_width = "32") {
    // Every address is reachable with a 32-bit displacement.
    return allocate(process, size);
  }

  let info = process.system_info();

  for candidate in search::candidates(origin as usize, arch::meta::RELAY_RANGE, &info) {
    if let Ok(region) = unsafe { process.alloc(size, Some(candidate as *const ())) } {
      if is_within_reach(origin as usize, region.as_ptr() as usize) {
        return Ok(region);
      }
      // Out of reach; released here, and the search moves on.
    }
  }

  Err(Error::NoReachablePage {
    target: origin as usize,
  })
}

/// Returns true if `base` can be referenced by a 32-bit displacement from
/// an instruction at `origin`.
fn is_within_reach(origin: usize, base: usize) -> bool {
  let distance = (base as isize).wrapping_sub(origin as isize);
  distance.unsigned_abs() <= arch::meta::RELAY_RANGE
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::process::LocalProcess;

  #[test]
  fn allocate_returns_requested_capacity() -> Result<()> {
    let region = allocate(&LocalProcess, 45)?;
    assert!(region.len() >= 45);
    Ok(())
  }

  #[test]
  fn allocate_near_stays_within_reach() -> Result<()> {
    let origin = allocate_near::<LocalProcess> as *const ();
    let region = allocate_near(&LocalProcess, origin, 8)?;
    assert!(is_within_reach(origin as usize, region.as_ptr() as usize));
    Ok(())
  }
}
