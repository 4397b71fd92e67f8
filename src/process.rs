//! Access to the address space being patched.
use crate::alloc::ExecutableRegion;
use crate::error::{Error, Result};
use std::ptr;

/// Address space properties used to bound allocation searches.
#[derive(Debug, Clone, Copy)]
pub struct SystemInfo {
  /// The allocation granularity of the system.
  pub page_size: usize,
  /// The lowest address usable by applications.
  pub min_address: usize,
  /// The highest address usable by applications.
  pub max_address: usize,
}

/// An address space that can be read, written, flushed and allocated in.
///
/// Patches borrow a process handle for their entire lifetime and never own
/// it. Writes are not atomic with respect to code concurrently executing in
/// the process; callers that require stronger guarantees must quiesce the
/// target externally.
pub trait Process {
  /// Reads `size` bytes starting at `address`.
  ///
  /// # Safety
  ///
  /// The range must be mapped and readable in the process.
  unsafe fn read_bytes(&self, address: *const (), size: usize) -> Result<Vec<u8>>;

  /// Writes `bytes` starting at `address`.
  ///
  /// # Safety
  ///
  /// The range must be mapped, and must not be referenced by Rust code
  /// through any live shared or mutable borrow.
  unsafe fn write_bytes(&self, address: *const (), bytes: &[u8]) -> Result<()>;

  /// Flushes the instruction cache over the range.
  ///
  /// # Safety
  ///
  /// The range must be mapped in the process.
  unsafe fn flush_icache(&self, address: *const (), size: usize) -> Result<()>;

  /// Maps at least `size` bytes of executable memory.
  ///
  /// A hint requests placement at a specific address and fails if the
  /// address is unavailable; without one the system chooses freely.
  ///
  /// # Safety
  ///
  /// A hinted address must not be dereferenced until the returned region
  /// confirms the mapping.
  unsafe fn alloc(&self, size: usize, hint: Option<*const ()>) -> Result<ExecutableRegion>;

  /// Returns the properties of the process's address space.
  fn system_info(&self) -> SystemInfo;
}

/// The process the library is loaded in.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalProcess;

impl Process for LocalProcess {
  unsafe fn read_bytes(&self, address: *const (), size: usize) -> Result<Vec<u8>> {
    let mut buffer = vec![0; size];
    ptr::copy_nonoverlapping(address as *const u8, buffer.as_mut_ptr(), size);
    Ok(buffer)
  }

  unsafe fn write_bytes(&self, address: *const (), bytes: &[u8]) -> Result<()> {
    // Runtime code is by default only read-execute
    let _handle = region::protect_with_handle(
      address as *const u8,
      bytes.len(),
      region::Protection::READ_WRITE_EXECUTE,
    )?;

    ptr::copy_nonoverlapping(bytes.as_ptr(), address as *mut u8, bytes.len());
    Ok(())
  }

  unsafe fn flush_icache(&self, _address: *const (), _size: usize) -> Result<()> {
    // x86 keeps instruction fetch coherent with stores
    Ok(())
  }

  unsafe fn alloc(&self, size: usize, hint: Option<*const ()>) -> Result<ExecutableRegion> {
    let mut options = vec![
      mmap::MapOption::MapReadable,
      mmap::MapOption::MapWritable,
      mmap::MapOption::MapExecutable,
    ];

    if let Some(address) = hint {
      // A fixed mapping over an occupied range would destroy live pages;
      // treat such candidates as failed reservations instead.
      match region::query(address as *const u8) {
        Err(region::Error::FreeMemory) => (),
        Ok(_) => return Err(Error::OutOfMemory),
        Err(error) => return Err(error.into()),
      }

      options.push(mmap::MapOption::MapAddr(address as *const u8));
    }

    let map = mmap::MemoryMap::new(size, &options)?;
    Ok(ExecutableRegion::new(map))
  }

  fn system_info(&self) -> SystemInfo {
    let page_size = region::page::size();

    SystemInfo {
      page_size,
      // The first page is never usable by applications.
      min_address: page_size,
      max_address: MAX_APPLICATION_ADDRESS,
    }
  }
}

/// The canonical user-space ceiling.
#[cfg(target_pointer_width = "64")]
const MAX_APPLICATION_ADDRESS: usize = 0x0000_7FFF_FFFF_0000;
#[cfg(target_pointer_width = "32")]
const MAX_APPLICATION_ADDRESS: usize = 0xBFFF_0000;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn local_read_write_round_trip() -> Result<()> {
    let process = LocalProcess;
    let mut data = [0x10u8, 0x20, 0x30, 0x40];
    let address = data.as_mut_ptr() as *const ();

    unsafe {
      assert_eq!(process.read_bytes(address, 4)?, [0x10, 0x20, 0x30, 0x40]);
      process.write_bytes(address, &[0x50, 0x60])?;
      assert_eq!(process.read_bytes(address, 4)?, [0x50, 0x60, 0x30, 0x40]);
    }
    Ok(())
  }

  #[test]
  fn local_alloc_is_writable() -> Result<()> {
    let process = LocalProcess;
    let region = unsafe { process.alloc(16, None)? };
    assert!(region.len() >= 16);

    unsafe {
      process.write_bytes(region.as_ptr() as *const (), &[0xC3])?;
      assert_eq!(process.read_bytes(region.as_ptr() as *const (), 1)?, [0xC3]);
    }
    Ok(())
  }

  #[test]
  fn system_info_is_plausible() {
    let info = LocalProcess.system_info();
    assert!(info.page_size.is_power_of_two());
    assert!(info.min_address < info.max_address);
  }
}
