use crate::error::Result;
use crate::process::Process;

/// A patch overwriting an arbitrary byte span, able to restore it.
///
/// # Example
///
/// ```rust
/// # use mempatch::{LocalProcess, RawPatch, Result};
/// # fn main() -> Result<()> {
/// let process = LocalProcess;
/// let mut data = [0x00u8, 0x11, 0x22, 0x33, 0x44];
/// let target = data.as_mut_ptr() as *const ();
///
/// let mut patch = RawPatch::new(&process, target, vec![0xAA, 0xBB, 0xCC, 0xDD, 0xEE]);
/// unsafe { patch.apply()? };
/// assert_eq!(unsafe { std::ptr::read_volatile(&data) }, [0xAA, 0xBB, 0xCC, 0xDD, 0xEE]);
///
/// unsafe { patch.remove()? };
/// assert_eq!(unsafe { std::ptr::read_volatile(&data) }, [0x00, 0x11, 0x22, 0x33, 0x44]);
/// # Ok(())
/// # }
/// ```
pub struct RawPatch<'p, P: Process> {
  process: &'p P,
  target: *const (),
  data: Vec<u8>,
  original: Vec<u8>,
  applied: bool,
}

impl<'p, P: Process> RawPatch<'p, P> {
  /// Constructs a new raw patch; nothing is written until [`apply`](Self::apply).
  pub fn new(process: &'p P, target: *const (), data: Vec<u8>) -> Self {
    RawPatch {
      process,
      target,
      data,
      original: Vec::new(),
      applied: false,
    }
  }

  /// Returns whether the patch is applied or not.
  pub fn is_applied(&self) -> bool {
    self.applied
  }

  /// Overwrites the target bytes, remembering their previous contents.
  ///
  /// Applying an applied patch is a no-op.
  ///
  /// # Safety
  ///
  /// The target span must be mapped for the patch's whole length, and no
  /// thread may rely on the bytes being replaced mid-write.
  pub unsafe fn apply(&mut self) -> Result<()> {
    if self.applied {
      return Ok(());
    }

    self.original = self.process.read_bytes(self.target, self.data.len())?;
    self.process.write_bytes(self.target, &self.data)?;
    self.process.flush_icache(self.target, self.data.len())?;
    self.applied = true;
    Ok(())
  }

  /// Restores the original bytes at the target.
  ///
  /// Removing an unapplied patch is a no-op.
  ///
  /// # Safety
  ///
  /// Same requirements as [`apply`](Self::apply).
  pub unsafe fn remove(&mut self) -> Result<()> {
    if !self.applied {
      return Ok(());
    }

    self.process.write_bytes(self.target, &self.original)?;
    self.process.flush_icache(self.target, self.original.len())?;
    self.applied = false;
    Ok(())
  }
}

impl<P: Process> Drop for RawPatch<'_, P> {
  /// Removes the patch, if applied.
  fn drop(&mut self) {
    if let Err(error) = unsafe { self.remove() } {
      super::log_removal_failure("raw patch", self.target, &error);
      self.applied = false;
      self.original.clear();
    }
  }
}
