//! Error types and utilities.
use thiserror::Error;

/// The result of a patching operation.
pub type Result<T> = ::std::result::Result<T, Error>;

/// A collection of possible errors.
#[derive(Debug, Error)]
pub enum Error {
  /// A page query or protection change was refused by the OS.
  #[error("memory region failure: {0}")]
  Region(#[from] region::Error),
  /// An executable mapping could not be created.
  #[error("cannot map executable memory: {0}")]
  Allocate(mmap::MapError),
  /// The process rejected an allocation request.
  #[error("cannot allocate memory")]
  OutOfMemory,
  /// No executable page could be mapped within branch reach of the target.
  #[error("no executable page reachable from {target:#x}")]
  NoReachablePage {
    /// The address the allocation had to stay close to.
    target: usize,
  },
  /// The target address does not contain valid instructions.
  #[error("address contains invalid assembly")]
  InvalidCode,
  /// The target's prologue cannot be relocated safely.
  #[error("prologue cannot be safely relocated")]
  UnsafePrologue,
  /// An assembled stub did not match its expected size.
  #[error("assembled stub is {actual} bytes, expected {expected}")]
  StubSizeMismatch {
    /// The platform's jump or call size.
    expected: usize,
    /// The size the stub was actually assembled with.
    actual: usize,
  },
}

impl From<mmap::MapError> for Error {
  fn from(error: mmap::MapError) -> Self {
    Error::Allocate(error)
  }
}
