//! Patch types and their shared drop discipline.
pub use self::detour::DetourPatch;
pub use self::raw::RawPatch;

mod detour;
mod raw;

use crate::error::Error;

/// Reports a removal failure during drop.
///
/// Drop cannot propagate errors; after calling this, a patch forces itself
/// into the not-applied empty shape so removal is never retried, and its
/// owned memory is released by the ordinary field drops.
pub(crate) fn log_removal_failure(kind: &str, target: *const (), error: &Error) {
  log::error!("cannot remove {} at {:p}: {}", kind, target, error);
}
