//! Architecture specific code.
//!
//! An architecture module exposes three pieces:
//!
//! - `meta`, the platform's branch sizes and trampoline capacity.
//! - `disasm`, a decoder yielding one instruction at a time from a buffer.
//! - `thunk`, direct byte construction for the branch stubs the engine
//!   synthesises when relocating a prologue.
use cfg_if::cfg_if;

cfg_if! {
  if #[cfg(any(target_arch = "x86", target_arch = "x86_64"))] {
    mod x86;
    pub use self::x86::{disasm, meta, thunk};
  } else {
    // TODO: AArch64 needs its own decoder and a B/BL literal-pool thunk set.
  }
}

/// Returns true if the displacement fits within a signed 32-bit operand.
pub fn is_within_range(displacement: isize) -> bool {
  ((i32::min_value() as isize)..=(i32::max_value() as isize)).contains(&displacement)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn displacement_range_is_signed_32_bit() {
    assert!(is_within_range(0));
    assert!(is_within_range(i32::max_value() as isize));
    assert!(is_within_range(i32::min_value() as isize));

    #[cfg(target_pointer_width = "64")]
    assert!(!is_within_range(i32::max_value() as isize + 1));
  }
}
