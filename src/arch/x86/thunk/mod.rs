#![allow(dead_code)]

/// Implements x86 stubs
pub mod x86;

/// Implements x64 stubs
#[cfg(target_arch = "x86_64")]
pub mod x64;

/// Calculates the relative displacement operand for a branch at `source`.
fn calculate_displacement(source: usize, destination: usize, instruction_size: usize) -> u32 {
  let displacement =
    (destination as isize).wrapping_sub(source as isize + instruction_size as isize);

  // Only asserted on x64, since the displacement wraps around on x86.
  #[cfg(target_arch = "x86_64")]
  assert!(crate::arch::is_within_range(displacement));

  displacement as u32
}
