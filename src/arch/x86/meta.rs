//! Platform constants for stub synthesis.

/// The size of the jump written at a target's entry; a RIP-relative
/// indirect jump on x64, a relative direct jump on x86.
#[cfg(target_arch = "x86_64")]
pub const JUMP_SIZE: usize = 6;
#[cfg(target_arch = "x86")]
pub const JUMP_SIZE: usize = 5;

/// The size of a synthesised call stub.
pub const CALL_SIZE: usize = JUMP_SIZE;

/// The longest valid instruction encoding.
pub const MAX_INSTRUCTION_SIZE: usize = 15;

/// Trampoline capacity; the relocated prologue and its tail jump always
/// fit, since the prologue walk stops before `JUMP_SIZE + MAX_INSTRUCTION_SIZE`.
pub const TRAMPOLINE_CAPACITY: usize = MAX_INSTRUCTION_SIZE * 3;

/// The furthest reach of a relay slot from the instruction referencing it
/// (2 GiB minus slack for the instruction length).
pub const RELAY_RANGE: usize = 0x7FFF_FF00;
