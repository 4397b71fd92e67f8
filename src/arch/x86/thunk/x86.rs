use std::mem;

#[repr(packed)]
struct JumpRel {
  opcode: u8,
  operand: u32,
}

/// Constructs a relative jump (`E9 disp32`).
pub fn jmp_rel32(source: usize, destination: usize) -> Vec<u8> {
  relative32(source, destination, 0xE9)
}

/// Constructs a relative call (`E8 disp32`).
pub fn call_rel32(source: usize, destination: usize) -> Vec<u8> {
  relative32(source, destination, 0xE8)
}

/// Constructs either of the rel32 branches for its final address.
fn relative32(source: usize, destination: usize, opcode: u8) -> Vec<u8> {
  let code = JumpRel {
    opcode,
    operand: super::calculate_displacement(source, destination, mem::size_of::<JumpRel>()),
  };

  let slice: [u8; 5] = unsafe { mem::transmute(code) };
  slice.to_vec()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn jump_layout_is_e9_disp32() {
    assert_eq!(
      jmp_rel32(0x1000, 0x2000),
      [0xE9, 0xFB, 0x0F, 0x00, 0x00]
    );
  }

  #[test]
  fn call_layout_is_e8_disp32() {
    // A backward call wraps to a negative displacement.
    assert_eq!(
      call_rel32(0x2000, 0x1000),
      [0xE8, 0xFB, 0xEF, 0xFF, 0xFF]
    );
  }
}
