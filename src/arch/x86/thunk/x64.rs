use std::mem;

#[repr(packed)]
struct BranchInd {
  opcode0: u8,
  opcode1: u8,
  operand: u32,
}

/// Constructs a RIP-relative indirect jump (`FF 25 disp32`) through an
/// absolute pointer slot.
pub fn jmp_indirect(source: usize, slot: usize) -> Vec<u8> {
  indirect32(source, slot, 0x25)
}

/// Constructs a RIP-relative indirect call (`FF 15 disp32`) through an
/// absolute pointer slot.
pub fn call_indirect(source: usize, slot: usize) -> Vec<u8> {
  indirect32(source, slot, 0x15)
}

/// Constructs either of the indirect branches for its final address.
fn indirect32(source: usize, slot: usize, modrm: u8) -> Vec<u8> {
  let code = BranchInd {
    opcode0: 0xFF,
    opcode1: modrm,
    operand: super::calculate_displacement(source, slot, mem::size_of::<BranchInd>()),
  };

  let slice: [u8; 6] = unsafe { mem::transmute(code) };
  slice.to_vec()
}
