use crate::alloc::{self, ExecutableRegion};
use crate::arch::{disasm, meta, thunk};
use crate::error::{Error, Result};
use crate::process::Process;
use std::fmt;
#[cfg(target_arch = "x86_64")]
use std::mem;

/// An inline detour, redirecting a function to a replacement while keeping
/// the original callable.
///
/// Applying the detour overwrites the target's entry with a jump to the
/// detour function, after relocating the overwritten prologue into a
/// trampoline. While applied, calling [`trampoline`](Self::trampoline)
/// behaves as the unhooked function.
///
/// The engine never suspends threads executing in the patched process. A
/// thread observing the entry bytes mid-overwrite is undefined behavior;
/// callers that cannot rule this out must quiesce the target themselves.
///
/// # Example
///
/// ```rust
/// use mempatch::{DetourPatch, LocalProcess};
/// use std::{mem, ptr};
///
/// #[inline(never)]
/// extern "C" fn add5(val: i32) -> i32 {
///   unsafe { ptr::read_volatile(&val) + 5 }
/// }
///
/// extern "C" fn add10(val: i32) -> i32 {
///   val + 10
/// }
///
/// # fn main() -> mempatch::Result<()> {
/// let process = LocalProcess;
/// let mut patch = DetourPatch::new(&process, add5 as *const (), add10 as *const ());
///
/// assert_eq!(add5(5), 10);
/// assert!(!patch.is_applied());
///
/// unsafe { patch.apply()? };
/// assert!(patch.is_applied());
///
/// let original: extern "C" fn(i32) -> i32 = unsafe { mem::transmute(patch.trampoline()) };
/// assert_eq!(add5(5), 15);
/// assert_eq!(original(5), 10);
///
/// unsafe { patch.remove()? };
/// assert_eq!(add5(5), 10);
/// # Ok(())
/// # }
/// ```
pub struct DetourPatch<'p, P: Process> {
  process: &'p P,
  target: *const (),
  detour: *const (),
  trampoline: Option<ExecutableRegion>,
  relays: Vec<ExecutableRegion>,
  original: Vec<u8>,
  applied: bool,
}

impl<'p, P: Process> DetourPatch<'p, P> {
  /// Constructs a new detour patcher; nothing is modified until
  /// [`apply`](Self::apply).
  ///
  /// # Arguments
  ///
  /// * `target` - The address of the function to redirect.
  /// * `detour` - The address the target should be redirected to.
  pub fn new(process: &'p P, target: *const (), detour: *const ()) -> Self {
    DetourPatch {
      process,
      target,
      detour,
      trampoline: None,
      relays: Vec::new(),
      original: Vec::new(),
      applied: false,
    }
  }

  /// Returns whether the detour is applied or not.
  pub fn is_applied(&self) -> bool {
    self.applied
  }

  /// Returns the address of the relocated prologue.
  ///
  /// Calling the address behaves as the unhooked target; a function
  /// pointer of the target's type can be produced with `mem::transmute`.
  ///
  /// # Panics
  ///
  /// Panics if the detour is not applied.
  pub fn trampoline(&self) -> *const () {
    self
      .trampoline
      .as_ref()
      .expect("detour is not applied")
      .as_ptr() as *const ()
  }

  /// Builds the trampoline and installs the entry redirect.
  ///
  /// Applying an applied detour is a no-op. On failure all owned memory is
  /// released and the target is left unmodified.
  ///
  /// # Safety
  ///
  /// The target must be a function entry with at least `JUMP_SIZE` bytes
  /// of prologue mapped, and must not be executing the prologue while the
  /// entry is rewritten.
  pub unsafe fn apply(&mut self) -> Result<()> {
    if self.applied {
      return Ok(());
    }

    match self.install() {
      Ok(()) => {
        self.applied = true;
        Ok(())
      },
      Err(error) => {
        // Roll back to the unapplied shape, releasing owned memory.
        self.trampoline = None;
        self.relays.clear();
        self.original.clear();
        Err(error)
      },
    }
  }

  /// Restores the entry bytes and releases all trampolines.
  ///
  /// Removing an unapplied detour is a no-op.
  ///
  /// # Safety
  ///
  /// No thread may be executing inside the trampoline when it is released.
  pub unsafe fn remove(&mut self) -> Result<()> {
    if !self.applied {
      return Ok(());
    }

    // The entry is restored and flushed before any region is released.
    self.process.write_bytes(self.target, &self.original)?;
    self.process.flush_icache(self.target, self.original.len())?;

    self.trampoline = None;
    self.relays.clear();
    self.applied = false;
    Ok(())
  }

  /// Relocates the prologue into a fresh trampoline and redirects the
  /// target's entry to the detour.
  unsafe fn install(&mut self) -> Result<()> {
    let trampoline = alloc::allocate(self.process, meta::TRAMPOLINE_CAPACITY)?;
    let buffer = self
      .process
      .read_bytes(self.target, meta::TRAMPOLINE_CAPACITY)?;

    let mut decoder = disasm::Decoder::new(&buffer, self.target as usize);
    let mut cursor = trampoline.as_ptr() as usize;
    let mut consumed = 0;

    while consumed < meta::JUMP_SIZE {
      let instruction = decoder.next_instruction().ok_or(Error::InvalidCode)?;
      log::trace!(
        "relocating {:02x?} from {:#x}",
        instruction.as_slice(),
        instruction.address()
      );

      cursor += self.relocate_instruction(&instruction, cursor)?;
      consumed += instruction.len();
    }

    // Resume at the first instruction the entry jump does not replace.
    let resume = self.target as usize + consumed;
    cursor += self.write_jump(cursor, resume)?;

    let base = trampoline.as_ptr() as *const ();
    self.process.flush_icache(base, cursor - base as usize)?;

    self.original = self.process.read_bytes(self.target, meta::JUMP_SIZE)?;

    // A single write keeps the entry either intact or fully redirected.
    let entry = self.jump_to(self.target as usize, self.detour as usize)?;
    self.process.write_bytes(self.target, &entry)?;
    self.process.flush_icache(self.target, entry.len())?;

    self.trampoline = Some(trampoline);
    Ok(())
  }

  /// Copies or rewrites one prologue instruction at `cursor`, returning
  /// the number of bytes emitted.
  unsafe fn relocate_instruction(
    &mut self,
    instruction: &disasm::Instruction,
    cursor: usize,
  ) -> Result<usize> {
    if let Some(operand) = instruction.branch_operand() {
      // Only direct jumps and calls with 32-bit immediates keep exact
      // semantics when rewritten; short and conditional branches do not.
      if operand.bits != 32 || !(instruction.is_call() || instruction.is_unconditional_jump()) {
        return Err(Error::UnsafePrologue);
      }

      let destination = instruction
        .next_instruction_address()
        .wrapping_add(operand.displacement as usize);
      log::debug!(
        "prologue branch at {:#x} targets {:#x}",
        instruction.address(),
        destination
      );

      // A branch into the bytes replaced by the entry jump would execute
      // the redirect instead of the original prologue.
      let overwritten = self.target as usize..self.target as usize + meta::JUMP_SIZE;
      if overwritten.contains(&destination) {
        return Err(Error::UnsafePrologue);
      }

      if instruction.is_call() {
        self.write_call(cursor, destination)
      } else {
        self.write_jump(cursor, destination)
      }
    } else if instruction.references_instruction_pointer() {
      // The operand would resolve relative to the trampoline instead.
      Err(Error::UnsafePrologue)
    } else if instruction.is_terminator() {
      // The function ends before a whole entry jump fits.
      Err(Error::UnsafePrologue)
    } else {
      self
        .process
        .write_bytes(cursor as *const (), instruction.as_slice())?;
      Ok(instruction.len())
    }
  }

  /// Writes a synthesised jump at `source`, returning its size.
  unsafe fn write_jump(&mut self, source: usize, destination: usize) -> Result<usize> {
    let code = self.jump_to(source, destination)?;
    self.process.write_bytes(source as *const (), &code)?;
    Ok(code.len())
  }

  /// Writes a synthesised call at `source`, returning its size.
  unsafe fn write_call(&mut self, source: usize, destination: usize) -> Result<usize> {
    let code = self.call_to(source, destination)?;
    self.process.write_bytes(source as *const (), &code)?;
    Ok(code.len())
  }

  /// Assembles a jump to `destination` for an instruction at `source`.
  unsafe fn jump_to(&mut self, source: usize, destination: usize) -> Result<Vec<u8>> {
    #[cfg(target_arch = "x86_64")]
    let code = {
      let slot = self.relay_slot(source, destination)?;
      thunk::x64::jmp_indirect(source, slot)
    };
    #[cfg(target_arch = "x86")]
    let code = thunk::x86::jmp_rel32(source, destination);

    expect_stub_size(code, meta::JUMP_SIZE)
  }

  /// Assembles a call to `destination` for an instruction at `source`.
  unsafe fn call_to(&mut self, source: usize, destination: usize) -> Result<Vec<u8>> {
    #[cfg(target_arch = "x86_64")]
    let code = {
      let slot = self.relay_slot(source, destination)?;
      thunk::x64::call_indirect(source, slot)
    };
    #[cfg(target_arch = "x86")]
    let code = thunk::x86::call_rel32(source, destination);

    expect_stub_size(code, meta::CALL_SIZE)
  }

  /// Allocates a relay slot near `source` holding `destination` as an
  /// 8-byte absolute pointer.
  #[cfg(target_arch = "x86_64")]
  unsafe fn relay_slot(&mut self, source: usize, destination: usize) -> Result<usize> {
    let slot = alloc::allocate_near(self.process, source as *const (), mem::size_of::<usize>())?;
    self
      .process
      .write_bytes(slot.as_ptr() as *const (), &destination.to_ne_bytes())?;

    let address = slot.as_ptr() as usize;
    self.relays.push(slot);
    Ok(address)
  }
}

impl<P: Process> Drop for DetourPatch<'_, P> {
  /// Removes the detour, if applied; owned memory is always released.
  fn drop(&mut self) {
    if let Err(error) = unsafe { self.remove() } {
      super::log_removal_failure("detour", self.target, &error);
      self.applied = false;
      self.original.clear();
    }
  }
}

impl<P: Process> fmt::Debug for DetourPatch<'_, P> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(
      f,
      "DetourPatch {{ target: {:p}, detour: {:p}, applied: {} }}",
      self.target, self.detour, self.applied
    )
  }
}

/// Guards against drift between stub synthesis and the platform constants.
fn expect_stub_size(code: Vec<u8>, expected: usize) -> Result<Vec<u8>> {
  if code.len() != expected {
    return Err(Error::StubSizeMismatch {
      expected,
      actual: code.len(),
    });
  }

  Ok(code)
}
