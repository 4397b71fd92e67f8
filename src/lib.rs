//! A library for patching the code of a live process at runtime.
//!
//! ## Intro
//!
//! This library installs byte-level overwrites and inline detours by
//! disassembling and patching functions during runtime, using stubs placed
//! in executable memory. A detour replaces the target function's prolog
//! with an unconditional jump, while the displaced instructions are
//! relocated into a trampoline so the original remains callable.
//!
//! Two patch types are provided:
//!
//! - [`RawPatch`]: overwrites an arbitrary byte span and can restore it.
//! - [`DetourPatch`]: redirects a function's entry to a replacement and
//!   exposes the relocated prolog as a callable trampoline.
//!
//! All memory access goes through a [`Process`] handle. [`LocalProcess`]
//! covers the common case of patching the current address space; the trait
//! exists so tooling can substitute its own transport.
//!
//! ## Procedure
//!
//! Applying a detour walks the target's prolog one instruction at a time
//! until enough bytes are consumed to hold an entry jump. Each displaced
//! instruction is copied into the trampoline verbatim, except for direct
//! relative jumps and calls, which are rewritten to branch to the same
//! absolute destination from their new address. A jump back to the first
//! untouched instruction is appended, the trampoline is flushed, and only
//! then is the entry overwritten, as a single write.
//!
//! On x86 the entry stub is a five-byte relative jump. On x64 a relative
//! jump cannot reach an arbitrary address, so a six-byte RIP-relative
//! indirect jump is used instead, reading its destination from an 8-byte
//! relay slot allocated within 2 GiB of the stub.
//!
//! ## Limitations
//!
//! Patching does not suspend threads executing in the target. A thread
//! observing the entry bytes mid-overwrite is undefined behavior, which is
//! why the entry overwrite is issued as one write and flushed immediately.
//! Callers requiring stronger guarantees must quiesce the target
//! externally.
//!
//! Prologs containing a terminator (`ret`, `int3`, an indirect jump),
//! short or conditional branches, or RIP-relative operands within the
//! first jump-sized bytes are refused rather than silently mis-relocated.

// Re-exports
pub use crate::alloc::{allocate, allocate_near, ExecutableRegion};
pub use crate::error::{Error, Result};
pub use crate::patch::{DetourPatch, RawPatch};
pub use crate::process::{LocalProcess, Process, SystemInfo};

// Modules
mod alloc;
mod arch;
mod error;
mod patch;
mod process;
