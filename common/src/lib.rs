//! Shared infrastructure for the driver workspace.
//!
//! - [`sync`]: spinlocks and interrupt-safe locking primitives
//! - [`arch`]: architecture-specific interrupt masking

#![no_std]

pub mod arch;
pub mod sync;
