//! Hardware Abstraction Layer (HAL) - Platform-Independent Traits
//!
//! This module defines generic traits for interacting with hardware
//! peripherals. These traits are implemented by register-level drivers,
//! allowing the transfer core to be exercised on a host without any
//! hardware behind it.
//!
//! # Available Interfaces
//!
//! - [`serial`]: blocking serial port communication
//! - [`channel`]: transfer-channel primitives (byte streaming and block engines)
//! - [`interrupt`]: interrupt controller management

pub mod channel;
pub mod interrupt;
pub mod serial;
