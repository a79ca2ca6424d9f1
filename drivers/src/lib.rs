//! USART loopback driver subsystem
//!
//! This crate provides a layered architecture for the serial loopback
//! transfer drivers:
//!
//! # Module Organization
//!
//! - [`hal`]: Platform-independent trait definitions
//! - [`hw`]: Register maps and hardware constants
//! - [`peripheral`]: Reusable peripheral drivers (USART, DMA streams)
//! - [`loopback`]: Transfer strategies and their synchronization core
//! - [`platform`]: Platform-specific bring-up (SoC level)
//! - [`selftest`]: End-to-end loopback verification
//!
//! # Design Principles
//!
//! 1. **Separation of Concerns**: Platform code is separate from peripheral code
//! 2. **Zero-Cost Abstractions**: HAL traits compile to direct hardware access
//! 3. **Type Safety**: Use the type system to prevent errors at compile time
//! 4. **Reusability**: Transfer strategies work over any channel implementation
//!
//! # Usage Example
//!
//! ```no_run
//! use drivers::hal::serial::{SerialConfig, SerialPort};
//! use drivers::peripheral::usart::Usart;
//!
//! # fn main() -> Result<(), drivers::hal::serial::SerialError> {
//! let mut uart = unsafe { Usart::new(0x4000_4400) };
//! uart.configure(SerialConfig::default())?;
//! uart.write(b"Hello, world!\r\n")?;
//! # Ok(())
//! # }
//! ```

#![no_std]

#[cfg(test)]
extern crate std;

pub mod hal;
pub mod hw;
pub mod loopback;
pub mod peripheral;
pub mod platform;
pub mod selftest;

#[cfg(all(feature = "stm32f407", target_arch = "arm"))]
pub mod uart;

// Re-export commonly used types
pub use hal::channel::{ChannelStatus, Direction, TransferError};
pub use hal::interrupt::InterruptController;
pub use hal::serial::{SerialConfig, SerialError, SerialPort};
pub use loopback::{DmaUart, InterruptUart};
pub use selftest::SelfTestError;
