//! Platform Abstraction Layer
//!
//! One-shot board bring-up and interrupt-line plumbing, behind a trait
//! so the rest of the crate never names a concrete SoC.
//!
//! # Usage
//!
//! ```no_run
//! use drivers::platform::{CurrentPlatform as Platform, Platform as PlatformTrait};
//! use drivers::hw::stm32f4::nvic::IRQ_USART2;
//!
//! unsafe { Platform::early_init() };
//! Platform::enable_irq(IRQ_USART2);
//! ```

use crate::hal::interrupt::IrqNumber;

/// Platform trait - implemented by each supported board.
pub trait Platform {
    /// Platform name for debugging.
    fn name() -> &'static str;

    /// Early platform initialization: peripheral clocks and pin
    /// multiplexing. Pure configuration, never revisited.
    ///
    /// # Safety
    /// Must only be called once, before any peripheral access.
    unsafe fn early_init();

    /// Unmask an interrupt line at the interrupt controller.
    fn enable_irq(irq: IrqNumber);

    /// Mask an interrupt line at the interrupt controller.
    fn disable_irq(irq: IrqNumber);
}

// Platform selection based on Cargo features
cfg_if::cfg_if! {
    if #[cfg(feature = "stm32f407")] {
        pub mod stm32f407;
        pub use stm32f407::Stm32f407Platform as CurrentPlatform;
    } else {
        compile_error!(
            "No platform selected!\n\
            Use: cargo build --features stm32f407"
        );
    }
}
