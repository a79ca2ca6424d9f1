//! STM32F4 (Cortex-M4) register definitions used by this driver suite.
//!
//! Only the registers the drivers actually touch are modeled; this is
//! not a full device description.

pub mod dma;
pub mod nvic;
pub mod rcc;
pub mod usart;
