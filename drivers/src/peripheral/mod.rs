//! Register-level peripheral drivers.

pub mod dma;
pub mod usart;
