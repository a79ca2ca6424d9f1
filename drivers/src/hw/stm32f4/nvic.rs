//! Cortex-M NVIC registers and the interrupt lines this suite uses.

pub const NVIC_ISER_BASE: usize = 0xE000_E100;
pub const NVIC_ICER_BASE: usize = 0xE000_E180;
pub const NVIC_ISPR_BASE: usize = 0xE000_E200;

/// DMA1 stream 5 (USART2_RX block completion).
pub const IRQ_DMA1_STREAM5: u32 = 16;
/// DMA1 stream 6 (USART2_TX block completion).
pub const IRQ_DMA1_STREAM6: u32 = 17;
/// USART2 global interrupt (TXE/RXNE byte events).
pub const IRQ_USART2: u32 = 38;
