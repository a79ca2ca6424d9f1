//! DMA1 register map (AHB1).
//!
//! USART2 is served by DMA1 channel 4: stream 5 for reception, stream 6
//! for transmission.

pub const DMA1_BASE: usize = 0x4002_6000;

/// DMA channel routing USART2 requests on streams 5 and 6.
pub const USART2_CHANNEL: u32 = 4;

/// Stream carrying USART2_RX (peripheral-to-memory).
pub const RX_STREAM: usize = 5;
/// Stream carrying USART2_TX (memory-to-peripheral).
pub const TX_STREAM: usize = 6;

// Controller-level registers
pub const HISR_OFFSET: usize = 0x04;
pub const HIFCR_OFFSET: usize = 0x0C;

// Per-stream register block: 0x10 + 0x18 * stream
pub const STREAM0_OFFSET: usize = 0x10;
pub const STREAM_STRIDE: usize = 0x18;

// Offsets within a stream block
pub const SXCR_OFFSET: usize = 0x00;
pub const SXNDTR_OFFSET: usize = 0x04;
pub const SXPAR_OFFSET: usize = 0x08;
pub const SXM0AR_OFFSET: usize = 0x0C;

// Stream configuration (SxCR) bits
pub const SXCR_EN: u32 = 1 << 0;
pub const SXCR_TCIE: u32 = 1 << 4;
pub const SXCR_DIR_M2P: u32 = 0b01 << 6;
pub const SXCR_MINC: u32 = 1 << 10;
pub const SXCR_CHSEL_POS: u32 = 25;

// High interrupt status/clear (HISR/HIFCR) bits for streams 5 and 6
pub const TCIF5: u32 = 1 << 11;
pub const TCIF6: u32 = 1 << 21;

/// Every event flag of stream 5: FEIF5, DMEIF5, TEIF5, HTIF5, TCIF5.
pub const ALL_FLAGS_STREAM5: u32 = (1 << 6) | (1 << 8) | (1 << 9) | (1 << 10) | (1 << 11);
/// Every event flag of stream 6: FEIF6, DMEIF6, TEIF6, HTIF6, TCIF6.
pub const ALL_FLAGS_STREAM6: u32 = (1 << 16) | (1 << 18) | (1 << 19) | (1 << 20) | (1 << 21);
