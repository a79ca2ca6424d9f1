//! USART2 register map (APB1).

pub const USART2_BASE: usize = 0x4000_4400;

/// APB1 bus clock feeding USART2, in Hz.
pub const PCLK1_HZ: u32 = 42_000_000;

// Register offsets
pub const SR_OFFSET: usize = 0x00;
pub const DR_OFFSET: usize = 0x04;
pub const BRR_OFFSET: usize = 0x08;
pub const CR1_OFFSET: usize = 0x0C;
pub const CR2_OFFSET: usize = 0x10;
pub const CR3_OFFSET: usize = 0x14;

// Status Register (SR) bits
pub const SR_RXNE: u32 = 1 << 5;
pub const SR_TC: u32 = 1 << 6;
pub const SR_TXE: u32 = 1 << 7;

// Control Register 1 (CR1) bits
pub const CR1_RE: u32 = 1 << 2;
pub const CR1_TE: u32 = 1 << 3;
pub const CR1_RXNEIE: u32 = 1 << 5;
pub const CR1_TXEIE: u32 = 1 << 7;
pub const CR1_PCE: u32 = 1 << 10;
pub const CR1_M: u32 = 1 << 12;
pub const CR1_UE: u32 = 1 << 13;

// Control Register 2 (CR2) bits
pub const CR2_STOP_MASK: u32 = 0b11 << 12;

// Control Register 3 (CR3) bits
pub const CR3_DMAR: u32 = 1 << 6;
pub const CR3_DMAT: u32 = 1 << 7;
