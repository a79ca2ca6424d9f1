//! Reset and clock control, plus the GPIOA pins USART2 lives on.

pub const RCC_BASE: usize = 0x4002_3800;

pub const AHB1ENR_OFFSET: usize = 0x30;
pub const APB1ENR_OFFSET: usize = 0x40;

// AHB1ENR bits
pub const AHB1ENR_GPIOAEN: u32 = 1 << 0;
pub const AHB1ENR_DMA1EN: u32 = 1 << 21;

// APB1ENR bits
pub const APB1ENR_USART2EN: u32 = 1 << 17;

// GPIOA: PA2 = USART2_TX, PA3 = USART2_RX, alternate function 7
pub const GPIOA_BASE: usize = 0x4002_0000;
pub const MODER_OFFSET: usize = 0x00;
pub const PUPDR_OFFSET: usize = 0x0C;
pub const AFRL_OFFSET: usize = 0x20;

pub const MODER_PIN2_MASK: u32 = 0b11 << 4;
pub const MODER_PIN3_MASK: u32 = 0b11 << 6;
pub const MODER_PIN2_AF: u32 = 0b10 << 4;
pub const MODER_PIN3_AF: u32 = 0b10 << 6;

pub const PUPDR_PIN3_MASK: u32 = 0b11 << 6;
pub const PUPDR_PIN3_PULLUP: u32 = 0b01 << 6;

pub const AFRL_PIN2_MASK: u32 = 0xF << 8;
pub const AFRL_PIN3_MASK: u32 = 0xF << 12;
pub const AFRL_AF7: u32 = 7;
pub const AFRL_PIN2_POS: u32 = 8;
pub const AFRL_PIN3_POS: u32 = 12;
