//! STM32F4 DMA1 driver for the USART2 stream pair.
//!
//! Channel 4 routes USART2 requests onto stream 5 (reception) and
//! stream 6 (transmission). This driver models exactly that pair as one
//! [`DmaEngine`]: the peripheral side of both streams is fixed to the
//! USART2 data register, the memory side is programmed per transfer.

use core::ptr::{read_volatile, write_volatile};

use crate::hal::channel::{Direction, DmaEngine};
use crate::hw::stm32f4::dma::*;
use crate::hw::stm32f4::usart::{DR_OFFSET, USART2_BASE};

/// The DMA1 stream pair serving USART2.
pub struct DmaStreams {
    base: usize,
}

impl DmaStreams {
    /// Create a driver over a DMA controller register block.
    ///
    /// # Safety
    ///
    /// - `base` must point to a valid DMA controller
    /// - the controller's bus clock must be enabled before any access
    /// - aliasing instances must never drive the hardware concurrently
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    fn stream(dir: Direction) -> usize {
        match dir {
            Direction::Tx => TX_STREAM,
            Direction::Rx => RX_STREAM,
        }
    }

    fn stream_reg(&self, dir: Direction, offset: usize) -> usize {
        self.base + STREAM0_OFFSET + STREAM_STRIDE * Self::stream(dir) + offset
    }

    #[inline]
    fn read_stream(&self, dir: Direction, offset: usize) -> u32 {
        unsafe { read_volatile(self.stream_reg(dir, offset) as *const u32) }
    }

    #[inline]
    fn write_stream(&mut self, dir: Direction, offset: usize, value: u32) {
        unsafe { write_volatile(self.stream_reg(dir, offset) as *mut u32, value) }
    }

    #[inline]
    fn read_reg(&self, offset: usize) -> u32 {
        unsafe { read_volatile((self.base + offset) as *const u32) }
    }

    #[inline]
    fn write_reg(&mut self, offset: usize, value: u32) {
        unsafe { write_volatile((self.base + offset) as *mut u32, value) }
    }

    fn tc_flag(dir: Direction) -> u32 {
        match dir {
            Direction::Tx => TCIF6,
            Direction::Rx => TCIF5,
        }
    }

    fn all_flags(dir: Direction) -> u32 {
        match dir {
            Direction::Tx => ALL_FLAGS_STREAM6,
            Direction::Rx => ALL_FLAGS_STREAM5,
        }
    }
}

impl DmaEngine for DmaStreams {
    fn init(&mut self) {
        for dir in [Direction::Rx, Direction::Tx] {
            // A stream must be off before its configuration sticks.
            self.disable(dir);
            while self.is_enabled(dir) {
                core::hint::spin_loop();
            }

            // Peripheral side: the USART2 data register, fixed address.
            // Memory side increments; completion events are unmasked.
            self.write_stream(dir, SXPAR_OFFSET, (USART2_BASE + DR_OFFSET) as u32);
            let mut cr = (USART2_CHANNEL << SXCR_CHSEL_POS) | SXCR_MINC | SXCR_TCIE;
            if dir == Direction::Tx {
                cr |= SXCR_DIR_M2P;
            }
            self.write_stream(dir, SXCR_OFFSET, cr);
        }
    }

    fn set_transfer(&mut self, dir: Direction, addr: *mut u8, len: u16) {
        self.write_stream(dir, SXM0AR_OFFSET, addr as u32);
        self.write_stream(dir, SXNDTR_OFFSET, len as u32);
    }

    fn enable(&mut self, dir: Direction) {
        let cr = self.read_stream(dir, SXCR_OFFSET);
        self.write_stream(dir, SXCR_OFFSET, cr | SXCR_EN);
    }

    fn disable(&mut self, dir: Direction) {
        let cr = self.read_stream(dir, SXCR_OFFSET);
        self.write_stream(dir, SXCR_OFFSET, cr & !SXCR_EN);
    }

    fn is_enabled(&self, dir: Direction) -> bool {
        self.read_stream(dir, SXCR_OFFSET) & SXCR_EN != 0
    }

    fn pending(&self, dir: Direction) -> bool {
        self.read_reg(HISR_OFFSET) & Self::tc_flag(dir) != 0
    }

    fn clear_pending(&mut self, dir: Direction) {
        // Writing ones clears; every event flag of the stream goes,
        // not just transfer-complete, so half-transfer or error
        // leftovers cannot linger into the next arm. Writing to clear
        // flags that are not set is defined as a no-op.
        self.write_reg(HIFCR_OFFSET, Self::all_flags(dir));
    }
}

// SAFETY: the type wraps memory-mapped hardware; exclusive access is
// the caller's obligation per `DmaStreams::new`.
unsafe impl Send for DmaStreams {}
