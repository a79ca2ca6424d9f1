//! STM32F4 USART driver.
//!
//! One register-level type serves two of the three transfer strategies:
//!
//! - the blocking [`SerialPort`] implementation polls the status flags
//!   with a bounded per-byte budget (the polling strategy);
//! - the [`UartChannel`] implementation exposes the per-byte readiness
//!   primitives the interrupt-driven transfer core drives.
//!
//! For the block strategy the USART only needs its request lines routed
//! to the DMA controller, see [`Usart::enable_dma_handoff`].
//!
//! # Example
//!
//! ```no_run
//! use drivers::hal::serial::{SerialConfig, SerialPort};
//! use drivers::hw::stm32f4::usart::USART2_BASE;
//! use drivers::peripheral::usart::Usart;
//!
//! let mut uart = unsafe { Usart::new(USART2_BASE) };
//! uart.configure(SerialConfig::new_8n1(9600)).unwrap();
//! uart.write(b"hello\n").unwrap();
//! ```

use core::ptr::{read_volatile, write_volatile};

use crate::hal::channel::{Direction, UartChannel};
use crate::hal::serial::{
    DataBits, Parity, SerialConfig, SerialError, SerialPort, StopBits,
};
use crate::hw::stm32f4::usart::*;

/// Iteration budget for each blocking poll in the [`SerialPort`] paths.
const POLL_BUDGET: u32 = 0xFFFF;

/// STM32F4 USART peripheral driver.
pub struct Usart {
    base: usize,
}

impl Usart {
    /// Create a USART instance over a register block.
    ///
    /// # Safety
    ///
    /// - `base` must point to a valid USART peripheral
    /// - the peripheral's bus clock must be enabled before any access
    /// - aliasing instances must never drive the hardware concurrently
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    #[inline]
    fn read_reg(&self, offset: usize) -> u32 {
        unsafe { read_volatile((self.base + offset) as *const u32) }
    }

    #[inline]
    fn write_reg(&mut self, offset: usize, value: u32) {
        unsafe { write_volatile((self.base + offset) as *mut u32, value) }
    }

    #[inline]
    fn modify_reg(&mut self, offset: usize, clear: u32, set: u32) {
        let v = self.read_reg(offset);
        self.write_reg(offset, (v & !clear) | set);
    }

    /// Spin until `mask` is set in SR, bounded.
    fn wait_flag(&self, mask: u32) -> Result<(), SerialError> {
        let mut budget = POLL_BUDGET;
        while self.read_reg(SR_OFFSET) & mask == 0 {
            budget -= 1;
            if budget == 0 {
                return Err(SerialError::Timeout);
            }
            core::hint::spin_loop();
        }
        Ok(())
    }

    /// Compute the BRR value for `baud` with oversampling by 16.
    ///
    /// The divisor is a 12.4 fixed-point number:
    /// `USARTDIV = pclk / (16 * baud)`.
    fn baud_divisor(pclk: u32, baud: u32) -> Result<u32, SerialError> {
        if baud == 0 {
            return Err(SerialError::InvalidConfig);
        }

        let div_q4 = ((pclk as u64) << 4) / (16 * baud as u64);
        let mantissa = (div_q4 >> 4) as u32;
        let fraction = (div_q4 & 0xF) as u32;

        if mantissa == 0 || mantissa > 0xFFF {
            return Err(SerialError::InvalidConfig);
        }

        Ok((mantissa << 4) | fraction)
    }

    /// Route the USART's transmit and receive requests to the DMA
    /// controller. Required once before block transfers.
    pub fn enable_dma_handoff(&mut self) {
        self.modify_reg(CR3_OFFSET, 0, CR3_DMAT | CR3_DMAR);
    }
}

impl SerialPort for Usart {
    fn configure(&mut self, config: SerialConfig) -> Result<(), SerialError> {
        // Only 8N1 frames are supported on this channel.
        if !matches!(config.data_bits, DataBits::Eight)
            || !matches!(config.parity, Parity::None)
            || !matches!(config.stop_bits, StopBits::One)
        {
            return Err(SerialError::InvalidConfig);
        }

        let brr = Self::baud_divisor(PCLK1_HZ, config.baud_rate)?;

        // Disable before reprogramming
        self.modify_reg(CR1_OFFSET, CR1_UE, 0);

        // 8 data bits, no parity, 1 stop bit
        self.modify_reg(CR1_OFFSET, CR1_M | CR1_PCE, 0);
        self.modify_reg(CR2_OFFSET, CR2_STOP_MASK, 0);
        self.write_reg(BRR_OFFSET, brr);

        // Transmitter and receiver on, then the peripheral itself
        self.modify_reg(CR1_OFFSET, 0, CR1_TE | CR1_RE);
        self.modify_reg(CR1_OFFSET, 0, CR1_UE);

        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), SerialError> {
        self.wait_flag(SR_TXE)?;
        self.write_reg(DR_OFFSET, byte as u32);
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, SerialError> {
        self.wait_flag(SR_RXNE)?;
        // The DR read also retires the data-ready flag
        Ok((self.read_reg(DR_OFFSET) & 0xFF) as u8)
    }

    fn flush(&mut self) -> Result<(), SerialError> {
        // TC only rises once the last frame left the shifter
        self.wait_flag(SR_TC)
    }

    fn is_busy(&self) -> bool {
        self.read_reg(SR_OFFSET) & SR_TC == 0
    }
}

impl UartChannel for Usart {
    fn configure_channel(&mut self, config: SerialConfig) {
        // Bring-up is assumed infallible on this target; an unsupported
        // frame format is a programming error upstream.
        let _ = self.configure(config);
    }

    fn write_data(&mut self, byte: u8) {
        self.write_reg(DR_OFFSET, byte as u32);
    }

    fn read_data(&mut self) -> u8 {
        (self.read_reg(DR_OFFSET) & 0xFF) as u8
    }

    fn pending(&self, dir: Direction) -> bool {
        let sr = self.read_reg(SR_OFFSET);
        match dir {
            Direction::Tx => sr & SR_TXE != 0,
            Direction::Rx => sr & SR_RXNE != 0,
        }
    }

    fn set_notify(&mut self, dir: Direction, enabled: bool) {
        let bit = match dir {
            Direction::Tx => CR1_TXEIE,
            Direction::Rx => CR1_RXNEIE,
        };
        if enabled {
            self.modify_reg(CR1_OFFSET, 0, bit);
        } else {
            self.modify_reg(CR1_OFFSET, bit, 0);
        }
    }

    fn notify_enabled(&self, dir: Direction) -> bool {
        let cr1 = self.read_reg(CR1_OFFSET);
        match dir {
            Direction::Tx => cr1 & CR1_TXEIE != 0,
            Direction::Rx => cr1 & CR1_RXNEIE != 0,
        }
    }

    fn clear_pending(&mut self, dir: Direction) {
        match dir {
            // TXE is a level condition, retired only by writing DR;
            // there is nothing stale to discard.
            Direction::Tx => {}
            // Draining DR retires RXNE. No-op when nothing is waiting.
            Direction::Rx => {
                if self.pending(Direction::Rx) {
                    let _ = self.read_data();
                }
            }
        }
    }
}

// SAFETY: the type wraps memory-mapped hardware; exclusive access is
// the caller's obligation per `Usart::new`.
unsafe impl Send for Usart {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divisor_matches_the_reference_configuration() {
        // 42 MHz APB1, 9600 baud: USARTDIV = 273.4375 -> 0x1117
        assert_eq!(Usart::baud_divisor(PCLK1_HZ, 9600), Ok(0x1117));
    }

    #[test]
    fn divisor_handles_common_rates() {
        // 115200 baud: 42e6 / (16 * 115200) = 22.786 -> 22 + 12/16
        assert_eq!(Usart::baud_divisor(PCLK1_HZ, 115_200), Ok((22 << 4) | 12));
        // 19200 baud: 136.71875 -> 136 + 11/16
        assert_eq!(Usart::baud_divisor(PCLK1_HZ, 19_200), Ok((136 << 4) | 11));
    }

    #[test]
    fn divisor_rejects_degenerate_rates() {
        assert_eq!(
            Usart::baud_divisor(PCLK1_HZ, 0),
            Err(SerialError::InvalidConfig)
        );
        // Mantissa overflows 12 bits
        assert_eq!(
            Usart::baud_divisor(PCLK1_HZ, 1),
            Err(SerialError::InvalidConfig)
        );
        // Mantissa underflows to zero
        assert_eq!(
            Usart::baud_divisor(PCLK1_HZ, 42_000_000),
            Err(SerialError::InvalidConfig)
        );
    }
}
