//! STM32F407 board support: clock enables, USART2 pin multiplexing,
//! and the Cortex-M NVIC.

use core::ptr::{read_volatile, write_volatile};

use crate::hal::interrupt::{InterruptController, IrqNumber};
use crate::hw::stm32f4::nvic::{NVIC_ICER_BASE, NVIC_ISER_BASE, NVIC_ISPR_BASE};
use crate::hw::stm32f4::rcc::*;
use super::Platform;

/// Nested Vectored Interrupt Controller.
pub struct Nvic;

impl Nvic {
    fn bank_and_bit(irq: IrqNumber) -> (usize, u32) {
        ((irq as usize / 32) * 4, 1 << (irq % 32))
    }
}

impl InterruptController for Nvic {
    type Error = core::convert::Infallible;

    fn enable(&mut self, irq: IrqNumber) -> Result<(), Self::Error> {
        let (bank, bit) = Self::bank_and_bit(irq);
        unsafe { write_volatile((NVIC_ISER_BASE + bank) as *mut u32, bit) };
        Ok(())
    }

    fn disable(&mut self, irq: IrqNumber) -> Result<(), Self::Error> {
        let (bank, bit) = Self::bank_and_bit(irq);
        unsafe { write_volatile((NVIC_ICER_BASE + bank) as *mut u32, bit) };
        Ok(())
    }

    fn is_pending(&self, irq: IrqNumber) -> Result<bool, Self::Error> {
        let (bank, bit) = Self::bank_and_bit(irq);
        let pending = unsafe { read_volatile((NVIC_ISPR_BASE + bank) as *const u32) };
        Ok(pending & bit != 0)
    }
}

#[inline]
unsafe fn set_bits(addr: usize, clear: u32, set: u32) {
    unsafe {
        let v = read_volatile(addr as *const u32);
        write_volatile(addr as *mut u32, (v & !clear) | set);
    }
}

/// STM32F407 Discovery-class board.
pub struct Stm32f407Platform;

impl Platform for Stm32f407Platform {
    fn name() -> &'static str {
        "stm32f407"
    }

    unsafe fn early_init() {
        unsafe {
            // Peripheral clocks: GPIOA and DMA1 on AHB1, USART2 on APB1
            set_bits(
                RCC_BASE + AHB1ENR_OFFSET,
                0,
                AHB1ENR_GPIOAEN | AHB1ENR_DMA1EN,
            );
            set_bits(RCC_BASE + APB1ENR_OFFSET, 0, APB1ENR_USART2EN);

            // PA2/PA3 to alternate function 7 (USART2 TX/RX),
            // pull-up on the receive line
            set_bits(
                GPIOA_BASE + MODER_OFFSET,
                MODER_PIN2_MASK | MODER_PIN3_MASK,
                MODER_PIN2_AF | MODER_PIN3_AF,
            );
            set_bits(
                GPIOA_BASE + PUPDR_OFFSET,
                PUPDR_PIN3_MASK,
                PUPDR_PIN3_PULLUP,
            );
            set_bits(
                GPIOA_BASE + AFRL_OFFSET,
                AFRL_PIN2_MASK | AFRL_PIN3_MASK,
                (AFRL_AF7 << AFRL_PIN2_POS) | (AFRL_AF7 << AFRL_PIN3_POS),
            );
        }
        log::debug!("{} clocks and pins configured", Self::name());
    }

    fn enable_irq(irq: IrqNumber) {
        let _ = Nvic.enable(irq);
    }

    fn disable_irq(irq: IrqNumber) {
        let _ = Nvic.disable(irq);
    }
}
