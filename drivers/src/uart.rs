//! Board wiring for USART2.
//!
//! The three transfer strategies are alternatives over the same serial
//! channel; initialize exactly one of them. The statics exist so the
//! interrupt vector table can reach the drivers; host tests construct
//! the same driver types locally around mock channels instead.

use common::arch::CortexMIrq;
use common::sync::SpinLock;

use crate::hal::serial::{SerialConfig, SerialPort};
use crate::hw::stm32f4::dma::DMA1_BASE;
use crate::hw::stm32f4::nvic::{IRQ_DMA1_STREAM5, IRQ_DMA1_STREAM6, IRQ_USART2};
use crate::hw::stm32f4::usart::USART2_BASE;
use crate::loopback::{Direction, DmaUart, InterruptUart};
use crate::peripheral::dma::DmaStreams;
use crate::peripheral::usart::Usart;
use crate::platform::{CurrentPlatform as Board, Platform};

/// Console over USART2 protected by a spinlock (polling strategy)
static CONSOLE: SpinLock<Usart> = SpinLock::new(unsafe { Usart::new(USART2_BASE) });

/// Interrupt-driven loopback channel over USART2
pub static IRQ_UART: InterruptUart<Usart, CortexMIrq> =
    InterruptUart::new(unsafe { Usart::new(USART2_BASE) });

/// Block-transfer loopback channel over USART2 and DMA1
pub static DMA_UART: DmaUart<DmaStreams, CortexMIrq> =
    DmaUart::new(unsafe { DmaStreams::new(DMA1_BASE) });

/// Bring up the polling console.
///
/// # Safety
/// Call once, before any other strategy claims USART2.
pub unsafe fn init_console(baud_rate: u32) {
    unsafe { Board::early_init() };
    let _ = CONSOLE.lock().configure(SerialConfig::new_8n1(baud_rate));
}

/// Bring up the interrupt-driven loopback channel.
///
/// # Safety
/// Call once, before any other strategy claims USART2.
pub unsafe fn init_interrupt_loopback() {
    unsafe { Board::early_init() };
    IRQ_UART.init(SerialConfig::default());
    Board::enable_irq(IRQ_USART2);
}

/// Bring up the DMA loopback channel.
///
/// # Safety
/// Call once, before any other strategy claims USART2.
pub unsafe fn init_dma_loopback() {
    unsafe { Board::early_init() };
    let mut usart = unsafe { Usart::new(USART2_BASE) };
    let _ = usart.configure(SerialConfig::default());
    usart.enable_dma_handoff();
    DMA_UART.init();
    Board::enable_irq(IRQ_DMA1_STREAM5);
    Board::enable_irq(IRQ_DMA1_STREAM6);
}

/// Entry point for the USART2 interrupt vector.
pub fn usart2_irq() {
    IRQ_UART.handle_interrupt();
}

/// Entry point for the DMA1 stream 5 interrupt vector (USART2_RX).
pub fn dma1_stream5_irq() {
    DMA_UART.handle_transfer_event(Direction::Rx);
}

/// Entry point for the DMA1 stream 6 interrupt vector (USART2_TX).
pub fn dma1_stream6_irq() {
    DMA_UART.handle_transfer_event(Direction::Tx);
}

/// Execute a closure with exclusive access to the console
///
/// # Example
/// ```ignore
/// with_console(|uart| {
///     let _ = uart.write(b"hello\r\n");
/// });
/// ```
pub fn with_console<F, R>(f: F) -> R
where
    F: FnOnce(&mut Usart) -> R,
{
    let mut console = CONSOLE.lock();
    f(&mut console)
}

/// Write a string to the console
pub fn print(s: &str) {
    with_console(|uart| {
        let _ = uart.write(s.as_bytes());
    });
}

/// Write a formatted string to the console
#[macro_export]
macro_rules! uart_print {
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let _ = write!($crate::uart::UartWriter, $($arg)*);
    }};
}

/// Write a formatted string with newline to the console
#[macro_export]
macro_rules! uart_println {
    () => { $crate::uart_print!("\n") };
    ($($arg:tt)*) => {{
        $crate::uart_print!($($arg)*);
        $crate::uart_print!("\n");
    }};
}

/// Writer adapter for `core::fmt::Write` trait
pub struct UartWriter;

impl core::fmt::Write for UartWriter {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        with_console(|uart| {
            for byte in s.bytes() {
                // CRLF translation for terminal output
                if byte == b'\n' {
                    uart.write_byte(b'\r').map_err(|_| core::fmt::Error)?;
                }
                uart.write_byte(byte).map_err(|_| core::fmt::Error)?;
            }
            Ok(())
        })
    }
}
