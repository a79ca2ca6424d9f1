//! Interrupt-driven transfer strategy.
//!
//! Each byte is moved by one hardware-readiness event: a transmit-empty
//! notification drains the next byte of the caller's buffer into the
//! data register, a receive-ready notification pulls one byte into the
//! internal accumulator. No byte is ever written speculatively.
//!
//! The handler never blocks and never reports errors; every condition it
//! observes is expressed as flag state the foreground reads later
//! through [`InterruptUart::poll_complete`].

use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use common::sync::IrqSpinLock;
use common::sync::irq::IrqControl;

use crate::hal::channel::{ChannelStatus, Direction, TransferError, UartChannel};
use crate::hal::serial::SerialConfig;

use super::{
    DISABLE_CONFIRM_BUDGET, DirState, RX_CAPACITY, STATUS_BUSY, STATUS_IDLE, spin_until,
};

/// Outbound half of a transfer: the caller's buffer, borrowed for the
/// duration of the transfer, plus the drain cursor.
///
/// Written by the foreground only while the channel lock is held and
/// notifications are quiesced; written by the interrupt handler at all
/// other times. The raw parts are dropped (nulled) the moment the
/// transfer completes or is aborted, so a stale borrow can never be
/// dereferenced.
struct TxDescriptor {
    data: *const u8,
    len: usize,
    pos: usize,
    state: DirState,
}

// SAFETY: the raw buffer pointer is only dereferenced between the
// arm and release handoff points, under the lending contract of
// `start_transfer`.
unsafe impl Send for TxDescriptor {}

impl TxDescriptor {
    const fn empty() -> Self {
        Self {
            data: ptr::null(),
            len: 0,
            pos: 0,
            state: DirState::Idle,
        }
    }

    fn release(&mut self) {
        self.data = ptr::null();
        self.len = 0;
        self.pos = 0;
    }
}

/// Inbound half of a transfer: a fixed-capacity accumulator.
///
/// The cursor never exceeds the capacity; bytes delivered past it are
/// read from the hardware (so the line never stalls) and discarded.
struct RxAccumulator {
    buf: [u8; RX_CAPACITY],
    len: usize,
    /// Bytes after which this direction counts as complete. Bounded by
    /// the capacity at arm time.
    expected: usize,
    state: DirState,
}

impl RxAccumulator {
    const fn empty() -> Self {
        Self {
            buf: [0; RX_CAPACITY],
            len: 0,
            expected: 0,
            state: DirState::Idle,
        }
    }
}

/// Everything wider than a single word, shared between the two
/// execution contexts under one interrupt-masking lock.
struct Inner<U: UartChannel> {
    hw: U,
    tx: TxDescriptor,
    rx: RxAccumulator,
}

/// Interrupt-driven serial channel with simultaneous transmit and
/// receive over one peripheral.
///
/// Constructed `const`, so it can live in a `static` reachable from the
/// interrupt vector, or on the stack in host tests with a mock channel.
pub struct InterruptUart<U: UartChannel, I: IrqControl> {
    /// Channel lock: at most one transfer in flight. Foreground moves
    /// Idle→Busy, the handler moves Busy→Idle on joint completion.
    status: AtomicU8,
    tx_done: AtomicBool,
    rx_done: AtomicBool,
    inner: IrqSpinLock<Inner<U>, I>,
}

impl<U: UartChannel, I: IrqControl> InterruptUart<U, I> {
    pub const fn new(hw: U) -> Self {
        Self {
            status: AtomicU8::new(STATUS_IDLE),
            tx_done: AtomicBool::new(false),
            rx_done: AtomicBool::new(false),
            inner: IrqSpinLock::new(Inner {
                hw,
                tx: TxDescriptor::empty(),
                rx: RxAccumulator::empty(),
            }),
        }
    }

    /// One-time bring-up of the channel.
    ///
    /// Call exactly once before the first transfer; calling twice is
    /// undefined. Readiness notifications stay disabled until a
    /// transfer is armed.
    pub fn init(&self, config: SerialConfig) {
        let mut inner = self.inner.lock();
        inner.hw.configure_channel(config);
        log::debug!("interrupt uart configured at {} baud", config.baud_rate);
    }

    /// Arm a simultaneous transmit/receive of `tx.len()` bytes.
    ///
    /// Fails with [`TransferError::Busy`], mutating nothing, if a
    /// transfer is already in flight. On acceptance the notification
    /// source is quiesced and confirmed off, stale completion state is
    /// cleared (software flags first, then hardware), the descriptor is
    /// installed, and only then are notifications enabled.
    ///
    /// Reception completes after `tx.len()` echoed bytes (bounded by
    /// the accumulator capacity); read them with
    /// [`with_received`](Self::with_received).
    ///
    /// # Safety
    ///
    /// `tx` must stay valid and unmodified until [`poll_complete`]
    /// returns `true`, or until [`abort`](Self::abort) after a
    /// [`wait_complete`] timeout. The driver drops its borrow at those
    /// points and never retains it past them.
    ///
    /// [`poll_complete`]: Self::poll_complete
    /// [`wait_complete`]: Self::wait_complete
    pub unsafe fn start_transfer(&self, tx: &[u8]) -> Result<(), TransferError> {
        if self
            .status
            .compare_exchange(STATUS_IDLE, STATUS_BUSY, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TransferError::Busy);
        }

        if tx.is_empty() {
            // Nothing to move in either direction: trivially complete,
            // hand the channel straight back.
            self.tx_done.store(true, Ordering::Release);
            self.rx_done.store(true, Ordering::Release);
            self.status.store(STATUS_IDLE, Ordering::Release);
            return Ok(());
        }

        let mut inner = self.inner.lock();

        // Quiesce the notification source and confirm it took effect.
        // Re-arming a live source would let an event of the previous
        // transfer touch the new descriptor.
        inner.hw.set_notify(Direction::Tx, false);
        inner.hw.set_notify(Direction::Rx, false);
        let quiesced = spin_until(DISABLE_CONFIRM_BUDGET, || {
            !inner.hw.notify_enabled(Direction::Tx) && !inner.hw.notify_enabled(Direction::Rx)
        });
        if let Err(e) = quiesced {
            log::warn!("notification source refused to quiesce");
            self.status.store(STATUS_IDLE, Ordering::Release);
            return Err(e);
        }

        // Clear stale completion indications: software flags first,
        // then hardware status. Clear-before-arm, never arm-before-clear.
        self.tx_done.store(false, Ordering::Release);
        self.rx_done.store(false, Ordering::Release);
        inner.hw.clear_pending(Direction::Tx);
        inner.hw.clear_pending(Direction::Rx);

        // Install the new descriptor. The arm cannot fail here: the
        // lock is held and both directions are quiescent.
        inner.tx.data = tx.as_ptr();
        inner.tx.len = tx.len();
        inner.tx.pos = 0;
        inner.tx.state.arm();
        inner.rx.len = 0;
        inner.rx.expected = tx.len().min(RX_CAPACITY);
        inner.rx.state.arm();

        // Enable the notification source; from here on the handler owns
        // the descriptor.
        inner.hw.set_notify(Direction::Rx, true);
        inner.hw.set_notify(Direction::Tx, true);
        log::debug!("interrupt transfer armed: {} bytes", tx.len());
        Ok(())
    }

    /// Completion notifier. Call from the channel's interrupt handler.
    ///
    /// Consumes at most one byte per direction per invocation, advances
    /// the per-direction state machines, and releases the channel lock
    /// once both directions are complete. Never blocks.
    pub fn handle_interrupt(&self) {
        let mut inner = self.inner.lock();

        // RX first: the data-register read is what retires the
        // data-ready condition, so it must happen even when the
        // accumulator is full or no transfer is armed, otherwise the
        // line stalls on hardware without a receive FIFO.
        if inner.hw.notify_enabled(Direction::Rx) && inner.hw.pending(Direction::Rx) {
            let byte = inner.hw.read_data();
            if inner.rx.state.in_flight() {
                inner.rx.state.advance();
                if inner.rx.len < RX_CAPACITY {
                    let at = inner.rx.len;
                    inner.rx.buf[at] = byte;
                    inner.rx.len += 1;
                }
                if inner.rx.len >= inner.rx.expected {
                    inner.rx.state.complete();
                    self.rx_done.store(true, Ordering::Release);
                }
            }
        }

        if inner.hw.notify_enabled(Direction::Tx) && inner.hw.pending(Direction::Tx) {
            if inner.tx.state.in_flight() {
                inner.tx.state.advance();
                if inner.tx.pos < inner.tx.len {
                    // SAFETY: `data..data+len` is valid per the lending
                    // contract of `start_transfer`; `pos < len` here.
                    let byte = unsafe { *inner.tx.data.add(inner.tx.pos) };
                    inner.hw.write_data(byte);
                    inner.tx.pos += 1;
                }
                if inner.tx.pos >= inner.tx.len {
                    // Drained. Stop transmit-empty events, they would
                    // fire forever on an empty data register.
                    inner.hw.set_notify(Direction::Tx, false);
                    inner.tx.state.complete();
                    self.tx_done.store(true, Ordering::Release);
                }
            } else {
                // Spurious transmit-empty with nothing armed.
                inner.hw.set_notify(Direction::Tx, false);
            }
        }

        // Joint completion releases the channel. Receive notifications
        // stay enabled so late bytes keep getting drained and dropped.
        if inner.tx.state.is_complete()
            && inner.rx.state.is_complete()
            && self.status.load(Ordering::Acquire) == STATUS_BUSY
        {
            inner.tx.release();
            self.status.store(STATUS_IDLE, Ordering::Release);
        }
    }

    /// `true` once both directions of the current transfer completed.
    ///
    /// Non-blocking; safe from any context that is not the completion
    /// notifier itself.
    pub fn poll_complete(&self) -> bool {
        self.tx_done.load(Ordering::Acquire) && self.rx_done.load(Ordering::Acquire)
    }

    /// Busy-wait on [`poll_complete`](Self::poll_complete), bounded by
    /// `budget` iterations.
    ///
    /// On [`TransferError::Timeout`] no partial result is salvaged: the
    /// buffers are indeterminate and the caller should
    /// [`abort`](Self::abort) before reusing the channel.
    pub fn wait_complete(&self, budget: u32) -> Result<(), TransferError> {
        spin_until(budget, || self.poll_complete()).inspect_err(|_| {
            log::warn!("interrupt transfer timed out");
        })
    }

    /// Channel lock state as seen by the foreground.
    pub fn status(&self) -> ChannelStatus {
        if self.status.load(Ordering::Acquire) == STATUS_BUSY {
            ChannelStatus::Busy
        } else {
            ChannelStatus::Idle
        }
    }

    /// Forcibly tear down the in-flight transfer, if any.
    ///
    /// Safe to call at any time: notification disable is idempotent and
    /// the borrowed buffer is dropped before the lock is released. This
    /// is the recovery path after a [`wait_complete`](Self::wait_complete)
    /// timeout; without it a peer that never sends enough bytes would
    /// hold the channel lock forever.
    pub fn abort(&self) {
        let mut inner = self.inner.lock();
        inner.hw.set_notify(Direction::Tx, false);
        inner.hw.set_notify(Direction::Rx, false);
        inner.tx.release();
        inner.tx.state.reset();
        inner.rx.state.reset();
        self.tx_done.store(false, Ordering::Release);
        self.rx_done.store(false, Ordering::Release);
        self.status.store(STATUS_IDLE, Ordering::Release);
        log::warn!("interrupt transfer aborted");
    }

    /// Run `f` over the bytes received by the current (or most recent)
    /// transfer, in arrival order.
    pub fn with_received<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let inner = self.inner.lock();
        f(&inner.rx.buf[..inner.rx.len])
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::NoIrq;
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::vec::Vec;

    /// Scripted stand-in for the USART register interface. The test
    /// holds a second handle to the wire to play the peer device.
    #[derive(Default)]
    struct Wire {
        configured: Option<SerialConfig>,
        notify_tx: bool,
        notify_rx: bool,
        /// Transmit register empty. Set out of reset and immediately
        /// after every accepted byte, as on real silicon.
        tx_ready: bool,
        /// Data register content, if a byte is waiting.
        rx_data: Option<u8>,
        sent: Vec<u8>,
    }

    struct MockChannel(Rc<RefCell<Wire>>);

    fn mock() -> (Rc<RefCell<Wire>>, MockChannel) {
        let wire = Rc::new(RefCell::new(Wire {
            tx_ready: true,
            ..Wire::default()
        }));
        (wire.clone(), MockChannel(wire))
    }

    impl UartChannel for MockChannel {
        fn configure_channel(&mut self, config: SerialConfig) {
            self.0.borrow_mut().configured = Some(config);
        }

        fn write_data(&mut self, byte: u8) {
            let mut w = self.0.borrow_mut();
            w.sent.push(byte);
            w.tx_ready = true;
        }

        fn read_data(&mut self) -> u8 {
            self.0.borrow_mut().rx_data.take().unwrap_or(0)
        }

        fn pending(&self, dir: Direction) -> bool {
            let w = self.0.borrow();
            match dir {
                Direction::Tx => w.tx_ready,
                Direction::Rx => w.rx_data.is_some(),
            }
        }

        fn set_notify(&mut self, dir: Direction, enabled: bool) {
            let mut w = self.0.borrow_mut();
            match dir {
                Direction::Tx => w.notify_tx = enabled,
                Direction::Rx => w.notify_rx = enabled,
            }
        }

        fn notify_enabled(&self, dir: Direction) -> bool {
            let w = self.0.borrow();
            match dir {
                Direction::Tx => w.notify_tx,
                Direction::Rx => w.notify_rx,
            }
        }

        fn clear_pending(&mut self, dir: Direction) {
            if dir == Direction::Rx {
                self.0.borrow_mut().rx_data = None;
            }
        }
    }

    fn uart() -> (Rc<RefCell<Wire>>, InterruptUart<MockChannel, NoIrq>) {
        let (wire, ch) = mock();
        let uart = InterruptUart::new(ch);
        uart.init(SerialConfig::new_8n1(9600));
        (wire, uart)
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| i as u8).collect()
    }

    /// Drive the handler while echoing every transmitted byte back,
    /// one at a time, interleaved with the transmit drain.
    fn pump_echo(uart: &InterruptUart<MockChannel, NoIrq>, wire: &Rc<RefCell<Wire>>) {
        let mut echoed = 0;
        for _ in 0..10_000 {
            if uart.poll_complete() {
                return;
            }
            {
                let mut w = wire.borrow_mut();
                if w.rx_data.is_none() && echoed < w.sent.len() {
                    w.rx_data = Some(w.sent[echoed]);
                    echoed += 1;
                }
            }
            uart.handle_interrupt();
        }
        panic!("transfer never completed");
    }

    /// Deliver `bytes` from the peer one at a time, invoking the
    /// handler for each.
    fn deliver(uart: &InterruptUart<MockChannel, NoIrq>, wire: &Rc<RefCell<Wire>>, bytes: &[u8]) {
        for &b in bytes {
            wire.borrow_mut().rx_data = Some(b);
            uart.handle_interrupt();
        }
    }

    #[test]
    fn zero_length_transfer_is_trivially_complete() {
        let (_wire, uart) = uart();
        unsafe { uart.start_transfer(&[]).unwrap() };
        assert!(uart.poll_complete());
        assert_eq!(uart.status(), ChannelStatus::Idle);
    }

    #[test]
    fn busy_rejection_mutates_nothing() {
        let (wire, uart) = uart();
        let tx = pattern(50);
        unsafe { uart.start_transfer(&tx).unwrap() };

        let (sent_before, ntx, nrx) = {
            let w = wire.borrow();
            (w.sent.len(), w.notify_tx, w.notify_rx)
        };

        let other = pattern(10);
        assert_eq!(
            unsafe { uart.start_transfer(&other) },
            Err(TransferError::Busy)
        );

        let w = wire.borrow();
        assert_eq!(w.sent.len(), sent_before);
        assert_eq!(w.notify_tx, ntx);
        assert_eq!(w.notify_rx, nrx);
        drop(w);
        assert_eq!(uart.status(), ChannelStatus::Busy);
    }

    #[test]
    fn fifty_byte_loopback_interleaved() {
        let (wire, uart) = uart();
        let tx = pattern(50);
        unsafe { uart.start_transfer(&tx).unwrap() };

        pump_echo(&uart, &wire);

        assert!(uart.poll_complete());
        assert_eq!(uart.status(), ChannelStatus::Idle);
        assert_eq!(wire.borrow().sent, tx);
        uart.with_received(|rx| assert_eq!(rx, &tx[..]));
    }

    #[test]
    fn fifty_byte_loopback_tx_drain_then_rx_burst() {
        let (wire, uart) = uart();
        let tx = pattern(50);
        unsafe { uart.start_transfer(&tx).unwrap() };

        // Drain the whole transmit side first; no echo yet.
        for _ in 0..60 {
            uart.handle_interrupt();
        }
        assert!(!uart.poll_complete());
        assert_eq!(wire.borrow().sent, tx);
        assert_eq!(uart.status(), ChannelStatus::Busy);

        // Now the peer answers in one burst.
        let echo: Vec<u8> = wire.borrow().sent.clone();
        deliver(&uart, &wire, &echo);

        assert!(uart.poll_complete());
        assert_eq!(uart.status(), ChannelStatus::Idle);
        uart.with_received(|rx| assert_eq!(rx, &tx[..]));
    }

    #[test]
    fn short_transfer_completes_at_expected_count() {
        let (wire, uart) = uart();
        let tx = pattern(30);
        unsafe { uart.start_transfer(&tx).unwrap() };

        for _ in 0..40 {
            uart.handle_interrupt();
        }
        // Peer babbles 40 bytes; only the first 30 count.
        let noise: Vec<u8> = (0..40).map(|i| 0x80 + i as u8).collect();
        deliver(&uart, &wire, &noise);

        assert!(uart.poll_complete());
        assert_eq!(uart.status(), ChannelStatus::Idle);
        uart.with_received(|rx| {
            assert_eq!(rx.len(), 30);
            assert_eq!(rx, &noise[..30]);
        });
    }

    #[test]
    fn overflow_keeps_first_capacity_bytes_in_order() {
        let (wire, uart) = uart();
        let tx = pattern(50);
        unsafe { uart.start_transfer(&tx).unwrap() };

        for _ in 0..60 {
            uart.handle_interrupt();
        }
        let flood: Vec<u8> = (0..60).map(|i| i as u8 ^ 0x5A).collect();
        deliver(&uart, &wire, &flood);

        uart.with_received(|rx| {
            assert_eq!(rx.len(), RX_CAPACITY);
            assert_eq!(rx, &flood[..RX_CAPACITY]);
        });
        // Late bytes were still consumed off the wire, not left pending.
        assert!(wire.borrow().rx_data.is_none());
    }

    #[test]
    fn stale_byte_cannot_satisfy_the_next_transfer() {
        let (wire, uart) = uart();
        let tx = pattern(5);
        unsafe { uart.start_transfer(&tx).unwrap() };
        pump_echo(&uart, &wire);
        assert_eq!(uart.status(), ChannelStatus::Idle);

        // A late byte of the old exchange is sitting in the data
        // register when the next transfer is armed.
        wire.borrow_mut().rx_data = Some(0xEE);
        wire.borrow_mut().sent.clear();

        let tx2 = pattern(8);
        unsafe { uart.start_transfer(&tx2).unwrap() };

        // The stale byte was retired during the arm and must not be
        // attributed to the new transfer.
        assert!(wire.borrow().rx_data.is_none());
        assert!(!uart.poll_complete());
        uart.with_received(|rx| assert!(rx.is_empty()));

        pump_echo(&uart, &wire);
        uart.with_received(|rx| assert_eq!(rx, &tx2[..]));
    }

    #[test]
    fn wait_complete_times_out_when_nothing_fires() {
        let (_wire, uart) = uart();
        let tx = pattern(50);
        unsafe { uart.start_transfer(&tx).unwrap() };
        assert_eq!(uart.wait_complete(1_000), Err(TransferError::Timeout));
        assert_eq!(uart.status(), ChannelStatus::Busy);
    }

    #[test]
    fn tx_completion_alone_is_not_completion() {
        let (wire, uart) = uart();
        let tx = pattern(10);
        unsafe { uart.start_transfer(&tx).unwrap() };

        for _ in 0..20 {
            uart.handle_interrupt();
        }
        assert_eq!(wire.borrow().sent.len(), 10);
        assert!(!uart.poll_complete());
        assert_eq!(uart.status(), ChannelStatus::Busy);
    }

    #[test]
    fn abort_releases_the_channel_for_reuse() {
        let (wire, uart) = uart();
        let tx = pattern(50);
        unsafe { uart.start_transfer(&tx).unwrap() };
        for _ in 0..5 {
            uart.handle_interrupt();
        }

        uart.abort();
        assert_eq!(uart.status(), ChannelStatus::Idle);
        assert!(!uart.poll_complete());
        {
            let w = wire.borrow();
            assert!(!w.notify_tx);
            assert!(!w.notify_rx);
        }
        wire.borrow_mut().sent.clear();

        let tx2 = pattern(12);
        unsafe { uart.start_transfer(&tx2).unwrap() };
        pump_echo(&uart, &wire);
        assert_eq!(wire.borrow().sent, tx2);
        uart.with_received(|rx| assert_eq!(rx, &tx2[..]));
    }
}
