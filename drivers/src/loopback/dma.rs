//! Block-transfer strategy over an autonomous engine.
//!
//! The engine moves the whole buffer by itself; software tracks no
//! byte-level progress. The completion notifier's only job is to turn
//! the single "block transfer complete" hardware event per direction
//! into the corresponding completion flag, and to acknowledge the event
//! so the same line cannot re-trigger.
//!
//! The clear-before-arm ordering in [`DmaUart::start_transfer`] is a
//! hard prerequisite here, not an optimization: a completion event left
//! pending by a superseded transfer must never satisfy the flags of the
//! next one.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use common::sync::IrqSpinLock;
use common::sync::irq::IrqControl;

use crate::hal::channel::{ChannelStatus, Direction, DmaEngine, TransferError};

use super::{DISABLE_CONFIRM_BUDGET, DirState, STATUS_BUSY, STATUS_IDLE, spin_until};

/// Per-direction arming state. Only consulted under the engine lock.
struct Machines {
    tx: DirState,
    rx: DirState,
}

impl Machines {
    fn get(&mut self, dir: Direction) -> &mut DirState {
        match dir {
            Direction::Tx => &mut self.tx,
            Direction::Rx => &mut self.rx,
        }
    }
}

struct Inner<E: DmaEngine> {
    hw: E,
    machines: Machines,
}

/// DMA-driven serial channel: one engine per direction, one completion
/// event per block.
///
/// Constructed `const`, so it can live in a `static` reachable from the
/// stream interrupt vectors, or on the stack in host tests with a mock
/// engine.
pub struct DmaUart<E: DmaEngine, I: IrqControl> {
    /// Channel lock: at most one transfer in flight. Foreground moves
    /// Idle→Busy, the notifier moves Busy→Idle on joint completion.
    status: AtomicU8,
    tx_done: AtomicBool,
    rx_done: AtomicBool,
    inner: IrqSpinLock<Inner<E>, I>,
}

impl<E: DmaEngine, I: IrqControl> DmaUart<E, I> {
    pub const fn new(hw: E) -> Self {
        Self {
            status: AtomicU8::new(STATUS_IDLE),
            tx_done: AtomicBool::new(false),
            rx_done: AtomicBool::new(false),
            inner: IrqSpinLock::new(Inner {
                hw,
                machines: Machines {
                    tx: DirState::Idle,
                    rx: DirState::Idle,
                },
            }),
        }
    }

    /// One-time engine bring-up (stream routing, event unmasking).
    ///
    /// Call exactly once before the first transfer; calling twice is
    /// undefined.
    pub fn init(&self) {
        let mut inner = self.inner.lock();
        inner.hw.init();
        log::debug!("dma engine initialized");
    }

    /// Arm a simultaneous block transmit of `tx` and block receive into
    /// `rx`.
    ///
    /// Fails with [`TransferError::Busy`], mutating nothing, if a
    /// transfer is already in flight. On acceptance both engines are
    /// forced off and their disabled state confirmed within a bounded
    /// poll, stale completion indications are cleared (software flags
    /// first, then hardware events), the buffer addresses are
    /// programmed, and only then are the engines enabled. A direction
    /// with an empty buffer is trivially complete and its engine is
    /// left untouched.
    ///
    /// # Safety
    ///
    /// `tx` and `rx` must stay valid, with `rx` not aliased by anything
    /// that reads it, until [`poll_complete`] returns `true` or until
    /// [`abort`](Self::abort) after a [`wait_complete`] timeout: the
    /// engine reads and writes them asynchronously after this call
    /// returns. After a timeout both buffers are indeterminate.
    ///
    /// [`poll_complete`]: Self::poll_complete
    /// [`wait_complete`]: Self::wait_complete
    pub unsafe fn start_transfer(&self, tx: &[u8], rx: &mut [u8]) -> Result<(), TransferError> {
        if self
            .status
            .compare_exchange(STATUS_IDLE, STATUS_BUSY, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TransferError::Busy);
        }

        let mut inner = self.inner.lock();

        // Force both engines off and wait for the hardware to
        // acknowledge. Re-programming a running engine corrupts the
        // in-flight block.
        inner.hw.disable(Direction::Tx);
        inner.hw.disable(Direction::Rx);
        let acked = spin_until(DISABLE_CONFIRM_BUDGET, || {
            !inner.hw.is_enabled(Direction::Tx) && !inner.hw.is_enabled(Direction::Rx)
        });
        if let Err(e) = acked {
            log::warn!("dma engine refused to disable");
            self.status.store(STATUS_IDLE, Ordering::Release);
            return Err(e);
        }

        // Clear stale completion indications: software flags first,
        // then the hardware events. A completion raised by the
        // superseded transfer dies here instead of satisfying this one.
        self.tx_done.store(false, Ordering::Release);
        self.rx_done.store(false, Ordering::Release);
        inner.hw.clear_pending(Direction::Tx);
        inner.hw.clear_pending(Direction::Rx);

        // Program addresses and lengths, then start. RX before TX so
        // the receiver is listening before the first byte leaves.
        let mut armed = 0;
        if !rx.is_empty() {
            inner
                .hw
                .set_transfer(Direction::Rx, rx.as_mut_ptr(), rx.len() as u16);
            inner.machines.rx.arm();
            armed += 1;
        } else {
            inner.machines.rx.complete();
            self.rx_done.store(true, Ordering::Release);
        }
        if !tx.is_empty() {
            inner
                .hw
                .set_transfer(Direction::Tx, tx.as_ptr().cast_mut(), tx.len() as u16);
            inner.machines.tx.arm();
            armed += 1;
        } else {
            inner.machines.tx.complete();
            self.tx_done.store(true, Ordering::Release);
        }

        if armed == 0 {
            self.status.store(STATUS_IDLE, Ordering::Release);
            return Ok(());
        }
        if inner.machines.rx.in_flight() {
            inner.hw.enable(Direction::Rx);
        }
        if inner.machines.tx.in_flight() {
            inner.hw.enable(Direction::Tx);
        }
        log::debug!("dma transfer armed: {} out / {} in", tx.len(), rx.len());
        Ok(())
    }

    /// Completion notifier. Call from the stream interrupt handler of
    /// `dir`.
    ///
    /// Acknowledges the hardware event so it cannot re-trigger, marks
    /// the direction complete, and releases the channel lock once both
    /// directions are. A stray event with nothing armed is acknowledged
    /// and otherwise ignored. Never blocks.
    pub fn handle_transfer_event(&self, dir: Direction) {
        let mut inner = self.inner.lock();
        if !inner.hw.pending(dir) {
            return;
        }
        inner.hw.clear_pending(dir);

        let machine = inner.machines.get(dir);
        if !machine.in_flight() {
            return;
        }
        machine.advance();
        machine.complete();
        match dir {
            Direction::Tx => self.tx_done.store(true, Ordering::Release),
            Direction::Rx => self.rx_done.store(true, Ordering::Release),
        }

        if inner.machines.tx.is_complete()
            && inner.machines.rx.is_complete()
            && self.status.load(Ordering::Acquire) == STATUS_BUSY
        {
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
    pub fn wait_complete(&self, budget: u32) -> Result<(), TransferError> {
        spin_until(budget, || self.poll_complete()).inspect_err(|_| {
            log::warn!("dma transfer timed out");
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
    /// Safe to call at any time: engine disable is idempotent and
    /// confirmed within a bounded poll. This is the recovery path
    /// after a [`wait_complete`](Self::wait_complete) timeout.
    pub fn abort(&self) {
        let mut inner = self.inner.lock();
        inner.hw.disable(Direction::Tx);
        inner.hw.disable(Direction::Rx);
        let _ = spin_until(DISABLE_CONFIRM_BUDGET, || {
            !inner.hw.is_enabled(Direction::Tx) && !inner.hw.is_enabled(Direction::Rx)
        });
        inner.machines.tx.reset();
        inner.machines.rx.reset();
        self.tx_done.store(false, Ordering::Release);
        self.rx_done.store(false, Ordering::Release);
        self.status.store(STATUS_IDLE, Ordering::Release);
        log::warn!("dma transfer aborted");
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::NoIrq;
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::vec::Vec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {
        Disable(Direction),
        ClearPending(Direction),
        SetTransfer(Direction),
        Enable(Direction),
    }

    #[derive(Default)]
    struct EngineState {
        inited: bool,
        enabled: [bool; 2],
        pending: [bool; 2],
        addr: [usize; 2],
        len: [u16; 2],
        ops: Vec<Op>,
    }

    fn idx(dir: Direction) -> usize {
        match dir {
            Direction::Tx => 0,
            Direction::Rx => 1,
        }
    }

    struct MockEngine(Rc<RefCell<EngineState>>);

    fn mock() -> (Rc<RefCell<EngineState>>, MockEngine) {
        let state = Rc::new(RefCell::new(EngineState::default()));
        (state.clone(), MockEngine(state))
    }

    impl DmaEngine for MockEngine {
        fn init(&mut self) {
            self.0.borrow_mut().inited = true;
        }

        fn set_transfer(&mut self, dir: Direction, addr: *mut u8, len: u16) {
            let mut s = self.0.borrow_mut();
            assert!(!s.enabled[idx(dir)], "reprogrammed a running engine");
            s.addr[idx(dir)] = addr as usize;
            s.len[idx(dir)] = len;
            s.ops.push(Op::SetTransfer(dir));
        }

        fn enable(&mut self, dir: Direction) {
            let mut s = self.0.borrow_mut();
            s.enabled[idx(dir)] = true;
            s.ops.push(Op::Enable(dir));
        }

        fn disable(&mut self, dir: Direction) {
            let mut s = self.0.borrow_mut();
            s.enabled[idx(dir)] = false;
            s.ops.push(Op::Disable(dir));
        }

        fn is_enabled(&self, dir: Direction) -> bool {
            self.0.borrow().enabled[idx(dir)]
        }

        fn pending(&self, dir: Direction) -> bool {
            self.0.borrow().pending[idx(dir)]
        }

        fn clear_pending(&mut self, dir: Direction) {
            let mut s = self.0.borrow_mut();
            s.pending[idx(dir)] = false;
            s.ops.push(Op::ClearPending(dir));
        }
    }

    fn dma() -> (Rc<RefCell<EngineState>>, DmaUart<MockEngine, NoIrq>) {
        let (state, engine) = mock();
        let dma = DmaUart::new(engine);
        dma.init();
        (state, dma)
    }

    /// Play the peer plus the engine: move the block, raise the
    /// completion event, fire the stream handler.
    fn finish_direction(dma: &DmaUart<MockEngine, NoIrq>, state: &Rc<RefCell<EngineState>>, dir: Direction) {
        {
            let mut s = state.borrow_mut();
            assert!(s.enabled[idx(dir)]);
            if dir == Direction::Rx {
                // The engine writes the peer's echo into memory.
                let tx_addr = s.addr[idx(Direction::Tx)] as *const u8;
                let rx_addr = s.addr[idx(Direction::Rx)] as *mut u8;
                let n = s.len[idx(Direction::Rx)].min(s.len[idx(Direction::Tx)]) as usize;
                unsafe { core::ptr::copy_nonoverlapping(tx_addr, rx_addr, n) };
            }
            // NDTR hit zero: the stream clears its own enable bit.
            s.enabled[idx(dir)] = false;
            s.pending[idx(dir)] = true;
        }
        dma.handle_transfer_event(dir);
    }

    #[test]
    fn init_reaches_the_engine() {
        let (state, _dma) = dma();
        assert!(state.borrow().inited);
    }

    #[test]
    fn fifty_byte_block_loopback() {
        let (state, dma) = dma();
        let tx: Vec<u8> = (0u8..50).collect();
        let mut rx = [0u8; 50];
        unsafe { dma.start_transfer(&tx, &mut rx).unwrap() };
        assert_eq!(dma.status(), ChannelStatus::Busy);
        assert!(!dma.poll_complete());

        finish_direction(&dma, &state, Direction::Tx);
        assert!(!dma.poll_complete());
        finish_direction(&dma, &state, Direction::Rx);

        assert!(dma.poll_complete());
        assert_eq!(dma.status(), ChannelStatus::Idle);
        assert_eq!(&rx[..], &tx[..]);
        assert_eq!(dma.wait_complete(10), Ok(()));
    }

    #[test]
    fn completion_order_does_not_matter() {
        let (state, dma) = dma();
        let tx: Vec<u8> = (0u8..50).collect();
        let mut rx = [0u8; 50];
        unsafe { dma.start_transfer(&tx, &mut rx).unwrap() };

        finish_direction(&dma, &state, Direction::Rx);
        assert!(!dma.poll_complete());
        assert_eq!(dma.status(), ChannelStatus::Busy);
        finish_direction(&dma, &state, Direction::Tx);

        assert!(dma.poll_complete());
        assert_eq!(dma.status(), ChannelStatus::Idle);
    }

    #[test]
    fn arm_sequence_disables_then_clears_then_programs_then_enables() {
        let (state, dma) = dma();
        let tx = [1u8; 50];
        let mut rx = [0u8; 50];
        unsafe { dma.start_transfer(&tx, &mut rx).unwrap() };

        let ops = state.borrow().ops.clone();
        let pos = |op: Op| ops.iter().position(|&o| o == op).unwrap();

        for dir in [Direction::Tx, Direction::Rx] {
            assert!(pos(Op::Disable(dir)) < pos(Op::ClearPending(dir)));
            assert!(pos(Op::ClearPending(dir)) < pos(Op::SetTransfer(dir)));
            assert!(pos(Op::SetTransfer(dir)) < pos(Op::Enable(dir)));
        }
    }

    #[test]
    fn busy_rejection_mutates_nothing() {
        let (state, dma) = dma();
        let tx = [1u8; 50];
        let mut rx = [0u8; 50];
        unsafe { dma.start_transfer(&tx, &mut rx).unwrap() };
        let ops_before = state.borrow().ops.len();

        let tx2 = [2u8; 50];
        let mut rx2 = [0u8; 50];
        assert_eq!(
            unsafe { dma.start_transfer(&tx2, &mut rx2) },
            Err(TransferError::Busy)
        );
        assert_eq!(state.borrow().ops.len(), ops_before);
        assert!(!dma.poll_complete());
        assert_eq!(dma.status(), ChannelStatus::Busy);
    }

    #[test]
    fn stale_completion_event_cannot_satisfy_a_new_transfer() {
        let (state, dma) = dma();
        let tx = [1u8; 50];
        let mut rx = [0u8; 50];
        unsafe { dma.start_transfer(&tx, &mut rx).unwrap() };
        finish_direction(&dma, &state, Direction::Tx);
        finish_direction(&dma, &state, Direction::Rx);
        assert!(dma.poll_complete());

        // The old TX event re-asserts between disable and clear of the
        // next arm; the arm must retire it.
        state.borrow_mut().pending[idx(Direction::Tx)] = true;

        let tx2 = [2u8; 50];
        let mut rx2 = [0u8; 50];
        unsafe { dma.start_transfer(&tx2, &mut rx2).unwrap() };
        assert!(!state.borrow().pending[idx(Direction::Tx)]);
        assert!(!dma.poll_complete());

        // A handler invocation with nothing pending changes nothing.
        dma.handle_transfer_event(Direction::Tx);
        assert!(!dma.poll_complete());

        finish_direction(&dma, &state, Direction::Tx);
        finish_direction(&dma, &state, Direction::Rx);
        assert!(dma.poll_complete());
        assert_eq!(&rx2[..], &tx2[..]);
    }

    #[test]
    fn disable_is_idempotent() {
        let (state, dma) = dma();
        {
            let mut inner = dma.inner.lock();
            inner.hw.disable(Direction::Tx);
            let snapshot = (
                state.borrow().enabled,
                state.borrow().pending,
            );
            inner.hw.disable(Direction::Tx);
            assert_eq!(snapshot.0, state.borrow().enabled);
            assert_eq!(snapshot.1, state.borrow().pending);
        }
    }

    #[test]
    fn clear_pending_with_nothing_pending_is_a_noop() {
        let (state, dma) = dma();
        {
            let mut inner = dma.inner.lock();
            inner.hw.clear_pending(Direction::Rx);
        }
        let s = state.borrow();
        assert_eq!(s.pending, [false; 2]);
        assert_eq!(s.enabled, [false; 2]);
    }

    #[test]
    fn wait_complete_times_out_when_no_event_fires() {
        let (_state, dma) = dma();
        let tx = [1u8; 50];
        let mut rx = [0u8; 50];
        unsafe { dma.start_transfer(&tx, &mut rx).unwrap() };
        assert_eq!(dma.wait_complete(1_000), Err(TransferError::Timeout));
        assert_eq!(dma.status(), ChannelStatus::Busy);
    }

    #[test]
    fn abort_after_timeout_releases_the_channel() {
        let (state, dma) = dma();
        let tx = [1u8; 50];
        let mut rx = [0u8; 50];
        unsafe { dma.start_transfer(&tx, &mut rx).unwrap() };
        assert_eq!(dma.wait_complete(100), Err(TransferError::Timeout));

        dma.abort();
        assert_eq!(dma.status(), ChannelStatus::Idle);
        assert!(!state.borrow().enabled[idx(Direction::Tx)]);
        assert!(!state.borrow().enabled[idx(Direction::Rx)]);

        let tx2: Vec<u8> = (0u8..50).collect();
        let mut rx2 = [0u8; 50];
        unsafe { dma.start_transfer(&tx2, &mut rx2).unwrap() };
        finish_direction(&dma, &state, Direction::Tx);
        finish_direction(&dma, &state, Direction::Rx);
        assert!(dma.poll_complete());
        assert_eq!(&rx2[..], &tx2[..]);
    }

    #[test]
    fn empty_directions_complete_without_touching_the_engine() {
        let (state, dma) = dma();
        let mut rx: [u8; 0] = [];
        unsafe { dma.start_transfer(&[], &mut rx).unwrap() };
        assert!(dma.poll_complete());
        assert_eq!(dma.status(), ChannelStatus::Idle);
        let s = state.borrow();
        assert!(!s.ops.contains(&Op::Enable(Direction::Tx)));
        assert!(!s.ops.contains(&Op::Enable(Direction::Rx)));
    }
}
