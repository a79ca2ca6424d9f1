//! Loopback transfer core.
//!
//! A single serial channel moves a fixed-size buffer out to, and
//! simultaneously in from, a peer device. Two transfer strategies share
//! the same synchronization discipline between the foreground call site
//! and the interrupt context that observes completion:
//!
//! - [`interrupt::InterruptUart`]: byte-at-a-time streaming driven by
//!   per-byte readiness interrupts
//! - [`dma::DmaUart`]: block transfer by an autonomous engine raising a
//!   single completion event per direction
//!
//! A third, polling-only strategy lives on the peripheral driver itself
//! (see [`crate::peripheral::usart`]); it involves a single execution
//! context and none of the machinery here.
//!
//! # Shared-state contract
//!
//! Exactly two execution contexts exist: the foreground thread of
//! control and the interrupt handlers, which preempt the foreground at
//! arbitrary instruction boundaries on a single core. Cross-context
//! state is limited to:
//!
//! - the channel lock, an `AtomicU8` that only the foreground moves
//!   Idle→Busy (acquire) and only the interrupt side moves Busy→Idle
//!   (release) on joint completion;
//! - one completion flag per direction, `AtomicBool`, set with release
//!   ordering in interrupt context and read with acquire ordering by
//!   the foreground;
//! - everything wider than a word (descriptor, accumulator, the
//!   hardware handle itself) behind an [`IrqSpinLock`], so the
//!   foreground can never be preempted mid-update by the very handler
//!   that reads the state.
//!
//! [`IrqSpinLock`]: common::sync::IrqSpinLock

pub mod dma;
pub mod interrupt;

pub use crate::hal::channel::{ChannelStatus, Direction, TransferError};
pub use dma::DmaUart;
pub use interrupt::InterruptUart;

/// Fixed transfer window moved by the loopback self-test, in bytes.
pub const TRANSFER_LEN: usize = 50;

/// Capacity of the interrupt-driven receive accumulator.
pub const RX_CAPACITY: usize = TRANSFER_LEN;

/// Iteration budget when polling an engine for its disabled
/// acknowledgment. The acknowledgment normally lands within a few bus
/// cycles.
pub const DISABLE_CONFIRM_BUDGET: u32 = 0xFFFF;

/// Default iteration budget for waiting on a full transfer; sized for a
/// 50-byte window at 9600 baud with margin.
pub const WAIT_BUDGET: u32 = 0x00FF_FFFF;

/// Spin on `done` for at most `budget` iterations.
///
/// There is no scheduler to yield to, so a bounded busy-wait is the only
/// suspension primitive available to the foreground.
pub(crate) fn spin_until(budget: u32, mut done: impl FnMut() -> bool) -> Result<(), TransferError> {
    for _ in 0..budget {
        if done() {
            return Ok(());
        }
        core::hint::spin_loop();
    }
    Err(TransferError::Timeout)
}

/// Progress of one channel direction, tracked explicitly so transitions
/// and their preconditions are checkable independently of timing.
///
/// ```text
/// Idle ──arm──► Armed ──event──► InProgress ──last event──► Complete
///   ▲                                                          │
///   └──────────────reset (abort) / arm (next transfer)─────────┘
/// ```
///
/// Foreground context only calls [`arm`](Self::arm) and
/// [`reset`](Self::reset); interrupt context only calls
/// [`advance`](Self::advance) and [`complete`](Self::complete). The
/// handoff points are the channel lock transitions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum DirState {
    /// No transfer installed for this direction.
    #[default]
    Idle,
    /// A descriptor is installed; no event observed yet.
    Armed,
    /// At least one event observed, more expected.
    InProgress,
    /// All expected progress observed.
    Complete,
}

impl DirState {
    /// Install a new transfer. Legal only when no transfer is in
    /// flight; returns `false` (and stays put) otherwise.
    pub fn arm(&mut self) -> bool {
        match self {
            DirState::Idle | DirState::Complete => {
                *self = DirState::Armed;
                true
            }
            DirState::Armed | DirState::InProgress => false,
        }
    }

    /// Record that an event for this direction was observed.
    pub fn advance(&mut self) {
        if *self == DirState::Armed {
            *self = DirState::InProgress;
        }
    }

    /// Record that the last expected event was observed.
    pub fn complete(&mut self) {
        *self = DirState::Complete;
    }

    /// Tear the direction down to its ground state.
    pub fn reset(&mut self) {
        *self = DirState::Idle;
    }

    /// Whether events for this direction should still be consumed.
    pub fn in_flight(&self) -> bool {
        matches!(self, DirState::Armed | DirState::InProgress)
    }

    pub fn is_complete(&self) -> bool {
        *self == DirState::Complete
    }
}

/// Channel lock encoding shared by both strategies.
pub(crate) const STATUS_IDLE: u8 = 0;
pub(crate) const STATUS_BUSY: u8 = 1;

#[cfg(test)]
pub(crate) mod testing {
    use common::sync::irq::IrqControl;

    /// Host-side interrupt control: there is nothing to mask.
    pub struct NoIrq;

    impl IrqControl for NoIrq {
        type State = ();

        fn disable() {}

        fn restore(_: ()) {}
    }
}
