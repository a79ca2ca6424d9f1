//! Transfer-channel Hardware Abstraction Layer.
//!
//! The traits here are the narrow waist between the loopback transfer
//! core and the silicon: a byte-streaming channel whose readiness is
//! signalled per byte ([`UartChannel`]), and a block engine that moves a
//! whole buffer and raises a single completion event per direction
//! ([`DmaEngine`]).
//!
//! Both traits are written so that every operation is callable at any
//! time: disables are idempotent, clears are no-ops when nothing is
//! pending, and status reads have no side effects. The transfer core
//! leans on those properties to reset hardware state safely before each
//! transfer.

use super::serial::SerialConfig;
use core::fmt;

/// Transfer direction of a channel half.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    /// Peripheral consumes bytes from memory.
    Tx,
    /// Peripheral produces bytes into memory.
    Rx,
}

/// Occupancy of a transfer channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    /// No transfer in flight; a new one may be armed.
    Idle,
    /// A transfer is in flight.
    Busy,
}

/// Errors surfaced to callers of the transfer core.
///
/// The core never recovers internally; both kinds are reported
/// immediately and the caller decides whether to retry, abort, or
/// escalate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// A transfer is already in flight. The request was rejected, not
    /// queued, and nothing was mutated.
    Busy,
    /// A bounded wait ran out of iterations. Any buffer involved in the
    /// timed-out transfer is indeterminate and must not be reused
    /// without re-arming.
    Timeout,
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Busy => f.write_str("transfer already in flight"),
            TransferError::Timeout => f.write_str("bounded wait exhausted"),
        }
    }
}

/// Byte-streaming serial channel with per-byte readiness notifications.
///
/// Implemented by the USART register driver and, in tests, by a scripted
/// mock. All methods are interrupt-context safe; none of them blocks.
pub trait UartChannel {
    /// One-shot channel setup (baud rate, frame format).
    ///
    /// Assumed infallible on supported hardware; invalid configurations
    /// are a programming error, not a runtime condition.
    fn configure_channel(&mut self, config: SerialConfig);

    /// Hand one byte to the transmitter. Only legal when
    /// `pending(Direction::Tx)` is true; the byte is never buffered.
    fn write_data(&mut self, byte: u8);

    /// Take one byte from the receiver. The read itself retires the
    /// data-ready condition, so a skipped read is a lost byte.
    fn read_data(&mut self) -> u8;

    /// Whether the readiness condition for `dir` is currently asserted
    /// (transmit register empty / receive data available). Read-only.
    fn pending(&self, dir: Direction) -> bool;

    /// Enable or disable readiness notifications for `dir`. Disabling is
    /// idempotent.
    fn set_notify(&mut self, dir: Direction, enabled: bool);

    /// Whether notifications for `dir` are currently enabled.
    fn notify_enabled(&self, dir: Direction) -> bool;

    /// Retire a stale readiness condition for `dir`, if one is
    /// asserted. Defined as a no-op when nothing is pending.
    fn clear_pending(&mut self, dir: Direction);
}

/// Block-transfer engine: moves a whole buffer autonomously and raises
/// one completion event per direction.
pub trait DmaEngine {
    /// One-shot engine setup (stream/channel routing, event unmasking).
    fn init(&mut self);

    /// Install the memory side of the next transfer for `dir`.
    ///
    /// Must only be called while the engine for `dir` is disabled;
    /// reprogramming a running engine corrupts the in-flight transfer.
    fn set_transfer(&mut self, dir: Direction, addr: *mut u8, len: u16);

    /// Start moving the programmed block.
    fn enable(&mut self, dir: Direction);

    /// Stop the engine. Idempotent; the disabled state may take effect
    /// asynchronously, poll [`is_enabled`](Self::is_enabled) to confirm.
    fn disable(&mut self, dir: Direction);

    /// Whether the engine for `dir` is still running.
    fn is_enabled(&self, dir: Direction) -> bool;

    /// Whether a completion event for `dir` is currently asserted.
    /// Read-only.
    fn pending(&self, dir: Direction) -> bool;

    /// Acknowledge the completion event for `dir` so the same event
    /// cannot re-trigger. Defined as a no-op when nothing is pending.
    fn clear_pending(&mut self, dir: Direction);
}
