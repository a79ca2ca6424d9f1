use core::fmt::Debug;

/// Architecture-specific interrupt masking interface.
///
/// Implemented per target core (see [`crate::arch`]). Host-side tests
/// provide a no-op implementation, since there is nothing to mask.
pub trait IrqControl {
    /// Saved interrupt state, returned by [`disable`](Self::disable).
    type State: Copy + Debug;

    /// Disable interrupts and return the previous state.
    fn disable() -> Self::State;

    /// Restore interrupts to a previously saved state.
    fn restore(state: Self::State);
}
