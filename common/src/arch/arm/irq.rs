use crate::sync::irq::IrqControl;

const PRIMASK_DISABLED: u32 = 1;

/// Interrupt masking for Cortex-M cores via the PRIMASK register.
///
/// `State` is a `bool` recording whether interrupts were enabled before
/// the critical section, so nested sections restore correctly.
///
/// # Safety
///
/// Both methods manipulate PRIMASK with inline assembly. `cpsid i` masks
/// all configurable-priority exceptions; `cpsie i` unmasks them. Faults
/// and NMI are unaffected.
pub struct CortexMIrq;

impl IrqControl for CortexMIrq {
    type State = bool;

    #[inline(always)]
    fn disable() -> bool {
        let primask: u32;
        unsafe {
            // Save current PRIMASK, then mask interrupts
            core::arch::asm!(
                "mrs {0}, PRIMASK",
                "cpsid i",
                out(reg) primask,
                options(nomem, nostack)
            );
        }
        primask & PRIMASK_DISABLED == 0 // true if interrupts were enabled
    }

    #[inline(always)]
    fn restore(prev_enabled: bool) {
        if prev_enabled {
            unsafe {
                core::arch::asm!("cpsie i", options(nomem, nostack));
            }
        }
    }
}
