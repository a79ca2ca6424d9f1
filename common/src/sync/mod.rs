pub mod spinlock;
pub use spinlock::SpinLock;
pub mod irq;
pub mod irq_spinlock;
pub use irq_spinlock::IrqSpinLock;
