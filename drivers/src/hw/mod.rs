//! Raw hardware definitions: base addresses, register offsets, and bit
//! constants, grouped per SoC family.

pub mod stm32f4;
