/*!
 * Trap Frame
 * CPU register image saved on entry to the kernel
 */

use crate::core::types::Vaddr;

/// General register numbers (MIPS o32)
pub mod reg {
    pub const ZERO: usize = 0;
    pub const V0: usize = 2;
    pub const V1: usize = 3;
    pub const A0: usize = 4;
    pub const A1: usize = 5;
    pub const A2: usize = 6;
    pub const A3: usize = 7;
    pub const GP: usize = 28;
    pub const SP: usize = 29;
    pub const RA: usize = 31;
}

/// Register snapshot of a user thread
#[repr(C)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrapFrame {
    pub vaddr: u32,
    pub status: u32,
    pub cause: u32,
    pub lo: u32,
    pub hi: u32,
    pub regs: [u32; 32],
    pub epc: Vaddr,
}

impl TrapFrame {
    /// Initial register image for a freshly loaded program
    pub fn for_entry(argc: usize, argv: Vaddr, stackptr: Vaddr, entry: Vaddr) -> Self {
        let mut tf = Self::default();
        tf.set_reg(reg::A0, argc as u32);
        tf.set_reg(reg::A1, argv);
        tf.set_reg(reg::SP, stackptr);
        tf.epc = entry;
        tf
    }

    #[inline]
    pub fn reg(&self, r: usize) -> u32 {
        self.regs[r]
    }

    /// Set a general register; writes to `$zero` are discarded
    #[inline]
    pub fn set_reg(&mut self, r: usize, value: u32) {
        if r != reg::ZERO {
            self.regs[r] = value;
        }
    }

    #[inline]
    pub fn sp(&self) -> Vaddr {
        self.regs[reg::SP]
    }
}
