//! GPU interrupt lines
//!
//! Raised interrupts latch in a status word until acknowledged by the OS-service layer. The mask
//! only affects whether a latched interrupt counts as pending.

use bincode::{Decode, Encode};
use proc_bitfield::bitfield;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptType {
    /// First memory fill unit finished
    Psc0,
    /// Second memory fill unit finished
    Psc1,
    /// Display line completed
    Pdc0,
    /// Display frame completed (vblank)
    Pdc1,
    /// Display transfer finished
    Ppf,
    /// Command list finished
    P3d,
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
    pub struct InterruptLines(pub u8): Debug {
        pub psc0: bool @ 0,
        pub psc1: bool @ 1,
        pub pdc0: bool @ 2,
        pub pdc1: bool @ 3,
        pub ppf: bool @ 4,
        pub p3d: bool @ 5,
    }
}

impl InterruptLines {
    #[must_use]
    pub fn get(self, interrupt: InterruptType) -> bool {
        match interrupt {
            InterruptType::Psc0 => self.psc0(),
            InterruptType::Psc1 => self.psc1(),
            InterruptType::Pdc0 => self.pdc0(),
            InterruptType::Pdc1 => self.pdc1(),
            InterruptType::Ppf => self.ppf(),
            InterruptType::P3d => self.p3d(),
        }
    }

    pub fn set(&mut self, interrupt: InterruptType, value: bool) {
        match interrupt {
            InterruptType::Psc0 => self.set_psc0(value),
            InterruptType::Psc1 => self.set_psc1(value),
            InterruptType::Pdc0 => self.set_pdc0(value),
            InterruptType::Pdc1 => self.set_pdc1(value),
            InterruptType::Ppf => self.set_ppf(value),
            InterruptType::P3d => self.set_p3d(value),
        }
    }
}

#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct InterruptRegisters {
    status: InterruptLines,
    mask: InterruptLines,
}

impl InterruptRegisters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status(&self) -> InterruptLines {
        self.status
    }

    #[must_use]
    pub fn mask(&self) -> InterruptLines {
        self.mask
    }

    pub fn set_mask(&mut self, mask: InterruptLines) {
        self.mask = mask;
        log::debug!("Interrupt mask set to {:02X}", mask.0);
    }

    pub fn raise(&mut self, interrupt: InterruptType) {
        self.status.set(interrupt, true);
        log::debug!("Raised GPU interrupt {interrupt:?}");
    }

    /// Clear every latched interrupt whose bit is set in `lines`.
    pub fn acknowledge(&mut self, lines: InterruptLines) {
        self.status = InterruptLines(self.status.0 & !lines.0);
        log::debug!("Acknowledged interrupts {:02X}, status now {:02X}", lines.0, self.status.0);
    }

    #[must_use]
    pub fn is_raised(&self, interrupt: InterruptType) -> bool {
        self.status.get(interrupt)
    }

    /// Whether any latched interrupt is enabled in the mask.
    #[must_use]
    pub fn pending(&self) -> bool {
        self.status.0 & self.mask.0 != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raise_mask_and_acknowledge() {
        let mut registers = InterruptRegisters::new();
        registers.raise(InterruptType::Pdc0);
        registers.raise(InterruptType::P3d);
        assert_eq!(registers.status().0, 0x24);
        assert!(!registers.pending());

        registers.set_mask(InterruptLines::default().with_p3d(true));
        assert!(registers.pending());

        registers.acknowledge(InterruptLines(0x20));
        assert!(!registers.is_raised(InterruptType::P3d));
        assert!(registers.is_raised(InterruptType::Pdc0));
        assert!(!registers.pending());
    }

    #[test]
    fn line_accessors_match_bits() {
        let mut lines = InterruptLines::default();
        for (bit, interrupt) in [
            InterruptType::Psc0,
            InterruptType::Psc1,
            InterruptType::Pdc0,
            InterruptType::Pdc1,
            InterruptType::Ppf,
            InterruptType::P3d,
        ]
        .into_iter()
        .enumerate()
        {
            lines.set(interrupt, true);
            assert!(lines.get(interrupt));
            assert_eq!(lines.0 & (1 << bit), 1 << bit);
        }
        assert_eq!(lines.0, 0x3F);
    }
}
