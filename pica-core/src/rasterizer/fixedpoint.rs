use crate::float24::Float24;

/// Unsigned screen coordinate with 12 integer bits and 4 fractional bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Fix12P4(u16);

impl Fix12P4 {
    pub const FRACTION_BITS: u8 = 4;
    pub const ONE: u16 = 1 << Self::FRACTION_BITS;
    pub const FRAC_MASK: u16 = Self::ONE - 1;
    pub const INT_MASK: u16 = !Self::FRAC_MASK;

    // Truncates toward zero; negative coordinates saturate to 0
    #[must_use]
    pub fn from_float24(value: Float24) -> Self {
        Self((value.to_f32() * f32::from(Self::ONE)) as u16)
    }

    #[must_use]
    pub fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn raw(self) -> u16 {
        self.0
    }

    #[must_use]
    pub fn integer_part(self) -> u16 {
        self.0 >> Self::FRACTION_BITS
    }

    #[must_use]
    pub fn fraction(self) -> u16 {
        self.0 & Self::FRAC_MASK
    }
}

impl From<Fix12P4> for i32 {
    fn from(value: Fix12P4) -> Self {
        value.0.into()
    }
}
