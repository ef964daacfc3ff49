//! PICA200 24-bit floating point
//!
//! The shader units and the rasterizer do all of their math in a 1.7.16 format: 1 sign bit, a
//! 7-bit exponent biased by 63, and a 16-bit mantissa. Values are held in an `f32` that has been
//! reduced to that set, and every arithmetic operation rounds its `f32` result back into it, so
//! results match the hardware's precision instead of host single precision.

use crate::num::U32Ext;
use bincode::{Decode, Encode};
use bytemuck::{Pod, Zeroable};
use std::ops::{Add, Div, Mul, Neg, Sub};

// f32 has 23 mantissa bits, float24 has 16
const DROPPED_MANTISSA_BITS: u32 = 23 - 16;
const DROPPED_MANTISSA_MASK: u32 = (1 << DROPPED_MANTISSA_BITS) - 1;

const EXPONENT_BIAS: i32 = 63;
const F32_EXPONENT_BIAS: i32 = 127;

// Biased exponents 0 and 0x7F are reserved for zero and infinity/NaN
const MIN_EXPONENT: i32 = 1 - EXPONENT_BIAS;
const MAX_EXPONENT: i32 = 0x7E - EXPONENT_BIAS;

const RAW_EXPONENT_MAX: u32 = 0x7F;
const RAW_NAN: u32 = 0x7F_FFFF;

pub type Vec2 = [Float24; 2];
pub type Vec3 = [Float24; 3];
pub type Vec4 = [Float24; 4];

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Pod, Zeroable, Encode, Decode)]
pub struct Float24(f32);

impl Float24 {
    pub const ZERO: Self = Self(0.0);
    pub const ONE: Self = Self(1.0);

    #[must_use]
    pub fn from_f32(value: f32) -> Self {
        Self(reduce_precision(value))
    }

    #[must_use]
    pub fn to_f32(self) -> f32 {
        self.0
    }

    /// Decode a packed 24-bit hardware value (bits 23-0).
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        let sign = u32::from(raw.bit(23)) << 31;
        let exponent = raw.bits(16, 7);
        let mantissa = raw.bits(0, 16);

        let bits = match exponent {
            // Denormals are flushed to zero
            0 => sign,
            RAW_EXPONENT_MAX => {
                if mantissa == 0 {
                    sign | 0x7F80_0000
                } else {
                    0x7FC0_0000
                }
            }
            _ => {
                let f32_exponent = (exponent as i32 - EXPONENT_BIAS + F32_EXPONENT_BIAS) as u32;
                sign | (f32_exponent << 23) | (mantissa << DROPPED_MANTISSA_BITS)
            }
        };

        Self(f32::from_bits(bits))
    }

    /// Encode into the packed 24-bit hardware format.
    #[must_use]
    pub fn to_raw(self) -> u32 {
        if self.0.is_nan() {
            return RAW_NAN;
        }

        let bits = self.0.to_bits();
        let sign = ((bits >> 31) & 1) << 23;
        if self.0 == 0.0 {
            return sign;
        }
        if self.0.is_infinite() {
            return sign | (RAW_EXPONENT_MAX << 16);
        }

        let exponent = (bits.bits(23, 8) as i32 - F32_EXPONENT_BIAS + EXPONENT_BIAS) as u32;
        let mantissa = bits.bits(DROPPED_MANTISSA_BITS as u8, 16);
        sign | (exponent << 16) | mantissa
    }

    // RCP is not guarded against zero; 1/0 produces infinity just like the host division
    #[must_use]
    pub fn recip(self) -> Self {
        Self::from_f32(1.0 / self.0)
    }

    // RSQ of zero is infinity and RSQ of a negative value is NaN
    #[must_use]
    pub fn rsqrt(self) -> Self {
        Self::from_f32(1.0 / self.0.sqrt())
    }
}

fn reduce_precision(value: f32) -> f32 {
    if !value.is_finite() {
        return value;
    }

    let bits = value.to_bits();
    let sign = bits & 0x8000_0000;
    let magnitude = bits & 0x7FFF_FFFF;

    // Round to nearest, ties to even. A carry out of the mantissa correctly bumps the exponent
    let lsb = (magnitude >> DROPPED_MANTISSA_BITS) & 1;
    let half = 1 << (DROPPED_MANTISSA_BITS - 1);
    let rounded = (magnitude + half - 1 + lsb) & !DROPPED_MANTISSA_MASK;

    let exponent = (rounded >> 23) as i32 - F32_EXPONENT_BIAS;
    if exponent > MAX_EXPONENT {
        f32::from_bits(sign | 0x7F80_0000)
    } else if exponent < MIN_EXPONENT {
        f32::from_bits(sign)
    } else {
        f32::from_bits(sign | rounded)
    }
}

impl From<Float24> for f32 {
    fn from(value: Float24) -> Self {
        value.0
    }
}

impl Add for Float24 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::from_f32(self.0 + rhs.0)
    }
}

impl Sub for Float24 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::from_f32(self.0 - rhs.0)
    }
}

impl Mul for Float24 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self::from_f32(self.0 * rhs.0)
    }
}

impl Div for Float24 {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        Self::from_f32(self.0 / rhs.0)
    }
}

impl Neg for Float24 {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

#[must_use]
pub fn vec4(x: f32, y: f32, z: f32, w: f32) -> Vec4 {
    [x, y, z, w].map(Float24::from_f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mantissa_rounds_to_16_bits() {
        let ulp = 2.0_f32.powi(-16);

        assert_eq!(Float24::from_f32(1.0 + ulp).to_f32(), 1.0 + ulp);
        // Exactly half an ulp ties to even
        assert_eq!(Float24::from_f32(1.0 + ulp / 2.0).to_f32(), 1.0);
        assert_eq!(Float24::from_f32(1.0 + 3.0 * ulp / 2.0).to_f32(), 1.0 + 2.0 * ulp);
        assert_eq!(Float24::from_f32(1.0 + 0.75 * ulp).to_f32(), 1.0 + ulp);
        assert_eq!(Float24::from_f32(-(1.0 + 0.25 * ulp)).to_f32(), -1.0);
    }

    #[test]
    fn exponent_range() {
        assert_eq!(Float24::from_f32(2.0_f32.powi(63)).to_f32(), 2.0_f32.powi(63));
        assert_eq!(Float24::from_f32(2.0_f32.powi(64)).to_f32(), f32::INFINITY);
        assert_eq!(Float24::from_f32(-(2.0_f32.powi(70))).to_f32(), f32::NEG_INFINITY);
        assert_eq!(Float24::from_f32(2.0_f32.powi(-62)).to_f32(), 2.0_f32.powi(-62));
        assert_eq!(Float24::from_f32(2.0_f32.powi(-63)).to_f32(), 0.0);
    }

    #[test]
    fn arithmetic_rounds_every_result() {
        let one = Float24::ONE;
        let tiny = Float24::from_f32(2.0_f32.powi(-20));

        assert_eq!(tiny.to_f32(), 2.0_f32.powi(-20));
        assert_eq!((one + tiny).to_f32(), 1.0);
        assert_eq!((Float24::from_f32(3.0) * Float24::from_f32(0.5)).to_f32(), 1.5);
        assert_eq!((-Float24::from_f32(2.5)).to_f32(), -2.5);

        let third = one / Float24::from_f32(3.0);
        assert_ne!(third.to_f32(), 1.0_f32 / 3.0);
        assert!((third.to_f32() - 1.0 / 3.0).abs() < 2.0_f32.powi(-17));
    }

    #[test]
    fn raw_decoding() {
        assert_eq!(Float24::from_raw(0x3F0000).to_f32(), 1.0);
        assert_eq!(Float24::from_raw(0xBF0000).to_f32(), -1.0);
        assert_eq!(Float24::from_raw(0x408000).to_f32(), 3.0);
        assert_eq!(Float24::from_raw(0x000000).to_f32(), 0.0);
        assert_eq!(Float24::from_raw(0x7F0000).to_f32(), f32::INFINITY);
        assert!(Float24::from_raw(0x7F0001).to_f32().is_nan());

        for raw in [0x3F0000, 0xBF0000, 0x408000, 0x3E5555, 0x000000, 0x7F0000] {
            assert_eq!(Float24::from_raw(raw).to_raw(), raw);
        }
    }

    #[test]
    fn reciprocals_of_zero_are_not_guarded() {
        assert_eq!(Float24::ZERO.recip().to_f32(), f32::INFINITY);
        assert_eq!(Float24::ZERO.rsqrt().to_f32(), f32::INFINITY);
        assert!(Float24::from_f32(-4.0).rsqrt().to_f32().is_nan());
        assert_eq!(Float24::from_f32(4.0).rsqrt().to_f32(), 0.5);
    }
}
