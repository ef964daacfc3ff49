//! Texture units: configuration, coordinate wrapping, and tiled texel fetches
//!
//! Textures are stored as 8x8 tiles laid out left to right, top to bottom. Within a tile, texels
//! are in Morton order with S in the even bits and T in the odd bits. Only 24-bit RGB textures
//! (stored as B, G, R bytes) are supported.

use crate::api::{PicaError, PicaResult};
use crate::float24::{Float24, Vec2};
use crate::rasterizer::Color;
use bincode::{Decode, Encode};
use proc_bitfield::bitfield;

pub const NUM_TEXTURE_UNITS: usize = 3;
pub const BYTES_PER_TEXEL: usize = 3;
pub const TILE_SIZE: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WrapMode {
    #[default]
    ClampToEdge,
    ClampToBorder,
    Repeat,
    MirroredRepeat,
}

impl WrapMode {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::ClampToEdge),
            1 => Some(Self::ClampToBorder),
            2 => Some(Self::Repeat),
            3 => Some(Self::MirroredRepeat),
            _ => None,
        }
    }

    pub fn to_bits(self) -> u8 {
        self as u8
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
    pub struct TextureSize(pub u32): Debug {
        pub height: u16 @ 0..16,
        pub width: u16 @ 16..32,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
    pub struct TextureParameters(pub u32): Debug {
        pub wrap_t: u8 @ 8..11,
        pub wrap_s: u8 @ 12..15,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub struct TextureConfig {
    pub enabled: bool,
    pub size: TextureSize,
    pub parameters: TextureParameters,
}

impl TextureConfig {
    /// An enabled texture unit with the given dimensions and wrap modes.
    #[must_use]
    pub fn new(width: u16, height: u16, wrap_s: WrapMode, wrap_t: WrapMode) -> Self {
        Self {
            enabled: true,
            size: TextureSize(0).with_width(width).with_height(height),
            parameters: TextureParameters(0)
                .with_wrap_s(wrap_s.to_bits())
                .with_wrap_t(wrap_t.to_bits()),
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.size.width().into()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.size.height().into()
    }
}

/// An enabled texture unit bound to its texel data.
#[derive(Debug, Clone, Copy)]
pub struct Texture<'a> {
    config: TextureConfig,
    data: &'a [u8],
}

impl<'a> Texture<'a> {
    /// # Errors
    ///
    /// Returns an error if the dimensions are not non-zero multiples of the tile size, or if
    /// `data` is too small to hold the whole texture.
    pub fn new(unit: usize, config: TextureConfig, data: &'a [u8]) -> PicaResult<Self> {
        let (width, height) = (config.width(), config.height());
        if width == 0 || height == 0 || width % TILE_SIZE != 0 || height % TILE_SIZE != 0 {
            return Err(PicaError::InvalidTextureDimensions { unit, width, height });
        }

        let required = width as usize * height as usize * BYTES_PER_TEXEL;
        if data.len() < required {
            return Err(PicaError::TextureDataTooSmall { unit, len: data.len(), required });
        }

        Ok(Self { config, data })
    }

    #[must_use]
    pub fn config(&self) -> &TextureConfig {
        &self.config
    }

    /// Sample the texel nearest to a normalized texture coordinate.
    #[must_use]
    pub fn sample(&self, uv: Vec2) -> Color {
        let (width, height) = (self.config.width(), self.config.height());

        let s = (uv[0] * Float24::from_f32(width as f32)).to_f32() as i32;
        let t = (uv[1] * Float24::from_f32(height as f32)).to_f32() as i32;

        let s = wrap_tex_coord(self.config.parameters.wrap_s(), s, width);
        let t = wrap_tex_coord(self.config.parameters.wrap_t(), t, height);

        self.texel(s as u32, t as u32)
    }

    // Callers wrap coordinates into the texture first
    fn texel(&self, s: u32, t: u32) -> Color {
        let offset = texel_offset(s, t, self.config.width());
        let texel = &self.data[offset..offset + BYTES_PER_TEXEL];
        Color::rgba(texel[2], texel[1], texel[0], 255)
    }
}

/// Map a texel coordinate into `0..size` according to the raw wrap mode bits.
#[must_use]
pub fn wrap_tex_coord(wrap_mode: u8, value: i32, size: u32) -> i32 {
    match WrapMode::from_bits(wrap_mode) {
        Some(WrapMode::ClampToEdge) => value.clamp(0, size as i32 - 1),
        Some(WrapMode::Repeat) => ((value as u32) % size) as i32,
        Some(mode @ (WrapMode::ClampToBorder | WrapMode::MirroredRepeat)) => {
            log::error!("Unimplemented texture wrap mode {mode:?}");
            0
        }
        None => {
            log::error!("Unknown texture wrap mode {wrap_mode}");
            0
        }
    }
}

/// Index of a texel within its 8x8 tile: S bits interleaved into even positions, T bits into odd.
#[must_use]
pub fn texel_index_within_tile(s: u32, t: u32) -> u32 {
    (0..3).fold(0, |index, bit| {
        index + ((s & (1 << bit)) << bit) + 2 * ((t & (1 << bit)) << bit)
    })
}

/// Byte offset of the texel at (s, t) in a tiled texture that is `width` texels wide.
#[must_use]
pub fn texel_offset(s: u32, t: u32, width: u32) -> usize {
    let coarse_s = s / TILE_SIZE * TILE_SIZE;
    let coarse_t = t / TILE_SIZE * TILE_SIZE;
    let index = texel_index_within_tile(s, t);

    BYTES_PER_TEXEL * (coarse_s * TILE_SIZE + coarse_t * width + index) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_modes() {
        let repeat = WrapMode::Repeat.to_bits();
        let clamp = WrapMode::ClampToEdge.to_bits();

        assert_eq!(wrap_tex_coord(repeat, 13, 8), 5);
        assert_eq!(wrap_tex_coord(repeat, 8, 8), 0);
        assert_eq!(wrap_tex_coord(clamp, -3, 8), 0);
        assert_eq!(wrap_tex_coord(clamp, 20, 8), 7);
        assert_eq!(wrap_tex_coord(clamp, 4, 8), 4);

        // Unimplemented and unknown modes fall back to coordinate 0
        assert_eq!(wrap_tex_coord(WrapMode::MirroredRepeat.to_bits(), 5, 8), 0);
        assert_eq!(wrap_tex_coord(WrapMode::ClampToBorder.to_bits(), 5, 8), 0);
        assert_eq!(wrap_tex_coord(6, 5, 8), 0);
    }

    #[test]
    fn repeat_wraps_negative_coordinates_as_unsigned() {
        // Negative coordinates wrap through their unsigned representation
        assert_eq!(wrap_tex_coord(WrapMode::Repeat.to_bits(), -1, 8), 7);
    }

    #[test]
    fn tile_index_is_morton_order() {
        assert_eq!(texel_index_within_tile(0, 0), 0);
        assert_eq!(texel_index_within_tile(1, 0), 1);
        assert_eq!(texel_index_within_tile(0, 1), 2);
        assert_eq!(texel_index_within_tile(1, 1), 3);
        assert_eq!(texel_index_within_tile(2, 0), 4);
        assert_eq!(texel_index_within_tile(7, 7), 63);

        // Every texel of a tile maps to a distinct index
        let mut seen = [false; 64];
        for t in 0..8 {
            for s in 0..8 {
                let index = texel_index_within_tile(s, t) as usize;
                assert!(!seen[index], "({s}, {t}) collides at {index}");
                seen[index] = true;
            }
        }
    }

    // Texel index within an 8x8 tile, indexed [t][s]
    const TILE_INDICES: [[usize; 8]; 8] = [
        [0, 1, 4, 5, 16, 17, 20, 21],
        [2, 3, 6, 7, 18, 19, 22, 23],
        [8, 9, 12, 13, 24, 25, 28, 29],
        [10, 11, 14, 15, 26, 27, 30, 31],
        [32, 33, 36, 37, 48, 49, 52, 53],
        [34, 35, 38, 39, 50, 51, 54, 55],
        [40, 41, 44, 45, 56, 57, 60, 61],
        [42, 43, 46, 47, 58, 59, 62, 63],
    ];

    #[test]
    fn sampling_finds_markers_at_tiled_offsets() {
        let mut data = vec![0; 8 * 8 * BYTES_PER_TEXEL];
        for (t, row) in TILE_INDICES.iter().enumerate() {
            for (s, &index) in row.iter().enumerate() {
                // Red byte of the texel
                data[BYTES_PER_TEXEL * index + 2] = (1 + s + 8 * t) as u8;
            }
        }

        let config = TextureConfig::new(8, 8, WrapMode::ClampToEdge, WrapMode::ClampToEdge);
        let texture = Texture::new(0, config, &data).unwrap();
        for t in 0..8 {
            for s in 0..8 {
                let uv = [
                    Float24::from_f32((s as f32 + 0.5) / 8.0),
                    Float24::from_f32((t as f32 + 0.5) / 8.0),
                ];
                assert_eq!(texture.sample(uv).r, (1 + s + 8 * t) as u8, "texel ({s}, {t})");
            }
        }
    }

    #[test]
    fn tiles_are_laid_out_in_rows() {
        let width = 16;
        // Second tile in the first row starts right after the first tile
        assert_eq!(texel_offset(8, 0, width), 64 * BYTES_PER_TEXEL);
        // First tile of the second tile row starts after a full row of tiles
        assert_eq!(texel_offset(0, 8, width), 128 * BYTES_PER_TEXEL);
        assert_eq!(texel_offset(9, 10, width), (192 + TILE_INDICES[2][1]) * BYTES_PER_TEXEL);
    }

    #[test]
    fn sample_reads_bgr_bytes() {
        let mut data = vec![0; 8 * 8 * BYTES_PER_TEXEL];
        // Texel (5, 2)
        let offset = texel_offset(5, 2, 8);
        data[offset..offset + 3].copy_from_slice(&[0x10, 0x20, 0x30]);

        let config = TextureConfig::new(8, 8, WrapMode::Repeat, WrapMode::Repeat);
        let texture = Texture::new(0, config, &data).unwrap();

        let uv = [Float24::from_f32(5.5 / 8.0), Float24::from_f32(2.5 / 8.0)];
        assert_eq!(texture.sample(uv), Color::rgba(0x30, 0x20, 0x10, 0xFF));

        // One full repeat further along S lands on the same texel
        let uv = [Float24::from_f32(13.5 / 8.0), Float24::from_f32(2.5 / 8.0)];
        assert_eq!(texture.sample(uv), Color::rgba(0x30, 0x20, 0x10, 0xFF));
    }

    #[test]
    fn wrap_modes_are_per_axis() {
        let mut data = vec![0; 8 * 8 * BYTES_PER_TEXEL];
        let offset = texel_offset(7, 1, 8);
        data[offset + 2] = 0xAA;

        // S clamps, T repeats
        let config = TextureConfig::new(8, 8, WrapMode::ClampToEdge, WrapMode::Repeat);
        let texture = Texture::new(0, config, &data).unwrap();

        let uv = [Float24::from_f32(3.0), Float24::from_f32(9.5 / 8.0)];
        assert_eq!(texture.sample(uv).r, 0xAA);
    }

    #[test]
    fn out_of_range_coordinates_stay_inside_the_texture() {
        let data = vec![0x55; 8 * 8 * BYTES_PER_TEXEL];

        for mode in [WrapMode::ClampToEdge, WrapMode::ClampToBorder, WrapMode::Repeat, WrapMode::MirroredRepeat] {
            let config = TextureConfig::new(8, 8, mode, mode);
            let texture = Texture::new(0, config, &data).unwrap();
            for uv in [[-1000.0, 3.5], [1000.0, -0.25], [f32::INFINITY, f32::NEG_INFINITY]] {
                let color = texture.sample(uv.map(Float24::from_f32));
                assert_eq!(color, Color::rgba(0x55, 0x55, 0x55, 0xFF), "{mode:?} at {uv:?}");
            }
        }
    }

    #[test]
    fn texture_validation() {
        let data = vec![0; 8 * 8 * BYTES_PER_TEXEL];

        let config = TextureConfig::new(12, 8, WrapMode::Repeat, WrapMode::Repeat);
        assert!(matches!(
            Texture::new(1, config, &data),
            Err(PicaError::InvalidTextureDimensions { unit: 1, width: 12, height: 8 })
        ));

        let config = TextureConfig::new(0, 8, WrapMode::Repeat, WrapMode::Repeat);
        assert!(matches!(Texture::new(0, config, &data), Err(PicaError::InvalidTextureDimensions { .. })));

        let config = TextureConfig::new(16, 8, WrapMode::Repeat, WrapMode::Repeat);
        assert!(matches!(
            Texture::new(2, config, &data),
            Err(PicaError::TextureDataTooSmall { unit: 2, len: 192, required: 384 })
        ));
    }
}
