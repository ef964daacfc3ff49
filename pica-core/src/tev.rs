//! Texture environment (TEV) combiner stages
//!
//! Six stages run in sequence. Each stage selects three color inputs and three alpha inputs from
//! the primary color, the texture unit outputs, its constant color, or the previous stage's
//! output, passes each input through a modifier, and combines them with one operation for color
//! and one for alpha. All arithmetic is on 8-bit channels.

use crate::rasterizer::Color;
use bincode::{Decode, Encode};
use proc_bitfield::bitfield;

pub const NUM_TEV_STAGES: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TevSource {
    PrimaryColor,
    Texture0,
    Texture1,
    Texture2,
    Constant,
    Previous,
}

impl TevSource {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0x0 => Some(Self::PrimaryColor),
            0x3 => Some(Self::Texture0),
            0x4 => Some(Self::Texture1),
            0x5 => Some(Self::Texture2),
            0xE => Some(Self::Constant),
            0xF => Some(Self::Previous),
            _ => None,
        }
    }

    pub fn to_bits(self) -> u8 {
        match self {
            Self::PrimaryColor => 0x0,
            Self::Texture0 => 0x3,
            Self::Texture1 => 0x4,
            Self::Texture2 => 0x5,
            Self::Constant => 0xE,
            Self::Previous => 0xF,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColorModifier {
    SourceColor,
    SourceAlpha,
}

impl ColorModifier {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0x0 => Some(Self::SourceColor),
            0x2 => Some(Self::SourceAlpha),
            _ => None,
        }
    }

    pub fn to_bits(self) -> u8 {
        match self {
            Self::SourceColor => 0x0,
            Self::SourceAlpha => 0x2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AlphaModifier {
    SourceAlpha,
    OneMinusSourceAlpha,
}

impl AlphaModifier {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0x0 => Some(Self::SourceAlpha),
            0x1 => Some(Self::OneMinusSourceAlpha),
            _ => None,
        }
    }

    pub fn to_bits(self) -> u8 {
        match self {
            Self::SourceAlpha => 0x0,
            Self::OneMinusSourceAlpha => 0x1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TevOperation {
    Replace,
    Modulate,
    Add,
    Lerp,
}

impl TevOperation {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0x0 => Some(Self::Replace),
            0x1 => Some(Self::Modulate),
            0x2 => Some(Self::Add),
            0x4 => Some(Self::Lerp),
            _ => None,
        }
    }

    pub fn to_bits(self) -> u8 {
        match self {
            Self::Replace => 0x0,
            Self::Modulate => 0x1,
            Self::Add => 0x2,
            Self::Lerp => 0x4,
        }
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
    pub struct TevSources(pub u32): Debug {
        pub color_source1: u8 @ 0..4,
        pub color_source2: u8 @ 4..8,
        pub color_source3: u8 @ 8..12,
        pub alpha_source1: u8 @ 16..20,
        pub alpha_source2: u8 @ 20..24,
        pub alpha_source3: u8 @ 24..28,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
    pub struct TevModifiers(pub u32): Debug {
        pub color_modifier1: u8 @ 0..4,
        pub color_modifier2: u8 @ 4..8,
        pub color_modifier3: u8 @ 8..12,
        pub alpha_modifier1: u8 @ 12..15,
        pub alpha_modifier2: u8 @ 16..19,
        pub alpha_modifier3: u8 @ 20..23,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
    pub struct TevOperations(pub u32): Debug {
        pub color_op: u8 @ 0..4,
        pub alpha_op: u8 @ 16..20,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
    pub struct TevConstant(pub u32): Debug {
        pub r: u8 @ 0..8,
        pub g: u8 @ 8..16,
        pub b: u8 @ 16..24,
        pub a: u8 @ 24..32,
    }
}

impl TevSources {
    fn color(self) -> [u8; 3] {
        [self.color_source1(), self.color_source2(), self.color_source3()]
    }

    fn alpha(self) -> [u8; 3] {
        [self.alpha_source1(), self.alpha_source2(), self.alpha_source3()]
    }
}

impl TevModifiers {
    fn color(self) -> [u8; 3] {
        [self.color_modifier1(), self.color_modifier2(), self.color_modifier3()]
    }

    fn alpha(self) -> [u8; 3] {
        [self.alpha_modifier1(), self.alpha_modifier2(), self.alpha_modifier3()]
    }
}

/// Register words for one combiner stage. The all-zero stage outputs the primary color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub struct TevStageConfig {
    pub sources: TevSources,
    pub modifiers: TevModifiers,
    pub operations: TevOperations,
    pub constant: TevConstant,
}

impl TevStageConfig {
    #[must_use]
    pub fn with_color_combiner(
        mut self,
        operation: TevOperation,
        sources: [TevSource; 3],
        modifiers: [ColorModifier; 3],
    ) -> Self {
        let [s1, s2, s3] = sources.map(TevSource::to_bits);
        let [m1, m2, m3] = modifiers.map(ColorModifier::to_bits);

        self.sources = self.sources.with_color_source1(s1).with_color_source2(s2).with_color_source3(s3);
        self.modifiers =
            self.modifiers.with_color_modifier1(m1).with_color_modifier2(m2).with_color_modifier3(m3);
        self.operations = self.operations.with_color_op(operation.to_bits());
        self
    }

    #[must_use]
    pub fn with_alpha_combiner(
        mut self,
        operation: TevOperation,
        sources: [TevSource; 3],
        modifiers: [AlphaModifier; 3],
    ) -> Self {
        let [s1, s2, s3] = sources.map(TevSource::to_bits);
        let [m1, m2, m3] = modifiers.map(AlphaModifier::to_bits);

        self.sources = self.sources.with_alpha_source1(s1).with_alpha_source2(s2).with_alpha_source3(s3);
        self.modifiers =
            self.modifiers.with_alpha_modifier1(m1).with_alpha_modifier2(m2).with_alpha_modifier3(m3);
        self.operations = self.operations.with_alpha_op(operation.to_bits());
        self
    }

    #[must_use]
    pub fn with_constant(mut self, color: Color) -> Self {
        self.constant = TevConstant(0).with_r(color.r).with_g(color.g).with_b(color.b).with_a(color.a);
        self
    }

    fn constant_color(&self) -> Color {
        Color::rgba(self.constant.r(), self.constant.g(), self.constant.b(), self.constant.a())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CombinerInputs {
    pub primary_color: Color,
    /// Black for disabled texture units
    pub texture_colors: [Color; 3],
}

/// Run every stage in order and return the last stage's output.
#[must_use]
pub fn combine(stages: &[TevStageConfig], inputs: &CombinerInputs) -> Color {
    let mut previous = Color::BLACK;

    for stage in stages {
        let sources = stage.sources.color().map(|bits| resolve_source(bits, stage, inputs, previous));
        let color_inputs: [[u8; 3]; 3] = std::array::from_fn(|i| {
            apply_color_modifier(stage.modifiers.color()[i], sources[i])
        });

        let sources = stage.sources.alpha().map(|bits| resolve_source(bits, stage, inputs, previous));
        let alpha_inputs: [u8; 3] = std::array::from_fn(|i| {
            apply_alpha_modifier(stage.modifiers.alpha()[i], sources[i])
        });

        let color_op = stage.operations.color_op();
        let [r, g, b] = std::array::from_fn(|channel| {
            combine_channel(color_op, color_inputs.map(|input| input[channel]))
        });
        let a = combine_channel(stage.operations.alpha_op(), alpha_inputs);

        previous = Color::rgba(r, g, b, a);
    }

    previous
}

fn resolve_source(bits: u8, stage: &TevStageConfig, inputs: &CombinerInputs, previous: Color) -> Color {
    match TevSource::from_bits(bits) {
        Some(TevSource::PrimaryColor) => inputs.primary_color,
        Some(TevSource::Texture0) => inputs.texture_colors[0],
        Some(TevSource::Texture1) => inputs.texture_colors[1],
        Some(TevSource::Texture2) => inputs.texture_colors[2],
        Some(TevSource::Constant) => stage.constant_color(),
        Some(TevSource::Previous) => previous,
        None => {
            log::error!("Unknown TEV color source {bits:X}");
            Color::BLACK
        }
    }
}

fn apply_color_modifier(bits: u8, color: Color) -> [u8; 3] {
    match ColorModifier::from_bits(bits) {
        // Both modeled modifiers pass the source color through unchanged
        Some(ColorModifier::SourceColor | ColorModifier::SourceAlpha) => [color.r, color.g, color.b],
        None => {
            log::error!("Unknown TEV color modifier {bits:X}");
            [0; 3]
        }
    }
}

fn apply_alpha_modifier(bits: u8, color: Color) -> u8 {
    match AlphaModifier::from_bits(bits) {
        Some(AlphaModifier::SourceAlpha) => color.a,
        Some(AlphaModifier::OneMinusSourceAlpha) => 255 - color.a,
        None => {
            log::error!("Unknown TEV alpha modifier {bits:X}");
            0
        }
    }
}

fn combine_channel(bits: u8, [a, b, c]: [u8; 3]) -> u8 {
    let (a, b, c) = (u32::from(a), u32::from(b), u32::from(c));
    match TevOperation::from_bits(bits) {
        Some(TevOperation::Replace) => a as u8,
        Some(TevOperation::Modulate) => (a * b / 255) as u8,
        Some(TevOperation::Add) => (a + b).min(255) as u8,
        Some(TevOperation::Lerp) => ((a * c + b * (255 - c)) / 255) as u8,
        None => {
            log::error!("Unknown TEV combiner operation {bits:X}");
            0
        }
    }
}
