//! Shader instruction words, swizzle patterns, and register operands

use proc_bitfield::bitfield;
use std::fmt::{Display, Formatter};

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct Instruction(pub u32): Debug {
        pub opcode: u8 @ 26..32,
        // Arithmetic format
        pub operand_desc_id: u8 @ 0..7,
        pub src2: u8 @ 7..12,
        pub src1: u8 @ 12..19,
        pub address_register_index: u8 @ 19..21,
        pub dest: u8 @ 21..26,
        // Arithmetic format with inverted operands; src1 is the narrow one
        pub src2_inverted: u8 @ 7..14,
        pub src1_inverted: u8 @ 14..19,
        // Flow control format
        pub num_instructions: u8 @ 0..8,
        pub dest_offset: u16 @ 10..22,
    }
}

impl Instruction {
    pub fn source1(self, inverted: bool) -> SourceRegister {
        if inverted {
            SourceRegister::from_raw(self.src1_inverted())
        } else {
            SourceRegister::from_raw(self.src1())
        }
    }

    pub fn source2(self, inverted: bool) -> SourceRegister {
        if inverted {
            SourceRegister::from_raw(self.src2_inverted())
        } else {
            SourceRegister::from_raw(self.src2())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Add,
    Dp3,
    Dp4,
    Dph,
    Dst,
    Ex2,
    Lg2,
    Litp,
    Mul,
    Sge,
    Slt,
    Flr,
    Max,
    Min,
    Rcp,
    Rsq,
    Mova,
    Mov,
    Dphi,
    Dsti,
    Sgei,
    Slti,
    Break,
    Nop,
    End,
    Breakc,
    Call,
    Callc,
    Callu,
    Ifu,
    Ifc,
    Loop,
    Emit,
    SetEmit,
    Jmpc,
    Jmpu,
    Cmp,
    Madi,
    Mad,
    Unknown(u8),
}

impl OpCode {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x3F {
            0x00 => Self::Add,
            0x01 => Self::Dp3,
            0x02 => Self::Dp4,
            0x03 => Self::Dph,
            0x04 => Self::Dst,
            0x05 => Self::Ex2,
            0x06 => Self::Lg2,
            0x07 => Self::Litp,
            0x08 => Self::Mul,
            0x09 => Self::Sge,
            0x0A => Self::Slt,
            0x0B => Self::Flr,
            0x0C => Self::Max,
            0x0D => Self::Min,
            0x0E => Self::Rcp,
            0x0F => Self::Rsq,
            0x12 => Self::Mova,
            0x13 => Self::Mov,
            0x18 => Self::Dphi,
            0x19 => Self::Dsti,
            0x1A => Self::Sgei,
            0x1B => Self::Slti,
            0x20 => Self::Break,
            0x21 => Self::Nop,
            0x22 => Self::End,
            0x23 => Self::Breakc,
            0x24 => Self::Call,
            0x25 => Self::Callc,
            0x26 => Self::Callu,
            0x27 => Self::Ifu,
            0x28 => Self::Ifc,
            0x29 => Self::Loop,
            0x2A => Self::Emit,
            0x2B => Self::SetEmit,
            0x2C => Self::Jmpc,
            0x2D => Self::Jmpu,
            0x2E..=0x2F => Self::Cmp,
            0x30..=0x37 => Self::Madi,
            0x38..=0x3F => Self::Mad,
            other => Self::Unknown(other),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Dp3 => "DP3",
            Self::Dp4 => "DP4",
            Self::Dph => "DPH",
            Self::Dst => "DST",
            Self::Ex2 => "EX2",
            Self::Lg2 => "LG2",
            Self::Litp => "LITP",
            Self::Mul => "MUL",
            Self::Sge => "SGE",
            Self::Slt => "SLT",
            Self::Flr => "FLR",
            Self::Max => "MAX",
            Self::Min => "MIN",
            Self::Rcp => "RCP",
            Self::Rsq => "RSQ",
            Self::Mova => "MOVA",
            Self::Mov => "MOV",
            Self::Dphi => "DPHI",
            Self::Dsti => "DSTI",
            Self::Sgei => "SGEI",
            Self::Slti => "SLTI",
            Self::Break => "BREAK",
            Self::Nop => "NOP",
            Self::End => "END",
            Self::Breakc => "BREAKC",
            Self::Call => "CALL",
            Self::Callc => "CALLC",
            Self::Callu => "CALLU",
            Self::Ifu => "IFU",
            Self::Ifc => "IFC",
            Self::Loop => "LOOP",
            Self::Emit => "EMIT",
            Self::SetEmit => "SETEMIT",
            Self::Jmpc => "JMPC",
            Self::Jmpu => "JMPU",
            Self::Cmp => "CMP",
            Self::Madi => "MADI",
            Self::Mad => "MAD",
            Self::Unknown(_) => "???",
        }
    }

    // The "I" variants encode a 5-bit src1 and a 7-bit src2, so only src2 can name a uniform
    pub fn is_src_inverted(self) -> bool {
        matches!(self, Self::Dphi | Self::Dsti | Self::Sgei | Self::Slti)
    }
}

const LANE_NAMES: [char; 4] = ['x', 'y', 'z', 'w'];

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct SwizzlePattern(pub u32): Debug {
        pub dest_mask: u8 @ 0..4,
        pub negate_src1: bool @ 4,
        pub src1_selector: u8 @ 5..13,
        pub negate_src2: bool @ 13,
        pub src2_selector: u8 @ 14..22,
        pub negate_src3: bool @ 22,
        pub src3_selector: u8 @ 23..31,
    }
}

impl SwizzlePattern {
    // Selectors are stored with lane 0 (x) in the highest 2 bits
    fn select(selector: u8, lane: usize) -> usize {
        usize::from((selector >> (6 - 2 * lane)) & 3)
    }

    pub fn src1_lane(self, lane: usize) -> usize {
        Self::select(self.src1_selector(), lane)
    }

    pub fn src2_lane(self, lane: usize) -> usize {
        Self::select(self.src2_selector(), lane)
    }

    // The write mask likewise has x in bit 3 and w in bit 0
    pub fn dest_lane_enabled(self, lane: usize) -> bool {
        self.dest_mask() & (0x8 >> lane) != 0
    }

    pub fn dest_mask_str(self) -> String {
        (0..4).filter(|&lane| self.dest_lane_enabled(lane)).map(|lane| LANE_NAMES[lane]).collect()
    }

    pub fn src1_str(self) -> String {
        (0..4).map(|lane| LANE_NAMES[self.src1_lane(lane)]).collect()
    }

    pub fn src2_str(self) -> String {
        (0..4).map(|lane| LANE_NAMES[self.src2_lane(lane)]).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRegister {
    Input(usize),
    Temporary(usize),
    FloatUniform(usize),
}

impl SourceRegister {
    pub fn from_raw(raw: u8) -> Self {
        match raw & 0x7F {
            raw @ 0x00..=0x0F => Self::Input(raw.into()),
            raw @ 0x10..=0x1F => Self::Temporary((raw - 0x10).into()),
            raw => Self::FloatUniform((raw - 0x20).into()),
        }
    }
}

impl Display for SourceRegister {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input(index) => write!(f, "v{index}"),
            Self::Temporary(index) => write!(f, "r{index}"),
            Self::FloatUniform(index) => write!(f, "c{index}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestRegister {
    Output(usize),
    Temporary(usize),
}

impl DestRegister {
    pub const NUM_OUTPUT_REGISTERS: usize = 7;

    /// Returns `None` for encodings that do not name an output or temporary register.
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw & 0x1F {
            raw @ 0x00..=0x06 => Some(Self::Output(raw.into())),
            raw @ 0x10..=0x1F => Some(Self::Temporary((raw - 0x10).into())),
            _ => None,
        }
    }
}

impl Display for DestRegister {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Output(index) => write!(f, "o{index}"),
            Self::Temporary(index) => write!(f, "r{index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_arithmetic_fields() {
        // MOV r3, c5 with operand descriptor 9
        let instruction = Instruction((0x13 << 26) | (0x13 << 21) | (0x25 << 12) | 9);

        assert_eq!(OpCode::from_bits(instruction.opcode()), OpCode::Mov);
        assert_eq!(DestRegister::from_raw(instruction.dest()), Some(DestRegister::Temporary(3)));
        assert_eq!(instruction.source1(false), SourceRegister::FloatUniform(5));
        assert_eq!(instruction.operand_desc_id(), 9);
    }

    #[test]
    fn decode_inverted_sources() {
        // src1i = r2, src2i = c1
        let instruction = Instruction((0x18 << 26) | (0x12 << 14) | (0x21 << 7));
        let opcode = OpCode::from_bits(instruction.opcode());

        assert!(opcode.is_src_inverted());
        assert_eq!(instruction.source1(true), SourceRegister::Temporary(2));
        assert_eq!(instruction.source2(true), SourceRegister::FloatUniform(1));
    }

    #[test]
    fn decode_flow_control_fields() {
        let instruction = Instruction((0x24 << 26) | (0x123 << 10) | 2);

        assert_eq!(OpCode::from_bits(instruction.opcode()), OpCode::Call);
        assert_eq!(instruction.dest_offset(), 0x123);
        assert_eq!(instruction.num_instructions(), 2);
    }

    #[test]
    fn invalid_destinations() {
        assert_eq!(DestRegister::from_raw(0x06), Some(DestRegister::Output(6)));
        assert_eq!(DestRegister::from_raw(0x07), None);
        assert_eq!(DestRegister::from_raw(0x0F), None);
        assert_eq!(DestRegister::from_raw(0x1F), Some(DestRegister::Temporary(15)));
    }

    #[test]
    fn swizzle_selectors() {
        // dest .xz, src1 .wzyx negated, src2 .xxxx
        let swizzle = SwizzlePattern(0b1010 | (1 << 4) | (0b1110_0100 << 5));

        assert!(swizzle.dest_lane_enabled(0));
        assert!(!swizzle.dest_lane_enabled(1));
        assert!(swizzle.dest_lane_enabled(2));
        assert!(!swizzle.dest_lane_enabled(3));
        assert!(swizzle.negate_src1());
        assert_eq!([0, 1, 2, 3].map(|lane| swizzle.src1_lane(lane)), [3, 2, 1, 0]);
        assert_eq!([0, 1, 2, 3].map(|lane| swizzle.src2_lane(lane)), [0, 0, 0, 0]);
        assert_eq!(swizzle.dest_mask_str(), "xz");
        assert_eq!(swizzle.src1_str(), "wzyx");
    }
}
