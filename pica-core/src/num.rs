pub trait U32Ext {
    fn bit(self, i: u8) -> bool;

    fn bits(self, lsb: u8, len: u8) -> u32;
}

impl U32Ext for u32 {
    fn bit(self, i: u8) -> bool {
        self & (1 << i) != 0
    }

    fn bits(self, lsb: u8, len: u8) -> u32 {
        (self >> lsb) & ((1 << len) - 1)
    }
}

pub trait U64Ext {
    fn nibble(self, i: usize) -> u8;
}

impl U64Ext for u64 {
    fn nibble(self, i: usize) -> u8 {
        ((self >> (4 * i)) & 0xF) as u8
    }
}
