//! Memory fill unit

use crate::api::{PicaError, PicaResult};
use bincode::{Decode, Encode};

/// Fill `start_address..end_address` with a repeated 32-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub struct MemoryFillConfig {
    pub start_address: u32,
    pub end_address: u32,
    pub value: u32,
}

impl MemoryFillConfig {
    /// Run the fill against `memory`, a region that begins at physical address `base_address`.
    ///
    /// Words are written in big-endian byte order. A trailing partial word is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the fill range is reversed or extends outside of `memory`.
    pub fn apply(&self, memory: &mut [u8], base_address: u32) -> PicaResult<()> {
        let out_of_range = PicaError::FillOutOfRange {
            start: self.start_address,
            end: self.end_address,
            base: base_address,
            len: memory.len(),
        };

        if self.end_address < self.start_address || self.start_address < base_address {
            return Err(out_of_range);
        }

        let start = (self.start_address - base_address) as usize;
        let end = (self.end_address - base_address) as usize;
        let Some(region) = memory.get_mut(start..end) else {
            return Err(out_of_range);
        };

        for word in region.chunks_exact_mut(4) {
            word.copy_from_slice(&self.value.to_be_bytes());
        }

        log::debug!(
            "Memory fill {:08X}-{:08X} with {:08X}",
            self.start_address,
            self.end_address,
            self.value
        );

        Ok(())
    }
}
