//! Debugger callbacks
//!
//! All callbacks have empty default implementations, and `()` implements the trait as a hook that
//! ignores everything.

use crate::shader::{Instruction, OutputAttributeMap, NUM_OUTPUT_REGISTERS};
use std::fmt::Write;

pub trait DebugHook {
    /// Called before each shader instruction executes.
    fn instruction_executed(&mut self, _pc: u32, _instruction: Instruction) {}

    /// Called after a vertex shader run completes.
    fn shader_executed(&mut self, _dump: &ShaderDump<'_>) {}

    /// Called after a batch of primitives has been rasterized.
    fn command_list_processed(&mut self, _triangles: usize) {}
}

impl DebugHook for () {}

/// Borrowed view of the shader state touched by a run: program words up to the highest executed
/// address and operand descriptors up to the highest one referenced.
#[derive(Debug, Clone, Copy)]
pub struct ShaderDump<'a> {
    pub program: &'a [u32],
    pub swizzle_data: &'a [u32],
    pub main_offset: u32,
    pub output_maps: &'a [OutputAttributeMap; NUM_OUTPUT_REGISTERS],
}

impl ShaderDump<'_> {
    /// Render the used portion of the program as a disassembly listing.
    #[must_use]
    pub fn listing(&self) -> String {
        let mut listing = String::new();

        let _ = writeln!(listing, "; main offset {:03X}", self.main_offset);
        for (register, map) in self.output_maps.iter().enumerate() {
            let _ = writeln!(listing, "; o{register} -> {:?}", map.semantics());
        }

        for (address, &word) in self.program.iter().enumerate() {
            let _ = writeln!(
                listing,
                "{address:03X}: {word:08X}  {}",
                crate::shader::disassemble::instruction_str(Instruction(word), self.swizzle_data)
            );
        }

        listing
    }
}
