//! Vertex shader setup, input/output vertex layouts, and the entry point for running a shader

pub mod disassemble;
pub mod instruction;
mod interpreter;

use crate::api::{PicaError, PicaResult};
use crate::debug::{DebugHook, ShaderDump};
use crate::float24::{Float24, Vec2, Vec3, Vec4};
use crate::num::U64Ext;
use bincode::{Decode, Encode};
use bytemuck::{Pod, Zeroable};
use interpreter::VertexShaderState;
use proc_bitfield::bitfield;

pub use instruction::{DestRegister, Instruction, OpCode, SourceRegister, SwizzlePattern};
pub use interpreter::DebugCounters;

pub const PROGRAM_MEMORY_LEN: usize = 1024;
pub const SWIZZLE_DATA_LEN: usize = 1024;
pub const NUM_FLOAT_UNIFORMS: usize = 96;
pub const MAX_ATTRIBUTES: usize = 16;
pub const NUM_OUTPUT_REGISTERS: usize = DestRegister::NUM_OUTPUT_REGISTERS;

/// Output vertex slot indices. Each output register lane is routed to one of these.
pub struct OutputSemantic;

impl OutputSemantic {
    pub const POSITION_X: usize = 0;
    pub const POSITION_Y: usize = 1;
    pub const POSITION_Z: usize = 2;
    pub const POSITION_W: usize = 3;
    pub const QUATERNION_X: usize = 4;
    pub const QUATERNION_Y: usize = 5;
    pub const QUATERNION_Z: usize = 6;
    pub const QUATERNION_W: usize = 7;
    pub const COLOR_R: usize = 8;
    pub const COLOR_G: usize = 9;
    pub const COLOR_B: usize = 10;
    pub const COLOR_A: usize = 11;
    pub const TEXCOORD0_U: usize = 12;
    pub const TEXCOORD0_V: usize = 13;
    pub const TEXCOORD1_U: usize = 14;
    pub const TEXCOORD1_V: usize = 15;
    pub const TEXCOORD2_U: usize = 22;
    pub const TEXCOORD2_V: usize = 23;
    // Padding slot; writes routed here are discarded by the rasterizer
    pub const INVALID: usize = 31;
}

bitfield! {
    /// Routes the four lanes of one shader output register to output vertex slots.
    #[derive(Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
    pub struct OutputAttributeMap(pub u32): Debug {
        pub map_x: u8 @ 0..5,
        pub map_y: u8 @ 8..13,
        pub map_z: u8 @ 16..21,
        pub map_w: u8 @ 24..29,
    }
}

impl OutputAttributeMap {
    #[must_use]
    pub fn from_semantics(semantics: [usize; 4]) -> Self {
        let [x, y, z, w] = semantics.map(|semantic| (semantic & 0x1F) as u32);
        Self(x | (y << 8) | (z << 16) | (w << 24))
    }

    #[must_use]
    pub fn semantics(self) -> [usize; 4] {
        [self.map_x(), self.map_y(), self.map_z(), self.map_w()].map(usize::from)
    }
}

/// Input register index for each vertex attribute, one nibble per attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub struct InputRegisterMap(pub u64);

impl InputRegisterMap {
    #[must_use]
    pub fn identity() -> Self {
        Self(0xFEDC_BA98_7654_3210)
    }

    #[must_use]
    pub fn register_for_attribute(self, attribute: usize) -> usize {
        self.0.nibble(attribute).into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputVertex {
    pub attributes: [Vec4; MAX_ATTRIBUTES],
}

/// Shaded vertex. Field order matches the output semantic slot numbering.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct OutputVertex {
    pub pos: Vec4,
    pub quat: Vec4,
    pub color: Vec4,
    pub tc0: Vec2,
    pub tc1: Vec2,
    _pad0: [Float24; 6],
    pub tc2: Vec2,
    _pad1: [Float24; 4],
    // Written by the viewport transform, not by shaders
    pub screenpos: Vec3,
    _pad2: Float24,
}

impl OutputVertex {
    pub const NUM_SLOTS: usize = 32;

    #[must_use]
    pub fn slots(&self) -> &[Float24; Self::NUM_SLOTS] {
        bytemuck::cast_ref(self)
    }

    pub fn slots_mut(&mut self) -> &mut [Float24; Self::NUM_SLOTS] {
        bytemuck::cast_mut(self)
    }
}

/// Shader program memory, operand descriptors, uniforms, and I/O routing.
#[derive(Debug, Clone, Encode, Decode)]
pub struct ShaderSetup {
    program: Box<[u32; PROGRAM_MEMORY_LEN]>,
    swizzle_data: Box<[u32; SWIZZLE_DATA_LEN]>,
    uniforms: Box<[Vec4; NUM_FLOAT_UNIFORMS]>,
    main_offset: u32,
    input_register_map: InputRegisterMap,
    output_maps: [OutputAttributeMap; NUM_OUTPUT_REGISTERS],
}

impl ShaderSetup {
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: Box::new([0; PROGRAM_MEMORY_LEN]),
            swizzle_data: Box::new([0; SWIZZLE_DATA_LEN]),
            uniforms: Box::new([[Float24::ZERO; 4]; NUM_FLOAT_UNIFORMS]),
            main_offset: 0,
            input_register_map: InputRegisterMap::identity(),
            output_maps: [OutputAttributeMap(0x1F1F_1F1F); NUM_OUTPUT_REGISTERS],
        }
    }

    /// Write one word of shader program memory.
    ///
    /// # Errors
    ///
    /// Returns an error if `address` is outside of program memory.
    pub fn submit_shader_instruction(&mut self, address: u32, word: u32) -> PicaResult<()> {
        let slot = self
            .program
            .get_mut(address as usize)
            .ok_or(PicaError::ProgramAddressOutOfRange { address })?;
        *slot = word;

        log::trace!("Shader program word {address:03X} = {word:08X}");

        Ok(())
    }

    /// Write one operand descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if `address` is outside of operand descriptor memory.
    pub fn submit_swizzle_pattern(&mut self, address: u32, word: u32) -> PicaResult<()> {
        let slot = self
            .swizzle_data
            .get_mut(address as usize)
            .ok_or(PicaError::SwizzleAddressOutOfRange { address })?;
        *slot = word;

        log::trace!("Operand descriptor {address:03X} = {word:08X}");

        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if `index` is not a valid float uniform index.
    pub fn uniform_mut(&mut self, index: usize) -> PicaResult<&mut Vec4> {
        self.uniforms.get_mut(index).ok_or(PicaError::UniformIndexOutOfRange { index })
    }

    /// Write a float uniform from four packed 24-bit values in x, y, z, w order.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is not a valid float uniform index.
    pub fn set_uniform_raw(&mut self, index: usize, raw: [u32; 4]) -> PicaResult<()> {
        *self.uniform_mut(index)? = raw.map(Float24::from_raw);
        Ok(())
    }

    #[must_use]
    pub fn uniforms(&self) -> &[Vec4; NUM_FLOAT_UNIFORMS] {
        &self.uniforms
    }

    #[must_use]
    pub fn program(&self) -> &[u32; PROGRAM_MEMORY_LEN] {
        &self.program
    }

    #[must_use]
    pub fn swizzle_data(&self) -> &[u32; SWIZZLE_DATA_LEN] {
        &self.swizzle_data
    }

    #[must_use]
    pub fn main_offset(&self) -> u32 {
        self.main_offset
    }

    pub fn set_main_offset(&mut self, main_offset: u32) {
        self.main_offset = main_offset;
    }

    #[must_use]
    pub fn input_register_map(&self) -> InputRegisterMap {
        self.input_register_map
    }

    pub fn set_input_register_map(&mut self, map: InputRegisterMap) {
        self.input_register_map = map;
    }

    #[must_use]
    pub fn output_maps(&self) -> &[OutputAttributeMap; NUM_OUTPUT_REGISTERS] {
        &self.output_maps
    }

    /// # Errors
    ///
    /// Returns an error if `register` is not a valid output register.
    pub fn set_output_map(&mut self, register: usize, map: OutputAttributeMap) -> PicaResult<()> {
        *self
            .output_maps
            .get_mut(register)
            .ok_or(PicaError::OutputRegisterOutOfRange { register })? = map;
        Ok(())
    }

    /// View of the program and operand descriptors up to the extents recorded in `counters`.
    #[must_use]
    pub fn dump(&self, counters: DebugCounters) -> ShaderDump<'_> {
        let program_len = (counters.max_offset as usize).min(PROGRAM_MEMORY_LEN);
        let swizzle_len = (counters.max_opdesc_id as usize).min(SWIZZLE_DATA_LEN);
        ShaderDump {
            program: &self.program[..program_len],
            swizzle_data: &self.swizzle_data[..swizzle_len],
            main_offset: self.main_offset,
            output_maps: &self.output_maps,
        }
    }

    /// Run the vertex shader on a single vertex, starting at the main offset.
    ///
    /// Only the first `num_attributes` attributes of `input` are loaded into input registers; the
    /// rest read as zero.
    ///
    /// # Errors
    ///
    /// Returns an error if `num_attributes` is greater than the number of vertex attributes.
    ///
    /// # Panics
    ///
    /// Panics if the program is malformed: the program counter leaves program memory, calls nest
    /// deeper than the call stack, or an instruction writes to an invalid destination register.
    pub fn run<H: DebugHook + ?Sized>(
        &self,
        input: &InputVertex,
        num_attributes: usize,
        debug_hook: &mut H,
    ) -> PicaResult<(OutputVertex, DebugCounters)> {
        if num_attributes > MAX_ATTRIBUTES {
            return Err(PicaError::TooManyAttributes { num_attributes });
        }

        let mut state = VertexShaderState::new(self, input, num_attributes);
        let mut output = OutputVertex::default();
        state.run(self, &mut output, debug_hook);

        debug_hook.shader_executed(&self.dump(state.debug));

        log::trace!(
            "Output vertex: pos ({:.2}, {:.2}, {:.2}, {:.2}), color ({:.2}, {:.2}, {:.2}, {:.2}), tc0 ({:.2}, {:.2})",
            output.pos[0].to_f32(),
            output.pos[1].to_f32(),
            output.pos[2].to_f32(),
            output.pos[3].to_f32(),
            output.color[0].to_f32(),
            output.color[1].to_f32(),
            output.color[2].to_f32(),
            output.color[3].to_f32(),
            output.tc0[0].to_f32(),
            output.tc0[1].to_f32(),
        );

        Ok((output, state.debug))
    }
}

impl Default for ShaderSetup {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::float24::vec4;

    #[test]
    fn output_vertex_slots_alias_fields() {
        let mut vertex = OutputVertex::default();
        vertex.slots_mut()[OutputSemantic::POSITION_W] = Float24::ONE;
        vertex.slots_mut()[OutputSemantic::COLOR_G] = Float24::from_f32(0.5);
        vertex.slots_mut()[OutputSemantic::TEXCOORD2_V] = Float24::from_f32(0.25);
        vertex.screenpos[2] = Float24::from_f32(0.75);

        assert_eq!(vertex.pos[3], Float24::ONE);
        assert_eq!(vertex.color[1].to_f32(), 0.5);
        assert_eq!(vertex.tc2[1].to_f32(), 0.25);
        assert_eq!(vertex.slots()[30].to_f32(), 0.75);
    }

    #[test]
    fn output_attribute_map_fields() {
        let map = OutputAttributeMap(0x0B0A_0908);
        assert_eq!(map.semantics(), [8, 9, 10, 11]);

        let map = OutputAttributeMap::from_semantics([
            OutputSemantic::TEXCOORD0_U,
            OutputSemantic::TEXCOORD0_V,
            OutputSemantic::INVALID,
            OutputSemantic::INVALID,
        ]);
        assert_eq!(map.0, 0x1F1F_0D0C);
    }

    #[test]
    fn input_register_map_nibbles() {
        let map = InputRegisterMap(0x0000_0000_0000_0F21);
        assert_eq!(map.register_for_attribute(0), 1);
        assert_eq!(map.register_for_attribute(1), 2);
        assert_eq!(map.register_for_attribute(2), 15);
        assert_eq!(InputRegisterMap::identity().register_for_attribute(11), 11);
    }

    #[test]
    fn submit_out_of_range() {
        let mut setup = ShaderSetup::new();
        assert!(setup.submit_shader_instruction(1023, 0x8800_0000).is_ok());
        assert!(matches!(
            setup.submit_shader_instruction(1024, 0),
            Err(PicaError::ProgramAddressOutOfRange { address: 1024 })
        ));
        assert!(matches!(
            setup.submit_swizzle_pattern(4096, 0),
            Err(PicaError::SwizzleAddressOutOfRange { address: 4096 })
        ));
        assert!(matches!(
            setup.uniform_mut(96),
            Err(PicaError::UniformIndexOutOfRange { index: 96 })
        ));
    }

    #[test]
    fn output_map_register_out_of_range() {
        let mut setup = ShaderSetup::new();
        let map = OutputAttributeMap(0x0302_0100);
        setup.set_output_map(NUM_OUTPUT_REGISTERS - 1, map).unwrap();
        assert_eq!(setup.output_maps()[NUM_OUTPUT_REGISTERS - 1], map);

        let result = setup.set_output_map(NUM_OUTPUT_REGISTERS, map);
        assert!(matches!(
            result,
            Err(PicaError::OutputRegisterOutOfRange { register }) if register == NUM_OUTPUT_REGISTERS
        ));
    }

    #[test]
    fn raw_uniform_upload() {
        let mut setup = ShaderSetup::new();
        setup.set_uniform_raw(95, [0x3F0000, 0xBF0000, 0x408000, 0]).unwrap();
        assert_eq!(setup.uniforms()[95], vec4(1.0, -1.0, 3.0, 0.0));
    }

    #[test]
    fn too_many_attributes() {
        let setup = ShaderSetup::new();
        let result = setup.run(&InputVertex::default(), 17, &mut ());
        assert!(matches!(result, Err(PicaError::TooManyAttributes { num_attributes: 17 })));
    }
}
