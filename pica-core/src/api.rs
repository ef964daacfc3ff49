use crate::debug::DebugHook;
use crate::fill::MemoryFillConfig;
use crate::interrupts::{InterruptRegisters, InterruptType};
use crate::memory::Framebuffer;
use crate::primitive::{self, Topology};
use crate::rasterizer::{self, PixelPipeline};
use crate::shader::{DebugCounters, InputVertex, OutputVertex, ShaderSetup};
use crate::tev::{TevStageConfig, NUM_TEV_STAGES};
use crate::texture::{Texture, TextureConfig, NUM_TEXTURE_UNITS};
use crate::timing::{DisplayTimer, TimingConfig};
use crate::viewport::Viewport;
use bincode::error::{DecodeError, EncodeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PicaError {
    #[error("Shader program address out of range: {address:#X}")]
    ProgramAddressOutOfRange { address: u32 },
    #[error("Operand descriptor address out of range: {address:#X}")]
    SwizzleAddressOutOfRange { address: u32 },
    #[error("Float uniform index out of range: {index}")]
    UniformIndexOutOfRange { index: usize },
    #[error("Shader output register out of range: {register}")]
    OutputRegisterOutOfRange { register: usize },
    #[error("Texture unit out of range: {unit}")]
    TextureUnitOutOfRange { unit: usize },
    #[error("TEV stage out of range: {stage}")]
    TevStageOutOfRange { stage: usize },
    #[error("Too many vertex attributes; at most 16 are supported, got {num_attributes}")]
    TooManyAttributes { num_attributes: usize },
    #[error("Color buffer is too small; {required} bytes required, was {len}")]
    ColorBufferTooSmall { len: usize, required: usize },
    #[error("Depth buffer is too small; {required} bytes required, was {len}")]
    DepthBufferTooSmall { len: usize, required: usize },
    #[error("Framebuffer stride {stride} is smaller than its width {width}")]
    InvalidStride { width: u32, stride: u32 },
    #[error("Texture unit {unit} data is too small; {required} bytes required, was {len}")]
    TextureDataTooSmall { unit: usize, len: usize, required: usize },
    #[error("Texture unit {unit} has invalid dimensions {width}x{height}; both must be non-zero multiples of 8")]
    InvalidTextureDimensions { unit: usize, width: u32, height: u32 },
    #[error("Memory fill {start:#010X}-{end:#010X} is outside of the {len}-byte region at {base:#010X}")]
    FillOutOfRange { start: u32, end: u32, base: u32, len: usize },
    #[error("Error encoding shader state: {source}")]
    StateEncode {
        #[from]
        source: EncodeError,
    },
    #[error("Error decoding shader state: {source}")]
    StateDecode {
        #[from]
        source: DecodeError,
    },
}

pub type PicaResult<T> = Result<T, PicaError>;

/// Bound to the data of each texture unit for a draw. Disabled units may pass an empty slice.
pub type TextureData<'a> = [&'a [u8]; NUM_TEXTURE_UNITS];

/// GPU state and entry points for submitting shader data and drawing.
pub struct PicaCore {
    shader: ShaderSetup,
    viewport: Viewport,
    textures: [TextureConfig; NUM_TEXTURE_UNITS],
    tev_stages: [TevStageConfig; NUM_TEV_STAGES],
    interrupts: InterruptRegisters,
    display_timer: DisplayTimer,
    last_debug_counters: DebugCounters,
    debug_hook: Box<dyn DebugHook>,
}

impl PicaCore {
    #[must_use]
    pub fn new(framebuffer_width: u32, framebuffer_height: u32, timing: TimingConfig) -> Self {
        Self {
            shader: ShaderSetup::new(),
            viewport: Viewport::new(framebuffer_width, framebuffer_height),
            textures: [TextureConfig::default(); NUM_TEXTURE_UNITS],
            tev_stages: [TevStageConfig::default(); NUM_TEV_STAGES],
            interrupts: InterruptRegisters::new(),
            display_timer: DisplayTimer::new(timing),
            last_debug_counters: DebugCounters::default(),
            debug_hook: Box::new(()),
        }
    }

    /// # Errors
    ///
    /// Returns an error if `address` is outside of shader program memory.
    pub fn submit_shader_instruction(&mut self, address: u32, word: u32) -> PicaResult<()> {
        self.shader.submit_shader_instruction(address, word)
    }

    /// # Errors
    ///
    /// Returns an error if `address` is outside of operand descriptor memory.
    pub fn submit_swizzle_pattern(&mut self, address: u32, word: u32) -> PicaResult<()> {
        self.shader.submit_swizzle_pattern(address, word)
    }

    #[must_use]
    pub fn shader(&self) -> &ShaderSetup {
        &self.shader
    }

    pub fn shader_mut(&mut self) -> &mut ShaderSetup {
        &mut self.shader
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// # Errors
    ///
    /// Returns an error if `unit` is not a valid texture unit.
    pub fn set_texture_config(&mut self, unit: usize, config: TextureConfig) -> PicaResult<()> {
        *self.textures.get_mut(unit).ok_or(PicaError::TextureUnitOutOfRange { unit })? = config;

        log::debug!("Texture unit {unit} config: {config:?}");

        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if `stage` is not a valid TEV stage.
    pub fn set_tev_stage(&mut self, stage: usize, config: TevStageConfig) -> PicaResult<()> {
        *self.tev_stages.get_mut(stage).ok_or(PicaError::TevStageOutOfRange { stage })? = config;

        log::debug!("TEV stage {stage} config: {config:?}");

        Ok(())
    }

    pub fn set_debug_hook(&mut self, debug_hook: Box<dyn DebugHook>) {
        self.debug_hook = debug_hook;
    }

    #[must_use]
    pub fn interrupts(&self) -> &InterruptRegisters {
        &self.interrupts
    }

    pub fn interrupts_mut(&mut self) -> &mut InterruptRegisters {
        &mut self.interrupts
    }

    /// Program extents observed during the most recent shader run.
    #[must_use]
    pub fn last_debug_counters(&self) -> DebugCounters {
        self.last_debug_counters
    }

    /// Run the vertex shader on one vertex.
    ///
    /// # Errors
    ///
    /// Returns an error if `num_attributes` is greater than the number of vertex attributes.
    pub fn run_vertex_shader(
        &mut self,
        input: &InputVertex,
        num_attributes: usize,
    ) -> PicaResult<OutputVertex> {
        let (output, counters) = self.shader.run(input, num_attributes, self.debug_hook.as_mut())?;
        self.last_debug_counters = counters;
        Ok(output)
    }

    /// Rasterize one triangle of shaded vertices whose screen positions are already filled in.
    ///
    /// # Errors
    ///
    /// Returns an error if an enabled texture unit's configuration or data is invalid.
    pub fn process_triangle(
        &mut self,
        vertices: [&OutputVertex; 3],
        framebuffer: &mut Framebuffer<'_>,
        texture_data: TextureData<'_>,
    ) -> PicaResult<u32> {
        let textures = bind_textures(&self.textures, texture_data)?;
        let pipeline = PixelPipeline { textures: &textures, tev_stages: &self.tev_stages };
        Ok(rasterizer::process_triangle(vertices, &pipeline, framebuffer))
    }

    /// Shade every vertex, assemble primitives, and rasterize them. Raises the command list
    /// completion interrupt when done.
    ///
    /// Returns the number of triangles drawn.
    ///
    /// # Errors
    ///
    /// Returns an error if `num_attributes` is too large or if an enabled texture unit's
    /// configuration or data is invalid.
    pub fn draw(
        &mut self,
        inputs: &[InputVertex],
        num_attributes: usize,
        topology: Topology,
        framebuffer: &mut Framebuffer<'_>,
        texture_data: TextureData<'_>,
    ) -> PicaResult<usize> {
        let textures = bind_textures(&self.textures, texture_data)?;

        let mut vertices = Vec::with_capacity(inputs.len());
        for input in inputs {
            let mut vertex = self.run_vertex_shader(input, num_attributes)?;
            self.viewport.transform(&mut vertex);
            vertices.push(vertex);
        }

        let triangles = primitive::assemble_triangles(topology, vertices.len());
        let pipeline = PixelPipeline { textures: &textures, tev_stages: &self.tev_stages };

        let mut pixels = 0;
        for &[i0, i1, i2] in &triangles {
            pixels += rasterizer::process_triangle(
                [&vertices[i0], &vertices[i1], &vertices[i2]],
                &pipeline,
                framebuffer,
            );
        }

        log::debug!(
            "Drew {} vertices as {} {topology:?} triangles, {pixels} pixels written",
            vertices.len(),
            triangles.len()
        );

        self.debug_hook.command_list_processed(triangles.len());
        self.interrupts.raise(InterruptType::P3d);

        Ok(triangles.len())
    }

    /// # Errors
    ///
    /// Returns an error if the fill range does not lie within `memory`.
    pub fn memory_fill(
        &mut self,
        config: &MemoryFillConfig,
        memory: &mut [u8],
        base_address: u32,
    ) -> PicaResult<()> {
        config.apply(memory, base_address)?;
        self.interrupts.raise(InterruptType::Psc0);
        Ok(())
    }

    /// Advance display timing to `current_ticks`. Returns true when a frame completes.
    pub fn tick(&mut self, current_ticks: u64) -> bool {
        self.display_timer.tick(current_ticks, &mut self.interrupts)
    }

    #[must_use]
    pub fn display_timer(&self) -> &DisplayTimer {
        &self.display_timer
    }

    /// Serialize the shader setup (program, operand descriptors, uniforms, and I/O routing).
    ///
    /// # Errors
    ///
    /// Propagates any error from the encoder.
    pub fn save_shader_state(&self) -> PicaResult<Vec<u8>> {
        let bytes = bincode::encode_to_vec(&self.shader, bincode::config::standard())?;
        Ok(bytes)
    }

    /// # Errors
    ///
    /// Returns an error if `bytes` does not decode to a shader setup.
    pub fn load_shader_state(&mut self, bytes: &[u8]) -> PicaResult<()> {
        let (shader, _) = bincode::decode_from_slice(bytes, bincode::config::standard())?;
        self.shader = shader;
        Ok(())
    }
}

fn bind_textures<'a>(
    configs: &[TextureConfig; NUM_TEXTURE_UNITS],
    data: TextureData<'a>,
) -> PicaResult<[Option<Texture<'a>>; NUM_TEXTURE_UNITS]> {
    let mut textures = [None; NUM_TEXTURE_UNITS];
    for (unit, (config, data)) in configs.iter().zip(data).enumerate() {
        if config.enabled {
            textures[unit] = Some(Texture::new(unit, *config, data)?);
        }
    }
    Ok(textures)
}
