//! TOML scene description: shader program, vertex data, texture units, and combiner stages

use anyhow::{anyhow, Context};
use pica_core::float24::{vec4, Float24};
use pica_core::primitive::Topology;
use pica_core::rasterizer::Color;
use pica_core::shader::{InputRegisterMap, InputVertex, OutputAttributeMap, MAX_ATTRIBUTES};
use pica_core::tev::{AlphaModifier, ColorModifier, TevOperation, TevSource, TevStageConfig};
use pica_core::texture::{self, TextureConfig, WrapMode, BYTES_PER_TEXEL};
use pica_core::PicaCore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniformConfig {
    pub index: usize,
    pub value: [f32; 4],
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VertexConfig {
    #[serde(default)]
    pub attributes: Vec<[f32; 4]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TevStageDescription {
    pub color_op: TevOperation,
    pub color_sources: [TevSource; 3],
    #[serde(default = "default_color_modifiers")]
    pub color_modifiers: [ColorModifier; 3],
    pub alpha_op: TevOperation,
    pub alpha_sources: [TevSource; 3],
    #[serde(default = "default_alpha_modifiers")]
    pub alpha_modifiers: [AlphaModifier; 3],
    #[serde(default)]
    pub constant: [u8; 4],
}

fn default_color_modifiers() -> [ColorModifier; 3] {
    [ColorModifier::SourceColor; 3]
}

fn default_alpha_modifiers() -> [AlphaModifier; 3] {
    [AlphaModifier::SourceAlpha; 3]
}

impl TevStageDescription {
    pub fn to_stage_config(&self) -> TevStageConfig {
        let [r, g, b, a] = self.constant;
        TevStageConfig::default()
            .with_color_combiner(self.color_op, self.color_sources, self.color_modifiers)
            .with_alpha_combiner(self.alpha_op, self.alpha_sources, self.alpha_modifiers)
            .with_constant(Color::rgba(r, g, b, a))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TextureSource {
    /// Two-color checkerboard, generated in tiled order
    Checkerboard { colors: [[u8; 3]; 2], square_size: u32 },
    /// Raw tiled BGR texel data, relative to the scene file
    File { path: PathBuf },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextureDescription {
    pub unit: usize,
    pub width: u16,
    pub height: u16,
    #[serde(default)]
    pub wrap_s: WrapMode,
    #[serde(default)]
    pub wrap_t: WrapMode,
    pub source: TextureSource,
}

impl TextureDescription {
    fn load_data(&self, scene_dir: &Path) -> anyhow::Result<Vec<u8>> {
        match &self.source {
            TextureSource::Checkerboard { colors, square_size } => {
                Ok(checkerboard(self.width.into(), self.height.into(), *colors, *square_size))
            }
            TextureSource::File { path } => {
                let path = scene_dir.join(path);
                fs::read(&path)
                    .with_context(|| format!("Error reading texture data from '{}'", path.display()))
            }
        }
    }
}

fn checkerboard(width: u32, height: u32, colors: [[u8; 3]; 2], square_size: u32) -> Vec<u8> {
    let square_size = square_size.max(1);

    let mut data = vec![0; width as usize * height as usize * BYTES_PER_TEXEL];
    for t in 0..height {
        for s in 0..width {
            let [r, g, b] = colors[((s / square_size + t / square_size) % 2) as usize];
            let offset = texture::texel_offset(s, t, width);
            data[offset..offset + BYTES_PER_TEXEL].copy_from_slice(&[b, g, r]);
        }
    }
    data
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default = "default_framebuffer_size")]
    pub width: u32,
    #[serde(default = "default_framebuffer_size")]
    pub height: u32,
    #[serde(default)]
    pub clear_color: [u8; 4],
    #[serde(default)]
    pub topology: Topology,
    #[serde(default)]
    pub main_offset: u32,
    #[serde(default)]
    pub program: Vec<u32>,
    #[serde(default)]
    pub swizzle_patterns: Vec<u32>,
    #[serde(default)]
    pub output_maps: Vec<u32>,
    #[serde(default = "default_input_register_map")]
    pub input_register_map: u64,
    #[serde(default)]
    pub uniforms: Vec<UniformConfig>,
    #[serde(default)]
    pub vertices: Vec<VertexConfig>,
    #[serde(default)]
    pub textures: Vec<TextureDescription>,
    #[serde(default)]
    pub tev_stages: Vec<TevStageDescription>,
}

fn default_framebuffer_size() -> u32 {
    64
}

fn default_input_register_map() -> u64 {
    InputRegisterMap::identity().0
}

impl Default for Scene {
    fn default() -> Self {
        toml::from_str("").unwrap()
    }
}

/// A parsed scene with its texture data loaded.
pub struct LoadedScene {
    pub scene: Scene,
    pub texture_data: [Vec<u8>; 3],
}

impl Scene {
    pub fn num_attributes(&self) -> usize {
        self.vertices.iter().map(|vertex| vertex.attributes.len()).max().unwrap_or(0)
    }

    pub fn input_vertices(&self) -> anyhow::Result<Vec<InputVertex>> {
        self.vertices
            .iter()
            .enumerate()
            .map(|(i, vertex)| {
                if vertex.attributes.len() > MAX_ATTRIBUTES {
                    return Err(anyhow!(
                        "Vertex {i} has {} attributes; at most {MAX_ATTRIBUTES} are supported",
                        vertex.attributes.len()
                    ));
                }

                let mut input = InputVertex::default();
                for (attribute, &[x, y, z, w]) in input.attributes.iter_mut().zip(&vertex.attributes) {
                    *attribute = vec4(x, y, z, w);
                }
                Ok(input)
            })
            .collect()
    }

    /// Load shader, texture unit, and combiner state into `core`.
    pub fn configure(&self, core: &mut PicaCore) -> anyhow::Result<()> {
        for (address, &word) in self.program.iter().enumerate() {
            core.submit_shader_instruction(address as u32, word)?;
        }
        for (address, &word) in self.swizzle_patterns.iter().enumerate() {
            core.submit_swizzle_pattern(address as u32, word)?;
        }

        let shader = core.shader_mut();
        shader.set_main_offset(self.main_offset);
        shader.set_input_register_map(InputRegisterMap(self.input_register_map));
        for (register, &map) in self.output_maps.iter().enumerate() {
            shader.set_output_map(register, OutputAttributeMap(map))?;
        }
        for uniform in &self.uniforms {
            *shader.uniform_mut(uniform.index)? = uniform.value.map(Float24::from_f32);
        }

        for texture in &self.textures {
            core.set_texture_config(
                texture.unit,
                TextureConfig::new(texture.width, texture.height, texture.wrap_s, texture.wrap_t),
            )?;
        }

        for (stage, description) in self.tev_stages.iter().enumerate() {
            core.set_tev_stage(stage, description.to_stage_config())?;
        }
        // Unused trailing stages pass the previous output through
        let passthrough = TevStageDescription {
            color_op: TevOperation::Replace,
            color_sources: [TevSource::Previous; 3],
            color_modifiers: default_color_modifiers(),
            alpha_op: TevOperation::Replace,
            alpha_sources: [TevSource::Previous; 3],
            alpha_modifiers: default_alpha_modifiers(),
            constant: [0; 4],
        };
        if !self.tev_stages.is_empty() {
            for stage in self.tev_stages.len()..pica_core::tev::NUM_TEV_STAGES {
                core.set_tev_stage(stage, passthrough.to_stage_config())?;
            }
        }

        Ok(())
    }
}

pub fn load(path: &Path) -> anyhow::Result<LoadedScene> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Error reading scene from '{}'", path.display()))?;
    let scene: Scene = toml::from_str(&contents)
        .with_context(|| format!("Error parsing scene '{}'", path.display()))?;

    let scene_dir = path.parent().unwrap_or(Path::new("."));
    let mut texture_data: [Vec<u8>; 3] = Default::default();
    for texture in &scene.textures {
        let data = texture.load_data(scene_dir)?;
        if let Some(slot) = texture_data.get_mut(texture.unit) {
            *slot = data;
        }
    }

    Ok(LoadedScene { scene, texture_data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_default_does_not_panic() {
        let scene = Scene::default();
        assert_eq!((scene.width, scene.height), (64, 64));
        assert_eq!(scene.topology, Topology::List);
        assert_eq!(scene.input_register_map, 0xFEDC_BA98_7654_3210);
    }

    #[test]
    fn parse_scene() {
        let scene: Scene = toml::from_str(
            r#"
            width = 32
            height = 16
            topology = "Strip"
            program = [0x4C000000, 0x88000000]
            swizzle_patterns = [0x6C36F]
            output_maps = [0x03020100]

            [[uniforms]]
            index = 4
            value = [1.0, 0.5, 0.25, 0.0]

            [[vertices]]
            attributes = [[-1.0, -1.0, 0.5, 1.0], [1.0, 0.0, 0.0, 1.0]]

            [[vertices]]
            attributes = [[1.0, -1.0, 0.5, 1.0]]

            [[textures]]
            unit = 1
            width = 8
            height = 8
            wrap_s = "Repeat"
            source = { kind = "Checkerboard", colors = [[255, 0, 0], [0, 0, 255]], square_size = 2 }

            [[tev_stages]]
            color_op = "Modulate"
            color_sources = ["Texture1", "PrimaryColor", "PrimaryColor"]
            alpha_op = "Replace"
            alpha_sources = ["PrimaryColor", "PrimaryColor", "PrimaryColor"]
            "#,
        )
        .unwrap();

        assert_eq!((scene.width, scene.height), (32, 16));
        assert_eq!(scene.topology, Topology::Strip);
        assert_eq!(scene.program, vec![0x4C000000, 0x88000000]);
        assert_eq!(scene.num_attributes(), 2);
        assert_eq!(scene.textures[0].wrap_s, WrapMode::Repeat);
        assert_eq!(scene.textures[0].wrap_t, WrapMode::ClampToEdge);
        assert_eq!(scene.tev_stages[0].color_modifiers, [ColorModifier::SourceColor; 3]);

        let inputs = scene.input_vertices().unwrap();
        assert_eq!(inputs[1].attributes[0], vec4(1.0, -1.0, 0.5, 1.0));
        assert_eq!(inputs[1].attributes[1], [Float24::ZERO; 4]);

        let mut core = PicaCore::new(32, 16, pica_core::timing::TimingConfig::default());
        scene.configure(&mut core).unwrap();
        assert_eq!(core.shader().program()[1], 0x88000000);
        assert_eq!(core.shader().uniforms()[4], vec4(1.0, 0.5, 0.25, 0.0));
    }

    #[test]
    fn checkerboard_is_tiled() {
        let data = checkerboard(16, 8, [[255, 0, 0], [0, 0, 255]], 8);

        // Texel (8, 0) is in the second square and the second tile
        let offset = texture::texel_offset(8, 0, 16);
        assert_eq!(offset, 64 * BYTES_PER_TEXEL);
        assert_eq!(data[offset..offset + 3], [255, 0, 0]);
        assert_eq!(data[0..3], [0, 0, 255]);
    }
}
