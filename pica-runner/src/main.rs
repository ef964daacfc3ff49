mod scene;

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use pica_core::debug::{DebugHook, ShaderDump};
use pica_core::fill::MemoryFillConfig;
use pica_core::memory::{Framebuffer, COLOR_BYTES_PER_PIXEL, DEPTH_BYTES_PER_PIXEL};
use pica_core::rasterizer::Color;
use pica_core::timing::TimingConfig;
use pica_core::PicaCore;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

// Physical address the runner pretends the color buffer lives at
const COLOR_BUFFER_ADDRESS: u32 = 0x1800_0000;

#[derive(Debug, Parser)]
struct Args {
    #[arg(short = 's', long, required = true)]
    scene_path: String,
    #[arg(short = 'o', long, default_value = "out.ppm")]
    output_path: String,
    /// Write a disassembly listing of the shader program to this file
    #[arg(short = 'd', long)]
    dump_shader: Option<String>,
    /// Write the serialized shader setup to this file
    #[arg(long)]
    save_shader_state: Option<String>,
    /// Number of display frames to simulate after drawing
    #[arg(short = 'f', long, default_value_t = 1)]
    frames: u64,
}

/// Writes the shader listing the first time a vertex is shaded.
struct ListingDumpHook {
    path: PathBuf,
    dumped: bool,
    triangles: usize,
}

impl ListingDumpHook {
    fn new(path: PathBuf) -> Self {
        Self { path, dumped: false, triangles: 0 }
    }
}

impl DebugHook for ListingDumpHook {
    fn shader_executed(&mut self, dump: &ShaderDump<'_>) {
        if self.dumped {
            return;
        }
        self.dumped = true;

        let listing = dump.listing();
        log::debug!("Shader listing:\n{listing}");

        match fs::write(&self.path, listing) {
            Ok(()) => log::info!(
                "Wrote {} shader words to '{}'",
                dump.program.len(),
                self.path.display()
            ),
            Err(err) => {
                log::error!("Error writing shader listing to '{}': {err}", self.path.display());
            }
        }
    }

    fn command_list_processed(&mut self, triangles: usize) {
        self.triangles += triangles;
        log::debug!("{} triangles processed so far", self.triangles);
    }
}

fn write_ppm(path: &Path, framebuffer: &Framebuffer<'_>) -> anyhow::Result<()> {
    let file = File::create(path).context(format!("Error creating '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);

    write!(writer, "P6\n{} {}\n255\n", framebuffer.width(), framebuffer.height())?;

    // Row 0 is the bottom of the framebuffer
    for y in (0..framebuffer.height()).rev() {
        for x in 0..framebuffer.width() {
            let Color { r, g, b, .. } = framebuffer.read_color(x, y);
            writer.write_all(&[r, g, b])?;
        }
    }

    writer.flush().context(format!("Error writing '{}'", path.display()))?;

    Ok(())
}

fn clear_fill(clear_color: [u8; 4], color_buffer_len: usize) -> MemoryFillConfig {
    let [r, g, b, a] = clear_color;
    MemoryFillConfig {
        start_address: COLOR_BUFFER_ADDRESS,
        end_address: COLOR_BUFFER_ADDRESS + color_buffer_len as u32,
        // The fill unit writes big-endian words while the color buffer is little-endian
        value: Color::rgba(r, g, b, a).to_argb8888().swap_bytes(),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let scene_path = Path::new(&args.scene_path);
    log::info!("Loading scene from '{}'", scene_path.display());
    let scene::LoadedScene { scene, texture_data } = scene::load(scene_path)?;

    let mut core = PicaCore::new(scene.width, scene.height, TimingConfig::default());
    scene.configure(&mut core)?;

    if let Some(dump_path) = &args.dump_shader {
        core.set_debug_hook(Box::new(ListingDumpHook::new(dump_path.into())));
    }

    if let Some(state_path) = &args.save_shader_state {
        let state = core.save_shader_state()?;
        fs::write(state_path, state)
            .context(format!("Error writing shader state to '{state_path}'"))?;
        log::info!("Saved shader state to '{state_path}'");
    }

    let pixels = scene.width as usize * scene.height as usize;
    let mut color_buffer = vec![0; pixels * COLOR_BYTES_PER_PIXEL];
    let mut depth_buffer = vec![0; pixels * DEPTH_BYTES_PER_PIXEL];

    core.memory_fill(
        &clear_fill(scene.clear_color, color_buffer.len()),
        &mut color_buffer,
        COLOR_BUFFER_ADDRESS,
    )?;

    let mut framebuffer =
        Framebuffer::new(&mut color_buffer, &mut depth_buffer, scene.width, scene.height)?;

    let inputs = scene.input_vertices()?;
    let texture_data = [&texture_data[0][..], &texture_data[1][..], &texture_data[2][..]];
    let triangles = core.draw(
        &inputs,
        scene.num_attributes(),
        scene.topology,
        &mut framebuffer,
        texture_data,
    )?;

    let counters = core.last_debug_counters();
    log::info!(
        "Drew {triangles} triangles; max shader offset {:03X}, max operand descriptor {}",
        counters.max_offset,
        counters.max_opdesc_id
    );
    log::info!("Interrupt status after drawing: {:02X}", core.interrupts().status().0);

    let frame_ticks = core.display_timer().config().frame_ticks;
    let lines_per_frame = u64::from(core.display_timer().config().lines_per_frame.max(1));
    let line_ticks = frame_ticks / lines_per_frame;
    let mut current_ticks = 0;
    while core.display_timer().frame_count() < args.frames {
        current_ticks += line_ticks;
        if core.tick(current_ticks) {
            log::info!("Frame {} complete", core.display_timer().frame_count());
        }
    }

    let output_path = Path::new(&args.output_path);
    write_ppm(output_path, &framebuffer)?;
    log::info!("Wrote {}x{} image to '{}'", scene.width, scene.height, output_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_fill_matches_framebuffer_layout() {
        let mut color_buffer = vec![0; 2 * 2 * COLOR_BYTES_PER_PIXEL];
        let mut depth_buffer = vec![0; 2 * 2 * DEPTH_BYTES_PER_PIXEL];

        let fill = clear_fill([10, 20, 30, 255], color_buffer.len());
        fill.apply(&mut color_buffer, COLOR_BUFFER_ADDRESS).unwrap();

        let framebuffer = Framebuffer::new(&mut color_buffer, &mut depth_buffer, 2, 2).unwrap();
        assert_eq!(framebuffer.read_color(1, 1), Color::rgba(10, 20, 30, 255));
    }
}
