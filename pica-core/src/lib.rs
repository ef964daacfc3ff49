//! Software emulation of the PICA200 GPU core: vertex shader interpreter, triangle rasterizer,
//! texture units, and texture combiners.

pub mod api;
pub mod debug;
pub mod fill;
pub mod float24;
pub mod interrupts;
pub mod memory;
mod num;
pub mod primitive;
pub mod rasterizer;
pub mod shader;
pub mod tev;
pub mod texture;
pub mod timing;
pub mod viewport;

pub use api::{PicaCore, PicaError, PicaResult, TextureData};
