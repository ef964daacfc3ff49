use crate::float24::Float24;
use crate::shader::OutputVertex;
use bincode::{Decode, Encode};

/// Clip space to screen space transform.
#[derive(Debug, Clone, Copy, PartialEq, Encode, Decode)]
pub struct Viewport {
    pub half_width: Float24,
    pub half_height: Float24,
    pub offset_x: Float24,
    pub offset_y: Float24,
    pub depth_scale: Float24,
    pub depth_offset: Float24,
}

impl Viewport {
    /// Viewport covering a `width` x `height` framebuffer with depth passed through unchanged.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            half_width: Float24::from_f32(width as f32 / 2.0),
            half_height: Float24::from_f32(height as f32 / 2.0),
            offset_x: Float24::ZERO,
            offset_y: Float24::ZERO,
            depth_scale: Float24::ONE,
            depth_offset: Float24::ZERO,
        }
    }

    /// Perspective divide and viewport transform, filling in `screenpos`.
    pub fn transform(&self, vertex: &mut OutputVertex) {
        let w_inverse = Float24::ONE / vertex.pos[3];

        vertex.screenpos = [
            (vertex.pos[0] * w_inverse + Float24::ONE) * self.half_width + self.offset_x,
            (vertex.pos[1] * w_inverse + Float24::ONE) * self.half_height + self.offset_y,
            vertex.pos[2] * w_inverse * self.depth_scale + self.depth_offset,
        ];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::float24::vec4;

    #[test]
    fn clip_space_corners() {
        let viewport = Viewport::new(240, 400);

        let mut vertex = OutputVertex::default();
        vertex.pos = vec4(-2.0, 2.0, 1.0, 2.0);
        viewport.transform(&mut vertex);
        assert_eq!(vertex.screenpos.map(Float24::to_f32), [0.0, 400.0, 0.5]);

        let mut vertex = OutputVertex::default();
        vertex.pos = vec4(0.0, 0.0, 0.0, 1.0);
        viewport.transform(&mut vertex);
        assert_eq!(vertex.screenpos.map(Float24::to_f32), [120.0, 200.0, 0.0]);
    }

    #[test]
    fn offsets_and_depth_range() {
        let viewport = Viewport {
            offset_x: Float24::from_f32(8.0),
            offset_y: Float24::from_f32(-4.0),
            depth_scale: Float24::from_f32(-0.5),
            depth_offset: Float24::from_f32(0.5),
            ..Viewport::new(16, 16)
        };

        let mut vertex = OutputVertex::default();
        vertex.pos = vec4(1.0, -1.0, 1.0, 1.0);
        viewport.transform(&mut vertex);
        assert_eq!(vertex.screenpos.map(Float24::to_f32), [24.0, -4.0, 0.0]);
    }
}
