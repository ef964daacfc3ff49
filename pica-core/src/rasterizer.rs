//! Triangle rasterization and per-pixel processing
//!
//! Triangles are walked in 12.4 fixed-point screen space at pixel granularity. Coverage uses
//! edge functions with a top-left style fill rule, attributes are interpolated perspective
//! correctly in float24, and each covered pixel runs through texture sampling and the texture
//! combiners before being written to the framebuffer. Depth is written unconditionally.

mod fixedpoint;

use crate::float24::{Float24, Vec3};
use crate::memory::Framebuffer;
use crate::shader::OutputVertex;
use crate::tev::{self, CombinerInputs, TevStageConfig, NUM_TEV_STAGES};
use crate::texture::{Texture, NUM_TEXTURE_UNITS};
use bincode::{Decode, Encode};
use std::cmp;

pub use fixedpoint::Fix12P4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgba(0, 0, 0, 0);

    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    #[must_use]
    pub fn to_argb8888(self) -> u32 {
        (u32::from(self.a) << 24)
            | (u32::from(self.r) << 16)
            | (u32::from(self.g) << 8)
            | u32::from(self.b)
    }

    #[must_use]
    pub fn from_argb8888(value: u32) -> Self {
        Self { r: (value >> 16) as u8, g: (value >> 8) as u8, b: value as u8, a: (value >> 24) as u8 }
    }
}

/// Screen-space vertex position in 12.4 fixed-point units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Vertex {
    pub x: i32,
    pub y: i32,
}

impl Vertex {
    fn from_screen_position(screenpos: &Vec3) -> Self {
        Self {
            x: Fix12P4::from_float24(screenpos[0]).into(),
            y: Fix12P4::from_float24(screenpos[1]).into(),
        }
    }
}

/// Per-pixel pipeline state shared by every triangle in a draw.
#[derive(Debug, Clone, Copy)]
pub struct PixelPipeline<'a, 'data> {
    /// `None` for units that are disabled
    pub textures: &'a [Option<Texture<'data>>; NUM_TEXTURE_UNITS],
    pub tev_stages: &'a [TevStageConfig; NUM_TEV_STAGES],
}

/// Rasterize one triangle into `framebuffer`, returning the number of pixels written.
///
/// Only triangles with a positive signed area in screen space produce pixels.
pub fn process_triangle(
    vertices: [&OutputVertex; 3],
    pipeline: &PixelPipeline<'_, '_>,
    framebuffer: &mut Framebuffer<'_>,
) -> u32 {
    let v = vertices.map(|vertex| Vertex::from_screen_position(&vertex.screenpos));

    log::trace!("Triangle vertices: {v:?}");

    if cross_product_z(v[0], v[1], v[2]) <= 0 {
        return 0;
    }

    let int_mask = i32::from(Fix12P4::INT_MASK);
    let frac_mask = i32::from(Fix12P4::FRAC_MASK);

    // Bounding box snapped outward to whole pixels, clipped to the framebuffer
    let min_x = cmp::min(v[0].x, cmp::min(v[1].x, v[2].x)) & int_mask;
    let min_y = cmp::min(v[0].y, cmp::min(v[1].y, v[2].y)) & int_mask;
    let max_x = ((cmp::max(v[0].x, cmp::max(v[1].x, v[2].x)) + frac_mask) & int_mask)
        .min((framebuffer.width() << Fix12P4::FRACTION_BITS) as i32);
    let max_y = ((cmp::max(v[0].y, cmp::max(v[1].y, v[2].y)) + frac_mask) & int_mask)
        .min((framebuffer.height() << Fix12P4::FRACTION_BITS) as i32);

    log::trace!("Bounding box: ({min_x:X}, {min_y:X}) to ({max_x:X}, {max_y:X})");

    // Pixels exactly on an edge belong to the triangle only on its left/top side
    let bias = [
        edge_bias(v[0], v[1], v[2]),
        edge_bias(v[1], v[2], v[0]),
        edge_bias(v[2], v[0], v[1]),
    ];

    let interpolator = PerspectiveInterpolator::new(vertices);

    let mut pixels_written = 0;
    for y in (min_y..max_y).step_by(Fix12P4::ONE.into()) {
        for x in (min_x..max_x).step_by(Fix12P4::ONE.into()) {
            let p = Vertex { x, y };

            let w0 = bias[0] + cross_product_z(v[1], v[2], p);
            let w1 = bias[1] + cross_product_z(v[2], v[0], p);
            let w2 = bias[2] + cross_product_z(v[0], v[1], p);
            if w0 < 0 || w1 < 0 || w2 < 0 {
                continue;
            }

            draw_triangle_pixel(
                (x >> Fix12P4::FRACTION_BITS) as u32,
                (y >> Fix12P4::FRACTION_BITS) as u32,
                [w0, w1, w2],
                vertices,
                &interpolator,
                pipeline,
                framebuffer,
            );
            pixels_written += 1;
        }
    }

    pixels_written
}

fn draw_triangle_pixel(
    px: u32,
    py: u32,
    weights: [i64; 3],
    vertices: [&OutputVertex; 3],
    interpolator: &PerspectiveInterpolator,
    pipeline: &PixelPipeline<'_, '_>,
    framebuffer: &mut Framebuffer<'_>,
) {
    let barycentric = weights.map(|weight| Float24::from_f32(weight as f32));

    let [r, g, b, a] = std::array::from_fn(|channel| {
        let value = interpolator.interpolate(
            vertices.map(|vertex| vertex.color[channel]),
            &barycentric,
        );
        (value.to_f32() * 255.0) as u8
    });
    let primary_color = Color::rgba(r, g, b, a);

    let tex_coords = [
        vertices.map(|vertex| vertex.tc0),
        vertices.map(|vertex| vertex.tc1),
        vertices.map(|vertex| vertex.tc2),
    ];

    let mut texture_colors = [Color::BLACK; NUM_TEXTURE_UNITS];
    for ((texture, color), uv) in pipeline.textures.iter().zip(&mut texture_colors).zip(tex_coords)
    {
        let Some(texture) = texture else { continue };

        let u = interpolator.interpolate(uv.map(|uv| uv[0]), &barycentric);
        let v = interpolator.interpolate(uv.map(|uv| uv[1]), &barycentric);
        *color = texture.sample([u, v]);
    }

    let combiner_output =
        tev::combine(pipeline.tev_stages, &CombinerInputs { primary_color, texture_colors });

    // Depth uses the affine weights, not the perspective-corrected ones
    let z = vertices.map(|vertex| vertex.screenpos[2].to_f32());
    let weight_sum = (weights[0] + weights[1] + weights[2]) as f32;
    let depth = ((z[0] * weights[0] as f32 + z[1] * weights[1] as f32 + z[2] * weights[2] as f32)
        * 65535.0
        / weight_sum) as u16;

    framebuffer.write_depth(px, py, depth);
    framebuffer.write_color(px, py, combiner_output);
}

/// Interpolates vertex attributes by weighting `attribute / w` and dividing by the weighted
/// `1 / w`, all in float24.
struct PerspectiveInterpolator {
    w: Vec3,
    w_inverse: Vec3,
}

impl PerspectiveInterpolator {
    fn new(vertices: [&OutputVertex; 3]) -> Self {
        let w = vertices.map(|vertex| vertex.pos[3]);
        let w_inverse = w.map(|w| Float24::ONE / w);
        Self { w, w_inverse }
    }

    fn interpolate(&self, attribute: Vec3, barycentric: &Vec3) -> Float24 {
        let attribute_over_w: Vec3 = std::array::from_fn(|i| attribute[i] / self.w[i]);
        dot3(&attribute_over_w, barycentric) / dot3(&self.w_inverse, barycentric)
    }
}

fn dot3(a: &Vec3, b: &Vec3) -> Float24 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

// Z component of the cross product between v0->v1 and v0->v2
fn cross_product_z(v0: Vertex, v1: Vertex, v2: Vertex) -> i64 {
    let (dx1, dy1) = (i64::from(v1.x - v0.x), i64::from(v1.y - v0.y));
    let (dx2, dy2) = (i64::from(v2.x - v0.x), i64::from(v2.y - v0.y));
    dx1 * dy2 - dy1 * dx2
}

// Whether `vertex` lies on the side of edge l1-l2 whose boundary pixels are excluded
fn is_right_side_or_flat_bottom_edge(vertex: Vertex, l1: Vertex, l2: Vertex) -> bool {
    if l1.y == l2.y {
        return vertex.y < l1.y;
    }

    let (dx, dy) = (i64::from(l2.x - l1.x), i64::from(l2.y - l1.y));
    let line_x = i64::from(l1.x) + dx * i64::from(vertex.y - l1.y) / dy;
    i64::from(vertex.x) < line_x
}

fn edge_bias(vertex: Vertex, l1: Vertex, l2: Vertex) -> i64 {
    if is_right_side_or_flat_bottom_edge(vertex, l1, l2) { -1 } else { 0 }
}
