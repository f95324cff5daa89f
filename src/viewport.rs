//! Viewport layout
//!
//! Fits the image into the window while preserving its aspect ratio and
//! produces the two quads the compositor draws with.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

/// Vertex of a textured quad (clip-space position, texture coordinate)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

/// Number of vertices in a quad (drawn as a triangle strip)
pub const QUAD_VERTEX_COUNT: u32 = 4;

/// Corners in strip order with their texture coordinates.
/// UV (0, 1) sits at the bottom-left so row 0 of the image ends up on top.
const CORNERS: [([f32; 2], [f32; 2]); 4] = [
    ([-1.0, -1.0], [0.0, 1.0]),
    ([1.0, -1.0], [1.0, 1.0]),
    ([-1.0, 1.0], [0.0, 0.0]),
    ([1.0, 1.0], [1.0, 0.0]),
];

fn quad(half_extent: Vec2) -> [QuadVertex; 4] {
    CORNERS.map(|(corner, uv)| QuadVertex {
        position: (Vec2::from(corner) * half_extent).to_array(),
        uv,
    })
}

/// Quad covering the whole render target (`[-1, 1]` on both axes)
pub fn full_quad() -> [QuadVertex; 4] {
    quad(Vec2::ONE)
}

/// Layout of the image inside the window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportGeometry {
    /// Half-width of the centered quad in clip space (1.0 = full width)
    pub object_width: f32,
    /// Half-height of the centered quad in clip space (1.0 = full height)
    pub object_height: f32,
    /// Displayed size over source pixel size
    pub scale_diff: f32,
}

impl Default for ViewportGeometry {
    fn default() -> Self {
        Self {
            object_width: 1.0,
            object_height: 1.0,
            scale_diff: 1.0,
        }
    }
}

impl ViewportGeometry {
    /// Fit an image of `image_width`x`image_height` pixels into a window.
    ///
    /// A wider window pillarboxes (`object_height == 1`); otherwise the image
    /// is letterboxed (`object_width == 1`). Zero sizes are treated as 1.
    pub fn solve(window_width: u32, window_height: u32, image_width: u32, image_height: u32) -> Self {
        let window_width = window_width.max(1) as f32;
        let window_height = window_height.max(1) as f32;
        let image_height = image_height.max(1) as f32;
        let image_width = image_width.max(1) as f32;

        let window_aspect = window_width / window_height;
        let image_aspect = image_width / image_height;

        if window_aspect > image_aspect {
            Self {
                object_width: image_aspect / window_aspect,
                object_height: 1.0,
                scale_diff: window_height / image_height,
            }
        } else {
            let object_height = window_aspect / image_aspect;
            Self {
                object_width: 1.0,
                object_height,
                scale_diff: window_height * object_height / image_height,
            }
        }
    }

    /// The letterboxed/pillarboxed quad used for the on-screen pass
    pub fn centered_quad(&self) -> [QuadVertex; 4] {
        quad(Vec2::new(self.object_width, self.object_height))
    }
}
