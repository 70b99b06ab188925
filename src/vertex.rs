/// Interleaved vertex for batched 2D UI rendering.
///
/// Nine scalars per vertex: position (z is a constant depth for all 2D
/// draws), color normalized from the toolkit's 8-bit channels, and a
/// texture coordinate. Solid-color quads carry a zero UV that the shader
/// ignores at blend factor 0.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
    pub uv: [f32; 2],
}

/// Constant depth written into every 2D vertex.
pub const VERTEX_Z: f32 = 0.5;

impl Vertex {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            // position
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            // color
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x4,
            },
            // uv
            wgpu::VertexAttribute {
                offset: 28,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x2,
            },
        ],
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_nine_tightly_packed_scalars() {
        assert_eq!(std::mem::size_of::<Vertex>(), 9 * 4);
        assert_eq!(Vertex::LAYOUT.array_stride, 36);
    }

    #[test]
    fn layout_offsets_are_interleaved() {
        let attrs = Vertex::LAYOUT.attributes;
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[1].offset, 12);
        assert_eq!(attrs[2].offset, 28);
    }
}
