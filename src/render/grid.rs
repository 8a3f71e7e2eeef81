use iced::wgpu;

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl LineVertex {
    const ATTRS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x4];

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

const GRID_COLOR: [f32; 4] = [0.55, 0.58, 0.66, 0.55];

/// Ground-plane grid lines on y = 0.
pub(crate) fn build_ground_grid(extent: f32, step: f32) -> Vec<LineVertex> {
    let steps = (extent / step).round() as i32;
    let mut out = Vec::new();

    for i in -steps..=steps {
        let v = i as f32 * step;
        out.push(LineVertex {
            position: [-extent, 0.0, v],
            color: GRID_COLOR,
        });
        out.push(LineVertex {
            position: [extent, 0.0, v],
            color: GRID_COLOR,
        });
        out.push(LineVertex {
            position: [v, 0.0, -extent],
            color: GRID_COLOR,
        });
        out.push(LineVertex {
            position: [v, 0.0, extent],
            color: GRID_COLOR,
        });
    }

    out
}

const LINE_SHADER: &str = r#"
struct Uniforms {
    view: mat4x4<f32>,
    mvp: mat4x4<f32>,
    // x: 1.0 when orthographic, y: near, z: far, w: hidden-pass fade
    projection: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) color: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.position = uniforms.mvp * vec4<f32>(in.position, 1.0);
    out.color = in.color;
    return out;
}

// Fragment depth back to view-space distance, by projection kind.
fn linear_depth(ndc_z: f32) -> f32 {
    let near = uniforms.projection.y;
    let far = uniforms.projection.z;
    if (uniforms.projection.x > 0.5) {
        return near + ndc_z * (far - near);
    }
    return near * far / (far - ndc_z * (far - near));
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var color = in.color;
    if (uniforms.projection.w > 0.0) {
        // Hidden-edge pass: fade with distance so occluded outlines
        // read as subdued rather than solid.
        let depth = linear_depth(in.position.z);
        let far = uniforms.projection.z;
        let fade = clamp(1.0 - depth / far, 0.25, 1.0);
        color = vec4<f32>(color.rgb, color.a * uniforms.projection.w * fade);
    }
    return color;
}
"#;

pub(crate) fn create_line_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    pipeline_layout: &wgpu::PipelineLayout,
    depth_compare: wgpu::CompareFunction,
    label: &str,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("viewport_line_shader"),
        source: wgpu::ShaderSource::Wgsl(LINE_SHADER.into()),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[LineVertex::layout()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::LineList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: wgpu::TextureFormat::Depth24Plus,
            depth_write_enabled: false,
            depth_compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_line_counts_match_extent() {
        let vertices = build_ground_grid(10.0, 1.0);
        // 21 lines per axis, 2 vertices per line, 2 axes.
        assert_eq!(vertices.len(), 21 * 2 * 2);
        assert!(vertices.iter().all(|v| v.position[1] == 0.0));
    }
}
