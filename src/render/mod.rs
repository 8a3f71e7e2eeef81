pub(crate) mod grid;

use std::sync::Arc;

use glam::Vec3;
use iced::wgpu;
use iced::widget::shader::{self, Viewport as ShaderViewport};
use iced::Rectangle;
use wgpu::util::DeviceExt;

use crate::camera::{Camera, CameraKind};
use crate::geom::Aabb;
use crate::loader::Mesh;
use crate::scene::cursor::ADD_CURSOR_RADIUS;
use crate::scene::link::{LINK_CONE_RADIUS, LINK_RADIUS};
use crate::scene::Scene;
use grid::{build_ground_grid, create_line_pipeline, LineVertex};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;
const GRID_EXTENT: f32 = 50.0;
const GRID_STEP: f32 = 1.0;

const NODE_COLOR: [f32; 3] = [0.88, 0.90, 0.96];
const LINK_COLOR: [f32; 3] = [0.62, 0.66, 0.78];
const CURSOR_COLOR: [f32; 3] = [0.55, 0.85, 0.60];
const SELECTED_OUTLINE: [f32; 4] = [1.0, 0.62, 0.15, 1.0];
const HOVERED_OUTLINE: [f32; 4] = [1.0, 0.80, 0.45, 1.0];
const PREVIEW_LINE: [f32; 4] = [0.55, 0.85, 0.60, 0.9];

const SEGMENTS: usize = 12;

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
    color: [f32; 3],
}

impl Vertex {
    const ATTRS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x3];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    view: [[f32; 4]; 4],
    mvp: [[f32; 4]; 4],
    // x: orthographic flag, y: near, z: far, w: hidden-pass fade
    projection: [f32; 4],
}

/// Immutable display snapshot captured from the scene each frame.
/// Cheap to clone behind an Arc; the pipeline rebuilds GPU buffers
/// only when `version` moves.
#[derive(Debug)]
pub struct RenderScene {
    nodes: Vec<NodeDraw>,
    links: Vec<LinkDraw>,
    add_cursor: Option<Vec3>,
    link_cursor: Option<(Vec3, Vec3)>,
}

#[derive(Debug)]
struct NodeDraw {
    position: Vec3,
    bounds: Aabb,
    mesh: Option<Arc<Mesh>>,
    hovered: bool,
    selected: bool,
}

#[derive(Debug)]
struct LinkDraw {
    shaft: (Vec3, Vec3),
    cone: (Vec3, Vec3),
    hovered: bool,
    selected: bool,
}

impl RenderScene {
    pub fn capture(scene: &Scene) -> Self {
        Self {
            nodes: scene
                .nodes()
                .iter()
                .map(|n| NodeDraw {
                    position: n.position(),
                    bounds: n.local_bounds(),
                    mesh: n.model().cloned(),
                    hovered: n.hovered,
                    selected: n.selected,
                })
                .collect(),
            links: scene
                .links()
                .iter()
                .map(|l| LinkDraw {
                    shaft: l.shaft(),
                    cone: l.cone(),
                    hovered: l.hovered,
                    selected: l.selected,
                })
                .collect(),
            add_cursor: scene.add_cursor.visible.then_some(scene.add_cursor.position),
            link_cursor: scene.link_cursor.shaft(),
        }
    }
}

/// Per-frame draw data handed from the widget to the GPU side.
#[derive(Debug)]
pub struct Primitive {
    pub scene: Arc<RenderScene>,
    pub version: u64,
    pub camera: Camera,
}

#[derive(Debug)]
pub struct Pipeline {
    mesh_pipeline: wgpu::RenderPipeline,
    grid_pipeline: wgpu::RenderPipeline,
    outline_visible_pipeline: wgpu::RenderPipeline,
    outline_hidden_pipeline: wgpu::RenderPipeline,
    blit_pipeline: wgpu::RenderPipeline,

    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
    outline_vertices: wgpu::Buffer,
    outline_vertex_count: u32,
    preview_vertices: wgpu::Buffer,
    preview_vertex_count: u32,
    grid_vertices: wgpu::Buffer,
    grid_vertex_count: u32,
    scene_version: Option<u64>,

    uniforms: wgpu::Buffer,
    uniforms_hidden: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    bind_group_hidden: wgpu::BindGroup,

    blit_layout: wgpu::BindGroupLayout,
    blit_bind_group: wgpu::BindGroup,
    offscreen: wgpu::TextureView,
    depth: wgpu::TextureView,
    target_size: (u32, u32),
    last_bounds: (f32, f32, f32, f32),
    format: wgpu::TextureFormat,
}

const MESH_SHADER: &str = r#"
struct Uniforms {
    view: mat4x4<f32>,
    mvp: mat4x4<f32>,
    projection: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) color: vec3<f32>,
};

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) normal: vec3<f32>,
    @location(1) color: vec3<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.position = uniforms.mvp * vec4<f32>(in.position, 1.0);
    let nmat = mat3x3<f32>(
        uniforms.view[0].xyz,
        uniforms.view[1].xyz,
        uniforms.view[2].xyz,
    );
    out.normal = normalize(nmat * in.normal);
    out.color = in.color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let ambient = 0.18;
    let light_dir = normalize(vec3<f32>(0.3, 0.6, 0.8));
    let ndotl = max(dot(normalize(in.normal), light_dir), 0.0);
    let color = in.color * (ambient + (1.0 - ambient) * ndotl);
    return vec4<f32>(color, 1.0);
}
"#;

const BLIT_SHADER: &str = r#"
@group(0) @binding(0)
var source: texture_2d<f32>;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    // Fullscreen triangle.
    var out: VertexOutput;
    let x = f32(i32(index) - 1);
    let y = f32(i32(index & 1u) * 2 - 1);
    out.position = vec4<f32>(x * 3.0, y * 3.0, 0.0, 1.0);
    return out;
}

fn luma(c: vec3<f32>) -> f32 {
    return dot(c, vec3<f32>(0.299, 0.587, 0.114));
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let p = vec2<i32>(in.position.xy);
    let c = textureLoad(source, p, 0).rgb;
    let n = textureLoad(source, p + vec2<i32>(0, -1), 0).rgb;
    let s = textureLoad(source, p + vec2<i32>(0, 1), 0).rgb;
    let e = textureLoad(source, p + vec2<i32>(1, 0), 0).rgb;
    let w = textureLoad(source, p + vec2<i32>(-1, 0), 0).rgb;

    // Edge-weighted blend; flat regions pass through untouched.
    let lc = luma(c);
    let contrast = max(max(abs(luma(n) - lc), abs(luma(s) - lc)),
                       max(abs(luma(e) - lc), abs(luma(w) - lc)));
    let blend = smoothstep(0.05, 0.35, contrast) * 0.5;
    let averaged = (c + n + s + e + w) / 5.0;
    return vec4<f32>(mix(c, averaged, blend), 1.0);
}
"#;

fn create_color_target(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    size: (u32, u32),
) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("viewport_offscreen"),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_depth_target(device: &wgpu::Device, size: (u32, u32)) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("viewport_depth"),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_blit_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    offscreen: &wgpu::TextureView,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("viewport_blit_bind_group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::TextureView(offscreen),
        }],
    })
}

impl shader::Pipeline for Pipeline {
    fn new(device: &wgpu::Device, _queue: &wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("viewport_mesh_shader"),
            source: wgpu::ShaderSource::Wgsl(MESH_SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("viewport_uniform_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("viewport_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let mesh_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("viewport_mesh_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader_module,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader_module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        let grid_pipeline = create_line_pipeline(
            device,
            format,
            &pipeline_layout,
            wgpu::CompareFunction::LessEqual,
            "viewport_grid_pipeline",
        );
        let outline_visible_pipeline = create_line_pipeline(
            device,
            format,
            &pipeline_layout,
            wgpu::CompareFunction::LessEqual,
            "viewport_outline_visible_pipeline",
        );
        let outline_hidden_pipeline = create_line_pipeline(
            device,
            format,
            &pipeline_layout,
            wgpu::CompareFunction::Greater,
            "viewport_outline_hidden_pipeline",
        );

        let blit_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("viewport_blit_shader"),
            source: wgpu::ShaderSource::Wgsl(BLIT_SHADER.into()),
        });

        let blit_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("viewport_blit_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });

        let blit_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("viewport_blit_pipeline_layout"),
                bind_group_layouts: &[&blit_layout],
                push_constant_ranges: &[],
            });

        let blit_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("viewport_blit_pipeline"),
            layout: Some(&blit_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &blit_module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &blit_module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        let empty = |label: &str, usage: wgpu::BufferUsages| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: &[],
                usage,
            })
        };

        let grid = build_ground_grid(GRID_EXTENT, GRID_STEP);
        let grid_vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("viewport_grid_vertices"),
            contents: bytemuck::cast_slice(&grid),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("viewport_uniforms"),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniforms_hidden = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("viewport_uniforms_hidden"),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("viewport_bind_group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            }],
        });
        let bind_group_hidden = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("viewport_bind_group_hidden"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms_hidden.as_entire_binding(),
            }],
        });

        let target_size = (1, 1);
        let offscreen = create_color_target(device, format, target_size);
        let depth = create_depth_target(device, target_size);
        let blit_bind_group = create_blit_bind_group(device, &blit_layout, &offscreen);

        Self {
            mesh_pipeline,
            grid_pipeline,
            outline_visible_pipeline,
            outline_hidden_pipeline,
            blit_pipeline,
            vertices: empty("viewport_mesh_vertices", wgpu::BufferUsages::VERTEX),
            indices: empty("viewport_mesh_indices", wgpu::BufferUsages::INDEX),
            index_count: 0,
            outline_vertices: empty("viewport_outline_vertices", wgpu::BufferUsages::VERTEX),
            outline_vertex_count: 0,
            preview_vertices: empty("viewport_preview_vertices", wgpu::BufferUsages::VERTEX),
            preview_vertex_count: 0,
            grid_vertices,
            grid_vertex_count: grid.len() as u32,
            scene_version: None,
            uniforms,
            uniforms_hidden,
            bind_group,
            bind_group_hidden,
            blit_layout,
            blit_bind_group,
            offscreen,
            depth,
            target_size,
            last_bounds: (0.0, 0.0, 1.0, 1.0),
            format,
        }
    }
}

impl shader::Primitive for Primitive {
    type Pipeline = Pipeline;

    fn prepare(
        &self,
        pipeline: &mut Self::Pipeline,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bounds: &Rectangle,
        viewport: &ShaderViewport,
    ) {
        // Offscreen and depth targets track the swapchain size.
        let physical = viewport.physical_size();
        let target_size = (physical.width.max(1), physical.height.max(1));
        if pipeline.target_size != target_size {
            pipeline.offscreen = create_color_target(device, pipeline.format, target_size);
            pipeline.depth = create_depth_target(device, target_size);
            pipeline.blit_bind_group =
                create_blit_bind_group(device, &pipeline.blit_layout, &pipeline.offscreen);
            pipeline.target_size = target_size;
        }

        let scale = viewport.scale_factor();
        pipeline.last_bounds = (
            bounds.x * scale,
            bounds.y * scale,
            (bounds.width * scale).max(1.0),
            (bounds.height * scale).max(1.0),
        );

        let camera = &self.camera;
        let view = camera.view();
        let mvp = camera.projection() * view;
        let ortho_flag = match camera.kind {
            CameraKind::Top => 1.0,
            CameraKind::Perspective => 0.0,
        };
        let base = Uniforms {
            view: view.to_cols_array_2d(),
            mvp: mvp.to_cols_array_2d(),
            projection: [ortho_flag, camera.near, camera.far, 0.0],
        };
        queue.write_buffer(&pipeline.uniforms, 0, bytemuck::bytes_of(&base));
        let hidden = Uniforms {
            projection: [ortho_flag, camera.near, camera.far, 0.45],
            ..base
        };
        queue.write_buffer(&pipeline.uniforms_hidden, 0, bytemuck::bytes_of(&hidden));

        if pipeline.scene_version != Some(self.version) {
            pipeline.scene_version = Some(self.version);
            let (vertices, indices) = build_scene_geometry(&self.scene);
            pipeline.vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("viewport_mesh_vertices"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
            pipeline.indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("viewport_mesh_indices"),
                contents: bytemuck::cast_slice(&indices),
                usage: wgpu::BufferUsages::INDEX,
            });
            pipeline.index_count = indices.len() as u32;

            let outline = build_outline_lines(&self.scene);
            pipeline.outline_vertices =
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("viewport_outline_vertices"),
                    contents: bytemuck::cast_slice(&outline),
                    usage: wgpu::BufferUsages::VERTEX,
                });
            pipeline.outline_vertex_count = outline.len() as u32;

            let preview = build_preview_lines(&self.scene);
            pipeline.preview_vertices =
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("viewport_preview_vertices"),
                    contents: bytemuck::cast_slice(&preview),
                    usage: wgpu::BufferUsages::VERTEX,
                });
            pipeline.preview_vertex_count = preview.len() as u32;
        }
    }

    fn draw(&self, _pipeline: &Self::Pipeline, _render_pass: &mut wgpu::RenderPass<'_>) -> bool {
        // Use `render`: the base pass needs its own depth and color
        // attachments.
        false
    }

    fn render(
        &self,
        pipeline: &Self::Pipeline,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        clip_bounds: &Rectangle<u32>,
    ) {
        let (bx, by, bw, bh) = pipeline.last_bounds;

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("viewport_base_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &pipeline.offscreen,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.055,
                            g: 0.06,
                            b: 0.075,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &pipeline.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_viewport(bx, by, bw, bh, 0.0, 1.0);
            pass.set_scissor_rect(
                clip_bounds.x,
                clip_bounds.y,
                clip_bounds.width,
                clip_bounds.height,
            );

            if pipeline.grid_vertex_count > 0 {
                pass.set_pipeline(&pipeline.grid_pipeline);
                pass.set_bind_group(0, &pipeline.bind_group, &[]);
                pass.set_vertex_buffer(0, pipeline.grid_vertices.slice(..));
                pass.draw(0..pipeline.grid_vertex_count, 0..1);
            }

            if pipeline.index_count > 0 {
                pass.set_pipeline(&pipeline.mesh_pipeline);
                pass.set_bind_group(0, &pipeline.bind_group, &[]);
                pass.set_vertex_buffer(0, pipeline.vertices.slice(..));
                pass.set_index_buffer(pipeline.indices.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..pipeline.index_count, 0, 0..1);
            }

            if pipeline.outline_vertex_count > 0 {
                pass.set_pipeline(&pipeline.outline_visible_pipeline);
                pass.set_bind_group(0, &pipeline.bind_group, &[]);
                pass.set_vertex_buffer(0, pipeline.outline_vertices.slice(..));
                pass.draw(0..pipeline.outline_vertex_count, 0..1);

                pass.set_pipeline(&pipeline.outline_hidden_pipeline);
                pass.set_bind_group(0, &pipeline.bind_group_hidden, &[]);
                pass.set_vertex_buffer(0, pipeline.outline_vertices.slice(..));
                pass.draw(0..pipeline.outline_vertex_count, 0..1);
            }

            if pipeline.preview_vertex_count > 0 {
                pass.set_pipeline(&pipeline.outline_visible_pipeline);
                pass.set_bind_group(0, &pipeline.bind_group, &[]);
                pass.set_vertex_buffer(0, pipeline.preview_vertices.slice(..));
                pass.draw(0..pipeline.preview_vertex_count, 0..1);
            }
        }

        // Anti-aliasing resolve into the widget's surface.
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("viewport_resolve_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_viewport(bx, by, bw, bh, 0.0, 1.0);
        pass.set_scissor_rect(
            clip_bounds.x,
            clip_bounds.y,
            clip_bounds.width,
            clip_bounds.height,
        );
        pass.set_pipeline(&pipeline.blit_pipeline);
        pass.set_bind_group(0, &pipeline.blit_bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

fn push_triangle(vertices: &mut Vec<Vertex>, indices: &mut Vec<u32>, tri: [Vec3; 3], color: [f32; 3]) {
    let normal = (tri[1] - tri[0]).cross(tri[2] - tri[0]).normalize_or_zero();
    let base = vertices.len() as u32;
    for p in tri {
        vertices.push(Vertex {
            position: p.to_array(),
            normal: normal.to_array(),
            color,
        });
    }
    indices.extend([base, base + 1, base + 2]);
}

fn push_mesh(
    vertices: &mut Vec<Vertex>,
    indices: &mut Vec<u32>,
    mesh: &Mesh,
    offset: Vec3,
    color: [f32; 3],
) {
    for tri in mesh.indices.chunks_exact(3) {
        push_triangle(
            vertices,
            indices,
            [
                mesh.positions[tri[0] as usize] + offset,
                mesh.positions[tri[1] as usize] + offset,
                mesh.positions[tri[2] as usize] + offset,
            ],
            color,
        );
    }
    for child in &mesh.children {
        push_mesh(vertices, indices, child, offset, color);
    }
}

/// Orthonormal frame around `axis` for ring tessellation.
fn ring_basis(axis: Vec3) -> (Vec3, Vec3) {
    let helper = if axis.y.abs() < 0.9 { Vec3::Y } else { Vec3::X };
    let u = axis.cross(helper).normalize_or_zero();
    let v = axis.cross(u);
    (u, v)
}

fn push_cylinder(
    vertices: &mut Vec<Vertex>,
    indices: &mut Vec<u32>,
    a: Vec3,
    b: Vec3,
    radius: f32,
    color: [f32; 3],
) {
    let axis = (b - a).normalize_or_zero();
    if axis == Vec3::ZERO {
        return;
    }
    let (u, v) = ring_basis(axis);
    for i in 0..SEGMENTS {
        let t0 = (i as f32 / SEGMENTS as f32) * std::f32::consts::TAU;
        let t1 = ((i + 1) as f32 / SEGMENTS as f32) * std::f32::consts::TAU;
        let r0 = u * t0.cos() * radius + v * t0.sin() * radius;
        let r1 = u * t1.cos() * radius + v * t1.sin() * radius;
        push_triangle(vertices, indices, [a + r0, b + r0, b + r1], color);
        push_triangle(vertices, indices, [a + r0, b + r1, a + r1], color);
    }
}

fn push_cone(
    vertices: &mut Vec<Vertex>,
    indices: &mut Vec<u32>,
    base: Vec3,
    tip: Vec3,
    radius: f32,
    color: [f32; 3],
) {
    let axis = (tip - base).normalize_or_zero();
    if axis == Vec3::ZERO {
        return;
    }
    let (u, v) = ring_basis(axis);
    for i in 0..SEGMENTS {
        let t0 = (i as f32 / SEGMENTS as f32) * std::f32::consts::TAU;
        let t1 = ((i + 1) as f32 / SEGMENTS as f32) * std::f32::consts::TAU;
        let r0 = u * t0.cos() * radius + v * t0.sin() * radius;
        let r1 = u * t1.cos() * radius + v * t1.sin() * radius;
        push_triangle(vertices, indices, [base + r0, tip, base + r1], color);
        push_triangle(vertices, indices, [base + r1, base, base + r0], color);
    }
}

fn push_disc(
    vertices: &mut Vec<Vertex>,
    indices: &mut Vec<u32>,
    center: Vec3,
    radius: f32,
    color: [f32; 3],
) {
    for i in 0..SEGMENTS * 2 {
        let t0 = (i as f32 / (SEGMENTS * 2) as f32) * std::f32::consts::TAU;
        let t1 = ((i + 1) as f32 / (SEGMENTS * 2) as f32) * std::f32::consts::TAU;
        let r0 = Vec3::new(t0.cos() * radius, 0.0, t0.sin() * radius);
        let r1 = Vec3::new(t1.cos() * radius, 0.0, t1.sin() * radius);
        push_triangle(vertices, indices, [center, center + r1, center + r0], color);
    }
}

fn build_scene_geometry(scene: &RenderScene) -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for node in &scene.nodes {
        match &node.mesh {
            Some(mesh) => push_mesh(&mut vertices, &mut indices, mesh, node.position, NODE_COLOR),
            None => {
                let placeholder =
                    crate::loader::box_mesh(node.bounds.min, node.bounds.max);
                push_mesh(
                    &mut vertices,
                    &mut indices,
                    &placeholder,
                    node.position,
                    NODE_COLOR,
                );
            }
        }
    }

    for link in &scene.links {
        let (a, b) = link.shaft;
        push_cylinder(&mut vertices, &mut indices, a, b, LINK_RADIUS, LINK_COLOR);
        let (base, tip) = link.cone;
        push_cone(
            &mut vertices,
            &mut indices,
            base,
            tip,
            LINK_CONE_RADIUS,
            LINK_COLOR,
        );
    }

    if let Some(center) = scene.add_cursor {
        // Lifted a hair off the ground to avoid z-fighting the grid.
        push_disc(
            &mut vertices,
            &mut indices,
            center + Vec3::new(0.0, 0.01, 0.0),
            ADD_CURSOR_RADIUS,
            CURSOR_COLOR,
        );
    }

    (vertices, indices)
}

fn push_aabb_edges(out: &mut Vec<LineVertex>, bounds: &Aabb, offset: Vec3, color: [f32; 4]) {
    let min = bounds.min + offset;
    let max = bounds.max + offset;
    let corners = [
        Vec3::new(min.x, min.y, min.z),
        Vec3::new(max.x, min.y, min.z),
        Vec3::new(max.x, max.y, min.z),
        Vec3::new(min.x, max.y, min.z),
        Vec3::new(min.x, min.y, max.z),
        Vec3::new(max.x, min.y, max.z),
        Vec3::new(max.x, max.y, max.z),
        Vec3::new(min.x, max.y, max.z),
    ];
    const EDGES: [(usize, usize); 12] = [
        (0, 1),
        (1, 2),
        (2, 3),
        (3, 0),
        (4, 5),
        (5, 6),
        (6, 7),
        (7, 4),
        (0, 4),
        (1, 5),
        (2, 6),
        (3, 7),
    ];
    for (a, b) in EDGES {
        out.push(LineVertex {
            position: corners[a].to_array(),
            color,
        });
        out.push(LineVertex {
            position: corners[b].to_array(),
            color,
        });
    }
}

fn build_outline_lines(scene: &RenderScene) -> Vec<LineVertex> {
    let mut out = Vec::new();
    for node in &scene.nodes {
        let color = match (node.selected, node.hovered) {
            (true, _) => SELECTED_OUTLINE,
            (false, true) => HOVERED_OUTLINE,
            _ => continue,
        };
        push_aabb_edges(&mut out, &node.bounds, node.position, color);
    }
    for link in &scene.links {
        let color = match (link.selected, link.hovered) {
            (true, _) => SELECTED_OUTLINE,
            (false, true) => HOVERED_OUTLINE,
            _ => continue,
        };
        let (a, b) = link.shaft;
        out.push(LineVertex {
            position: a.to_array(),
            color,
        });
        out.push(LineVertex {
            position: b.to_array(),
            color,
        });
    }
    out
}

fn build_preview_lines(scene: &RenderScene) -> Vec<LineVertex> {
    let mut out = Vec::new();
    if let Some((a, b)) = scene.link_cursor {
        out.push(LineVertex {
            position: a.to_array(),
            color: PREVIEW_LINE,
        });
        out.push(LineVertex {
            position: b.to_array(),
            color: PREVIEW_LINE,
        });
    }
    out
}
