//! Presents the current frame buffer: one RGBA8 texture at the video's
//! native size, blitted to the window with letterbox/pillarbox fit.

use bytemuck::{Pod, Zeroable};
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, BufferBindingType, ColorTargetState,
    CommandEncoder, Device, FragmentState, PipelineCompilationOptions, PipelineLayoutDescriptor,
    PrimitiveState, Queue, RenderPipeline, SamplerBindingType, ShaderStages, TextureFormat,
    TextureSampleType, TextureViewDimension, VertexState,
};

const FRAME_BLIT_FS: &str = include_str!("../../../../assets/shaders/frame_blit.wgsl");

/// Fullscreen triangle vertex shader with UVs: 3 vertices cover the screen
/// without a vertex buffer.
const FULLSCREEN_TRIANGLE_VS: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4f,
    @location(0) uv: vec2f,
}

@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> VertexOutput {
    let x = f32(i32(vi & 1u) * 4) - 1.0;
    let y = f32(i32(vi & 2u) * 2) - 1.0;
    var out: VertexOutput;
    out.position = vec4f(x, y, 0.0, 1.0);
    out.uv = vec2f((x + 1.0) * 0.5, (1.0 - y) * 0.5);
    return out;
}
"#;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct FitUniforms {
    scale: [f32; 2],
    offset: [f32; 2],
}

pub struct FrameBlit {
    texture: wgpu::Texture,
    pipeline: RenderPipeline,
    bind_group: BindGroup,
    uniform_buffer: wgpu::Buffer,
    frame_width: u32,
    frame_height: u32,
}

impl FrameBlit {
    pub fn new(
        device: &Device,
        queue: &Queue,
        surface_format: TextureFormat,
        frame_width: u32,
        frame_height: u32,
        window_width: u32,
        window_height: u32,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("video-frame"),
            size: wgpu::Extent3d {
                width: frame_width,
                height: frame_height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("video-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        let uniforms = compute_fit(frame_width, frame_height, window_width, window_height);
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("video-fit-uniforms"),
            size: std::mem::size_of::<FitUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("video-blit-bgl"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: std::num::NonZeroU64::new(
                            std::mem::size_of::<FitUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
            ],
        });

        let full_source = format!("{FULLSCREEN_TRIANGLE_VS}\n{FRAME_BLIT_FS}");
        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("video-blit"),
            source: wgpu::ShaderSource::Wgsl(full_source.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("video-blit-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("video-blit-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader_module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &shader_module,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: PipelineCompilationOptions::default(),
            }),
            primitive: PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("video-blit-bg"),
            layout: &bind_group_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(&view),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(&sampler),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        });

        Self {
            texture,
            pipeline,
            bind_group,
            uniform_buffer,
            frame_width,
            frame_height,
        }
    }

    /// Upload a presented frame. Called only on ticks that performed a
    /// display read; other ticks leave the previous image on screen.
    pub fn upload(&self, queue: &Queue, frame: &[u8]) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            frame,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.frame_width * 4),
                rows_per_image: Some(self.frame_height),
            },
            wgpu::Extent3d {
                width: self.frame_width,
                height: self.frame_height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Recompute the letterbox transform for a new window size.
    pub fn resize(&mut self, queue: &Queue, window_width: u32, window_height: u32) {
        let uniforms = compute_fit(
            self.frame_width,
            self.frame_height,
            window_width,
            window_height,
        );
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    pub fn render(&self, encoder: &mut CommandEncoder, target: &wgpu::TextureView) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("video-blit"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

/// Letterbox scale and offset fitting the frame into the viewport.
fn compute_fit(frame_w: u32, frame_h: u32, viewport_w: u32, viewport_h: u32) -> FitUniforms {
    let frame_aspect = frame_w as f32 / frame_h.max(1) as f32;
    let viewport_aspect = viewport_w as f32 / viewport_h.max(1) as f32;

    let (scale_x, scale_y) = if frame_aspect > viewport_aspect {
        // Frame is wider: fit width, letterbox top/bottom
        (1.0, viewport_aspect / frame_aspect)
    } else {
        // Frame is taller: fit height, pillarbox left/right
        (frame_aspect / viewport_aspect, 1.0)
    };

    FitUniforms {
        scale: [scale_x, scale_y],
        offset: [(1.0 - scale_x) * 0.5, (1.0 - scale_y) * 0.5],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_aspect_fills_viewport() {
        let fit = compute_fit(1920, 1080, 960, 540);
        assert_eq!(fit.scale, [1.0, 1.0]);
        assert_eq!(fit.offset, [0.0, 0.0]);
    }

    #[test]
    fn wide_frame_letterboxes_vertically() {
        let fit = compute_fit(200, 100, 100, 100);
        assert_eq!(fit.scale[0], 1.0);
        assert!((fit.scale[1] - 0.5).abs() < 1e-6);
        assert!((fit.offset[1] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn tall_frame_pillarboxes_horizontally() {
        let fit = compute_fit(100, 200, 100, 100);
        assert!((fit.scale[0] - 0.5).abs() < 1e-6);
        assert_eq!(fit.scale[1], 1.0);
        assert!((fit.offset[0] - 0.25).abs() < 1e-6);
    }
}
