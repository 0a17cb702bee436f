//! Offscreen wgpu rendering of the patch tree, for runs with `--gpu`.

use glam::{Mat4, Vec3};
use tessera_config::CameraConfig;
use tessera_lod::LodSettings;
use tessera_render::{CameraUniform, GpuTerrainBackend, TerrainPipeline, draw_terrain};
use tracing::{info, warn};

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

pub struct OffscreenRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pub backend: GpuTerrainBackend,
    pipeline: TerrainPipeline,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    projection: Mat4,
}

impl OffscreenRenderer {
    /// Set up a headless device and render target. `None` when no adapter is
    /// available.
    pub fn new(settings: &LodSettings, camera: &CameraConfig, wireframe: bool) -> Option<Self> {
        let (device, queue, wireframe) = pollster::block_on(request_device(wireframe))?;

        let height = camera.viewport_height.max(1);
        let width = height * 16 / 9;
        let color_view = create_target(&device, "terrain-color", COLOR_FORMAT, width, height);
        let depth_view = create_target(&device, "terrain-depth", DEPTH_FORMAT, width, height);

        let pipeline = TerrainPipeline::new(&device, COLOR_FORMAT, Some(DEPTH_FORMAT), wireframe);
        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("terrain-camera-uniform"),
            size: std::mem::size_of::<CameraUniform>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("terrain-camera-bg"),
            layout: &pipeline.camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let backend = GpuTerrainBackend::new(&device, &queue, settings);
        // Reverse-Z to match the pipeline's depth compare.
        let projection = Mat4::perspective_infinite_reverse_rh(
            camera.vertical_fov_degrees.to_radians(),
            width as f32 / height as f32,
            camera.near_plane,
        );

        info!("Offscreen target {width}x{height}, wireframe: {wireframe}");
        Some(Self {
            device,
            queue,
            backend,
            pipeline,
            camera_buffer,
            camera_bind_group,
            color_view,
            depth_view,
            projection,
        })
    }

    /// Draw whatever the backend recorded this frame.
    pub fn render(&self, eye: Vec3, target: Vec3, height_range: [f32; 2]) {
        let view = Mat4::look_at_rh(eye, target, Vec3::Y);
        let uniform = CameraUniform {
            view_proj: (self.projection * view).to_cols_array_2d(),
            height_range: [height_range[0], height_range[1], 0.0, 0.0],
        };
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&uniform));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("terrain-frame"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("terrain-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.55,
                            g: 0.7,
                            b: 0.9,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(0.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            draw_terrain(
                &mut render_pass,
                &self.pipeline,
                &self.camera_bind_group,
                &self.backend,
            );
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

async fn request_device(wireframe: bool) -> Option<(wgpu::Device, wgpu::Queue, bool)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .ok()?;

    let line_mode = adapter
        .features()
        .contains(wgpu::Features::POLYGON_MODE_LINE);
    if wireframe && !line_mode {
        warn!("Adapter lacks POLYGON_MODE_LINE, drawing filled patches");
    }
    let wireframe = wireframe && line_mode;
    let required_features = if wireframe {
        wgpu::Features::POLYGON_MODE_LINE
    } else {
        wgpu::Features::empty()
    };

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("tessera-device"),
            required_features,
            ..Default::default()
        })
        .await
        .ok()?;
    Some((device, queue, wireframe))
}

fn create_target(
    device: &wgpu::Device,
    label: &str,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
