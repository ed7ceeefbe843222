//! Backend state: device, queue, texture store, and the one-time
//! resources (samplers, fallback textures, camera uniform buffer).

use std::collections::HashMap;

use specular_core::host::{ShaderBackend, ShaderHandle, TargetRef, TextureDesc, TextureHandle};
use specular_core::PropertyId;
use wgpu::util::DeviceExt;

use crate::handle::HandleStore;
use crate::material::{BlitPipeline, CameraUniforms, WgpuPipelineState};
use crate::recorder::WgpuFrameRecorder;
use crate::shaders;
use crate::targets::TargetPool;

/// Global name under which the host publishes the scene depth buffer.
pub const DEPTH_TEXTURE_NAME: &str = "_CameraDepthTexture";
/// Global name under which the host publishes the scene normal buffer.
pub const NORMAL_TEXTURE_NAME: &str = "_CameraNormalsTexture";

/// GPU texture with its default view and shape.
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
}

/// Shared samplers for the effect bind groups.
pub struct Samplers {
    pub bilinear: wgpu::Sampler,
    pub point: wgpu::Sampler,
}

impl Samplers {
    fn new(device: &wgpu::Device) -> Self {
        Self {
            bilinear: device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("Bilinear Sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                ..Default::default()
            }),
            point: device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("Point Sampler"),
                address_mode_u: wgpu::AddressMode::Repeat,
                address_mode_v: wgpu::AddressMode::Repeat,
                mag_filter: wgpu::FilterMode::Nearest,
                min_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            }),
        }
    }
}

/// Create and fill an RGBA8 texture (dither map, 1x1 fallbacks).
fn upload_rgba8(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    width: u32,
    height: u32,
    pixels: &[u8],
    label: &str,
) -> GpuTexture {
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
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture {
        texture,
        view,
        format: wgpu::TextureFormat::Rgba8Unorm,
        width,
        height,
    }
}

/// Owns the wgpu-side state the reflection pass records against.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    textures: HandleStore<GpuTexture>,
    pool: TargetPool,
    globals: HashMap<PropertyId, TargetRef>,
    samplers: Samplers,
    blit_pipeline: BlitPipeline,
    fallback_white: GpuTexture,
    fallback_normal: GpuTexture,
    camera_buffer: wgpu::Buffer,
    depth_id: PropertyId,
    normal_id: PropertyId,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let samplers = Samplers::new(&device);
        let blit_pipeline = BlitPipeline::new(&device);
        let fallback_white =
            upload_rgba8(&device, &queue, 1, 1, &[255, 255, 255, 255], "Fallback White");
        // Flat +Z normal for frames where no normal buffer is published.
        let fallback_normal =
            upload_rgba8(&device, &queue, 1, 1, &[128, 128, 255, 255], "Fallback Normal");
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Uniforms"),
            contents: bytemuck::bytes_of(&CameraUniforms::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        log::info!("specular wgpu backend initialized");

        Self {
            device,
            queue,
            textures: HandleStore::new(),
            pool: TargetPool::new(),
            globals: HashMap::new(),
            samplers,
            blit_pipeline,
            fallback_white,
            fallback_normal,
            camera_buffer,
            depth_id: PropertyId::lookup(DEPTH_TEXTURE_NAME),
            normal_id: PropertyId::lookup(NORMAL_TEXTURE_NAME),
        }
    }

    /// Upload the camera matrices consumed by the trace sub-program.
    pub fn set_camera(&mut self, view: glam::Mat4, projection: glam::Mat4) {
        let uniforms = CameraUniforms::new(view, projection);
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    /// Wrap a host-owned texture (e.g. the camera color buffer) into a
    /// handle the pass can reference.
    pub fn register_external_target(&mut self, texture: wgpu::Texture) -> TextureHandle {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let (width, height, format) = (texture.width(), texture.height(), texture.format());
        TextureHandle(self.textures.insert(GpuTexture {
            texture,
            view,
            format,
            width,
            height,
        }))
    }

    /// Register a host texture and publish it under a global name
    /// (depth, normals) before recording begins.
    pub fn publish_external(&mut self, name: &str, texture: wgpu::Texture) -> TextureHandle {
        let handle = self.register_external_target(texture);
        self.globals
            .insert(PropertyId::lookup(name), TargetRef::External(handle));
        handle
    }

    /// Borrow out a recorder for one frame of command recording.
    pub fn begin_frame<'a>(
        &'a mut self,
        encoder: &'a mut wgpu::CommandEncoder,
    ) -> WgpuFrameRecorder<'a> {
        WgpuFrameRecorder {
            device: &self.device,
            encoder,
            pool: &mut self.pool,
            textures: &self.textures,
            globals: &mut self.globals,
            samplers: &self.samplers,
            blit_pipeline: &self.blit_pipeline,
            fallback_white: &self.fallback_white,
            fallback_normal: &self.fallback_normal,
            camera_buffer: &self.camera_buffer,
            depth_id: self.depth_id,
            normal_id: self.normal_id,
            current_target: None,
        }
    }

    /// End-of-frame cleanup: recycle temporaries still outstanding (the
    /// working target stays acquired through the frame and returns to
    /// the pool here).
    pub fn end_frame(&mut self) {
        self.pool.recycle_active();
    }

    pub fn pool(&self) -> &TargetPool {
        &self.pool
    }
}

impl ShaderBackend for WgpuBackend {
    type Pipeline = WgpuPipelineState;

    fn find_shader(&self, name: &str) -> Option<ShaderHandle> {
        shaders::find(name)
    }

    fn create_pipeline(&mut self, shader: ShaderHandle) -> WgpuPipelineState {
        let source = match shaders::source(shader) {
            Some(source) => source,
            None => {
                log::error!("unknown shader handle {shader:?}, using the reflection program");
                shaders::REFLECTION
            }
        };
        WgpuPipelineState::new(&self.device, source)
    }

    fn create_texture(&mut self, desc: &TextureDesc, pixels: &[u8]) -> TextureHandle {
        let texture = upload_rgba8(
            &self.device,
            &self.queue,
            desc.width,
            desc.height,
            pixels,
            "Effect Texture",
        );
        TextureHandle(self.textures.insert(texture))
    }
}
