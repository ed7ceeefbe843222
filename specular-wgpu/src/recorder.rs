//! Per-frame command recording for the reflection pass.

use std::collections::HashMap;

use specular_core::host::{FilterMode, FrameRecorder, TargetDescriptor, TargetRef};
use specular_core::PropertyId;
use wgpu::util::DeviceExt;

use crate::backend::{GpuTexture, Samplers};
use crate::handle::HandleStore;
use crate::material::{BlitPipeline, WgpuPipelineState};
use crate::targets::TargetPool;

/// A resolved render target: view plus the shape a draw needs.
struct Resolved<'t> {
    view: &'t wgpu::TextureView,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
}

fn resolve<'t>(
    pool: &'t TargetPool,
    textures: &'t HandleStore<GpuTexture>,
    target: TargetRef,
) -> Option<Resolved<'t>> {
    match target {
        TargetRef::External(handle) => textures.get(handle.0).map(|texture| Resolved {
            view: &texture.view,
            format: texture.format,
            width: texture.width,
            height: texture.height,
        }),
        TargetRef::Temporary(id) => pool.target(id).map(|target| Resolved {
            view: &target.color_view,
            format: target.format,
            width: target.width,
            height: target.height,
        }),
    }
}

/// Look up a published global texture, falling back to `fallback` when
/// the name was never published this frame.
fn global_view<'t>(
    pool: &'t TargetPool,
    textures: &'t HandleStore<GpuTexture>,
    globals: &HashMap<PropertyId, TargetRef>,
    id: PropertyId,
    fallback: &'t GpuTexture,
) -> &'t wgpu::TextureView {
    globals
        .get(&id)
        .and_then(|target| resolve(pool, textures, *target))
        .map(|resolved| resolved.view)
        .unwrap_or(&fallback.view)
}

/// Records the pass's full-screen work into a host command encoder.
///
/// Borrowed out of [`crate::WgpuBackend::begin_frame`] for the duration
/// of one frame's recording. Submission stays with the host.
pub struct WgpuFrameRecorder<'a> {
    pub(crate) device: &'a wgpu::Device,
    pub(crate) encoder: &'a mut wgpu::CommandEncoder,
    pub(crate) pool: &'a mut TargetPool,
    pub(crate) textures: &'a HandleStore<GpuTexture>,
    pub(crate) globals: &'a mut HashMap<PropertyId, TargetRef>,
    pub(crate) samplers: &'a Samplers,
    pub(crate) blit_pipeline: &'a BlitPipeline,
    pub(crate) fallback_white: &'a GpuTexture,
    pub(crate) fallback_normal: &'a GpuTexture,
    pub(crate) camera_buffer: &'a wgpu::Buffer,
    pub(crate) depth_id: PropertyId,
    pub(crate) normal_id: PropertyId,
    pub(crate) current_target: Option<TargetRef>,
}

impl WgpuFrameRecorder<'_> {
    /// The render target most recently set through the contract.
    pub fn current_target(&self) -> Option<TargetRef> {
        self.current_target
    }
}

impl FrameRecorder for WgpuFrameRecorder<'_> {
    type Pipeline = WgpuPipelineState;

    fn acquire_temporary(&mut self, id: PropertyId, desc: &TargetDescriptor, filter: FilterMode) {
        self.pool.acquire(self.device, id, desc, filter);
    }

    fn release_temporary(&mut self, id: PropertyId) {
        self.pool.release(id);
    }

    fn set_render_target(&mut self, target: TargetRef, clear: Option<[f32; 4]>) {
        self.current_target = Some(target);
        let Some(color) = clear else {
            return;
        };
        let Some(resolved) = resolve(self.pool, self.textures, target) else {
            log::error!("cannot clear unresolved target {target:?}");
            return;
        };
        self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Target"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: resolved.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: f64::from(color[0]),
                        g: f64::from(color[1]),
                        b: f64::from(color[2]),
                        a: f64::from(color[3]),
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            ..Default::default()
        });
    }

    fn blit(&mut self, src: TargetRef, dst: TargetRef) {
        if src == dst {
            // Sampling and rendering the same texture in one pass is
            // invalid; the destination already holds the source content.
            log::debug!("skipping self-blit on {src:?}");
            return;
        }
        let Some(src_t) = resolve(self.pool, self.textures, src) else {
            log::error!("blit source {src:?} is not resolvable");
            return;
        };
        let Some(dst_t) = resolve(self.pool, self.textures, dst) else {
            log::error!("blit destination {dst:?} is not resolvable");
            return;
        };
        let Some(pipeline) = self.blit_pipeline.variant(dst_t.format) else {
            log::error!("no blit pipeline for {:?}", dst_t.format);
            return;
        };

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Blit BG"),
            layout: self.blit_pipeline.bind_group_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(src_t.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.samplers.bilinear),
                },
            ],
        });

        let mut pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Blit"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: dst_t.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            ..Default::default()
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }

    fn blit_with(
        &mut self,
        src: TargetRef,
        dst: TargetRef,
        pipeline: &WgpuPipelineState,
        sub_pass: u32,
    ) {
        if src == dst {
            log::debug!("skipping self-blit on {src:?}");
            return;
        }
        let Some(src_t) = resolve(self.pool, self.textures, src) else {
            log::error!("blit source {src:?} is not resolvable");
            return;
        };
        let Some(dst_t) = resolve(self.pool, self.textures, dst) else {
            log::error!("blit destination {dst:?} is not resolvable");
            return;
        };
        let Some(render_pipeline) = pipeline.variant(sub_pass, dst_t.format) else {
            log::error!(
                "no pipeline variant for sub-program {sub_pass} targeting {:?}",
                dst_t.format
            );
            return;
        };

        let uniforms = pipeline.effect_uniforms([
            1.0 / src_t.width as f32,
            1.0 / src_t.height as f32,
        ]);
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Reflection Effect Uniforms"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let dither_view = pipeline
            .dither_texture()
            .and_then(|handle| self.textures.get(handle.0))
            .map(|texture| &texture.view)
            .unwrap_or(&self.fallback_white.view);
        let depth_view = global_view(
            self.pool,
            self.textures,
            self.globals,
            self.depth_id,
            self.fallback_white,
        );
        let normal_view = global_view(
            self.pool,
            self.textures,
            self.globals,
            self.normal_id,
            self.fallback_normal,
        );

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Reflection BG"),
            layout: pipeline.bind_group_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(src_t.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.samplers.bilinear),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(dither_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.samplers.point),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: self.camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::TextureView(depth_view),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: wgpu::BindingResource::TextureView(normal_view),
                },
            ],
        });

        let mut pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Reflection Sub-Program"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: dst_t.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            ..Default::default()
        });
        pass.set_pipeline(render_pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }

    fn publish_texture(&mut self, id: PropertyId, src: TargetRef) {
        self.globals.insert(id, src);
    }
}
