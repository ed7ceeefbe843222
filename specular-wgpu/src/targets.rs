//! Render-target creation and the temporary-target pool.

use std::collections::HashMap;

use specular_core::host::{ColorFormat, FilterMode, TargetDescriptor};
use specular_core::PropertyId;

/// HDR color format used for camera-resolution targets.
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// 8-bit format used for the blur pyramid levels.
pub const LDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Map a host color format onto the wgpu format it is backed by.
pub fn texture_format(format: ColorFormat) -> wgpu::TextureFormat {
    match format {
        ColorFormat::Rgba8 => LDR_FORMAT,
        ColorFormat::Rgba16Float => HDR_FORMAT,
    }
}

/// A pooled color target.
///
/// Requested depth bits participate in pool keying only; the blit work
/// recorded by this backend carries no depth attachment.
pub struct RenderTarget {
    pub color_texture: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
}

/// Create a color render target.
pub fn create_render_target(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    label: &str,
    format: wgpu::TextureFormat,
) -> RenderTarget {
    let color_texture = device.create_texture(&wgpu::TextureDescriptor {
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
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let color_view = color_texture.create_view(&wgpu::TextureViewDescriptor::default());

    RenderTarget {
        color_texture,
        color_view,
        format,
        width,
        height,
    }
}

/// Shape key a pooled target is matched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub width: u32,
    pub height: u32,
    pub format: ColorFormat,
    pub filter: FilterMode,
    pub depth_bits: u32,
}

impl PoolKey {
    pub fn new(desc: &TargetDescriptor, filter: FilterMode) -> Self {
        Self {
            width: desc.width,
            height: desc.height,
            format: desc.color_format,
            filter,
            depth_bits: desc.depth_bits,
        }
    }
}

/// Temporary render targets keyed by shape and reused across frames.
///
/// `acquire`/`release` implement the host contract's temporary-target
/// lifecycle; targets released during a frame become available for the
/// next acquire of the same shape.
pub struct TargetPool {
    free: Vec<(PoolKey, RenderTarget)>,
    active: HashMap<PropertyId, (PoolKey, RenderTarget)>,
}

impl TargetPool {
    pub fn new() -> Self {
        Self {
            free: Vec::new(),
            active: HashMap::new(),
        }
    }

    /// Acquire a target under `id`, reusing a compatible free one.
    /// Re-acquiring an id that is already active with the same shape
    /// keeps the existing target; a shape change swaps it out.
    pub fn acquire(
        &mut self,
        device: &wgpu::Device,
        id: PropertyId,
        desc: &TargetDescriptor,
        filter: FilterMode,
    ) {
        let key = PoolKey::new(desc, filter);
        if let Some((active_key, _)) = self.active.get(&id) {
            if *active_key == key {
                return;
            }
            if let Some(entry) = self.active.remove(&id) {
                self.free.push(entry);
            }
        }

        let target = match self.free.iter().position(|(free_key, _)| *free_key == key) {
            Some(index) => self.free.swap_remove(index).1,
            None => create_render_target(
                device,
                desc.width,
                desc.height,
                "Pooled Target",
                texture_format(desc.color_format),
            ),
        };
        self.active.insert(id, (key, target));
    }

    /// Return the temporary target `id` to the free list.
    pub fn release(&mut self, id: PropertyId) {
        match self.active.remove(&id) {
            Some(entry) => self.free.push(entry),
            None => log::warn!("released temporary target {id:?} that was not active"),
        }
    }

    /// End-of-frame cleanup: recycle every target still active.
    pub fn recycle_active(&mut self) {
        let outstanding: Vec<PropertyId> = self.active.keys().copied().collect();
        for id in outstanding {
            self.release(id);
        }
    }

    /// The active target registered under `id`.
    pub fn target(&self, id: PropertyId) -> Option<&RenderTarget> {
        self.active.get(&id).map(|(_, target)| target)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }
}

impl Default for TargetPool {
    fn default() -> Self {
        Self::new()
    }
}
