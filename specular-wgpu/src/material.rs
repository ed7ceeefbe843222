//! Pipeline-state objects: the reflection program's three sub-program
//! pipelines with staged named parameters, and the plain blit pipeline
//! used for resolve/composite copies.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use specular_core::host::{PipelineState, TextureHandle};
use specular_core::props::names;
use specular_core::PropertyId;

use crate::shaders;
use crate::targets::{HDR_FORMAT, LDR_FORMAT};

/// Scalar uniform block shared by every reflection sub-program.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct EffectUniforms {
    /// max_step, step_size, max_distance, thickness.
    pub trace_params: [f32; 4],
    /// blur_range, unused, 1/src_width, 1/src_height.
    pub blur_params: [f32; 4],
}

/// Camera matrices consumed by the trace sub-program.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct CameraUniforms {
    pub projection: [[f32; 4]; 4],
    pub inv_projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
}

impl CameraUniforms {
    pub fn new(view: glam::Mat4, projection: glam::Mat4) -> Self {
        Self {
            projection: projection.to_cols_array_2d(),
            inv_projection: projection.inverse().to_cols_array_2d(),
            view: view.to_cols_array_2d(),
        }
    }
}

impl Default for CameraUniforms {
    fn default() -> Self {
        Self::new(glam::Mat4::IDENTITY, glam::Mat4::IDENTITY)
    }
}

/// Ids of the named parameters the uniform block is assembled from.
struct UniformIds {
    max_step: PropertyId,
    step_size: PropertyId,
    max_distance: PropertyId,
    thickness: PropertyId,
    blur_range: PropertyId,
    dither_map: PropertyId,
}

impl UniformIds {
    fn resolve() -> Self {
        Self {
            max_step: PropertyId::lookup(names::MAX_STEP),
            step_size: PropertyId::lookup(names::STEP_SIZE),
            max_distance: PropertyId::lookup(names::MAX_DISTANCE),
            thickness: PropertyId::lookup(names::THICKNESS),
            blur_range: PropertyId::lookup(names::BLUR_RANGE),
            dither_map: PropertyId::lookup(names::DITHER_MAP),
        }
    }
}

fn fragment_entry(sub_pass: u32) -> &'static str {
    match sub_pass {
        1 => "fs_downsample",
        2 => "fs_upsample",
        _ => "fs_trace",
    }
}

/// Compiled reflection program plus its staged per-draw parameters.
///
/// One pipeline variant exists per (sub-program, output format) pair;
/// all variants share the module, layout and bind group layout. Named
/// floats and textures set through [`PipelineState`] are resolved into
/// the uniform block when a draw is recorded.
pub struct WgpuPipelineState {
    bind_group_layout: wgpu::BindGroupLayout,
    variants: HashMap<(u32, wgpu::TextureFormat), wgpu::RenderPipeline>,
    floats: HashMap<PropertyId, f32>,
    textures: HashMap<PropertyId, TextureHandle>,
    ids: UniformIds,
}

impl WgpuPipelineState {
    pub fn new(device: &wgpu::Device, source: &str) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Reflection Program"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let bind_group_layout = create_effect_bind_group_layout(device);
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Reflection Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let mut variants = HashMap::new();
        for format in [HDR_FORMAT, LDR_FORMAT] {
            for sub_pass in 0..3u32 {
                variants.insert(
                    (sub_pass, format),
                    create_sub_program_pipeline(device, &module, &layout, sub_pass, format),
                );
            }
        }

        Self {
            bind_group_layout,
            variants,
            floats: HashMap::new(),
            textures: HashMap::new(),
            ids: UniformIds::resolve(),
        }
    }

    pub(crate) fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    pub(crate) fn variant(
        &self,
        sub_pass: u32,
        format: wgpu::TextureFormat,
    ) -> Option<&wgpu::RenderPipeline> {
        self.variants.get(&(sub_pass, format))
    }

    /// Assemble the uniform block from the staged floats; unset names
    /// read as zero.
    pub(crate) fn effect_uniforms(&self, texel_size: [f32; 2]) -> EffectUniforms {
        let float = |id: PropertyId| self.floats.get(&id).copied().unwrap_or(0.0);
        EffectUniforms {
            trace_params: [
                float(self.ids.max_step),
                float(self.ids.step_size),
                float(self.ids.max_distance),
                float(self.ids.thickness),
            ],
            blur_params: [float(self.ids.blur_range), 0.0, texel_size[0], texel_size[1]],
        }
    }

    pub(crate) fn dither_texture(&self) -> Option<TextureHandle> {
        self.textures.get(&self.ids.dither_map).copied()
    }
}

impl PipelineState for WgpuPipelineState {
    fn set_float(&mut self, id: PropertyId, value: f32) {
        self.floats.insert(id, value);
    }

    fn set_texture(&mut self, id: PropertyId, texture: TextureHandle) {
        self.textures.insert(id, texture);
    }
}

/// Bind group layout shared by the three reflection sub-programs.
fn create_effect_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    };
    let sampler_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    };
    let uniform_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Reflection BGL"),
        entries: &[
            // 0: blit source
            texture_entry(0),
            // 1: bilinear sampler
            sampler_entry(1),
            // 2: dither map
            texture_entry(2),
            // 3: point sampler
            sampler_entry(3),
            // 4: effect uniforms
            uniform_entry(4),
            // 5: camera uniforms
            uniform_entry(5),
            // 6: scene depth
            texture_entry(6),
            // 7: scene normals
            texture_entry(7),
        ],
    })
}

fn create_sub_program_pipeline(
    device: &wgpu::Device,
    module: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    sub_pass: u32,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let entry = fragment_entry(sub_pass);
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("Reflection {entry}")),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some(entry),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Plain copy pipeline used for resolve/composite blits.
pub struct BlitPipeline {
    bind_group_layout: wgpu::BindGroupLayout,
    variants: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
}

impl BlitPipeline {
    pub fn new(device: &wgpu::Device) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Blit"),
            source: wgpu::ShaderSource::Wgsl(shaders::BLIT.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Blit BGL"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Blit Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let mut variants = HashMap::new();
        for format in [HDR_FORMAT, LDR_FORMAT] {
            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Blit Pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: &[],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some("fs_main"),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });
            variants.insert(format, pipeline);
        }

        Self {
            bind_group_layout,
            variants,
        }
    }

    pub(crate) fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    pub(crate) fn variant(&self, format: wgpu::TextureFormat) -> Option<&wgpu::RenderPipeline> {
        self.variants.get(&format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_entries_cover_the_three_sub_programs() {
        assert_eq!(fragment_entry(0), "fs_trace");
        assert_eq!(fragment_entry(1), "fs_downsample");
        assert_eq!(fragment_entry(2), "fs_upsample");
    }

    #[test]
    fn camera_uniforms_invert_projection() {
        let projection = glam::Mat4::perspective_rh(1.2, 16.0 / 9.0, 0.1, 100.0);
        let uniforms = CameraUniforms::new(glam::Mat4::IDENTITY, projection);
        let inv = glam::Mat4::from_cols_array_2d(&uniforms.inv_projection);
        let round_trip = projection * inv;
        for (i, column) in round_trip.to_cols_array_2d().iter().enumerate() {
            for (j, value) in column.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((value - expected).abs() < 1e-5);
            }
        }
    }
}
