//! Record one synthetic reflection frame on a headless device.
//!
//! Run with `RUST_LOG=debug cargo run --example headless`.

use specular_core::host::{ColorFormat, FrameContext, TargetDescriptor, TargetRef};
use specular_core::{PassQueue, ReflectionFeature, ReflectionSettings};
use specular_wgpu::WgpuBackend;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

fn main() {
    env_logger::init();
    pollster::block_on(run());
}

async fn run() {
    let instance = wgpu::Instance::default();
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions::default())
        .await
        .expect("no compatible adapter");
    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor::default(), None)
        .await
        .expect("device request failed");

    let mut backend = WgpuBackend::new(device.clone(), queue.clone());

    // Stand-in for the camera color buffer the host would own.
    let scene_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Scene Color"),
        size: wgpu::Extent3d {
            width: WIDTH,
            height: HEIGHT,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: specular_wgpu::HDR_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let scene_handle = backend.register_external_target(scene_texture);

    backend.set_camera(
        glam::Mat4::look_at_rh(glam::Vec3::new(0.0, 2.0, 6.0), glam::Vec3::ZERO, glam::Vec3::Y),
        glam::Mat4::perspective_rh(1.0, WIDTH as f32 / HEIGHT as f32, 0.1, 100.0),
    );

    let mut feature = ReflectionFeature::new(ReflectionSettings::default());
    feature.create(&mut backend);

    let descriptor = TargetDescriptor {
        width: WIDTH,
        height: HEIGHT,
        color_format: ColorFormat::Rgba16Float,
        depth_bits: 32,
    };
    let frame = FrameContext {
        scene_color: TargetRef::External(scene_handle),
        post_process_enabled: true,
    };

    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Frame") });
    {
        let mut recorder = backend.begin_frame(&mut encoder);
        let mut queue_of_passes = PassQueue::new();
        feature.enqueue(&mut queue_of_passes);
        queue_of_passes.run(&mut recorder, &descriptor, &frame);
    }
    backend.end_frame();

    queue.submit([encoder.finish()]);
    device.poll(wgpu::Maintain::Wait);

    println!(
        "recorded one reflection frame ({}x{}, {} pooled targets retained)",
        WIDTH,
        HEIGHT,
        backend.pool().free_count()
    );
}
