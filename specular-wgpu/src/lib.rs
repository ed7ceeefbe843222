//! wgpu reference backend for the specular screen-space reflection pass.
//!
//! Implements the `specular-core` host contract against a wgpu device:
//! a temporary render-target pool, a pipeline-state object exposing the
//! three reflection sub-programs, and a per-frame recorder that encodes
//! full-screen blits into a host-provided command encoder. The host
//! submits the encoder; nothing here touches the queue except one-time
//! texture uploads and camera uniform writes.

mod backend;
mod handle;
mod material;
mod recorder;
pub mod shaders;
mod targets;

pub use backend::{GpuTexture, WgpuBackend, DEPTH_TEXTURE_NAME, NORMAL_TEXTURE_NAME};
pub use material::{BlitPipeline, CameraUniforms, EffectUniforms, WgpuPipelineState};
pub use recorder::WgpuFrameRecorder;
pub use targets::{create_render_target, RenderTarget, TargetPool, HDR_FORMAT, LDR_FORMAT};
