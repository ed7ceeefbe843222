//! Host renderer contract.
//!
//! The pass never talks to a GPU API directly; it records work through
//! these traits, implemented by the host renderer (or the reference wgpu
//! backend). Everything here records commands into a per-frame command
//! stream that the host submits later; nothing submits to the device.

use crate::props::PropertyId;

/// Color format of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorFormat {
    /// 8-bit RGBA, used for the blur pyramid levels.
    Rgba8,
    /// 16-bit float RGBA, the usual camera color format.
    Rgba16Float,
}

/// Sampling filter of a render target or texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Point,
    Bilinear,
}

/// Camera target descriptor handed to [`crate::queue::RenderPass::configure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetDescriptor {
    pub width: u32,
    pub height: u32,
    pub color_format: ColorFormat,
    /// Depth buffer bit depth, 0 for none.
    pub depth_bits: u32,
}

/// Shape of a one-time texture upload with an RGBA8 payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub filter: FilterMode,
}

/// Opaque host texture handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// Opaque handle to a shader program resolved from the host registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u64);

/// A render target reference: either a target borrowed from the host
/// (the camera color buffer) or a pool temporary owned for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetRef {
    External(TextureHandle),
    Temporary(PropertyId),
}

/// Per-draw parameter surface of a compiled pipeline state.
///
/// Bindings are keyed by interned property name; a backend resolves them
/// into its own uniform layout when a draw is recorded.
pub trait PipelineState {
    fn set_float(&mut self, id: PropertyId, value: f32);
    fn set_texture(&mut self, id: PropertyId, texture: TextureHandle);
}

/// Construction-time services of the host graphics backend.
pub trait ShaderBackend {
    type Pipeline: PipelineState;

    /// Resolve a named shader program from the host registry.
    fn find_shader(&self, name: &str) -> Option<ShaderHandle>;

    /// Instantiate a pipeline state object for a resolved program.
    fn create_pipeline(&mut self, shader: ShaderHandle) -> Self::Pipeline;

    /// Create an immutable 2D texture from an RGBA8 payload.
    fn create_texture(&mut self, desc: &TextureDesc, pixels: &[u8]) -> TextureHandle;
}

/// Per-frame command-recording interface supplied by the host renderer.
///
/// Temporary targets acquired here are owned by the caller until the
/// matching [`FrameRecorder::release_temporary`]; the host recycles
/// anything still outstanding at end of frame.
pub trait FrameRecorder {
    type Pipeline: PipelineState;

    /// Allocate (or reuse) a temporary render target under `id`.
    fn acquire_temporary(&mut self, id: PropertyId, desc: &TargetDescriptor, filter: FilterMode);

    /// Return the temporary target `id` to the host pool.
    fn release_temporary(&mut self, id: PropertyId);

    /// Set the current render target, optionally clearing it first.
    fn set_render_target(&mut self, target: TargetRef, clear: Option<[f32; 4]>);

    /// Record a plain full-screen copy.
    fn blit(&mut self, src: TargetRef, dst: TargetRef);

    /// Record a full-screen draw through one of `pipeline`'s
    /// sub-programs.
    fn blit_with(&mut self, src: TargetRef, dst: TargetRef, pipeline: &Self::Pipeline, sub_pass: u32);

    /// Publish `src` under `id` so later passes in the same frame can
    /// sample it by name.
    fn publish_texture(&mut self, id: PropertyId, src: TargetRef);
}

/// Per-frame, per-camera state handed to [`crate::queue::RenderPass::execute`].
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    /// The camera color buffer, borrowed for this frame only.
    pub scene_color: TargetRef,
    /// Host-global post-processing toggle; `false` skips the pass
    /// silently.
    pub post_process_enabled: bool,
}
