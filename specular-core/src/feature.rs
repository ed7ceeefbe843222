//! Plugin-registration glue binding the reflection pass into a host
//! pass list.

use crate::host::{FrameRecorder, ShaderBackend};
use crate::pass::ScreenSpaceReflectionPass;
use crate::queue::{PassEvent, PassQueue};
use crate::settings::ReflectionSettings;

/// Owns the effect settings and its pass across frames.
///
/// The host calls [`ReflectionFeature::create`] once when the feature is
/// activated, then [`ReflectionFeature::enqueue`] every frame to register
/// the pass for that frame. Settings edits take effect on the next
/// enqueue.
pub struct ReflectionFeature<B: ShaderBackend> {
    pub settings: ReflectionSettings,
    pass: Option<ScreenSpaceReflectionPass<B>>,
}

impl<B: ShaderBackend> ReflectionFeature<B> {
    pub fn new(settings: ReflectionSettings) -> Self {
        Self { settings, pass: None }
    }

    /// One-time pass construction against the host backend.
    pub fn create(&mut self, backend: &mut B) {
        self.pass = Some(ScreenSpaceReflectionPass::new(backend, self.settings));
    }

    /// Register the pass for this frame, scheduled after transparent
    /// geometry. Does nothing until `create` has run.
    pub fn enqueue<'a, R>(&'a mut self, queue: &mut PassQueue<'a, R>)
    where
        R: FrameRecorder<Pipeline = B::Pipeline>,
    {
        if let Some(pass) = self.pass.as_mut() {
            pass.set_settings(self.settings);
            queue.enqueue(PassEvent::AfterTransparents, pass);
        }
    }

    /// The pass, once created.
    pub fn pass(&self) -> Option<&ScreenSpaceReflectionPass<B>> {
        self.pass.as_ref()
    }
}
