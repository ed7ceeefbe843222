//! Pass scheduling: a per-frame pass list driven by the host renderer.

use crate::host::{FrameContext, FrameRecorder, TargetDescriptor};

/// A render pass registered into the host's pass list.
///
/// Within a frame `configure` always runs before `execute`, and a
/// frame's execution (including release of its scratch targets)
/// completes before the next frame's configuration begins. Both run
/// synchronously on the host's render thread.
pub trait RenderPass<R: FrameRecorder> {
    /// Allocate frame-wide resources for the camera described by
    /// `descriptor`.
    fn configure(&mut self, recorder: &mut R, descriptor: &TargetDescriptor);

    /// Record this frame's draw sequence.
    fn execute(&mut self, recorder: &mut R, frame: &FrameContext);
}

/// Points in the frame where a pass may be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PassEvent {
    AfterOpaques,
    AfterTransparents,
    AfterPostProcessing,
}

/// Per-frame ordered list of passes.
///
/// Rebuilt every frame by the host; passes live with their owning
/// features and are only borrowed here.
pub struct PassQueue<'a, R: FrameRecorder> {
    entries: Vec<(PassEvent, &'a mut dyn RenderPass<R>)>,
}

impl<'a, R: FrameRecorder> PassQueue<'a, R> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Register `pass` to run at `event` this frame.
    pub fn enqueue(&mut self, event: PassEvent, pass: &'a mut dyn RenderPass<R>) {
        self.entries.push((event, pass));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every registered pass in event order: all `configure` calls
    /// first, then all `execute` calls. The sort is stable, so passes
    /// sharing an event keep their registration order.
    pub fn run(&mut self, recorder: &mut R, descriptor: &TargetDescriptor, frame: &FrameContext) {
        self.entries.sort_by_key(|(event, _)| *event);
        for (_, pass) in self.entries.iter_mut() {
            pass.configure(recorder, descriptor);
        }
        for (_, pass) in self.entries.iter_mut() {
            pass.execute(recorder, frame);
        }
    }
}

impl<R: FrameRecorder> Default for PassQueue<'_, R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ColorFormat, FilterMode, PipelineState, TargetRef, TextureHandle};
    use crate::props::PropertyId;

    struct NullPipeline;

    impl PipelineState for NullPipeline {
        fn set_float(&mut self, _id: PropertyId, _value: f32) {}
        fn set_texture(&mut self, _id: PropertyId, _texture: TextureHandle) {}
    }

    #[derive(Default)]
    struct NullRecorder;

    impl FrameRecorder for NullRecorder {
        type Pipeline = NullPipeline;

        fn acquire_temporary(
            &mut self,
            _id: PropertyId,
            _desc: &TargetDescriptor,
            _filter: FilterMode,
        ) {
        }
        fn release_temporary(&mut self, _id: PropertyId) {}
        fn set_render_target(&mut self, _target: TargetRef, _clear: Option<[f32; 4]>) {}
        fn blit(&mut self, _src: TargetRef, _dst: TargetRef) {}
        fn blit_with(
            &mut self,
            _src: TargetRef,
            _dst: TargetRef,
            _pipeline: &NullPipeline,
            _sub_pass: u32,
        ) {
        }
        fn publish_texture(&mut self, _id: PropertyId, _src: TargetRef) {}
    }

    struct ProbePass {
        tag: &'static str,
        trace: std::rc::Rc<std::cell::RefCell<Vec<String>>>,
    }

    impl RenderPass<NullRecorder> for ProbePass {
        fn configure(&mut self, _recorder: &mut NullRecorder, _descriptor: &TargetDescriptor) {
            self.trace.borrow_mut().push(format!("configure:{}", self.tag));
        }

        fn execute(&mut self, _recorder: &mut NullRecorder, _frame: &FrameContext) {
            self.trace.borrow_mut().push(format!("execute:{}", self.tag));
        }
    }

    fn descriptor() -> TargetDescriptor {
        TargetDescriptor {
            width: 64,
            height: 64,
            color_format: ColorFormat::Rgba8,
            depth_bits: 0,
        }
    }

    #[test]
    fn passes_run_in_event_order_configure_before_execute() {
        let trace = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut late = ProbePass { tag: "late", trace: trace.clone() };
        let mut early = ProbePass { tag: "early", trace: trace.clone() };

        let mut queue = PassQueue::new();
        queue.enqueue(PassEvent::AfterPostProcessing, &mut late);
        queue.enqueue(PassEvent::AfterTransparents, &mut early);
        assert_eq!(queue.len(), 2);

        let mut recorder = NullRecorder;
        let frame = FrameContext {
            scene_color: TargetRef::External(TextureHandle(1)),
            post_process_enabled: true,
        };
        queue.run(&mut recorder, &descriptor(), &frame);

        assert_eq!(
            *trace.borrow(),
            vec![
                "configure:early",
                "configure:late",
                "execute:early",
                "execute:late",
            ]
        );
    }
}
