//! The screen-space reflection pass: a fixed sequence of full-screen
//! draws (ray-marched trace, blur pyramid build and collapse, resolve,
//! composite) recorded once per frame per camera.

use log::error;

use crate::dither;
use crate::error::PassError;
use crate::host::{
    ColorFormat, FilterMode, FrameContext, FrameRecorder, PipelineState, ShaderBackend,
    TargetDescriptor, TargetRef, TextureDesc,
};
use crate::props::{names, PropertyId};
use crate::queue::RenderPass;
use crate::settings::ReflectionSettings;

/// Registry name of the reflection shader program.
pub const SHADER_NAME: &str = "specular/screen_space_reflection";

/// Sub-program indices of the reflection program.
pub const SUB_PASS_TRACE: u32 = 0;
pub const SUB_PASS_DOWNSAMPLE: u32 = 1;
pub const SUB_PASS_UPSAMPLE: u32 = 2;

const CLEAR_BLACK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Scalar uniform ids, resolved once at construction.
struct ScalarIds {
    max_step: PropertyId,
    step_size: PropertyId,
    max_distance: PropertyId,
    thickness: PropertyId,
    blur_range: PropertyId,
}

impl ScalarIds {
    fn resolve() -> Self {
        Self {
            max_step: PropertyId::lookup(names::MAX_STEP),
            step_size: PropertyId::lookup(names::STEP_SIZE),
            max_distance: PropertyId::lookup(names::MAX_DISTANCE),
            thickness: PropertyId::lookup(names::THICKNESS),
            blur_range: PropertyId::lookup(names::BLUR_RANGE),
        }
    }
}

/// Per-level temporary target ids.
///
/// The name → id mapping only changes shape with `blur_times`, so the
/// ids are cached here and rebuilt on that change instead of being
/// re-resolved every frame.
struct PyramidIds {
    down: Vec<PropertyId>,
    up: Vec<PropertyId>,
}

impl PyramidIds {
    fn resolve(levels: u32) -> Self {
        Self {
            down: (0..levels)
                .map(|i| PropertyId::lookup(&format!("_DownSample{i}")))
                .collect(),
            up: (0..levels)
                .map(|i| PropertyId::lookup(&format!("_UpSample{i}")))
                .collect(),
        }
    }

    fn levels(&self) -> u32 {
        self.down.len() as u32
    }
}

/// Scratch targets acquired during one execution.
///
/// Every id recorded here is released exactly once before the frame's
/// recording returns, whatever path execution takes.
struct ScratchTargets {
    acquired: Vec<PropertyId>,
}

impl ScratchTargets {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            acquired: Vec::with_capacity(capacity),
        }
    }

    fn acquire<R: FrameRecorder>(
        &mut self,
        recorder: &mut R,
        id: PropertyId,
        desc: &TargetDescriptor,
    ) {
        recorder.acquire_temporary(id, desc, FilterMode::Bilinear);
        self.acquired.push(id);
    }

    fn release_all<R: FrameRecorder>(mut self, recorder: &mut R) {
        for id in self.acquired.drain(..) {
            recorder.release_temporary(id);
        }
    }
}

/// Orchestrates the reflection effect against the host contract.
///
/// Owns the compiled pipeline state and the one-time dither texture;
/// everything else is per-frame transient state. The working target is
/// acquired under the `_SSRTexture` id so downstream effects can sample
/// the raw reflection buffer by name.
pub struct ScreenSpaceReflectionPass<B: ShaderBackend> {
    settings: ReflectionSettings,
    pipeline: Option<B::Pipeline>,
    scalars: ScalarIds,
    ssr_id: PropertyId,
    pyramid: PyramidIds,
    descriptor: Option<TargetDescriptor>,
}

impl<B: ShaderBackend> ScreenSpaceReflectionPass<B> {
    /// Create the pass, resolving the reflection program and building its
    /// one-time resources. A missing program is reported once and leaves
    /// the pass permanently disabled; per-frame calls then do nothing
    /// beyond the draw-time diagnostic.
    pub fn new(backend: &mut B, settings: ReflectionSettings) -> Self {
        let pipeline = match Self::create_pipeline_state(backend) {
            Ok(pipeline) => Some(pipeline),
            Err(err) => {
                error!("{err}");
                None
            }
        };

        Self {
            settings,
            pipeline,
            scalars: ScalarIds::resolve(),
            ssr_id: PropertyId::lookup(names::SSR_TEXTURE),
            pyramid: PyramidIds::resolve(settings.blur_times),
            descriptor: None,
        }
    }

    fn create_pipeline_state(backend: &mut B) -> Result<B::Pipeline, PassError> {
        let shader = backend
            .find_shader(SHADER_NAME)
            .ok_or_else(|| PassError::ShaderMissing {
                name: SHADER_NAME.to_owned(),
            })?;
        let mut pipeline = backend.create_pipeline(shader);

        let dither_map = backend.create_texture(
            &TextureDesc {
                width: dither::DITHER_DIM,
                height: dither::DITHER_DIM,
                filter: FilterMode::Point,
            },
            &dither::dither_texels(),
        );
        pipeline.set_texture(PropertyId::lookup(names::DITHER_MAP), dither_map);

        Ok(pipeline)
    }

    /// True when construction resolved the shader program.
    pub fn is_enabled(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn settings(&self) -> &ReflectionSettings {
        &self.settings
    }

    /// Replace the effect settings; the pyramid id cache is rebuilt on
    /// the next execution if `blur_times` changed.
    pub fn set_settings(&mut self, settings: ReflectionSettings) {
        self.settings = settings;
    }
}

impl<B, R> RenderPass<R> for ScreenSpaceReflectionPass<B>
where
    B: ShaderBackend,
    R: FrameRecorder<Pipeline = B::Pipeline>,
{
    fn configure(&mut self, recorder: &mut R, descriptor: &TargetDescriptor) {
        self.descriptor = Some(*descriptor);
        recorder.acquire_temporary(self.ssr_id, descriptor, FilterMode::Bilinear);
        recorder.set_render_target(TargetRef::Temporary(self.ssr_id), Some(CLEAR_BLACK));
    }

    fn execute(&mut self, recorder: &mut R, frame: &FrameContext) {
        if !frame.post_process_enabled {
            return;
        }
        let Some(pipeline) = self.pipeline.as_mut() else {
            error!("{}", PassError::PipelineStateUnavailable);
            return;
        };
        // configure() runs first within a frame; without a descriptor
        // there is no working target to draw into.
        let Some(descriptor) = self.descriptor else {
            return;
        };

        let working = TargetRef::Temporary(self.ssr_id);

        // Trace: ray-march the scene color into the working target and
        // publish it for anything downstream that samples `_SSRTexture`.
        pipeline.set_float(self.scalars.max_step, self.settings.max_step);
        pipeline.set_float(self.scalars.step_size, self.settings.step_size);
        pipeline.set_float(self.scalars.max_distance, self.settings.max_distance);
        pipeline.set_float(self.scalars.thickness, self.settings.thickness);
        recorder.blit_with(frame.scene_color, working, pipeline, SUB_PASS_TRACE);
        recorder.publish_texture(self.ssr_id, working);

        // Blur pyramid. Both base dimensions derive from the camera
        // width; the reference behavior is kept as-is.
        let down_sampling = self.settings.down_sampling.max(1);
        let mut width = (descriptor.width / down_sampling).max(1);
        let mut height = (descriptor.width / down_sampling).max(1);

        if self.pyramid.levels() != self.settings.blur_times {
            self.pyramid = PyramidIds::resolve(self.settings.blur_times);
        }
        pipeline.set_float(self.scalars.blur_range, self.settings.blur_range);

        let mut scratch = ScratchTargets::with_capacity(self.pyramid.down.len() * 2);
        let mut source = working;
        for i in 0..self.settings.blur_times as usize {
            let level = TargetDescriptor {
                width,
                height,
                color_format: ColorFormat::Rgba8,
                depth_bits: descriptor.depth_bits,
            };
            scratch.acquire(recorder, self.pyramid.down[i], &level);
            scratch.acquire(recorder, self.pyramid.up[i], &level);
            height = (height / 2).max(1);
            width = (width / 2).max(1);
            recorder.blit_with(
                source,
                TargetRef::Temporary(self.pyramid.down[i]),
                pipeline,
                SUB_PASS_DOWNSAMPLE,
            );
            source = TargetRef::Temporary(self.pyramid.down[i]);
        }

        for j in (0..self.settings.blur_times.saturating_sub(1) as usize).rev() {
            recorder.blit_with(
                source,
                TargetRef::Temporary(self.pyramid.up[j]),
                pipeline,
                SUB_PASS_UPSAMPLE,
            );
            source = TargetRef::Temporary(self.pyramid.up[j]);
        }

        // Collapse the chain back into the working target, return every
        // scratch level to the pool, then overwrite the scene color with
        // the finished reflection buffer.
        recorder.blit(source, working);
        scratch.release_all(recorder);
        recorder.blit(working, frame.scene_color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ShaderHandle, TextureHandle};

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Acquire {
            id: PropertyId,
            width: u32,
            height: u32,
            format: ColorFormat,
            filter: FilterMode,
        },
        Release {
            id: PropertyId,
        },
        SetTarget {
            target: TargetRef,
            clear: Option<[f32; 4]>,
        },
        Blit {
            src: TargetRef,
            dst: TargetRef,
            sub_pass: Option<u32>,
        },
        Publish {
            id: PropertyId,
            src: TargetRef,
        },
    }

    #[derive(Default)]
    struct MockPipeline {
        floats: Vec<(PropertyId, f32)>,
        textures: Vec<(PropertyId, TextureHandle)>,
    }

    impl PipelineState for MockPipeline {
        fn set_float(&mut self, id: PropertyId, value: f32) {
            self.floats.push((id, value));
        }

        fn set_texture(&mut self, id: PropertyId, texture: TextureHandle) {
            self.textures.push((id, texture));
        }
    }

    #[derive(Default)]
    struct MockBackend {
        shader_missing: bool,
        textures_created: u64,
    }

    impl ShaderBackend for MockBackend {
        type Pipeline = MockPipeline;

        fn find_shader(&self, name: &str) -> Option<ShaderHandle> {
            (!self.shader_missing && name == SHADER_NAME).then_some(ShaderHandle(1))
        }

        fn create_pipeline(&mut self, _shader: ShaderHandle) -> MockPipeline {
            MockPipeline::default()
        }

        fn create_texture(&mut self, desc: &TextureDesc, pixels: &[u8]) -> TextureHandle {
            assert_eq!(pixels.len(), (desc.width * desc.height * 4) as usize);
            self.textures_created += 1;
            TextureHandle(self.textures_created)
        }
    }

    #[derive(Default)]
    struct MockRecorder {
        events: Vec<Event>,
    }

    impl MockRecorder {
        fn acquires(&self) -> Vec<(PropertyId, u32, u32)> {
            self.events
                .iter()
                .filter_map(|event| match event {
                    Event::Acquire { id, width, height, .. } => Some((*id, *width, *height)),
                    _ => None,
                })
                .collect()
        }

        fn releases(&self) -> Vec<PropertyId> {
            self.events
                .iter()
                .filter_map(|event| match event {
                    Event::Release { id } => Some(*id),
                    _ => None,
                })
                .collect()
        }

        fn blits(&self) -> Vec<(TargetRef, TargetRef, Option<u32>)> {
            self.events
                .iter()
                .filter_map(|event| match event {
                    Event::Blit { src, dst, sub_pass } => Some((*src, *dst, *sub_pass)),
                    _ => None,
                })
                .collect()
        }
    }

    impl FrameRecorder for MockRecorder {
        type Pipeline = MockPipeline;

        fn acquire_temporary(
            &mut self,
            id: PropertyId,
            desc: &TargetDescriptor,
            filter: FilterMode,
        ) {
            self.events.push(Event::Acquire {
                id,
                width: desc.width,
                height: desc.height,
                format: desc.color_format,
                filter,
            });
        }

        fn release_temporary(&mut self, id: PropertyId) {
            self.events.push(Event::Release { id });
        }

        fn set_render_target(&mut self, target: TargetRef, clear: Option<[f32; 4]>) {
            self.events.push(Event::SetTarget { target, clear });
        }

        fn blit(&mut self, src: TargetRef, dst: TargetRef) {
            self.events.push(Event::Blit { src, dst, sub_pass: None });
        }

        fn blit_with(
            &mut self,
            src: TargetRef,
            dst: TargetRef,
            _pipeline: &MockPipeline,
            sub_pass: u32,
        ) {
            self.events.push(Event::Blit {
                src,
                dst,
                sub_pass: Some(sub_pass),
            });
        }

        fn publish_texture(&mut self, id: PropertyId, src: TargetRef) {
            self.events.push(Event::Publish { id, src });
        }
    }

    const SCENE: TargetRef = TargetRef::External(TextureHandle(99));

    fn camera(width: u32, height: u32) -> TargetDescriptor {
        TargetDescriptor {
            width,
            height,
            color_format: ColorFormat::Rgba16Float,
            depth_bits: 24,
        }
    }

    fn frame(enabled: bool) -> FrameContext {
        FrameContext {
            scene_color: SCENE,
            post_process_enabled: enabled,
        }
    }

    /// Configure into one recorder, execute into another, so execute-only
    /// properties can be asserted in isolation.
    fn run_split(
        settings: ReflectionSettings,
        descriptor: TargetDescriptor,
    ) -> (MockRecorder, MockRecorder, ScreenSpaceReflectionPass<MockBackend>) {
        let mut backend = MockBackend::default();
        let mut pass = ScreenSpaceReflectionPass::new(&mut backend, settings);
        let mut configure_rec = MockRecorder::default();
        pass.configure(&mut configure_rec, &descriptor);
        let mut execute_rec = MockRecorder::default();
        pass.execute(&mut execute_rec, &frame(true));
        (configure_rec, execute_rec, pass)
    }

    fn ssr() -> TargetRef {
        TargetRef::Temporary(PropertyId::lookup(names::SSR_TEXTURE))
    }

    #[test]
    fn configure_acquires_and_clears_working_target() {
        let mut backend = MockBackend::default();
        let mut pass =
            ScreenSpaceReflectionPass::new(&mut backend, ReflectionSettings::default());
        let mut recorder = MockRecorder::default();
        pass.configure(&mut recorder, &camera(1280, 720));

        assert_eq!(
            recorder.events,
            vec![
                Event::Acquire {
                    id: PropertyId::lookup(names::SSR_TEXTURE),
                    width: 1280,
                    height: 720,
                    format: ColorFormat::Rgba16Float,
                    filter: FilterMode::Bilinear,
                },
                Event::SetTarget {
                    target: ssr(),
                    clear: Some([0.0, 0.0, 0.0, 1.0]),
                },
            ]
        );
    }

    #[test]
    fn construction_binds_dither_map_once() {
        let mut backend = MockBackend::default();
        let pass = ScreenSpaceReflectionPass::new(&mut backend, ReflectionSettings::default());

        assert!(pass.is_enabled());
        assert_eq!(backend.textures_created, 1);
        let pipeline = pass.pipeline.as_ref().unwrap();
        assert_eq!(
            pipeline.textures,
            vec![(PropertyId::lookup(names::DITHER_MAP), TextureHandle(1))]
        );
    }

    #[test]
    fn missing_shader_disables_pass_without_panicking() {
        let mut backend = MockBackend {
            shader_missing: true,
            ..MockBackend::default()
        };
        let mut pass =
            ScreenSpaceReflectionPass::new(&mut backend, ReflectionSettings::default());
        assert!(!pass.is_enabled());

        let mut recorder = MockRecorder::default();
        pass.configure(&mut recorder, &camera(1920, 1080));
        let before = recorder.events.len();
        pass.execute(&mut recorder, &frame(true));
        assert_eq!(recorder.events.len(), before, "disabled pass must record nothing");
    }

    #[test]
    fn disabled_toggle_records_nothing() {
        let mut backend = MockBackend::default();
        let mut pass =
            ScreenSpaceReflectionPass::new(&mut backend, ReflectionSettings::default());
        let mut recorder = MockRecorder::default();
        pass.configure(&mut recorder, &camera(1920, 1080));
        let before = recorder.events.len();
        pass.execute(&mut recorder, &frame(false));
        assert_eq!(recorder.events.len(), before);
    }

    #[test]
    fn scratch_allocations_balance_for_any_level_count() {
        for blur_times in [0u32, 1, 2, 5] {
            let settings = ReflectionSettings {
                blur_times,
                ..ReflectionSettings::default()
            };
            let (_, execute_rec, _) = run_split(settings, camera(1920, 1080));
            let acquired = execute_rec.acquires();
            let released = execute_rec.releases();
            assert_eq!(acquired.len(), 2 * blur_times as usize, "blur_times={blur_times}");
            assert_eq!(released.len(), 2 * blur_times as usize, "blur_times={blur_times}");
            let mut acquired_ids: Vec<_> = acquired.iter().map(|(id, _, _)| *id).collect();
            let mut released_ids = released;
            acquired_ids.sort();
            released_ids.sort();
            assert_eq!(acquired_ids, released_ids, "every acquire pairs with a release");
        }
    }

    #[test]
    fn pyramid_dimensions_never_degenerate() {
        for (width, height, down_sampling, blur_times) in [
            (1920u32, 1080u32, 4u32, 6u32),
            (100, 900, 7, 8),
            (3, 3, 4, 3),
            (640, 480, 640, 4),
            (1, 1, 1, 5),
        ] {
            let settings = ReflectionSettings {
                down_sampling,
                blur_times,
                ..ReflectionSettings::default()
            };
            let (_, execute_rec, _) = run_split(settings, camera(width, height));
            let dims: Vec<(u32, u32)> = execute_rec
                .acquires()
                .iter()
                .map(|(_, w, h)| (*w, *h))
                .collect();
            assert_eq!(dims.len(), 2 * blur_times as usize);
            for pair in dims.chunks_exact(2) {
                // down[i] and up[i] share a shape.
                assert_eq!(pair[0], pair[1]);
                assert!(pair[0].0 >= 1 && pair[0].1 >= 1);
            }
            for levels in dims.chunks_exact(2).collect::<Vec<_>>().windows(2) {
                assert!(levels[1][0].0 <= levels[0][0].0);
                assert!(levels[1][0].1 <= levels[0][0].1);
            }
        }
    }

    #[test]
    fn zero_blur_levels_still_resolve_and_composite() {
        let settings = ReflectionSettings {
            blur_times: 0,
            ..ReflectionSettings::default()
        };
        let (_, execute_rec, _) = run_split(settings, camera(1920, 1080));

        assert!(execute_rec.acquires().is_empty());
        assert!(execute_rec.releases().is_empty());
        assert_eq!(
            execute_rec.blits(),
            vec![
                (SCENE, ssr(), Some(SUB_PASS_TRACE)),
                (ssr(), ssr(), None),
                (ssr(), SCENE, None),
            ]
        );
    }

    #[test]
    fn trace_publishes_reflection_buffer() {
        let (_, execute_rec, _) =
            run_split(ReflectionSettings::default(), camera(1920, 1080));
        let publish = execute_rec
            .events
            .iter()
            .position(|event| matches!(event, Event::Publish { .. }))
            .expect("working target published");
        let first_blit = execute_rec
            .events
            .iter()
            .position(|event| matches!(event, Event::Blit { .. }))
            .unwrap();
        assert!(publish > first_blit, "publish follows the trace draw");
        assert_eq!(
            execute_rec.events[publish],
            Event::Publish {
                id: PropertyId::lookup(names::SSR_TEXTURE),
                src: ssr(),
            }
        );
    }

    #[test]
    fn trace_scalars_bound_from_settings() {
        let settings = ReflectionSettings {
            max_step: 24.0,
            step_size: 0.5,
            max_distance: 80.0,
            thickness: 0.25,
            blur_range: 0.002,
            ..ReflectionSettings::default()
        };
        let (_, _, pass) = run_split(settings, camera(1280, 720));
        let pipeline = pass.pipeline.as_ref().unwrap();
        let expected = [
            (names::MAX_STEP, 24.0),
            (names::STEP_SIZE, 0.5),
            (names::MAX_DISTANCE, 80.0),
            (names::THICKNESS, 0.25),
            (names::BLUR_RANGE, 0.002),
        ];
        for (name, value) in expected {
            assert!(
                pipeline
                    .floats
                    .contains(&(PropertyId::lookup(name), value)),
                "{name} bound to {value}"
            );
        }
    }

    #[test]
    fn end_to_end_sequence_1080p() {
        // 1920x1080 at down_sampling=4, blur_times=2. Both base pyramid
        // dimensions derive from the camera width (480x480, then
        // 240x240), a known quirk of the reference behavior.
        let (configure_rec, execute_rec, _) =
            run_split(ReflectionSettings::default(), camera(1920, 1080));

        assert_eq!(
            configure_rec.acquires(),
            vec![(PropertyId::lookup(names::SSR_TEXTURE), 1920, 1080)]
        );

        let down0 = TargetRef::Temporary(PropertyId::lookup("_DownSample0"));
        let down1 = TargetRef::Temporary(PropertyId::lookup("_DownSample1"));
        let up0 = TargetRef::Temporary(PropertyId::lookup("_UpSample0"));

        assert_eq!(
            execute_rec.acquires(),
            vec![
                (PropertyId::lookup("_DownSample0"), 480, 480),
                (PropertyId::lookup("_UpSample0"), 480, 480),
                (PropertyId::lookup("_DownSample1"), 240, 240),
                (PropertyId::lookup("_UpSample1"), 240, 240),
            ]
        );
        assert_eq!(
            execute_rec.blits(),
            vec![
                (SCENE, ssr(), Some(SUB_PASS_TRACE)),
                (ssr(), down0, Some(SUB_PASS_DOWNSAMPLE)),
                (down0, down1, Some(SUB_PASS_DOWNSAMPLE)),
                (down1, up0, Some(SUB_PASS_UPSAMPLE)),
                (up0, ssr(), None),
                (ssr(), SCENE, None),
            ]
        );
        assert_eq!(execute_rec.releases().len(), 4);
        // Composite is the last thing recorded, after every release.
        assert!(matches!(
            execute_rec.events.last(),
            Some(Event::Blit { dst, sub_pass: None, .. }) if *dst == SCENE
        ));
    }

    #[test]
    fn pyramid_id_cache_rebuilds_when_blur_times_changes() {
        let mut backend = MockBackend::default();
        let mut pass =
            ScreenSpaceReflectionPass::new(&mut backend, ReflectionSettings::default());
        let descriptor = camera(1920, 1080);

        let mut recorder = MockRecorder::default();
        pass.configure(&mut recorder, &descriptor);
        pass.execute(&mut recorder, &frame(true));
        assert_eq!(pass.pyramid.levels(), 2);

        let mut settings = *pass.settings();
        settings.blur_times = 4;
        pass.set_settings(settings);

        let mut recorder = MockRecorder::default();
        pass.configure(&mut recorder, &descriptor);
        pass.execute(&mut recorder, &frame(true));
        assert_eq!(pass.pyramid.levels(), 4);
        assert_eq!(recorder.acquires().len(), 1 + 8);
    }

    #[test]
    fn zero_down_sampling_is_clamped_not_fatal() {
        let settings = ReflectionSettings {
            down_sampling: 0,
            ..ReflectionSettings::default()
        };
        let (_, execute_rec, _) = run_split(settings, camera(64, 64));
        // Divisor clamps to 1: the base level is the camera width square.
        assert_eq!(
            execute_rec.acquires().first().map(|(_, w, h)| (*w, *h)),
            Some((64, 64))
        );
    }
}
