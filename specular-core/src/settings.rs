//! Effect settings for the screen-space reflection pass.

/// Trace and blur parameters for the reflection effect.
///
/// Plain data holder; the host serializes it through its own asset
/// mechanism (enable the `serde` feature for the derives). Values are
/// read once per frame by the pass and validated lazily at draw time, so
/// degenerate values render a degraded effect instead of failing the
/// frame.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReflectionSettings {
    /// Maximum number of ray-march steps.
    pub max_step: f32,
    /// Length of a single ray-march step.
    pub step_size: f32,
    /// Maximum reflection ray travel distance.
    pub max_distance: f32,
    /// Depth thickness threshold for a ray hit.
    pub thickness: f32,
    /// Kernel spread passed to the blur sub-programs.
    pub blur_range: f32,
    /// Resolution divisor for the blur pyramid's base level.
    pub down_sampling: u32,
    /// Number of blur pyramid levels. Zero disables the blur entirely.
    pub blur_times: u32,
}

impl Default for ReflectionSettings {
    fn default() -> Self {
        Self {
            max_step: 10.0,
            step_size: 1.0,
            max_distance: 10.0,
            thickness: 1.0,
            blur_range: 0.00015,
            down_sampling: 4,
            blur_times: 2,
        }
    }
}
