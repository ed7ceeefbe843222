//! Screen-space reflection post-processing, independent of any concrete
//! GPU backend.
//!
//! The host renderer drives a [`ScreenSpaceReflectionPass`] once per frame
//! per camera through the [`host`] contract: `configure` sets up the
//! working target, `execute` records the fixed trace → blur pyramid →
//! resolve → composite sequence. Every scratch target acquired along the
//! way is released before the recording returns. Nothing in this crate
//! submits work to a device; it only records into the host's per-frame
//! command stream.

pub mod dither;
pub mod error;
pub mod feature;
pub mod host;
pub mod pass;
pub mod props;
pub mod queue;
pub mod settings;

pub use error::PassError;
pub use feature::ReflectionFeature;
pub use pass::{ScreenSpaceReflectionPass, SHADER_NAME};
pub use props::PropertyId;
pub use queue::{PassEvent, PassQueue, RenderPass};
pub use settings::ReflectionSettings;
