//! Embedded WGSL sources and the name → program registry backing
//! `ShaderBackend::find_shader`.

use specular_core::host::ShaderHandle;
use specular_core::SHADER_NAME;

/// Reflection effect program: fullscreen vertex stage plus the trace,
/// downsample and upsample fragment entry points.
pub const REFLECTION: &str = include_str!("../shaders/reflection.wgsl");

/// Plain textured copy used for resolve and composite blits.
pub const BLIT: &str = include_str!("../shaders/blit.wgsl");

const REGISTRY: &[(&str, &str)] = &[(SHADER_NAME, REFLECTION)];

/// Resolve a registered program name to its handle.
pub fn find(name: &str) -> Option<ShaderHandle> {
    REGISTRY
        .iter()
        .position(|(registered, _)| *registered == name)
        .map(|index| ShaderHandle(index as u64 + 1))
}

/// Source text for a previously resolved handle.
pub fn source(handle: ShaderHandle) -> Option<&'static str> {
    let index = (handle.0 as usize).checked_sub(1)?;
    REGISTRY.get(index).map(|(_, source)| *source)
}
