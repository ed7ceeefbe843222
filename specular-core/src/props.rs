//! Interned shader property identifiers.
//!
//! Uniforms, published textures, and temporary targets are all addressed
//! by string name in the host contract. Names are interned once into
//! stable per-process ids so per-frame code compares and hashes ids
//! instead of strings.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

/// Well-known property names shared between the pass and its backends.
pub mod names {
    pub const MAX_STEP: &str = "_MaxStep";
    pub const STEP_SIZE: &str = "_StepSize";
    pub const MAX_DISTANCE: &str = "_MaxDistance";
    pub const THICKNESS: &str = "_Thickness";
    pub const BLUR_RANGE: &str = "_BlurRange";
    pub const DITHER_MAP: &str = "_DitherMap";
    pub const SSR_TEXTURE: &str = "_SSRTexture";
}

/// Interned shader property name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(u32);

static TABLE: OnceLock<Mutex<HashMap<String, u32>>> = OnceLock::new();

impl PropertyId {
    /// Intern `name`, returning the same id for the same name within a
    /// process. Ids are not stable across processes.
    pub fn lookup(name: &str) -> Self {
        let table = TABLE.get_or_init(|| Mutex::new(HashMap::new()));
        let mut table = table
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        // Entries are never removed, so the table length is a fresh id.
        let next = table.len() as u32;
        Self(*table.entry(name.to_owned()).or_insert(next))
    }

    /// Raw id value, for backends that key their own tables by it.
    pub fn raw(self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_same_id() {
        assert_eq!(
            PropertyId::lookup(names::MAX_STEP),
            PropertyId::lookup(names::MAX_STEP)
        );
    }

    #[test]
    fn distinct_names_distinct_ids() {
        assert_ne!(
            PropertyId::lookup("_PropsTestA"),
            PropertyId::lookup("_PropsTestB")
        );
    }

    #[test]
    fn ids_are_stable_across_lookups() {
        let first = PropertyId::lookup("_PropsTestStable");
        for _ in 0..8 {
            assert_eq!(PropertyId::lookup("_PropsTestStable"), first);
        }
    }
}
