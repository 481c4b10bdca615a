use super::{PlainScript, Transpile, TypeStripper};
use std::collections::HashMap;

/// Dispatch table from file extension to transpiler adapter
pub struct TranspilerRegistry {
    /// Used for unregistered extensions
    fallback: Box<dyn Transpile>,
    /// Extension -> adapter
    map: HashMap<String, Box<dyn Transpile>>,
}

impl TranspilerRegistry {
    /// Empty registry; everything falls back to the type stripper
    pub fn new() -> Self {
        Self {
            fallback: Box::new(TypeStripper),
            map: HashMap::new(),
        }
    }

    /// Registry with `ts` (type stripping) and `js` (plain) adapters
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("ts", TypeStripper);
        registry.register("js", PlainScript);
        registry
    }

    /// Register an adapter for an extension (without dot, e.g. "ts")
    pub fn register(&mut self, extension: impl Into<String>, adapter: impl Transpile + 'static) {
        self.map
            .insert(extension.into().to_lowercase(), Box::new(adapter));
    }

    /// Adapter for an extension; a leading dot is ignored
    pub fn select(&self, extension: &str) -> &dyn Transpile {
        let ext = extension.trim_start_matches('.').to_lowercase();
        self.map.get(&ext).map(|t| &**t).unwrap_or(&*self.fallback)
    }
}

impl Default for TranspilerRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
