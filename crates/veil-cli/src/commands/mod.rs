//! CLI command implementations

pub mod check;
pub mod info;
pub mod select;

use std::path::Path;

use anyhow::Context;
use veil_engine::Runtime;
use veil_types::{Catalog, TypeHandle};

/// Fresh runtime holding the catalog's types, with their handles in
/// declaration order
pub fn load_runtime(path: &Path) -> anyhow::Result<(Runtime, Vec<TypeHandle>)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog {}", path.display()))?;
    let catalog =
        Catalog::parse(&text).with_context(|| format!("invalid catalog {}", path.display()))?;

    let runtime = Runtime::new();
    let handles = runtime.load_catalog(&catalog)?;
    tracing::debug!(target: "veil", path = %path.display(), types = handles.len(), "loaded catalog");
    Ok((runtime, handles))
}

/// Resolve a qualified type name, including closed generic names
pub fn resolve(runtime: &Runtime, name: &str) -> anyhow::Result<TypeHandle> {
    runtime
        .types_mut()
        .resolve_name(name)
        .with_context(|| format!("unknown type '{}'", name))
}
