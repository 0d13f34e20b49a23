//! Source loading and gating.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{SourceDescriptor, SourceKind, PROBE_DOMAIN};

/// Name filters applied while loading sources. The include and exclude
/// lists are mutually exclusive at the argument surface; the loader simply
/// honors whichever is set.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
}

impl LoadOptions {
    fn admits(&self, name: &str) -> bool {
        if let Some(include) = &self.include {
            if !include.iter().any(|entry| entry.eq_ignore_ascii_case(name)) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.iter().any(|entry| entry.eq_ignore_ascii_case(name)) {
                return false;
            }
        }
        true
    }
}

/// Applies the gating policy to candidate descriptors, in order: contract
/// check, include/exclude filters, then a PATH probe for tools. Survivors
/// are keyed by name; a duplicate name resolves last-write-wins.
pub fn load_sources(
    candidates: Vec<SourceDescriptor>,
    options: &LoadOptions,
) -> BTreeMap<String, Arc<SourceDescriptor>> {
    let mut selected: BTreeMap<String, Arc<SourceDescriptor>> = BTreeMap::new();
    for descriptor in candidates {
        if let Err(violation) = descriptor.check_contract() {
            warn!(source = %descriptor.name, %violation, "skipping source: contract violation");
            continue;
        }
        if !options.admits(&descriptor.name) {
            debug!(source = %descriptor.name, "skipping source: filtered out by name");
            continue;
        }
        if let SourceKind::Tool(tool) = &descriptor.kind {
            let argv = (tool.build_command)(PROBE_DOMAIN);
            let program = argv.first().cloned().unwrap_or_default();
            if which::which(&program).is_err() {
                warn!(
                    source = %descriptor.name,
                    program = %program,
                    "skipping tool: executable not found on PATH"
                );
                continue;
            }
        }
        if selected.contains_key(&descriptor.name) {
            warn!(source = %descriptor.name, "duplicate source name, keeping the later definition");
        }
        debug!(source = %descriptor.name, kind = descriptor.kind_label(), "source selected");
        selected.insert(descriptor.name.clone(), Arc::new(descriptor));
    }
    selected
}

/// Sorted names of the selected sources; one of the cache key components.
pub fn selected_names(selected: &BTreeMap<String, Arc<SourceDescriptor>>) -> Vec<String> {
    selected.keys().cloned().collect()
}
