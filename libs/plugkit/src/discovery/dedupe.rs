use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::ExtensionPath;

/// Keep one candidate per logical name: the one with the shortest path.
///
/// Ties go to the first candidate seen. Survivors keep the order in which
/// their name first appeared.
pub fn dedupe(candidates: Vec<ExtensionPath>) -> Vec<ExtensionPath> {
    let mut slots: Vec<ExtensionPath> = Vec::with_capacity(candidates.len());
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for candidate in candidates {
        match by_name.entry(candidate.name.clone()) {
            Entry::Vacant(v) => {
                v.insert(slots.len());
                slots.push(candidate);
            }
            Entry::Occupied(o) => {
                let kept = &mut slots[*o.get()];
                if path_len(&candidate) < path_len(kept) {
                    tracing::debug!(
                        extension = %candidate.name,
                        kept = %candidate.path.display(),
                        dropped = %kept.path.display(),
                        "Replacing nested duplicate with outer copy"
                    );
                    *kept = candidate;
                } else {
                    tracing::debug!(
                        extension = %candidate.name,
                        kept = %kept.path.display(),
                        dropped = %candidate.path.display(),
                        "Dropping duplicate extension path"
                    );
                }
            }
        }
    }

    slots
}

fn path_len(p: &ExtensionPath) -> usize {
    p.path.as_os_str().len()
}
