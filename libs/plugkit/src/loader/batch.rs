use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinSet;

use super::{load_extension, ExtensionDescriptor, LoaderContext};
use crate::discovery::{dedupe, scan};
use crate::error::{panic_message, DiscoveryError};

/// Scan `root`, dedupe, and load every extension concurrently.
///
/// Fails only when `root` cannot be listed. An extension whose load task
/// panics is logged with its path and left out. Results follow the order of
/// the deduplicated scan.
pub async fn load_all(ctx: Arc<LoaderContext>, root: &Path) -> Result<Vec<ExtensionDescriptor>, DiscoveryError> {
    let candidates = dedupe(scan(root, &ctx.options.discovery).await?);
    if candidates.is_empty() {
        tracing::info!(root = %root.display(), "No extensions found");
        return Ok(Vec::new());
    }

    tracing::info!(root = %root.display(), count = candidates.len(), "Loading extensions");

    let mut tasks = JoinSet::new();
    for (index, candidate) in candidates.into_iter().enumerate() {
        let ctx = ctx.clone();
        tasks.spawn(async move {
            let outcome = AssertUnwindSafe(load_extension(&ctx, &candidate))
                .catch_unwind()
                .await;
            (index, candidate, outcome)
        });
    }

    let mut loaded = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, _, Ok(descriptor))) => loaded.push((index, descriptor)),
            Ok((_, candidate, Err(payload))) => {
                tracing::error!(
                    path = %candidate.path.display(),
                    reason = %panic_message(payload.as_ref()),
                    "Extension load panicked; excluded from batch"
                );
            }
            Err(err) => {
                tracing::error!(error = %err, "Extension load task failed; excluded from batch");
            }
        }
    }

    loaded.sort_by_key(|(index, _)| *index);
    let descriptors: Vec<_> = loaded.into_iter().map(|(_, descriptor)| descriptor).collect();
    tracing::info!(count = descriptors.len(), "Extensions loaded");
    Ok(descriptors)
}
