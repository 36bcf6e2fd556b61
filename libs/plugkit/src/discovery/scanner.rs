use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use futures::FutureExt;

use super::ExtensionPath;
use crate::config::DiscoveryOptions;
use crate::error::DiscoveryError;

/// Walk `root` and return every extension directory found, nested ones included.
///
/// Entries are visited in file-name order and returned pre-order: each
/// extension is followed by everything found in its dependency directory.
/// Duplicates from diamond dependencies are kept; see [`super::dedupe`].
///
/// `root` is canonicalized first, so every returned path is absolute even
/// for a relative root. Only a failure to resolve or list `root` itself is an error. Nested directories that
/// cannot be read are logged and skipped, entries that cannot be stat'ed are
/// left out.
pub async fn scan(root: &Path, opts: &DiscoveryOptions) -> Result<Vec<ExtensionPath>, DiscoveryError> {
    let unreadable = |source| DiscoveryError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    };
    let root = tokio::fs::canonicalize(root).await.map_err(unreadable)?;
    let entries = read_candidates(&root, opts).await.map_err(unreadable)?;

    let mut found = Vec::new();
    for (path, name) in entries {
        let candidate = ExtensionPath::new(path, name, Vec::new());
        scan_nested(candidate, opts, &mut found).await;
    }

    tracing::debug!(root = %root.display(), count = found.len(), "Extension scan finished");
    Ok(found)
}

/// Record `candidate` and descend into its dependency directory, if any.
fn scan_nested<'a>(
    candidate: ExtensionPath,
    opts: &'a DiscoveryOptions,
    found: &'a mut Vec<ExtensionPath>,
) -> BoxFuture<'a, ()> {
    async move {
        let deps_dir = candidate.path.join(&opts.deps_dir);
        let ancestors = candidate.child_ancestors();
        found.push(candidate);

        if !is_dir(&deps_dir).await {
            return;
        }

        let entries = match read_candidates(&deps_dir, opts).await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(path = %deps_dir.display(), error = %err, "Skipping unreadable dependency directory");
                return;
            }
        };

        for (path, name) in entries {
            let nested = ExtensionPath::new(path, name, ancestors.clone());
            scan_nested(nested, opts, found).await;
        }
    }
    .boxed()
}

/// List the prefixed subdirectories of `dir`, sorted by name.
async fn read_candidates(dir: &Path, opts: &DiscoveryOptions) -> std::io::Result<Vec<(PathBuf, String)>> {
    let mut reader = tokio::fs::read_dir(dir).await?;
    let mut out = Vec::new();

    while let Some(entry) = reader.next_entry().await? {
        let file_name = entry.file_name();
        let Some(dir_name) = file_name.to_str() else {
            continue;
        };
        let Some(name) = opts.logical_name(dir_name) else {
            continue;
        };

        let path = entry.path();
        // Follows symlinks, so linked packages count as directories.
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => out.push((path, name.to_string())),
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "Excluding entry that cannot be stat'ed");
            }
        }
    }

    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}
