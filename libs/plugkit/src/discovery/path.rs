use std::path::{Path, PathBuf};

/// A candidate extension directory found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionPath {
    /// Absolute directory of the extension.
    pub path: PathBuf,
    /// Directory name without the extension prefix.
    pub name: String,
    /// Logical names of the extensions this one is nested under, outermost first.
    pub ancestors: Vec<String>,
}

impl ExtensionPath {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>, ancestors: Vec<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            ancestors,
        }
    }

    /// A top-level extension, e.g. the host's own root.
    pub fn top_level(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self::new(path, name, Vec::new())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Nesting depth below the scan root; top-level extensions are at depth 0.
    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    /// `/` followed by the ancestor chain and the own name, joined by `/`.
    pub fn mount_path(&self) -> String {
        let mut mount = String::new();
        for segment in self.ancestors.iter().chain(std::iter::once(&self.name)) {
            mount.push('/');
            mount.push_str(segment);
        }
        mount
    }

    /// Ancestor chain to hand down to extensions nested inside this one.
    pub(crate) fn child_ancestors(&self) -> Vec<String> {
        let mut chain = self.ancestors.clone();
        chain.push(self.name.clone());
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_path_joins_ancestor_chain() {
        let top = ExtensionPath::top_level("/srv/node_modules/plugkit-example", "example");
        assert_eq!(top.mount_path(), "/example");

        let nested = ExtensionPath::new(
            "/srv/node_modules/plugkit-example/node_modules/plugkit-subExample",
            "subExample",
            top.child_ancestors(),
        );
        assert_eq!(nested.mount_path(), "/example/subExample");
        assert_eq!(nested.depth(), 1);
    }
}
