use crate::loader::{PermissionEntry, PermissionGroup};

/// Label of the group collecting permissions declared outside any group.
pub const ORPHAN_GROUP_LABEL: &str = "other";

/// Move every ungrouped permission into a trailing [`ORPHAN_GROUP_LABEL`] group.
///
/// Groups keep their order. An existing group with the orphan label absorbs
/// the orphans instead of a second one being created.
pub fn group_orphaned_permissions(entries: Vec<PermissionEntry>) -> Vec<PermissionEntry> {
    let mut groups = Vec::with_capacity(entries.len());
    let mut orphans = Vec::new();

    for entry in entries {
        match entry {
            PermissionEntry::Single(permission) => orphans.push(permission),
            group @ PermissionEntry::Group(_) => groups.push(group),
        }
    }

    if orphans.is_empty() {
        return groups;
    }

    let existing = groups.iter_mut().find_map(|entry| match entry {
        PermissionEntry::Group(group) if group.label == ORPHAN_GROUP_LABEL => Some(group),
        _ => None,
    });
    match existing {
        Some(group) => group.permissions.extend(orphans),
        None => groups.push(PermissionEntry::Group(PermissionGroup {
            label: ORPHAN_GROUP_LABEL.to_string(),
            permissions: orphans,
        })),
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Permission;

    fn single(id: &str) -> PermissionEntry {
        PermissionEntry::Single(Permission {
            id: id.to_string(),
            name: None,
            description: None,
            paths: None,
        })
    }

    fn group(label: &str, ids: &[&str]) -> PermissionEntry {
        PermissionEntry::Group(PermissionGroup {
            label: label.to_string(),
            permissions: ids
                .iter()
                .map(|id| match single(id) {
                    PermissionEntry::Single(p) => p,
                    PermissionEntry::Group(_) => unreachable!(),
                })
                .collect(),
        })
    }

    #[test]
    fn orphans_are_grouped_last() {
        let out = group_orphaned_permissions(vec![single("a"), group("Videos", &["v"]), single("b")]);
        assert_eq!(out, vec![group("Videos", &["v"]), group(ORPHAN_GROUP_LABEL, &["a", "b"])]);
    }

    #[test]
    fn existing_orphan_group_is_reused() {
        let out = group_orphaned_permissions(vec![group(ORPHAN_GROUP_LABEL, &["x"]), single("y")]);
        assert_eq!(out, vec![group(ORPHAN_GROUP_LABEL, &["x", "y"])]);
    }

    #[test]
    fn no_orphans_no_extra_group() {
        let out = group_orphaned_permissions(vec![group("Videos", &["v"])]);
        assert_eq!(out.len(), 1);
    }
}
