//! Orphan detection for single-source mode

use std::collections::HashSet;

use stratus_common::model::RemoteResource;

/// Ids of remote resources with no local declaration.
///
/// Empty unless `single_source` is set: without it the local declaration is
/// not authoritative and undeclared resources are left alone.
pub fn elements_to_remove<'a, R, I>(single_source: bool, existing: &[R], declared_names: I) -> Vec<String>
where
    R: RemoteResource,
    I: IntoIterator<Item = &'a str>,
{
    if !single_source {
        return Vec::new();
    }

    let declared: HashSet<&str> = declared_names.into_iter().collect();
    existing
        .iter()
        .filter(|r| !declared.contains(r.name()))
        .map(|r| r.id().to_string())
        .collect()
}
