//! Path splitting.

/// Split a `/`-separated path into its components.
///
/// Empty components are dropped, which strips the leading one of an
/// absolute-style path as well as trailing and doubled separators.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty()).collect()
}

/// Join path components for display in records and errors.
pub fn join_path<S: AsRef<str>>(components: &[S]) -> String {
    components
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("/")
}
