//! Endpoint normalization.

/// Normalize a registry reference or mirror endpoint for comparison.
///
/// Strips any `scheme://` prefix and trailing slashes and lower-cases the
/// host segment. The path after the host is case-sensitive and kept as-is.
pub fn normalize_endpoint(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = match trimmed.find("://") {
        Some(idx) => &trimmed[idx + 3..],
        None => trimmed,
    };
    let without_slash = without_scheme.trim_end_matches('/');

    match without_slash.split_once('/') {
        Some((host, path)) => format!("{}/{}", host.to_ascii_lowercase(), path),
        None => without_slash.to_ascii_lowercase(),
    }
}

/// Host segment (with port) of a normalized reference.
pub fn host_of(reference: &str) -> &str {
    reference.split_once('/').map_or(reference, |(host, _)| host)
}

/// Path segment of a normalized reference, if any.
pub fn path_of(reference: &str) -> Option<&str> {
    reference.split_once('/').map(|(_, path)| path).filter(|p| !p.is_empty())
}
