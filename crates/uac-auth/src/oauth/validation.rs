//! Scope and redirect URI checks.
//!
//! Pure functions with no store access.

use std::collections::HashSet;

/// Splits a space-delimited scope string, dropping empty entries.
#[must_use]
pub fn parse_scopes(scope: &str) -> Vec<String> {
    scope.split_whitespace().map(str::to_string).collect()
}

/// Returns `true` if every requested scope is in the allowed set.
///
/// An empty request is always allowed.
#[must_use]
pub fn scopes_allowed<A, R>(allowed: &[A], requested: &[R]) -> bool
where
    A: AsRef<str>,
    R: AsRef<str>,
{
    let allowed: HashSet<&str> = allowed.iter().map(AsRef::as_ref).collect();
    requested
        .iter()
        .map(AsRef::as_ref)
        .filter(|s| !s.is_empty())
        .all(|s| allowed.contains(s))
}

/// Exact, case-sensitive match against the registered redirect URIs.
#[must_use]
pub fn redirect_uri_registered<S: AsRef<str>>(registered: &[S], redirect_uri: &str) -> bool {
    registered.iter().any(|uri| uri.as_ref() == redirect_uri)
}
