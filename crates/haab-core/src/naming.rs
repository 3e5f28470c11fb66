//! Container naming scheme.
//!
//! Every container Haab manages is named `haab-<app name>`. The prefix is
//! what distinguishes managed containers from everything else running on
//! the host, so both derivation and the reverse mapping live here.

/// Prefix applied to every managed container name.
pub const CONTAINER_PREFIX: &str = "haab-";

/// Derive the runtime container name for an application.
pub fn container_name(app_name: &str) -> String {
    format!("{CONTAINER_PREFIX}{app_name}")
}

/// Whether a runtime container name belongs to a Haab-managed container.
///
/// The runtime may report names with a leading `/` (the Docker API does);
/// that is stripped before matching.
pub fn is_managed(container_name: &str) -> bool {
    container_name
        .trim_start_matches('/')
        .starts_with(CONTAINER_PREFIX)
}

/// Recover the application name from a managed container name, if it is one.
pub fn app_name_from_container(container_name: &str) -> Option<&str> {
    container_name
        .trim_start_matches('/')
        .strip_prefix(CONTAINER_PREFIX)
}

/// Validate a user-chosen application name.
///
/// Names become part of a container name, so they are restricted to what
/// the runtime accepts there: lowercase alphanumerics, `-` and `_`, starting
/// with an alphanumeric, non-empty.
pub fn validate_app_name(name: &str) -> Result<(), String> {
    let Some(first) = name.chars().next() else {
        return Err("application name must not be empty".to_string());
    };
    if !first.is_ascii_alphanumeric() {
        return Err(format!(
            "application name '{name}' must start with an alphanumeric character"
        ));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '_'))
    {
        return Err(format!(
            "application name '{name}' contains invalid character '{bad}'"
        ));
    }
    Ok(())
}
