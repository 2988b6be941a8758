//! Severity label to OCSF `severity_id` table

/// Numeric code of the default event severity
pub const DEFAULT_SEVERITY_ID: i32 = 2;

/// Label of the default event severity
pub const DEFAULT_SEVERITY_LABEL: &str = "Medium";

/// Map a severity label to its numeric code, ignoring case
///
/// Unrecognised labels map to 2.
pub fn severity_id(label: &str) -> i32 {
    match label.to_ascii_lowercase().as_str() {
        "critical" | "high" => 4,
        "medium" | "med" => 3,
        "low" => 2,
        "info" | "informational" => 1,
        _ => 2,
    }
}
