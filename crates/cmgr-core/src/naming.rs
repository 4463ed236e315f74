use crate::error::Fault;

const MAX_PROFILE_LEN: usize = 63;

/// Validate a profile name: 1-63 chars of ASCII alphanumerics, `-`, `_`, `.`,
/// and not `.` or `..`. Profile names become directory names under the
/// state roots, which Clean removes recursively.
pub fn validate_profile(name: &str) -> Result<(), Fault> {
    let invalid = |reason: String| Fault::InvalidProfile {
        profile: name.to_string(),
        reason,
    };

    if name.is_empty() || name.len() > MAX_PROFILE_LEN {
        return Err(invalid(format!(
            "must be 1-{} characters, got {}",
            MAX_PROFILE_LEN,
            name.len()
        )));
    }
    if name == "." || name == ".." {
        return Err(invalid("must not be a relative path component".to_string()));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(invalid(format!("contains disallowed character {:?}", c)));
    }
    if name.starts_with('-') {
        return Err(invalid("must not start with a hyphen".to_string()));
    }
    Ok(())
}
