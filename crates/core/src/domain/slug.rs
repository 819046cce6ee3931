use crate::error::{CoreError, Result};

pub const MIN_SLUG_LEN: usize = 3;
pub const MAX_SLUG_LEN: usize = 63;

/// Checks that a project slug can be used verbatim as a resource name at
/// every downstream provider (repository, database project, hosting project).
pub fn validate_project_slug(slug: &str) -> Result<()> {
    let invalid = |reason: &str| CoreError::InvalidSlug {
        slug: slug.to_string(),
        reason: reason.to_string(),
    };

    if slug.len() < MIN_SLUG_LEN || slug.len() > MAX_SLUG_LEN {
        return Err(invalid(&format!(
            "must be between {} and {} characters",
            MIN_SLUG_LEN, MAX_SLUG_LEN
        )));
    }

    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid(
            "only lowercase letters, digits and '-' are allowed",
        ));
    }

    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(invalid("must not start or end with '-'"));
    }

    Ok(())
}
