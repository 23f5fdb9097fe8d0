use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::ToSchema;
use uuid::Uuid;

/// Organization status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "organization_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum OrganizationStatus {
    Active,
    Suspended,
    Deleted,
}

/// Organization (tenant) entity. Owns every business row through the
/// `organization_id` foreign key on tenant-owned tables.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub status: OrganizationStatus,
    pub plan: String,
    pub max_members: Option<i32>,
    pub max_projects: Option<i32>,
    pub timezone: String,
    pub currency: String,
    pub date_format: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Derive a URL-safe slug from a display name: lowercase, every run of
/// non-alphanumeric characters collapsed to a single hyphen, trimmed.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_hyphen = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("org");
    }
    slug
}

/// Pick the first free slug given the base candidate and the set of slugs
/// already taken: `base`, then `base-1`, `base-2`, ...
pub fn resolve_slug_collision(base: &str, taken: &[String]) -> String {
    let taken: HashSet<&str> = taken.iter().map(String::as_str).collect();
    if !taken.contains(base) {
        return base.to_string();
    }
    let mut n = 1u32;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Acme"), "acme");
        assert_eq!(slugify("Acme Inc."), "acme-inc");
        assert_eq!(slugify("  Møller & Sons GmbH  "), "m-ller-sons-gmbh");
        assert_eq!(slugify("--already--slugged--"), "already-slugged");
    }

    #[test]
    fn test_slugify_never_empty() {
        assert_eq!(slugify(""), "org");
        assert_eq!(slugify("!!!"), "org");
    }

    #[test]
    fn test_slug_collision_appends_numeric_suffix() {
        let taken = vec!["acme".to_string()];
        assert_eq!(resolve_slug_collision("acme", &taken), "acme-1");

        let taken = vec!["acme".to_string(), "acme-1".to_string()];
        assert_eq!(resolve_slug_collision("acme", &taken), "acme-2");
    }

    #[test]
    fn test_slug_no_collision_keeps_base() {
        let taken = vec!["acme-1".to_string()];
        assert_eq!(resolve_slug_collision("acme", &taken), "acme");
        assert_eq!(resolve_slug_collision("beta", &[]), "beta");
    }
}
