//! Version display names.

use crate::config::VersionsConfig;
use crate::db::{VersionRecord, VersionType};

/// Name for the next version of a parent, derived from its current siblings.
///
/// `"{prefix}{n}"` where `n` is one past the sibling count. Post-sale
/// versions get a chapter suffix, `" {chapter_prefix}{m}"`, where `m` is one
/// past the number of post-sale siblings. Names are not guaranteed unique:
/// two creations racing on the same sibling count get the same name.
pub fn generate_name(
    existing: &[VersionRecord],
    version_type: VersionType,
    config: &VersionsConfig,
) -> String {
    let mut name = format!("{}{}", config.name_prefix, existing.len() + 1);

    if version_type == VersionType::PostSale {
        let post_sale = existing
            .iter()
            .filter(|v| v.version_type == VersionType::PostSale)
            .count();
        name.push_str(&format!(" {}{}", config.chapter_prefix, post_sale + 1));
    }

    name
}
