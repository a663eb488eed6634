//! File selection for a catalog entry
//!
//! Deterministic: the same entry and config always select the same file, so
//! repeated resolutions against an unchanged snapshot produce identical
//! lockfiles.

use crate::catalog::{CatalogEntry, CatalogFile};
use crate::manifest::ModpackConfig;

/// Versions accepted for a target version string
///
/// Upstream authors routinely tag an `X.Y.5` build with an earlier patch
/// release, so a `.5` target also accepts `X.Y.1` through `X.Y.4`.
pub(crate) fn accepted_versions(target: &str) -> Vec<String> {
    let mut versions = vec![target.to_string()];
    let parts: Vec<&str> = target.split('.').collect();
    if parts.len() == 3 && parts[2] == "5" {
        for patch in 1..5 {
            versions.push(format!("{}.{}.{}", parts[0], parts[1], patch));
        }
    }
    versions
}

/// Select the file to install for `entry` under `config`
///
/// Filters to loader-compatible files tagged with an accepted game version,
/// then takes the most recent by file date; ties keep the first-seen file so
/// selection is reproducible for identical snapshots.
pub fn select_file<'a>(entry: &'a CatalogEntry, config: &ModpackConfig) -> Option<&'a CatalogFile> {
    let versions = accepted_versions(&config.version);
    let mut best: Option<&CatalogFile> = None;
    for file in &entry.files {
        if !file.mod_loader.compatible_with(config.mod_loader) {
            continue;
        }
        if !file.game_versions.iter().any(|v| versions.contains(v)) {
            continue;
        }
        match best {
            Some(current) if file.file_date <= current.file_date => {}
            _ => best = Some(file),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ModLoader;
    use chrono::{TimeZone, Utc};

    fn file(name: &str, versions: &[&str], loader: ModLoader, date: i64) -> CatalogFile {
        CatalogFile {
            game_versions: versions.iter().map(|v| v.to_string()).collect(),
            mod_loader: loader,
            file_id: 1,
            file_date: Utc.timestamp_opt(date, 0).unwrap(),
            download_url: format!("https://cdn.invalid/{name}"),
            file_name: name.to_string(),
            file_length: Some(10),
            dependencies: Vec::new(),
        }
    }

    fn entry(files: Vec<CatalogFile>) -> CatalogEntry {
        CatalogEntry {
            id: 1,
            slug: "mod".to_string(),
            name: "Mod".to_string(),
            summary: String::new(),
            files,
        }
    }

    fn forge_config(version: &str) -> ModpackConfig {
        ModpackConfig {
            version: version.to_string(),
            mod_loader: ModLoader::Forge,
        }
    }

    #[test]
    fn fuzzy_rule_accepts_mistagged_patch_releases() {
        for tagged in ["1.16.1", "1.16.2", "1.16.3", "1.16.4"] {
            let entry = entry(vec![file("a.jar", &[tagged], ModLoader::Forge, 100)]);
            assert!(
                select_file(&entry, &forge_config("1.16.5")).is_some(),
                "{tagged} should satisfy a 1.16.5 target"
            );
        }
    }

    #[test]
    fn fuzzy_rule_rejects_other_versions() {
        let entry = entry(vec![
            file("a.jar", &["1.15.2"], ModLoader::Forge, 100),
            file("b.jar", &["1.16"], ModLoader::Forge, 100),
            file("c.jar", &["1.17.1"], ModLoader::Forge, 100),
        ]);
        assert!(select_file(&entry, &forge_config("1.16.5")).is_none());
    }

    #[test]
    fn fuzzy_rule_only_applies_to_dot_five_targets() {
        let entry = entry(vec![file("a.jar", &["1.12.1"], ModLoader::Forge, 100)]);
        assert!(select_file(&entry, &forge_config("1.12.2")).is_none());
    }

    #[test]
    fn opposite_loader_is_excluded_and_agnostic_passes() {
        let entry = entry(vec![
            file("fabric.jar", &["1.16.5"], ModLoader::Fabric, 200),
            file("any.jar", &["1.16.5"], ModLoader::Any, 100),
        ]);
        let selected = select_file(&entry, &forge_config("1.16.5")).unwrap();
        assert_eq!(selected.file_name, "any.jar");
    }

    #[test]
    fn latest_file_date_wins() {
        let entry = entry(vec![
            file("old.jar", &["1.16.5"], ModLoader::Forge, 100),
            file("new.jar", &["1.16.5"], ModLoader::Forge, 200),
        ]);
        let selected = select_file(&entry, &forge_config("1.16.5")).unwrap();
        assert_eq!(selected.file_name, "new.jar");
    }

    #[test]
    fn date_tie_keeps_first_seen() {
        let entry = entry(vec![
            file("first.jar", &["1.16.5"], ModLoader::Forge, 100),
            file("second.jar", &["1.16.5"], ModLoader::Forge, 100),
        ]);
        let selected = select_file(&entry, &forge_config("1.16.5")).unwrap();
        assert_eq!(selected.file_name, "first.jar");
    }
}
