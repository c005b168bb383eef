//! On-disk locations of launcher data.
//!
//! The launcher base directory holds settings, playtime and the per-build
//! profiles. Each profile is a self-contained game directory with its own
//! `versions/`, `libraries/`, `assets/`, `natives/` and `mods/`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::game::installer::types::OsType;

pub const SETTINGS_FILE: &str = "launcher-settings.json";
pub const PLAYTIME_FILE: &str = "launcher-playtime.json";

/// Profile folder used by the community survival build.
const SURVIVAL_PROFILE: &str = "minecraft-survival";

pub fn launcher_base_path_for(os: OsType, home: &Path, app_data: Option<&Path>) -> PathBuf {
    match os.as_str() {
        "windows" => roaming_dir(home, app_data).join(".fixlauncher"),
        "osx" => home
            .join("Library")
            .join("Application Support")
            .join("fixlauncher"),
        _ => home.join(".fixlauncher"),
    }
}

/// Directories used by the launcher before it was renamed.
pub fn legacy_base_paths_for(os: OsType, home: &Path, app_data: Option<&Path>) -> Vec<PathBuf> {
    let legacy = match os.as_str() {
        "windows" => roaming_dir(home, app_data).join(".vanilla-suns"),
        "osx" => home
            .join("Library")
            .join("Application Support")
            .join("vanilla-suns"),
        _ => home.join(".vanilla-suns"),
    };
    vec![legacy]
}

fn roaming_dir(home: &Path, app_data: Option<&Path>) -> PathBuf {
    match app_data {
        Some(dir) => dir.to_path_buf(),
        None => home.join("AppData").join("Roaming"),
    }
}

fn home_and_app_data() -> Result<(PathBuf, Option<PathBuf>)> {
    let dirs = directories::BaseDirs::new().context("Could not determine the home directory")?;
    let app_data = std::env::var_os("APPDATA").map(PathBuf::from);
    Ok((dirs.home_dir().to_path_buf(), app_data))
}

pub fn launcher_base_path() -> Result<PathBuf> {
    let (home, app_data) = home_and_app_data()?;
    Ok(launcher_base_path_for(
        OsType::current(),
        &home,
        app_data.as_deref(),
    ))
}

pub fn legacy_base_paths() -> Result<Vec<PathBuf>> {
    let (home, app_data) = home_and_app_data()?;
    Ok(legacy_base_paths_for(
        OsType::current(),
        &home,
        app_data.as_deref(),
    ))
}

pub fn settings_path(base: &Path) -> PathBuf {
    base.join(SETTINGS_FILE)
}

pub fn playtime_path(base: &Path) -> PathBuf {
    base.join(PLAYTIME_FILE)
}

/// Folder name of the profile for a version selector id.
pub fn profile_folder_name(selector_id: &str) -> String {
    if selector_id == crate::game::metadata::SURVIVAL_BUILD_ID {
        return SURVIVAL_PROFILE.to_string();
    }
    let sanitized: String = selector_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("minecraft-{}", sanitized)
}

pub fn profile_path(base: &Path, selector_id: &str) -> PathBuf {
    base.join(profile_folder_name(selector_id))
}

/// Copy settings and playtime from a pre-rename directory when the current
/// base has none yet. Returns the legacy directory that was used, if any.
pub fn migrate_legacy_base(base: &Path, legacy: &[PathBuf]) -> Result<Option<PathBuf>> {
    if settings_path(base).exists() {
        return Ok(None);
    }
    for old in legacy {
        let old_settings = settings_path(old);
        if !old_settings.is_file() {
            continue;
        }
        std::fs::create_dir_all(base)
            .with_context(|| format!("Failed to create launcher dir {:?}", base))?;
        for name in [SETTINGS_FILE, PLAYTIME_FILE] {
            let src = old.join(name);
            if src.is_file() {
                std::fs::copy(&src, base.join(name))
                    .with_context(|| format!("Failed to copy {:?}", src))?;
            }
        }
        log::info!("[paths] migrated launcher data from {:?}", old);
        return Ok(Some(old.clone()));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_path_per_platform() {
        let home = Path::new("/home/steve");
        assert_eq!(
            launcher_base_path_for(OsType::Linux, home, None),
            home.join(".fixlauncher")
        );
        assert_eq!(
            launcher_base_path_for(OsType::MacOSArm64, home, None),
            home.join("Library/Application Support/fixlauncher")
        );
        assert_eq!(
            launcher_base_path_for(OsType::Windows, home, Some(Path::new("/roaming"))),
            Path::new("/roaming").join(".fixlauncher")
        );
        assert_eq!(
            launcher_base_path_for(OsType::Windows, home, None),
            home.join("AppData").join("Roaming").join(".fixlauncher")
        );
    }

    #[test]
    fn legacy_paths_point_at_old_name() {
        let home = Path::new("/home/steve");
        assert_eq!(
            legacy_base_paths_for(OsType::Linux, home, None),
            vec![home.join(".vanilla-suns")]
        );
    }

    #[test]
    fn profile_folders() {
        assert_eq!(profile_folder_name("evacuation"), "minecraft-survival");
        assert_eq!(profile_folder_name("fabric:1.20.1"), "minecraft-fabric-1.20.1");
        assert_eq!(profile_folder_name("release:1.8 beta"), "minecraft-release-1.8-beta");
    }

    #[test]
    fn migrates_settings_once() {
        let tmp = tempfile::tempdir().unwrap();
        let old = tmp.path().join(".vanilla-suns");
        let new = tmp.path().join(".fixlauncher");
        std::fs::create_dir_all(&old).unwrap();
        std::fs::write(old.join(SETTINGS_FILE), "{\"ram\":6}").unwrap();

        let used = migrate_legacy_base(&new, &[old.clone()]).unwrap();
        assert_eq!(used, Some(old.clone()));
        assert_eq!(
            std::fs::read_to_string(new.join(SETTINGS_FILE)).unwrap(),
            "{\"ram\":6}"
        );

        assert_eq!(migrate_legacy_base(&new, &[old]).unwrap(), None);
    }
}
