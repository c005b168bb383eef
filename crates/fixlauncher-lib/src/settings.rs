//! Persisted launcher settings (`launcher-settings.json`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::game::installer::config::DEFAULT_CONCURRENCY;
use crate::game::installer::core::jre_manager::{resolve_java_path, JAVA_PATH_AUTO};
use crate::game::installer::core::modpack_installer::ModpackSource;
use crate::game::installer::types::OsType;
use crate::game::metadata::SURVIVAL_BUILD_ID;

pub const DEFAULT_RAM_GB: u32 = 4;
pub const DEFAULT_PLAYER_NAME: &str = "Player";
const MINECRAFT_PATH_AUTO: &str = "auto";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LauncherSettings {
    /// Heap size in GB
    pub ram: u32,
    /// Path to a java executable, or `auto`
    pub java_path: String,
    /// Directory holding the profiles, or `auto` for the launcher base
    pub minecraft_path: String,
    pub player_name: String,
    /// Version selector id
    pub selected_version: String,
    pub jvm_flags: Vec<String>,
    pub custom_jvm_args: String,
    pub download_concurrency: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modpack: Option<ModpackSource>,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            ram: DEFAULT_RAM_GB,
            java_path: JAVA_PATH_AUTO.to_string(),
            minecraft_path: MINECRAFT_PATH_AUTO.to_string(),
            player_name: DEFAULT_PLAYER_NAME.to_string(),
            selected_version: SURVIVAL_BUILD_ID.to_string(),
            jvm_flags: Vec::new(),
            custom_jvm_args: String::new(),
            download_concurrency: DEFAULT_CONCURRENCY,
            modpack: None,
        }
    }
}

impl LauncherSettings {
    /// Read settings; a missing or unreadable file gives the defaults.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("[settings] {:?} not found, using defaults", path);
                return Self::default();
            }
            Err(e) => {
                log::warn!("[settings] cannot read {:?}: {}, using defaults", path, e);
                return Self::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("[settings] invalid {:?}: {}, using defaults", path, e);
                Self::default()
            }
        }
    }

    /// Pretty JSON written to a temp file, then renamed over the target.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp, json).with_context(|| format!("Failed to write {:?}", tmp))?;
        std::fs::rename(&tmp, path).with_context(|| format!("Failed to replace {:?}", path))?;
        log::debug!("[settings] saved {:?}", path);
        Ok(())
    }

    /// Directory the profiles live in.
    pub fn minecraft_root(&self, base: &Path) -> PathBuf {
        let configured = self.minecraft_path.trim();
        if configured.is_empty() || configured == MINECRAFT_PATH_AUTO {
            base.to_path_buf()
        } else {
            PathBuf::from(configured)
        }
    }

    pub fn java_executable(&self, base: &Path, os: OsType) -> PathBuf {
        resolve_java_path(&self.java_path, base, os)
    }

    /// Player name with surrounding whitespace removed; blank falls back to
    /// the default name.
    pub fn player(&self) -> &str {
        match self.player_name.trim() {
            "" => DEFAULT_PLAYER_NAME,
            name => name,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.download_concurrency.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = LauncherSettings::load(&tmp.path().join("launcher-settings.json"));
        assert_eq!(settings, LauncherSettings::default());
        assert_eq!(settings.ram, 4);
        assert_eq!(settings.selected_version, "evacuation");
        assert_eq!(settings.download_concurrency, 1);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("launcher-settings.json");
        std::fs::write(
            &path,
            r#"{"ram":6,"playerName":"Steve","modpack":{"owner":"fixsirt","repo":"build"}}"#,
        )
        .unwrap();

        let settings = LauncherSettings::load(&path);
        assert_eq!(settings.ram, 6);
        assert_eq!(settings.player(), "Steve");
        assert_eq!(settings.java_path, "auto");
        assert_eq!(
            settings.modpack,
            Some(ModpackSource {
                owner: "fixsirt".into(),
                repo: "build".into(),
                branch: None,
            })
        );
    }

    #[test]
    fn invalid_json_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("launcher-settings.json");
        std::fs::write(&path, "{ram:").unwrap();
        assert_eq!(LauncherSettings::load(&path), LauncherSettings::default());
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("launcher-settings.json");
        let settings = LauncherSettings {
            ram: 8,
            jvm_flags: vec!["g1gc".into()],
            ..Default::default()
        };
        settings.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"jvmFlags\""));
        assert!(!raw.contains("modpack"));
        assert_eq!(LauncherSettings::load(&path), settings);
    }

    #[test]
    fn auto_paths_resolve_to_base() {
        let base = Path::new("/data/.fixlauncher");
        let mut settings = LauncherSettings::default();
        assert_eq!(settings.minecraft_root(base), base);
        settings.minecraft_path = "/games/mc".into();
        assert_eq!(settings.minecraft_root(base), Path::new("/games/mc"));

        settings.java_path = "/opt/jdk/bin/java".into();
        assert_eq!(
            settings.java_executable(base, OsType::Linux),
            Path::new("/opt/jdk/bin/java")
        );
        settings.player_name = "  ".into();
        assert_eq!(settings.player(), "Player");
    }
}
