//! Installed mods: listing, metadata, enable/disable and conflict hints.
//!
//! Disabling renames `x.jar` to `x.jar.disabled`; file contents are never
//! touched.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

pub const DISABLED_SUFFIX: &str = ".disabled";
const UNKNOWN_VERSION: &str = "—";

/// Mod pairs known not to work together, matched by lowercase substring.
pub const CONFLICT_PAIRS: &[(&str, &str)] = &[
    ("optifine", "iris"),
    ("sodium", "optifine"),
    ("rubidium", "sodium"),
    ("forge", "fabric"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModLoaderKind {
    Fabric,
    Forge,
    Unknown,
    /// The jar could not be opened
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModMetadata {
    pub name: String,
    pub version: String,
    pub loader: ModLoaderKind,
    pub id: Option<String>,
    pub description: Option<String>,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledMod {
    pub path: PathBuf,
    pub enabled: bool,
    pub size: u64,
    #[serde(flatten)]
    pub metadata: ModMetadata,
}

#[derive(Debug, Deserialize)]
struct FabricModJson {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// File name without `.jar` / `.disabled`.
pub fn display_name_from_file(file_name: &str) -> String {
    let base = file_name.strip_suffix(DISABLED_SUFFIX).unwrap_or(file_name);
    base.strip_suffix(".jar").unwrap_or(base).to_string()
}

fn toml_value(text: &str, key: &str) -> Option<String> {
    let re = Regex::new(&format!(r#"{}\s*=\s*["']([^"']+)["']"#, key)).ok()?;
    re.captures(text).map(|c| c[1].to_string())
}

fn read_from_archive(path: &Path, file_name: &str) -> Result<ModMetadata> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mut archive = ZipArchive::new(file)?;

    // Fabric first: fabric.mod.json anywhere in the jar
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_owned();
        if name != "fabric.mod.json" && !name.ends_with("/fabric.mod.json") {
            continue;
        }
        let mut text = String::new();
        entry.read_to_string(&mut text)?;
        match serde_json::from_str::<FabricModJson>(&text) {
            Ok(json) => {
                return Ok(ModMetadata {
                    name: json
                        .name
                        .clone()
                        .or_else(|| json.id.clone())
                        .unwrap_or_else(|| display_name_from_file(file_name)),
                    version: json.version.unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
                    loader: ModLoaderKind::Fabric,
                    id: json.id,
                    description: json.description,
                    file_name: file_name.to_string(),
                });
            }
            Err(e) => log::debug!("[mods] bad {} in {}: {}", name, file_name, e),
        }
    }

    if let Ok(mut entry) = archive.by_name("META-INF/mods.toml") {
        let mut text = String::new();
        entry.read_to_string(&mut text)?;
        return Ok(ModMetadata {
            name: toml_value(&text, "displayName")
                .unwrap_or_else(|| display_name_from_file(file_name)),
            version: toml_value(&text, "version").unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
            loader: ModLoaderKind::Forge,
            id: toml_value(&text, "modId"),
            description: None,
            file_name: file_name.to_string(),
        });
    }

    Ok(ModMetadata {
        name: display_name_from_file(file_name),
        version: UNKNOWN_VERSION.to_string(),
        loader: ModLoaderKind::Unknown,
        id: None,
        description: None,
        file_name: file_name.to_string(),
    })
}

/// Metadata from `fabric.mod.json`, else `META-INF/mods.toml`, else the
/// file name. Never fails; unreadable jars are marked [`ModLoaderKind::Error`].
pub fn read_mod_metadata(path: &Path) -> ModMetadata {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    read_from_archive(path, &file_name).unwrap_or_else(|e| {
        log::warn!("[mods] cannot read {:?}: {:#}", path, e);
        ModMetadata {
            name: display_name_from_file(&file_name),
            version: UNKNOWN_VERSION.to_string(),
            loader: ModLoaderKind::Error,
            id: None,
            description: None,
            file_name,
        }
    })
}

/// `*.jar` and `*.jar.disabled` in `mods_dir`, sorted by file name.
/// A missing directory is an empty list.
pub fn list_mods(mods_dir: &Path) -> Result<Vec<InstalledMod>> {
    if !mods_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut mods = Vec::new();
    for entry in std::fs::read_dir(mods_dir).with_context(|| format!("Failed to read {:?}", mods_dir))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let enabled = name.ends_with(".jar");
        if !enabled && !name.ends_with(".jar.disabled") {
            continue;
        }
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        let path = entry.path();
        mods.push(InstalledMod {
            metadata: read_mod_metadata(&path),
            path,
            enabled,
            size: meta.len(),
        });
    }
    mods.sort_by(|a, b| a.metadata.file_name.cmp(&b.metadata.file_name));
    Ok(mods)
}

/// Rename a mod in or out of the `.disabled` state. Returns the new path;
/// a mod already in the requested state is left alone.
pub fn set_mod_enabled(path: &Path, enabled: bool) -> Result<PathBuf> {
    if !path.exists() {
        anyhow::bail!("Mod not found: {:?}", path);
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let target = match (enabled, name.strip_suffix(DISABLED_SUFFIX)) {
        (true, Some(stripped)) => path.with_file_name(stripped),
        (false, None) => path.with_file_name(format!("{}{}", name, DISABLED_SUFFIX)),
        _ => return Ok(path.to_path_buf()),
    };
    std::fs::rename(path, &target)
        .with_context(|| format!("Failed to rename {:?} to {:?}", path, target))?;
    log::info!("[mods] {} -> {:?}", if enabled { "enabled" } else { "disabled" }, target);
    Ok(target)
}

pub fn delete_mod(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path).with_context(|| format!("Failed to delete {:?}", path))?;
        log::info!("[mods] deleted {:?}", path);
    }
    Ok(())
}

/// Known incompatible pairs present in `names`, rendered `"a ↔ b"`.
pub fn detect_mod_conflicts<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let lower: Vec<String> = names.iter().map(|n| n.as_ref().to_lowercase()).collect();
    let has = |needle: &str| lower.iter().any(|n| n.contains(needle));
    CONFLICT_PAIRS
        .iter()
        .filter(|(a, b)| has(a) && has(b))
        .map(|(a, b)| format!("{} ↔ {}", a, b))
        .collect()
}
