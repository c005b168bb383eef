//! Mojang-format version json, library rules and inheritance.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::game::installer::config::{with_slash, MOJANG_LIBRARIES_URL};
use crate::game::installer::types::{OsType, ProfileLayout};
use crate::game::launcher::classpath::maven_to_path;

/// Version descriptor as stored in `versions/<id>/<id>.json`.
///
/// Fields the launcher does not interpret are kept in `extra`, so a
/// manifest can be cloned and rewritten without losing data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionJson {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherits_from: Option<String>,

    #[serde(default)]
    pub libraries: Vec<Library>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_index: Option<AssetIndexRef>,

    /// Legacy asset index id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<VersionDownloads>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub version_type: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<Artifact>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Library definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    /// Maven coordinates `group:artifact:version[:classifier]`
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,

    /// Maven repository base (Fabric-style entries)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,

    /// Legacy per-OS classifier map, e.g. `{"windows": "natives-windows-${arch}"}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natives: Option<HashMap<String, String>>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifiers: Option<BTreeMap<String, Artifact>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub action: RuleAction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsRule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<HashMap<String, bool>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

/// Standard rule evaluation: no rules means allowed; otherwise the last
/// matching rule decides and nothing matching means disallowed.
/// Feature-gated rules never match (no optional features are enabled).
pub fn evaluate_rules(rules: Option<&[Rule]>, os: OsType) -> bool {
    let Some(rules) = rules else {
        return true;
    };
    if rules.is_empty() {
        return true;
    }

    let mut allowed = false;
    for rule in rules {
        if rule.features.as_ref().is_some_and(|f| !f.is_empty()) {
            continue;
        }
        if let Some(os_rule) = &rule.os {
            if let Some(name) = &os_rule.name {
                if name != os.as_str() {
                    continue;
                }
            }
            if let Some(arch) = &os_rule.arch {
                if arch != os.arch_str() {
                    continue;
                }
            }
        }
        allowed = rule.action == RuleAction::Allow;
    }
    allowed
}

impl Library {
    /// Plain Maven entry resolved against `repo_url` (Fabric-style).
    pub fn from_maven(name: impl Into<String>, repo_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            downloads: None,
            url: Some(repo_url.into()),
            rules: None,
            natives: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn is_allowed(&self, os: OsType) -> bool {
        evaluate_rules(self.rules.as_deref(), os)
    }

    /// Classifier embedded in the coordinates (`g:a:v:classifier`), if any.
    pub fn name_classifier(&self) -> Option<&str> {
        let mut parts = self.name.split(':');
        let classifier = parts.nth(3)?;
        Some(classifier.split('@').next().unwrap_or(classifier))
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.downloads.as_ref().and_then(|d| d.artifact.as_ref())
    }

    /// Relative path of the main artifact under `libraries/`.
    pub fn artifact_path(&self) -> Option<String> {
        if let Some(path) = self.artifact().and_then(|a| a.path.clone()) {
            return Some(path);
        }
        // Entries that only carry natives have no main artifact
        if self.artifact().is_none()
            && self
                .downloads
                .as_ref()
                .is_some_and(|d| d.classifiers.is_some())
        {
            return None;
        }
        maven_to_path(&self.name).ok()
    }

    /// Where to fetch the main artifact from.
    pub fn artifact_url(&self) -> Option<String> {
        if let Some(url) = self.artifact().and_then(|a| a.url.clone()) {
            if !url.is_empty() {
                return Some(url);
            }
        }
        let path = self.artifact_path()?;
        let base = self.url.as_deref().unwrap_or(MOJANG_LIBRARIES_URL);
        Some(format!("{}{}", with_slash(base), path))
    }

    pub fn artifact_sha1(&self) -> Option<String> {
        self.artifact().and_then(|a| a.sha1.clone())
    }
}

impl VersionJson {
    /// Asset index id: `assetIndex.id`, else legacy `assets`, else `fallback`.
    pub fn asset_index_id(&self, fallback: &str) -> String {
        self.asset_index
            .as_ref()
            .map(|a| a.id.clone())
            .or_else(|| self.assets.clone())
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn client_download(&self) -> Option<&Artifact> {
        self.downloads.as_ref().and_then(|d| d.client.as_ref())
    }
}

pub fn read_version_json(path: &Path) -> Result<VersionJson> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read version json at {:?}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse version json at {:?}", path))
}

pub fn write_version_json(path: &Path, version: &VersionJson) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(version)?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))
}

/// Load a version and fold in its `inheritsFrom` parents.
pub fn load_version(layout: &ProfileLayout, version_id: &str) -> Result<VersionJson> {
    let mut version = read_version_json(&layout.version_json(version_id))?;
    let mut depth = 0;
    while let Some(parent_id) = version.inherits_from.take() {
        depth += 1;
        if depth > 8 {
            anyhow::bail!("inheritsFrom chain too deep at {}", version_id);
        }
        let parent = read_version_json(&layout.version_json(&parent_id))
            .with_context(|| format!("Parent version {} of {} is missing", parent_id, version_id))?;
        version = merge_versions(parent, version);
    }
    Ok(version)
}

/// Overlay `child` onto `parent`: child libraries come first, parent
/// libraries with the same `group:artifact` are dropped.
pub fn merge_versions(parent: VersionJson, child: VersionJson) -> VersionJson {
    let child_keys: std::collections::HashSet<String> =
        child.libraries.iter().map(|l| library_key(&l.name)).collect();

    let mut libraries = child.libraries;
    libraries.extend(
        parent
            .libraries
            .into_iter()
            .filter(|l| !child_keys.contains(&library_key(&l.name))),
    );

    let mut extra = parent.extra;
    extra.extend(child.extra);

    VersionJson {
        id: child.id,
        main_class: child.main_class.or(parent.main_class),
        inherits_from: parent.inherits_from,
        libraries,
        asset_index: child.asset_index.or(parent.asset_index),
        assets: child.assets.or(parent.assets),
        downloads: child.downloads.or(parent.downloads),
        version_type: child.version_type.or(parent.version_type),
        extra,
    }
}

/// `group:artifact[:classifier]`, version stripped.
pub fn library_key(name: &str) -> String {
    let parts: Vec<&str> = name.split(':').collect();
    match parts.len() {
        0..=2 => name.to_string(),
        3 => format!("{}:{}", parts[0], parts[1]),
        _ => format!("{}:{}:{}", parts[0], parts[1], parts[3]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lib(value: serde_json::Value) -> Library {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn rules_follow_last_match() {
        let l = lib(json!({
            "name": "a:b:1",
            "rules": [
                {"action": "allow"},
                {"action": "disallow", "os": {"name": "osx"}}
            ]
        }));
        assert!(l.is_allowed(OsType::Linux));
        assert!(!l.is_allowed(OsType::MacOSArm64));

        let only_windows = lib(json!({
            "name": "a:b:1",
            "rules": [{"action": "allow", "os": {"name": "windows"}}]
        }));
        assert!(only_windows.is_allowed(OsType::Windows));
        assert!(!only_windows.is_allowed(OsType::Linux));
    }

    #[test]
    fn feature_rules_never_match() {
        let l = lib(json!({
            "name": "a:b:1",
            "rules": [{"action": "allow", "features": {"is_demo_user": true}}]
        }));
        assert!(!l.is_allowed(OsType::Linux));
    }

    #[test]
    fn fabric_style_library_url() {
        let l = lib(json!({
            "name": "net.fabricmc:fabric-loader:0.16.9",
            "url": "https://maven.fabricmc.net/"
        }));
        assert_eq!(
            l.artifact_url().unwrap(),
            "https://maven.fabricmc.net/net/fabricmc/fabric-loader/0.16.9/fabric-loader-0.16.9.jar"
        );
        assert_eq!(l.artifact_sha1(), None);
    }

    #[test]
    fn classifier_only_library_has_no_artifact() {
        let l = lib(json!({
            "name": "org.lwjgl.lwjgl:lwjgl-platform:2.9.4",
            "downloads": {"classifiers": {"natives-windows": {"path": "x.jar", "url": "u"}}}
        }));
        assert_eq!(l.artifact_path(), None);
        assert_eq!(l.name_classifier(), None);

        let n = lib(json!({"name": "org.lwjgl:lwjgl:3.3.3:natives-windows"}));
        assert_eq!(n.name_classifier(), Some("natives-windows"));
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let raw = json!({
            "id": "1.21.4",
            "mainClass": "net.minecraft.client.main.Main",
            "javaVersion": {"majorVersion": 21},
            "libraries": []
        });
        let v: VersionJson = serde_json::from_value(raw).unwrap();
        let back = serde_json::to_value(&v).unwrap();
        assert_eq!(back["javaVersion"]["majorVersion"], 21);
    }

    #[test]
    fn inheritance_merges_child_over_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = ProfileLayout::new(tmp.path());
        let parent: VersionJson = serde_json::from_value(json!({
            "id": "1.21.4",
            "mainClass": "net.minecraft.client.main.Main",
            "assetIndex": {"id": "19", "url": "u"},
            "libraries": [
                {"name": "org.ow2.asm:asm:9.6"},
                {"name": "com.mojang:brigadier:1.0"}
            ]
        }))
        .unwrap();
        let child: VersionJson = serde_json::from_value(json!({
            "id": "fabric-loader-0.16.9-1.21.4",
            "inheritsFrom": "1.21.4",
            "mainClass": "net.fabricmc.loader.impl.launch.knot.KnotClient",
            "libraries": [{"name": "org.ow2.asm:asm:9.9", "url": "https://maven.fabricmc.net/"}]
        }))
        .unwrap();
        write_version_json(&layout.version_json("1.21.4"), &parent).unwrap();
        write_version_json(&layout.version_json(&child.id), &child).unwrap();

        let merged = load_version(&layout, "fabric-loader-0.16.9-1.21.4").unwrap();
        assert_eq!(
            merged.main_class.as_deref(),
            Some("net.fabricmc.loader.impl.launch.knot.KnotClient")
        );
        assert_eq!(merged.asset_index_id("x"), "19");
        let names: Vec<&str> = merged.libraries.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["org.ow2.asm:asm:9.9", "com.mojang:brigadier:1.0"]);
        assert!(merged.inherits_from.is_none());
    }
}
