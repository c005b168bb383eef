use serde::{Deserialize, Serialize};

use crate::error::ResolveError;
use crate::game::installer::types::{non_empty, ProfileLayout};

/// Id of the community survival build.
pub const SURVIVAL_BUILD_ID: &str = "evacuation";

/// Minecraft version the survival build is pinned to.
pub const SURVIVAL_BUILD_MC_VERSION: &str = "1.21.4";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionType {
    Release,
    Snapshot,
    OldAlpha,
    OldBeta,
    Fabric,
    Forge,
    #[serde(rename = "neoforge")]
    NeoForge,
    Quilt,
    LegacyForge,
    Custom,
}

impl VersionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionType::Release => "release",
            VersionType::Snapshot => "snapshot",
            VersionType::OldAlpha => "old_alpha",
            VersionType::OldBeta => "old_beta",
            VersionType::Fabric => "fabric",
            VersionType::Forge => "forge",
            VersionType::NeoForge => "neoforge",
            VersionType::Quilt => "quilt",
            VersionType::LegacyForge => "legacy_forge",
            VersionType::Custom => "custom",
        }
    }

    /// Heading the version list groups this type under.
    pub fn label(&self) -> &'static str {
        match self {
            VersionType::Custom => "Сборки FixLauncher",
            VersionType::Release => "Release",
            VersionType::Snapshot => "Snapshot",
            VersionType::OldAlpha => "Old Alpha",
            VersionType::OldBeta => "Old Beta",
            VersionType::Fabric => "Fabric",
            VersionType::Forge => "Forge",
            VersionType::NeoForge => "NeoForge",
            VersionType::Quilt => "Quilt",
            VersionType::LegacyForge => "Legacy Forge",
        }
    }

    pub fn has_mod_loader(&self) -> bool {
        matches!(
            self,
            VersionType::Custom
                | VersionType::Fabric
                | VersionType::Forge
                | VersionType::NeoForge
                | VersionType::Quilt
                | VersionType::LegacyForge
        )
    }

    /// Vanilla-family types share the plain Mojang install path.
    pub fn is_vanilla(&self) -> bool {
        matches!(
            self,
            VersionType::Release | VersionType::Snapshot | VersionType::OldAlpha | VersionType::OldBeta
        )
    }
}

impl std::fmt::Display for VersionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VersionType {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "release" | "vanilla" => Ok(VersionType::Release),
            "snapshot" => Ok(VersionType::Snapshot),
            "old_alpha" => Ok(VersionType::OldAlpha),
            "old_beta" => Ok(VersionType::OldBeta),
            "fabric" => Ok(VersionType::Fabric),
            "forge" => Ok(VersionType::Forge),
            "neoforge" => Ok(VersionType::NeoForge),
            "quilt" => Ok(VersionType::Quilt),
            "legacy_forge" => Ok(VersionType::LegacyForge),
            "custom" | "evacuation" => Ok(VersionType::Custom),
            _ => Err(ResolveError::UnknownSelector(s.to_string())),
        }
    }
}

/// What the player picked: a custom build or `type:mcVersion`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSelector {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: VersionType,
    pub mc_version: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
}

/// Builds maintained by the project itself.
pub fn custom_builds() -> Vec<VersionSelector> {
    vec![VersionSelector {
        id: SURVIVAL_BUILD_ID.to_string(),
        version_type: VersionType::Custom,
        mc_version: SURVIVAL_BUILD_MC_VERSION.to_string(),
        label: "VanillaSuns — Выживание".to_string(),
        description: format!("Fabric {} (кастомная сборка проекта)", SURVIVAL_BUILD_MC_VERSION),
    }]
}

impl VersionSelector {
    pub fn new(version_type: VersionType, mc_version: &str) -> Self {
        let label = match version_type {
            VersionType::Fabric => format!("Fabric {}", mc_version),
            _ => mc_version.to_string(),
        };
        Self {
            id: format!("{}:{}", version_type.as_str(), mc_version),
            version_type,
            mc_version: mc_version.to_string(),
            label,
            description: version_type.label().to_string(),
        }
    }

    /// Parse a stored selector: a custom build id, `type:mcVersion`, or a
    /// bare Minecraft version (treated as a release).
    pub fn parse(raw: &str) -> Result<Self, ResolveError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ResolveError::UnknownSelector(raw.to_string()));
        }
        if let Some(build) = custom_builds().into_iter().find(|b| b.id == raw) {
            return Ok(build);
        }

        let (kind, mc_version) = raw.split_once(':').unwrap_or(("release", raw));
        if mc_version.is_empty() {
            return Err(ResolveError::UnknownSelector(raw.to_string()));
        }
        let version_type: VersionType = kind.parse()?;
        if version_type == VersionType::Custom {
            return Err(ResolveError::UnknownSelector(raw.to_string()));
        }
        let mut selector = Self::new(version_type, mc_version);
        selector.id = raw.to_string();
        Ok(selector)
    }

    pub fn has_mod_loader(&self) -> bool {
        self.version_type.has_mod_loader()
    }

    /// `versions/` entries that count as this selector being installed.
    pub fn version_dir_names_for_check(&self) -> Vec<String> {
        if self.id == SURVIVAL_BUILD_ID {
            return vec![
                SURVIVAL_BUILD_MC_VERSION.to_string(),
                format!("{}-fabric", SURVIVAL_BUILD_MC_VERSION),
            ];
        }
        match self.version_type {
            VersionType::Fabric => vec![format!("{}-fabric", self.mc_version)],
            _ if self.mc_version.is_empty() => Vec::new(),
            _ => vec![self.mc_version.clone()],
        }
    }

    /// Whether any candidate version dir holds a non-empty json and jar.
    pub fn is_installed(&self, layout: &ProfileLayout) -> bool {
        self.version_dir_names_for_check().iter().any(|id| {
            non_empty(&layout.version_json(id)) && non_empty(&layout.version_jar(id))
        })
    }
}

/// Concrete install target produced by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallPlan {
    pub version_id: String,
    pub mc_version: String,
    pub is_modded: bool,
}

// ============================================================================
// External API Response Types
// ============================================================================

/// Mojang version manifest response
#[derive(Debug, Clone, Deserialize)]
pub struct MojangVersionManifest {
    #[serde(default)]
    pub latest: Option<MojangLatest>,
    pub versions: Vec<MojangVersion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MojangLatest {
    pub release: String,
    pub snapshot: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MojangVersion {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub release_time: Option<String>,
}

/// Entry of Fabric's `/versions/game` list
#[derive(Debug, Clone, Deserialize)]
pub struct FabricGameVersion {
    pub version: String,
    #[serde(default)]
    pub stable: bool,
}

/// Entry of Fabric's `/versions/loader/<mc>` list
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FabricLoaderEntry {
    pub loader: FabricComponent,
    #[serde(default)]
    pub intermediary: Option<FabricComponent>,
    #[serde(default)]
    pub launcher_meta: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FabricComponent {
    pub version: String,
    #[serde(default)]
    pub maven: Option<String>,
    #[serde(default)]
    pub stable: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_selectors() {
        let survival = VersionSelector::parse("evacuation").unwrap();
        assert_eq!(survival.version_type, VersionType::Custom);
        assert_eq!(survival.mc_version, "1.21.4");
        assert!(survival.has_mod_loader());

        let fabric = VersionSelector::parse("fabric:1.20.1").unwrap();
        assert_eq!(fabric.version_type, VersionType::Fabric);
        assert_eq!(fabric.label, "Fabric 1.20.1");
        assert_eq!(fabric.id, "fabric:1.20.1");

        let bare = VersionSelector::parse("1.20.1").unwrap();
        assert_eq!(bare.version_type, VersionType::Release);
        assert!(!bare.has_mod_loader());
        assert_eq!(bare.id, "1.20.1");

        assert!(VersionSelector::parse("banana:1.0").is_err());
        assert!(VersionSelector::parse("release:").is_err());
        assert!(VersionSelector::parse("").is_err());
    }

    #[test]
    fn version_type_serde_names() {
        assert_eq!(serde_json::to_string(&VersionType::OldAlpha).unwrap(), "\"old_alpha\"");
        assert_eq!(serde_json::to_string(&VersionType::NeoForge).unwrap(), "\"neoforge\"");
        assert_eq!("legacy_forge".parse::<VersionType>().unwrap(), VersionType::LegacyForge);
    }

    #[test]
    fn installed_needs_json_and_jar() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = ProfileLayout::new(tmp.path());
        let survival = VersionSelector::parse("evacuation").unwrap();
        assert_eq!(survival.version_dir_names_for_check(), vec!["1.21.4", "1.21.4-fabric"]);
        assert!(!survival.is_installed(&layout));

        let json = layout.version_json("1.21.4-fabric");
        std::fs::create_dir_all(json.parent().unwrap()).unwrap();
        std::fs::write(&json, "{}").unwrap();
        std::fs::write(layout.version_jar("1.21.4-fabric"), b"").unwrap();
        assert!(!survival.is_installed(&layout));

        std::fs::write(layout.version_jar("1.21.4-fabric"), b"PK").unwrap();
        assert!(survival.is_installed(&layout));
    }
}
