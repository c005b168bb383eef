//! Selector -> concrete install plan. No network access.

use crate::error::ResolveError;
use crate::game::metadata::types::{InstallPlan, VersionSelector, VersionType};

pub fn fabric_version_id(mc_version: &str) -> String {
    format!("{}-fabric", mc_version)
}

pub fn resolve_install_plan(selector: &VersionSelector) -> Result<InstallPlan, ResolveError> {
    let mc_version = selector.mc_version.trim();
    if mc_version.is_empty() {
        return Err(ResolveError::UnknownSelector(selector.id.clone()));
    }

    let plan = match selector.version_type {
        // Custom builds ship on Fabric
        VersionType::Custom | VersionType::Fabric => InstallPlan {
            version_id: fabric_version_id(mc_version),
            mc_version: mc_version.to_string(),
            is_modded: true,
        },
        t if t.is_vanilla() => InstallPlan {
            version_id: mc_version.to_string(),
            mc_version: mc_version.to_string(),
            is_modded: false,
        },
        other => return Err(ResolveError::UnsupportedLoader(other.label().to_string())),
    };

    log::debug!(
        "[resolve] {} -> {} (modded: {})",
        selector.id,
        plan.version_id,
        plan.is_modded
    );
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(raw: &str) -> Result<InstallPlan, ResolveError> {
        resolve_install_plan(&VersionSelector::parse(raw)?)
    }

    #[test]
    fn vanilla_id_is_the_mc_version() {
        let p = plan("release:1.20.1").unwrap();
        assert_eq!(p.version_id, "1.20.1");
        assert!(!p.is_modded);
        assert_eq!(plan("snapshot:24w14a").unwrap().version_id, "24w14a");
    }

    #[test]
    fn fabric_and_custom_are_modded() {
        let p = plan("fabric:1.20.1").unwrap();
        assert_eq!(p.version_id, "1.20.1-fabric");
        assert_eq!(p.mc_version, "1.20.1");
        assert!(p.is_modded);

        let survival = plan("evacuation").unwrap();
        assert_eq!(survival.version_id, "1.21.4-fabric");
        assert!(survival.is_modded);
    }

    #[test]
    fn other_loaders_are_rejected() {
        assert!(matches!(
            plan("forge:1.20.1"),
            Err(ResolveError::UnsupportedLoader(_))
        ));
        assert!(matches!(
            plan("quilt:1.20.1"),
            Err(ResolveError::UnsupportedLoader(_))
        ));
    }
}
