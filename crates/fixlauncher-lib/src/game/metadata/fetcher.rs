use super::types::*;
use crate::game::installer::config::Endpoints;
use crate::game::installer::core::downloader::fetch_optional_json;
use reqwest::Client;

/// Per-type caps for the selectable list.
pub const RELEASE_CAP: usize = 30;
pub const SNAPSHOT_CAP: usize = 20;
pub const OLD_ALPHA_CAP: usize = 15;
pub const OLD_BETA_CAP: usize = 15;
pub const FABRIC_CAP: usize = 25;

fn vanilla_selectors(manifest: &MojangVersionManifest) -> Vec<VersionSelector> {
    let caps = [
        (VersionType::Release, RELEASE_CAP),
        (VersionType::Snapshot, SNAPSHOT_CAP),
        (VersionType::OldBeta, OLD_BETA_CAP),
        (VersionType::OldAlpha, OLD_ALPHA_CAP),
    ];

    let mut out = Vec::new();
    for (version_type, cap) in caps {
        out.extend(
            manifest
                .versions
                .iter()
                .filter(|v| v.version_type == version_type.as_str())
                .take(cap)
                .map(|v| VersionSelector::new(version_type, &v.id)),
        );
    }
    out
}

fn fabric_selectors(game_versions: &[FabricGameVersion]) -> Vec<VersionSelector> {
    game_versions
        .iter()
        .filter(|v| v.stable)
        .take(FABRIC_CAP)
        .map(|v| VersionSelector::new(VersionType::Fabric, &v.version))
        .collect()
}

/// The list offered to the player: custom builds, then capped vanilla
/// slices, then Fabric game versions. A source that cannot be fetched just
/// contributes nothing.
pub async fn fetch_version_list(client: &Client, endpoints: &Endpoints) -> Vec<VersionSelector> {
    let fabric_url = endpoints.fabric_game_versions_url();
    let (manifest, fabric) = futures::join!(
        fetch_optional_json::<MojangVersionManifest>(client, &endpoints.version_manifest),
        fetch_optional_json::<Vec<FabricGameVersion>>(client, &fabric_url),
    );

    let mut list = custom_builds();
    match manifest {
        Some(manifest) => list.extend(vanilla_selectors(&manifest)),
        None => log::warn!("[versions] vanilla manifest unavailable, list will be shorter"),
    }
    match fabric {
        Some(versions) => list.extend(fabric_selectors(&versions)),
        None => log::warn!("[versions] Fabric game list unavailable, list will be shorter"),
    }

    log::info!("[versions] {} selectable versions", list.len());
    list
}
