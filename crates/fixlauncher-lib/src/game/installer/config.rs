//! Remote endpoints and network policy constants.
//! `Endpoints` bundles every base URL so tests can point the pipeline at a
//! mock server.

use std::time::Duration;

pub const VANILLA_MANIFEST_URL: &str =
    "https://launchermeta.mojang.com/mc/game/version_manifest.json";
pub const FABRIC_META_URL: &str = "https://meta.fabricmc.net/v2/versions";
pub const FABRIC_MAVEN_URL: &str = "https://maven.fabricmc.net/";
pub const FABRIC_INSTALLER_URL: &str =
    "https://maven.fabricmc.net/net/fabricmc/fabric-installer/1.0.1/fabric-installer-1.0.1.jar";
pub const RESOURCES_URL: &str = "https://resources.download.minecraft.net";
pub const MOJANG_LIBRARIES_URL: &str = "https://libraries.minecraft.net/";
pub const ADOPTIUM_API_URL: &str = "https://api.adoptium.net/v3";
pub const GITHUB_API_URL: &str = "https://api.github.com";
pub const GITHUB_RAW_URL: &str = "https://raw.githubusercontent.com";

/// Loader used when the Fabric meta API answers with an unexpected shape.
pub const FABRIC_FALLBACK_LOADER: &str = "0.16.9";
pub const FABRIC_KNOT_MAIN_CLASS: &str = "net.fabricmc.loader.impl.launch.knot.KnotClient";

pub const JSON_TIMEOUT_SECS: u64 = 30;
/// Longest silence tolerated while waiting for response headers or the
/// next body chunk. Large files have no total deadline.
pub const DOWNLOAD_IDLE_TIMEOUT_SECS: u64 = 30;
pub const PROBE_TIMEOUT_SECS: u64 = 5;
pub const MAX_REDIRECTS: usize = 5;
pub const DOWNLOAD_RETRIES: u32 = 3;

/// Delay between consecutive asset/library downloads.
pub const POLITENESS_DELAY_MS: u64 = 10;
pub const DEFAULT_CONCURRENCY: usize = 1;

pub const USER_AGENT: &str = concat!("FixLauncher/", env!("CARGO_PKG_VERSION"));

pub fn json_timeout() -> Duration {
    Duration::from_secs(JSON_TIMEOUT_SECS)
}

pub fn download_idle_timeout() -> Duration {
    Duration::from_secs(DOWNLOAD_IDLE_TIMEOUT_SECS)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub version_manifest: String,
    pub fabric_meta: String,
    pub fabric_maven: String,
    pub fabric_installer: String,
    pub resources: String,
    pub adoptium_api: String,
    pub github_api: String,
    pub github_raw: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            version_manifest: VANILLA_MANIFEST_URL.to_string(),
            fabric_meta: FABRIC_META_URL.to_string(),
            fabric_maven: FABRIC_MAVEN_URL.to_string(),
            fabric_installer: FABRIC_INSTALLER_URL.to_string(),
            resources: RESOURCES_URL.to_string(),
            adoptium_api: ADOPTIUM_API_URL.to_string(),
            github_api: GITHUB_API_URL.to_string(),
            github_raw: GITHUB_RAW_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Every endpoint rooted at one base URL, laid out as
    /// `<base>/manifest.json`, `<base>/fabric/...`, `<base>/resources/...`.
    pub fn rooted_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            version_manifest: format!("{}/manifest.json", base),
            fabric_meta: format!("{}/fabric/meta", base),
            fabric_maven: format!("{}/fabric/maven/", base),
            fabric_installer: format!("{}/fabric/installer.jar", base),
            resources: format!("{}/resources", base),
            adoptium_api: format!("{}/adoptium", base),
            github_api: format!("{}/github/api", base),
            github_raw: format!("{}/github/raw", base),
        }
    }

    pub fn asset_url(&self, hash: &str) -> String {
        let prefix = hash.get(..2).unwrap_or(hash);
        format!("{}/{}/{}", self.resources.trim_end_matches('/'), prefix, hash)
    }

    pub fn fabric_game_versions_url(&self) -> String {
        format!("{}/game", self.fabric_meta.trim_end_matches('/'))
    }

    pub fn fabric_loaders_url(&self, mc_version: &str) -> String {
        format!(
            "{}/loader/{}",
            self.fabric_meta.trim_end_matches('/'),
            mc_version
        )
    }

    pub fn fabric_loader_jar_url(&self, loader_version: &str) -> String {
        format!(
            "{}net/fabricmc/fabric-loader/{v}/fabric-loader-{v}.jar",
            with_slash(&self.fabric_maven),
            v = loader_version
        )
    }
}

pub(crate) fn with_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_urls_are_content_addressed() {
        let e = Endpoints::default();
        assert_eq!(
            e.asset_url("ab12cd"),
            "https://resources.download.minecraft.net/ab/ab12cd"
        );
    }

    #[test]
    fn fabric_urls() {
        let e = Endpoints::default();
        assert_eq!(
            e.fabric_loaders_url("1.21.4"),
            "https://meta.fabricmc.net/v2/versions/loader/1.21.4"
        );
        assert_eq!(
            e.fabric_loader_jar_url("0.16.9"),
            "https://maven.fabricmc.net/net/fabricmc/fabric-loader/0.16.9/fabric-loader-0.16.9.jar"
        );
    }
}
