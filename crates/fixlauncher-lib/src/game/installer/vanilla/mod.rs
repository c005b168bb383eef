use crate::error::InstallError;
use crate::game::installer::core::batch::{BatchArtifact, BatchDownloader, BatchReport};
use crate::game::installer::core::downloader::{download_to_memory, download_to_path, fetch_json};
use crate::game::installer::core::traits::VersionInstaller;
use crate::game::installer::types::{InstallSpec, OsType, ProfileLayout, ProgressReporter};
use crate::game::launcher::classifier::select_native_artifacts;
use crate::game::launcher::natives::{check_natives, extract_natives, native_url};
use crate::game::launcher::version_parser::{read_version_json, VersionJson};
use crate::game::metadata::{InstallPlan, MojangVersionManifest};
use anyhow::Context;
use futures::future::BoxFuture;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

pub struct VanillaInstaller;

impl VersionInstaller for VanillaInstaller {
    fn install<'a>(
        &'a self,
        spec: &'a InstallSpec,
        plan: &'a InstallPlan,
        reporter: Arc<dyn ProgressReporter>,
    ) -> BoxFuture<'a, Result<(), InstallError>> {
        Box::pin(async move {
            install_vanilla(spec, &plan.version_id, reporter).await?;
            Ok(())
        })
    }
}

#[derive(Deserialize, Debug)]
struct AssetIndexFile {
    objects: HashMap<String, AssetObject>,
}

#[derive(Deserialize, Debug)]
struct AssetObject {
    hash: String,
    #[allow(dead_code)]
    size: u64,
}

/// Fetch the version json for `version_id` from the Mojang manifest and
/// persist it byte for byte.
async fn fetch_version_json(
    spec: &InstallSpec,
    version_id: &str,
) -> Result<VersionJson, InstallError> {
    let manifest: MojangVersionManifest = fetch_json(&spec.client, &spec.endpoints.version_manifest)
        .await
        .map_err(InstallError::Manifest)?;

    let entry = manifest
        .versions
        .iter()
        .find(|v| v.id == version_id)
        .ok_or_else(|| InstallError::VersionNotFound(version_id.to_string()))?;

    log::info!("[installer] fetching version json {} from {}", version_id, entry.url);
    let bytes = download_to_memory(&spec.client, &entry.url, entry.sha1.as_deref())
        .await
        .map_err(InstallError::Manifest)?;
    let version: VersionJson = serde_json::from_slice(&bytes)
        .with_context(|| format!("Invalid version json for {}", version_id))?;

    let path = spec.layout.version_json(version_id);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(version)
}

/// Main library artifacts plus native classifier jars for `os`.
pub(crate) fn library_artifacts(
    version: &VersionJson,
    layout: &ProfileLayout,
    os: OsType,
) -> Vec<BatchArtifact> {
    let libraries_dir = layout.libraries_dir();
    let mut artifacts = Vec::new();

    for library in version.libraries.iter().filter(|l| l.is_allowed(os)) {
        let (Some(path), Some(url)) = (library.artifact_path(), library.artifact_url()) else {
            continue;
        };
        artifacts.push(BatchArtifact {
            name: library.name.clone(),
            urls: vec![url],
            path: libraries_dir.join(path),
            sha1: library.artifact_sha1(),
        });
    }

    for native in select_native_artifacts(version, os) {
        artifacts.push(BatchArtifact {
            name: format!("{}:{}", native.library, native.classifier),
            urls: vec![native_url(&native)],
            path: libraries_dir.join(&native.path),
            sha1: native.sha1.clone(),
        });
    }

    artifacts
}

async fn download_client_jar(
    spec: &InstallSpec,
    version: &VersionJson,
    version_id: &str,
    reporter: &dyn ProgressReporter,
) -> Result<(), InstallError> {
    let jar = spec.layout.version_jar(version_id);
    let client = version
        .client_download()
        .and_then(|c| c.url.clone().map(|url| (url, c.sha1.clone())))
        .ok_or_else(|| anyhow::anyhow!("No client download found in version {}", version_id))?;

    download_to_path(&spec.client, &client.0, &jar, client.1.as_deref(), reporter)
        .await
        .with_context(|| format!("Failed to download client jar for {}", version_id))?;
    Ok(())
}

/// Asset index plus every missing object. A missing index URL skips assets.
pub(crate) async fn install_assets(
    spec: &InstallSpec,
    version: &VersionJson,
    fallback_index: &str,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<BatchReport, InstallError> {
    let index_id = version.asset_index_id(fallback_index);
    let index_path = spec.layout.asset_index_path(&index_id);

    if !index_path.exists() {
        let Some(index_ref) = &version.asset_index else {
            log::warn!("[installer] {} has no asset index descriptor, skipping assets", version.id);
            return Ok(BatchReport::default());
        };
        download_to_path(
            &spec.client,
            &index_ref.url,
            &index_path,
            index_ref.sha1.as_deref(),
            &*reporter,
        )
        .await
        .with_context(|| format!("Failed to download asset index {}", index_id))?;
    }

    let raw = tokio::fs::read(&index_path)
        .await
        .with_context(|| format!("Failed to read {:?}", index_path))?;
    let index: AssetIndexFile = serde_json::from_slice(&raw)
        .with_context(|| format!("Invalid asset index {:?}", index_path))?;

    let mut objects: Vec<AssetObject> = index.objects.into_values().collect();
    objects.sort_by(|a, b| a.hash.cmp(&b.hash));

    let missing: Vec<BatchArtifact> = objects
        .into_iter()
        .filter_map(|obj| {
            let path = spec.layout.asset_object_path(&obj.hash);
            if path.exists() {
                return None;
            }
            Some(BatchArtifact {
                name: obj.hash.clone(),
                urls: vec![spec.endpoints.asset_url(&obj.hash)],
                path,
                sha1: Some(obj.hash),
            })
        })
        .collect();

    log::info!("[installer] assets {}: {} objects to download", index_id, missing.len());
    let report = BatchDownloader::new(spec.client.clone(), spec.concurrency)
        .report_every(100)
        .download_all("Ресурсы", missing, reporter, 40, 50.0)
        .await;
    Ok(report)
}

/// Install (or check) a plain Mojang version. Returns its version json.
///
/// An installed version (json and jar present) skips the manifest and
/// client jar; libraries, assets and natives are existence-checked so a
/// repeat run downloads nothing.
pub async fn install_vanilla(
    spec: &InstallSpec,
    version_id: &str,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<VersionJson, InstallError> {
    let layout = &spec.layout;
    reporter.start_step(&format!("Проверка версии {}", version_id));
    reporter.set_percent(0);

    let installed = if layout.is_version_installed(version_id) {
        match read_version_json(&layout.version_json(version_id)) {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("[installer] local version json unusable, refetching: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    let version = match installed {
        Some(version) => {
            log::info!("[installer] {} already installed, running light check", version_id);
            version
        }
        None => {
            reporter.start_step("Загрузка манифеста версии");
            reporter.set_percent(5);
            let version = fetch_version_json(spec, version_id).await?;

            reporter.start_step("Загрузка клиента");
            reporter.set_percent(10);
            download_client_jar(spec, &version, version_id, &*reporter).await?;
            version
        }
    };

    reporter.start_step("Загрузка библиотек");
    reporter.set_percent(20);
    let libraries = BatchDownloader::new(spec.client.clone(), spec.concurrency)
        .download_all(
            "Библиотеки",
            library_artifacts(&version, layout, spec.os),
            reporter.clone(),
            20,
            20.0,
        )
        .await;
    if !libraries.is_clean() {
        log::warn!("[installer] {} libraries failed: {:?}", libraries.failed.len(), libraries.failed);
    }

    reporter.start_step("Загрузка ресурсов");
    install_assets(spec, &version, version_id, reporter.clone()).await?;

    reporter.start_step("Распаковка нативных библиотек");
    reporter.set_percent(95);
    if check_natives(&layout.natives_dir(), spec.os).is_valid() {
        log::debug!("[installer] natives already extracted");
    } else if let Err(e) =
        extract_natives(&spec.client, layout, &version, spec.os, &*reporter).await
    {
        // The launcher re-validates natives before every start
        log::warn!("[installer] natives for {} incomplete: {}", version_id, e);
    }

    reporter.set_percent(100);
    Ok(version)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::game::installer::core::downloader::sha1_hex;
    use crate::game::installer::types::SilentProgressReporter;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn installs_every_artifact_then_downloads_nothing_on_rerun() {
        let server = MockServer::start().await;
        mount_vanilla(&server, "1.21.1").await;
        let tmp = tempfile::tempdir().unwrap();
        let spec = spec_for(&server, tmp.path());
        let layout = &spec.layout;

        let version = install_vanilla(&spec, "1.21.1", Arc::new(SilentProgressReporter))
            .await
            .unwrap();
        assert_eq!(version.id, "1.21.1");
        assert!(layout.is_version_installed("1.21.1"));
        assert!(layout
            .libraries_dir()
            .join("com/mojang/brigadier/1.0.18/brigadier-1.0.18.jar")
            .is_file());
        assert!(layout.asset_index_path("5").is_file());
        assert_eq!(
            std::fs::read(layout.asset_object_path(&sha1_hex(ASSET_BODY))).unwrap(),
            ASSET_BODY
        );
        assert!(layout.natives_dir().join("liblwjgl.so").is_file());

        // Every mock expects exactly one hit; the server verifies on drop.
        install_vanilla(&spec, "1.21.1", Arc::new(SilentProgressReporter))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_version_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/manifest.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"versions": []})))
            .mount(&server)
            .await;
        let tmp = tempfile::tempdir().unwrap();
        let spec = spec_for(&server, tmp.path());

        let err = install_vanilla(&spec, "9.9.9", Arc::new(SilentProgressReporter))
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::VersionNotFound(ref id) if id == "9.9.9"));
    }

    #[tokio::test]
    async fn unreachable_manifest_is_a_manifest_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/manifest.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let tmp = tempfile::tempdir().unwrap();
        let spec = spec_for(&server, tmp.path());

        let err = install_vanilla(&spec, "1.21.1", Arc::new(SilentProgressReporter))
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::Manifest(_)));
    }

    #[test]
    fn library_list_includes_native_classifier_jars() {
        let version: VersionJson =
            serde_json::from_value(version_json("http://h", "1.21.1", "a", "b")).unwrap();
        let layout = ProfileLayout::new("/p");
        let names: Vec<String> = library_artifacts(&version, &layout, OsType::Linux)
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "com.mojang:brigadier:1.0.18",
                "org.lwjgl:lwjgl:3.3.3",
                "org.lwjgl:lwjgl:3.3.3:natives-linux"
            ]
        );
    }
}
