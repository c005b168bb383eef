//! Fabric loader installation on top of an installed vanilla version.
//!
//! The official installer jar is run first. Its exit code is not trusted on
//! its own: the resulting layout is verified, and whenever the output is
//! missing or inconsistent the Fabric version is reconstructed by hand from
//! the loader metadata.

use crate::error::InstallError;
use crate::game::installer::config::{with_slash, FABRIC_FALLBACK_LOADER, FABRIC_KNOT_MAIN_CLASS};
use crate::game::installer::core::batch::BatchDownloader;
use crate::game::installer::core::downloader::{download_to_path, fetch_json};
use crate::game::installer::core::traits::VersionInstaller;
use crate::game::installer::types::{InstallSpec, ProgressReporter};
use crate::game::installer::vanilla::{install_vanilla, library_artifacts};
use crate::game::launcher::version_parser::{
    library_key, merge_versions, read_version_json, write_version_json, Library, VersionJson,
};
use crate::game::metadata::{fabric_version_id, FabricLoaderEntry, InstallPlan};
use crate::utils::process::LauncherCommandExt;
use anyhow::Context;
use futures::future::BoxFuture;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

pub struct FabricInstaller;

impl VersionInstaller for FabricInstaller {
    fn install<'a>(
        &'a self,
        spec: &'a InstallSpec,
        plan: &'a InstallPlan,
        reporter: Arc<dyn ProgressReporter>,
    ) -> BoxFuture<'a, Result<(), InstallError>> {
        Box::pin(async move {
            install_fabric(spec, &plan.mc_version, reporter).await?;
            Ok(())
        })
    }
}

/// Steps of a Fabric install after the vanilla base is in place.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FabricPhase {
    RunExternalInstaller,
    VerifyExpectedLayout { exit_ok: bool },
    Merge { installer_json: PathBuf },
    ManualReconstruct,
}

/// Loader chosen for a Minecraft version, with whatever metadata the
/// API returned alongside it.
#[derive(Debug, Clone)]
pub struct ResolvedLoader {
    pub version: String,
    pub entry: Option<FabricLoaderEntry>,
}

#[derive(Debug, Deserialize)]
struct MetaLibrary {
    name: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MetaLibraries {
    #[serde(default)]
    common: Vec<MetaLibrary>,
    #[serde(default)]
    client: Vec<MetaLibrary>,
}

#[derive(Debug, Deserialize)]
struct LauncherMeta {
    #[serde(default)]
    libraries: MetaLibraries,
}

/// Newest loader for `mc_version` (first list entry).
///
/// An unreachable API is fatal; a response that does not look like a
/// loader list falls back to the last known good loader.
pub async fn resolve_loader_version(
    spec: &InstallSpec,
    mc_version: &str,
) -> Result<ResolvedLoader, InstallError> {
    let url = spec.endpoints.fabric_loaders_url(mc_version);
    let raw: serde_json::Value =
        fetch_json(&spec.client, &url)
            .await
            .map_err(|source| InstallError::Fabric {
                mc_version: mc_version.to_string(),
                source,
            })?;

    let first = raw
        .as_array()
        .and_then(|list| list.first())
        .cloned()
        .and_then(|v| serde_json::from_value::<FabricLoaderEntry>(v).ok());

    match first {
        Some(entry) => {
            log::info!(
                "[fabric] newest loader for {}: {}",
                mc_version,
                entry.loader.version
            );
            Ok(ResolvedLoader {
                version: entry.loader.version.clone(),
                entry: Some(entry),
            })
        }
        None => {
            log::warn!(
                "[fabric] unrecognised loader list for {}, falling back to {}",
                mc_version,
                FABRIC_FALLBACK_LOADER
            );
            Ok(ResolvedLoader {
                version: FABRIC_FALLBACK_LOADER.to_string(),
                entry: None,
            })
        }
    }
}

fn installer_jar_path(spec: &InstallSpec) -> PathBuf {
    spec.layout.root().join("installers").join("fabric-installer.jar")
}

/// Directory name the official installer writes.
fn installer_output_id(mc_version: &str, loader: &str) -> String {
    format!("fabric-loader-{}-{}", loader, mc_version)
}

/// Libraries a Fabric client needs on top of vanilla, loader first.
fn fabric_libraries(spec: &InstallSpec, loader: &ResolvedLoader) -> Vec<Library> {
    let maven = with_slash(&spec.endpoints.fabric_maven);
    let mut libraries = vec![Library::from_maven(
        format!("net.fabricmc:fabric-loader:{}", loader.version),
        maven.clone(),
    )];

    let Some(entry) = &loader.entry else {
        return libraries;
    };

    if let Some(maven_name) = entry.intermediary.as_ref().and_then(|i| i.maven.clone()) {
        libraries.push(Library::from_maven(maven_name, maven.clone()));
    }

    let meta = entry
        .launcher_meta
        .clone()
        .and_then(|v| serde_json::from_value::<LauncherMeta>(v).ok());
    if let Some(meta) = meta {
        for lib in meta
            .libraries
            .common
            .into_iter()
            .chain(meta.libraries.client)
        {
            let url = lib.url.unwrap_or_else(|| maven.clone());
            libraries.push(Library::from_maven(lib.name, url));
        }
    }
    libraries
}

/// Base version cloned under the Fabric id with knot as entry point and
/// the Fabric libraries prepended.
fn reconstruct_version(
    base: &VersionJson,
    target_id: &str,
    fabric_libs: Vec<Library>,
) -> VersionJson {
    let fabric_keys: HashSet<String> = fabric_libs.iter().map(|l| library_key(&l.name)).collect();
    let mut version = base.clone();
    version.id = target_id.to_string();
    version.main_class = Some(FABRIC_KNOT_MAIN_CLASS.to_string());
    version.inherits_from = None;
    version.libraries = fabric_libs
        .into_iter()
        .chain(
            base.libraries
                .iter()
                .filter(|l| !fabric_keys.contains(&library_key(&l.name)))
                .cloned(),
        )
        .collect();
    version
}

async fn run_external_installer(
    spec: &InstallSpec,
    mc_version: &str,
    loader: &str,
) -> anyhow::Result<bool> {
    let jar = installer_jar_path(spec);
    let output = tokio::process::Command::new(&spec.java)
        .arg("-jar")
        .arg(&jar)
        .args(["client", "-mcversion", mc_version, "-loader", loader, "-dir"])
        .arg(spec.layout.root())
        .suppress_console()
        .output()
        .await
        .with_context(|| format!("Failed to run {:?} with {:?}", spec.java, jar))?;

    log::debug!(
        "[fabric] installer stdout:\n{}",
        String::from_utf8_lossy(&output.stdout)
    );
    if !output.status.success() {
        log::warn!(
            "[fabric] installer exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(output.status.success())
}

/// Write `version` as the Fabric target and give it the base client jar.
async fn write_target(
    spec: &InstallSpec,
    version: &VersionJson,
    mc_version: &str,
) -> anyhow::Result<()> {
    let layout = &spec.layout;
    write_version_json(&layout.version_json(&version.id), version)?;

    let base_jar = layout.version_jar(mc_version);
    let target_jar = layout.version_jar(&version.id);
    tokio::fs::copy(&base_jar, &target_jar)
        .await
        .with_context(|| format!("Failed to copy {:?} to {:?}", base_jar, target_jar))?;
    Ok(())
}

/// Install vanilla `mc_version`, then Fabric as `<mc>-fabric`.
pub async fn install_fabric(
    spec: &InstallSpec,
    mc_version: &str,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<VersionJson, InstallError> {
    let layout = &spec.layout;
    let target_id = fabric_version_id(mc_version);
    let fabric_err = |source: anyhow::Error| InstallError::Fabric {
        mc_version: mc_version.to_string(),
        source,
    };

    let base = install_vanilla(spec, mc_version, reporter.clone()).await?;

    if layout.is_version_installed(&target_id) {
        let version = read_version_json(&layout.version_json(&target_id)).map_err(fabric_err)?;
        log::info!("[fabric] {} already installed, checking libraries", target_id);
        download_libraries(spec, &version, reporter.clone()).await;
        return Ok(version);
    }

    reporter.start_step("Установка Fabric");
    reporter.set_percent(96);
    let loader = resolve_loader_version(spec, mc_version).await?;

    download_to_path(
        &spec.client,
        &spec.endpoints.fabric_installer,
        &installer_jar_path(spec),
        None,
        &*reporter,
    )
    .await
    .context("Fabric installer is unreachable")
    .map_err(fabric_err)?;

    let expected_dir = layout.version_dir(&installer_output_id(mc_version, &loader.version));
    let mut phase = FabricPhase::RunExternalInstaller;
    let version = loop {
        log::debug!("[fabric] phase {:?}", phase);
        phase = match phase {
            FabricPhase::RunExternalInstaller => {
                let exit_ok = match run_external_installer(spec, mc_version, &loader.version).await
                {
                    Ok(ok) => ok,
                    Err(e) => {
                        log::warn!("[fabric] installer could not be started: {:#}", e);
                        false
                    }
                };
                FabricPhase::VerifyExpectedLayout { exit_ok }
            }
            FabricPhase::VerifyExpectedLayout { exit_ok } => {
                let installer_json =
                    expected_dir.join(format!("{}.json", installer_output_id(mc_version, &loader.version)));
                match (exit_ok, installer_json.is_file()) {
                    (true, true) => FabricPhase::Merge { installer_json },
                    (true, false) => {
                        log::warn!(
                            "[fabric] installer reported success but {:?} is missing",
                            expected_dir
                        );
                        FabricPhase::ManualReconstruct
                    }
                    (false, true) => {
                        log::warn!(
                            "[fabric] installer failed but left {:?} behind, not trusting it",
                            expected_dir
                        );
                        FabricPhase::ManualReconstruct
                    }
                    (false, false) => FabricPhase::ManualReconstruct,
                }
            }
            FabricPhase::Merge { installer_json } => {
                match read_version_json(&installer_json) {
                    Ok(child) => {
                        let mut merged = merge_versions(base.clone(), child);
                        merged.id = target_id.clone();
                        break merged;
                    }
                    Err(e) => {
                        log::warn!("[fabric] installer output unreadable: {:#}", e);
                        FabricPhase::ManualReconstruct
                    }
                }
            }
            FabricPhase::ManualReconstruct => {
                log::info!(
                    "[fabric] assembling {} manually with loader {}",
                    target_id,
                    loader.version
                );
                break reconstruct_version(&base, &target_id, fabric_libraries(spec, &loader));
            }
        };
    };

    write_target(spec, &version, mc_version)
        .await
        .map_err(fabric_err)?;
    download_libraries(spec, &version, reporter.clone()).await;

    if !layout.is_version_installed(&target_id) {
        return Err(fabric_err(anyhow::anyhow!(
            "{} is incomplete after installation",
            target_id
        )));
    }
    reporter.set_percent(100);
    Ok(version)
}

async fn download_libraries(
    spec: &InstallSpec,
    version: &VersionJson,
    reporter: Arc<dyn ProgressReporter>,
) {
    let report = BatchDownloader::new(spec.client.clone(), spec.concurrency)
        .download_all(
            "Библиотеки Fabric",
            library_artifacts(version, &spec.layout, spec.os),
            reporter,
            96,
            3.0,
        )
        .await;
    if !report.is_clean() {
        log::warn!("[fabric] {} libraries failed: {:?}", report.failed.len(), report.failed);
    }
}
