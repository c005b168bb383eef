//! Native library extraction and validation.

use anyhow::Context;
use reqwest::Client;
use std::path::{Path, PathBuf};

use crate::error::ExtractError;
use crate::game::installer::config::{with_slash, MOJANG_LIBRARIES_URL};
use crate::game::installer::core::archive::{extract_matching, is_native_library};
use crate::game::installer::core::downloader::download_to_path;
use crate::game::installer::types::{OsType, ProfileLayout, ProgressReporter};
use crate::game::launcher::classifier::{native_classifier, select_native_artifacts, NativeArtifact};
use crate::game::launcher::version_parser::VersionJson;

/// A 64-bit LWJGL 3 `lwjgl.dll` is well above this; the 32-bit build
/// slipping into a 64-bit natives folder is not. Heuristic only: the sizes
/// move between LWJGL releases.
pub const MIN_LWJGL_DLL_BYTES: u64 = 350 * 1024;

/// State of the natives directory as seen by the launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativesCheck {
    Valid,
    Missing,
    /// `lwjgl.dll` was below the threshold and has been deleted.
    Undersized(u64),
}

impl NativesCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, NativesCheck::Valid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativesReport {
    pub classifier: String,
    pub jars: Vec<String>,
    pub files: Vec<PathBuf>,
}

fn has_native_files(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .any(|e| is_native_library(&e.file_name().to_string_lossy()))
        })
        .unwrap_or(false)
}

/// Validate an extracted natives directory. On Windows `lwjgl.dll` must be
/// present and at least [`MIN_LWJGL_DLL_BYTES`]; an undersized file is
/// removed so the next launch re-extracts.
pub fn check_natives(dir: &Path, os: OsType) -> NativesCheck {
    if !os.is_windows() {
        return if has_native_files(dir) {
            NativesCheck::Valid
        } else {
            NativesCheck::Missing
        };
    }

    let dll = dir.join("lwjgl.dll");
    let size = match std::fs::metadata(&dll) {
        Ok(meta) => meta.len(),
        Err(_) => return NativesCheck::Missing,
    };
    if size >= MIN_LWJGL_DLL_BYTES {
        return NativesCheck::Valid;
    }

    log::warn!(
        "[natives] lwjgl.dll is {} bytes (< {}), treating as wrong architecture (size heuristic)",
        size,
        MIN_LWJGL_DLL_BYTES
    );
    if let Err(e) = std::fs::remove_file(&dll) {
        log::warn!("[natives] failed to delete undersized lwjgl.dll: {}", e);
    }
    NativesCheck::Undersized(size)
}

fn reset_dir(dir: &Path) -> anyhow::Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir).with_context(|| format!("Failed to clear {:?}", dir))?;
    }
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))
}

pub(crate) fn native_url(artifact: &NativeArtifact) -> String {
    match &artifact.url {
        Some(url) if !url.is_empty() => url.clone(),
        _ => format!("{}{}", with_slash(MOJANG_LIBRARIES_URL), artifact.path),
    }
}

/// Clear `natives/` and repopulate it from the native jars `version`
/// declares for `os`.
pub async fn extract_natives(
    client: &Client,
    layout: &ProfileLayout,
    version: &VersionJson,
    os: OsType,
    reporter: &dyn ProgressReporter,
) -> Result<NativesReport, ExtractError> {
    let classifier = native_classifier(os).to_string();
    let natives_dir = layout.natives_dir();
    log::info!(
        "[natives] extracting {} natives for {} into {:?}",
        classifier,
        version.id,
        natives_dir
    );

    reset_dir(&natives_dir)?;

    let artifacts = select_native_artifacts(version, os);
    if artifacts.is_empty() {
        return Err(ExtractError::NoCandidates {
            version_id: version.id.clone(),
            classifier,
        });
    }

    let libraries_dir = layout.libraries_dir();
    let mut report = NativesReport {
        classifier,
        ..Default::default()
    };

    for artifact in &artifacts {
        let jar_path = libraries_dir.join(&artifact.path);
        let url = native_url(artifact);
        if let Err(e) =
            download_to_path(client, &url, &jar_path, artifact.sha1.as_deref(), reporter).await
        {
            log::warn!("[natives] skipping {}: {:#}", artifact.library, e);
            continue;
        }

        let bytes = match tokio::fs::read(&jar_path).await {
            Ok(b) => b,
            Err(e) => {
                log::warn!("[natives] cannot read {:?}: {}", jar_path, e);
                continue;
            }
        };
        match extract_matching(&bytes, &natives_dir, true, is_native_library) {
            Ok(files) => {
                log::debug!("[natives] {} -> {} files", artifact.path, files.len());
                report.jars.push(artifact.path.clone());
                report.files.extend(files);
            }
            Err(e) => log::warn!("[natives] failed to unpack {}: {:#}", artifact.path, e),
        }
    }

    match check_natives(&natives_dir, os) {
        NativesCheck::Valid => {
            log::info!("[natives] {} native files extracted", report.files.len());
            Ok(report)
        }
        NativesCheck::Undersized(size) => Err(ExtractError::UndersizedLwjgl { size }),
        NativesCheck::Missing => Err(ExtractError::NoCandidates {
            version_id: version.id.clone(),
            classifier: report.classifier,
        }),
    }
}
