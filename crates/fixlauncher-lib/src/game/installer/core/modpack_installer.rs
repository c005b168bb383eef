//! Community build files kept in a GitHub repository.
//!
//! The remote git tree is the authority: every blob is compared against the
//! profile directory by presence and size, and anything missing or of the
//! wrong size is fetched again from the raw host. User-owned files
//! (`config/`, `options.txt`, `servers.dat`) are downloaded when absent but
//! never overwritten.

use crate::error::InstallError;
use crate::game::installer::config::Endpoints;
use crate::game::installer::core::downloader::{download_to_memory, fetch_optional_json, git_blob_sha};
use crate::game::installer::lock::InstallLock;
use crate::game::installer::types::{InstallSpec, ProgressReporter};
use anyhow::{anyhow, Context, Result};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const DEFAULT_BRANCHES: [&str; 2] = ["main", "master"];

/// Paths the player is expected to edit.
pub const PRESERVED_PATHS: &[&str] = &["config/", "options.txt", "servers.dat"];

/// Repository holding the build's files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModpackSource {
    pub owner: String,
    pub repo: String,
    /// Tried alone when set, otherwise `main` then `master`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl ModpackSource {
    fn branches(&self) -> Vec<String> {
        match &self.branch {
            Some(b) => vec![b.clone()],
            None => DEFAULT_BRANCHES.iter().map(|b| b.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub path: String,
    pub size: u64,
    /// Git blob id
    pub sha: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RemoteTree {
    pub branch: String,
    pub files: Vec<RemoteFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRef {
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallIntegrityReport {
    /// Nothing of the build is present yet
    pub needs_download: bool,
    pub needs_repair: bool,
    pub missing_files: Vec<FileRef>,
    pub corrupted_files: Vec<FileRef>,
}

impl InstallIntegrityReport {
    pub fn is_intact(&self) -> bool {
        self.missing_files.is_empty() && self.corrupted_files.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct GitTree {
    #[serde(default)]
    tree: Vec<GitTreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct GitTreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    sha: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ContentsEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    sha: Option<String>,
    #[serde(default)]
    size: u64,
}

pub fn is_preserved(path: &str) -> bool {
    PRESERVED_PATHS.iter().any(|p| {
        if p.ends_with('/') {
            path.starts_with(p)
        } else {
            path == *p
        }
    })
}

/// Relative, forward-only paths; anything that could escape the profile is rejected.
fn is_safe_relative(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

fn tree_url(endpoints: &Endpoints, source: &ModpackSource, branch: &str) -> String {
    format!(
        "{}/repos/{}/{}/git/trees/{}?recursive=1",
        endpoints.github_api.trim_end_matches('/'),
        source.owner,
        source.repo,
        branch
    )
}

fn contents_url(endpoints: &Endpoints, source: &ModpackSource, dir: &str, branch: &str) -> String {
    format!(
        "{}/repos/{}/{}/contents/{}?ref={}",
        endpoints.github_api.trim_end_matches('/'),
        source.owner,
        source.repo,
        dir,
        branch
    )
}

pub fn raw_url(endpoints: &Endpoints, source: &ModpackSource, branch: &str, path: &str) -> String {
    format!(
        "{}/{}/{}/{}/{}",
        endpoints.github_raw.trim_end_matches('/'),
        source.owner,
        source.repo,
        branch,
        path
    )
}

/// Walk the contents API directory by directory.
async fn list_via_contents(
    client: &Client,
    endpoints: &Endpoints,
    source: &ModpackSource,
    branch: &str,
) -> Option<Vec<RemoteFile>> {
    let mut files = Vec::new();
    let mut pending = vec![String::new()];
    while let Some(dir) = pending.pop() {
        let entries: Vec<ContentsEntry> =
            fetch_optional_json(client, &contents_url(endpoints, source, &dir, branch)).await?;
        for entry in entries {
            match entry.kind.as_str() {
                "dir" => pending.push(entry.path),
                "file" => files.push(RemoteFile {
                    path: entry.path,
                    size: entry.size,
                    sha: entry.sha,
                }),
                _ => {}
            }
        }
    }
    Some(files)
}

/// List every file of the repository, trying each candidate branch with
/// the recursive tree API first and the contents API second.
pub async fn fetch_remote_tree(
    client: &Client,
    endpoints: &Endpoints,
    source: &ModpackSource,
) -> Result<RemoteTree> {
    for branch in source.branches() {
        if let Some(tree) =
            fetch_optional_json::<GitTree>(client, &tree_url(endpoints, source, &branch)).await
        {
            if !tree.truncated {
                let files = tree
                    .tree
                    .into_iter()
                    .filter(|e| e.kind == "blob")
                    .map(|e| RemoteFile {
                        path: e.path,
                        size: e.size.unwrap_or(0),
                        sha: e.sha,
                    })
                    .collect();
                return Ok(RemoteTree { branch, files });
            }
            log::warn!("[modpack] tree for {} is truncated, walking contents", branch);
        }

        if let Some(files) = list_via_contents(client, endpoints, source, &branch).await {
            return Ok(RemoteTree { branch, files });
        }
        log::debug!("[modpack] branch {} not available", branch);
    }

    Err(anyhow!(
        "Repository {}/{} could not be listed",
        source.owner,
        source.repo
    ))
}

/// Compare the profile directory with the remote listing.
pub fn check_integrity(root: &Path, tree: &RemoteTree) -> InstallIntegrityReport {
    let mut report = InstallIntegrityReport::default();
    let mut present = 0usize;

    for file in tree.files.iter().filter(|f| is_safe_relative(&f.path)) {
        let file_ref = FileRef {
            path: file.path.clone(),
            size: file.size,
        };
        match std::fs::metadata(root.join(&file.path)) {
            Ok(meta) => {
                present += 1;
                if meta.len() != file.size && !is_preserved(&file.path) {
                    report.corrupted_files.push(file_ref);
                }
            }
            Err(_) => report.missing_files.push(file_ref),
        }
    }

    report.needs_download = present == 0 && !report.missing_files.is_empty();
    report.needs_repair = !report.needs_download && !report.is_intact();
    report
}

/// `a.json` -> `a.json.part`
fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

async fn fetch_file(
    client: &Client,
    url: &str,
    dest: &Path,
    expected_blob_sha: Option<&str>,
) -> Result<()> {
    let bytes = download_to_memory(client, url, None).await?;
    if let Some(expected) = expected_blob_sha {
        let computed = git_blob_sha(&bytes);
        if !computed.eq_ignore_ascii_case(expected) {
            anyhow::bail!("Blob mismatch for {}: expected {}, got {}", url, expected, computed);
        }
    }
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let tmp = part_path(dest);
    tokio::fs::write(&tmp, &bytes)
        .await
        .with_context(|| format!("Failed to write {:?}", tmp))?;
    tokio::fs::rename(&tmp, dest)
        .await
        .with_context(|| format!("Failed to move {:?} into place", tmp))?;
    Ok(())
}

/// Check and repair the build without taking the profile lock. Callers
/// must already hold it.
pub(crate) async fn repair_modpack_locked(
    spec: &InstallSpec,
    source: &ModpackSource,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<InstallIntegrityReport, InstallError> {
    reporter.start_step("Проверка файлов сборки");
    let tree = fetch_remote_tree(&spec.client, &spec.endpoints, source)
        .await
        .map_err(InstallError::Modpack)?;
    let root = spec.layout.root();
    let report = check_integrity(root, &tree);

    if report.is_intact() {
        log::info!("[modpack] {} files intact", tree.files.len());
        return Ok(report);
    }
    log::info!(
        "[modpack] {} missing, {} corrupted on branch {}",
        report.missing_files.len(),
        report.corrupted_files.len(),
        tree.branch
    );

    reporter.start_step(if report.needs_download {
        "Загрузка сборки"
    } else {
        "Восстановление файлов сборки"
    });

    let wanted: Vec<&RemoteFile> = {
        let bad: std::collections::HashSet<&str> = report
            .missing_files
            .iter()
            .chain(&report.corrupted_files)
            .map(|f| f.path.as_str())
            .collect();
        tree.files.iter().filter(|f| bad.contains(f.path.as_str())).collect()
    };
    let total = wanted.len();
    let done = AtomicUsize::new(0);

    let failures: Vec<String> = stream::iter(wanted)
        .map(|file| {
            let url = raw_url(&spec.endpoints, source, &tree.branch, &file.path);
            let dest = root.join(&file.path);
            let done = &done;
            let reporter = reporter.clone();
            async move {
                let result = fetch_file(&spec.client, &url, &dest, file.sha.as_deref()).await;
                let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                reporter.set_percent((finished * 100 / total.max(1)) as i32);
                match result {
                    Ok(()) => None,
                    Err(e) => {
                        log::warn!("[modpack] {} failed: {:#}", file.path, e);
                        Some(file.path.clone())
                    }
                }
            }
        })
        .buffer_unordered(spec.concurrency.max(1))
        .filter_map(|r| async move { r })
        .collect()
        .await;

    if !failures.is_empty() {
        return Err(InstallError::Modpack(anyhow!(
            "{} of {} files could not be restored: {}",
            failures.len(),
            total,
            failures.join(", ")
        )));
    }
    Ok(report)
}

/// Take the profile lock, then check and repair the build.
pub async fn repair_modpack(
    spec: &InstallSpec,
    source: &ModpackSource,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<InstallIntegrityReport, InstallError> {
    let _lock = InstallLock::acquire(spec.layout.root())?;
    repair_modpack_locked(spec, source, reporter).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::installer::config::Endpoints;
    use crate::game::installer::core::downloader::build_client;
    use crate::game::installer::types::{ProfileLayout, SilentProgressReporter};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn part_files_keep_the_extension() {
        let dir = Path::new("profile/config");
        assert_eq!(part_path(&dir.join("a.json")), dir.join("a.json.part"));
        assert_eq!(part_path(&dir.join("a.txt")), dir.join("a.txt.part"));
        assert_eq!(part_path(&dir.join("options")), dir.join("options.part"));
    }

    fn source() -> ModpackSource {
        ModpackSource {
            owner: "fixsirt".into(),
            repo: "build".into(),
            branch: None,
        }
    }

    fn tree(files: &[(&str, u64)]) -> RemoteTree {
        RemoteTree {
            branch: "main".into(),
            files: files
                .iter()
                .map(|(p, s)| RemoteFile {
                    path: p.to_string(),
                    size: *s,
                    sha: None,
                })
                .collect(),
        }
    }

    #[test]
    fn preserved_paths() {
        assert!(is_preserved("config/sodium.json"));
        assert!(is_preserved("options.txt"));
        assert!(is_preserved("servers.dat"));
        assert!(!is_preserved("mods/options.txt"));
        assert!(!is_preserved("configs.txt"));
    }

    #[test]
    fn escaping_paths_are_ignored() {
        assert!(is_safe_relative("mods/a.jar"));
        assert!(!is_safe_relative("../evil"));
        assert!(!is_safe_relative("/etc/passwd"));
        assert!(!is_safe_relative(""));
    }

    #[test]
    fn empty_profile_needs_download() {
        let tmp = tempfile::tempdir().unwrap();
        let report = check_integrity(tmp.path(), &tree(&[("mods/a.jar", 3), ("options.txt", 2)]));
        assert!(report.needs_download);
        assert!(!report.needs_repair);
        assert_eq!(report.missing_files.len(), 2);
    }

    #[test]
    fn size_mismatch_is_corruption_except_for_user_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("mods")).unwrap();
        std::fs::create_dir_all(tmp.path().join("config")).unwrap();
        std::fs::write(tmp.path().join("mods/a.jar"), b"abcd").unwrap();
        std::fs::write(tmp.path().join("config/x.json"), b"edited by user").unwrap();

        let report = check_integrity(
            tmp.path(),
            &tree(&[("mods/a.jar", 3), ("config/x.json", 2), ("mods/b.jar", 1)]),
        );
        assert!(!report.needs_download);
        assert!(report.needs_repair);
        assert_eq!(
            report.corrupted_files,
            vec![FileRef {
                path: "mods/a.jar".into(),
                size: 3
            }]
        );
        assert_eq!(report.missing_files[0].path, "mods/b.jar");
    }

    #[tokio::test]
    async fn tree_falls_back_to_master() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/github/api/repos/fixsirt/build/git/trees/main"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/github/api/repos/fixsirt/build/contents/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/github/api/repos/fixsirt/build/git/trees/master"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sha": "x",
                "truncated": false,
                "tree": [
                    {"path": "mods", "type": "tree", "sha": "t"},
                    {"path": "mods/a.jar", "type": "blob", "sha": "b", "size": 3}
                ]
            })))
            .mount(&server)
            .await;

        let endpoints = Endpoints::rooted_at(&server.uri());
        let tree = fetch_remote_tree(&build_client().unwrap(), &endpoints, &source())
            .await
            .unwrap();
        assert_eq!(tree.branch, "master");
        assert_eq!(
            tree.files,
            vec![RemoteFile {
                path: "mods/a.jar".into(),
                size: 3,
                sha: Some("b".into())
            }]
        );
    }

    #[tokio::test]
    async fn repair_restores_files_and_keeps_user_config() {
        let server = MockServer::start().await;
        let jar = b"mod-bytes".to_vec();
        let options = b"fov:90".to_vec();
        Mock::given(method("GET"))
            .and(path("/github/api/repos/fixsirt/build/git/trees/main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tree": [
                    {"path": "mods/a.jar", "type": "blob", "sha": git_blob_sha(&jar), "size": jar.len()},
                    {"path": "options.txt", "type": "blob", "sha": git_blob_sha(&options), "size": options.len()}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/github/raw/fixsirt/build/main/mods/a.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(jar.clone()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/github/raw/fixsirt/build/main/options.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(options))
            .expect(0)
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("options.txt"), b"fov:110\nlang:ru_ru").unwrap();

        let mut spec = InstallSpec::new(build_client().unwrap(), ProfileLayout::new(tmp.path()));
        spec.endpoints = Endpoints::rooted_at(&server.uri());

        let report = repair_modpack(&spec, &source(), Arc::new(SilentProgressReporter))
            .await
            .unwrap();
        assert_eq!(report.missing_files.len(), 1);
        assert_eq!(std::fs::read(tmp.path().join("mods/a.jar")).unwrap(), jar);
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("options.txt")).unwrap(),
            "fov:110\nlang:ru_ru"
        );
        assert!(!tmp.path().join(crate::game::installer::lock::LOCK_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn blob_mismatch_fails_the_repair() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/github/api/repos/fixsirt/build/git/trees/main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tree": [{"path": "mods/a.jar", "type": "blob", "sha": "0000", "size": 3}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/github/raw/fixsirt/build/main/mods/a.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abc".to_vec()))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let mut spec = InstallSpec::new(build_client().unwrap(), ProfileLayout::new(tmp.path()));
        spec.endpoints = Endpoints::rooted_at(&server.uri());

        let err = repair_modpack(&spec, &source(), Arc::new(SilentProgressReporter))
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::Modpack(_)));
        assert!(!tmp.path().join("mods/a.jar").exists());
    }
}
