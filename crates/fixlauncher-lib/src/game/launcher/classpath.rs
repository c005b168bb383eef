//! Classpath assembly from on-disk state.

use anyhow::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::game::installer::types::{OsType, ProfileLayout};
use crate::game::launcher::version_parser::load_version;
use crate::utils::version::version_at_least;

/// Fabric's knot loader refuses to start with older ASM on the classpath.
pub const MIN_FABRIC_ASM: &str = "9.9";

const ASM_GROUP_PATH: [&str; 3] = ["org", "ow2", "asm"];
const FABRIC_GROUP_PATH: [&str; 2] = ["net", "fabricmc"];

/// Convert Maven coordinates to a relative artifact path.
/// Format: group:artifact:version[:classifier][@extension]
/// Example: "com.google.guava:guava:21.0" -> "com/google/guava/guava/21.0/guava-21.0.jar"
pub fn maven_to_path(coords: &str) -> Result<String> {
    let (coords, extension) = match coords.split_once('@') {
        Some((c, ext)) => (c, ext),
        None => (coords, "jar"),
    };
    let parts: Vec<&str> = coords.split(':').collect();
    if parts.len() < 3 || parts.iter().take(3).any(|p| p.is_empty()) {
        anyhow::bail!("Invalid Maven coordinates: {}", coords);
    }

    let group = parts[0].replace('.', "/");
    let (artifact, version) = (parts[1], parts[2]);
    let filename = match parts.get(3) {
        Some(classifier) => format!("{}-{}-{}.{}", artifact, version, classifier, extension),
        None => format!("{}-{}.{}", artifact, version, extension),
    };

    Ok(format!("{}/{}/{}/{}", group, artifact, version, filename))
}

/// Version directory of an `org/ow2/asm/<artifact>/<version>/...` jar.
pub fn asm_version(libraries_dir: &Path, jar: &Path) -> Option<String> {
    let relative = jar.strip_prefix(libraries_dir).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.len() < 6 || parts[..3] != ASM_GROUP_PATH {
        return None;
    }
    Some(parts[4].clone())
}

/// Every `*.jar` under `dir`, sorted by path. Missing dirs yield nothing.
fn scan_jars(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|e| e == "jar") {
                found.push(path);
            }
        }
    }
    found.sort();
    found
}

/// Enabled mod jars directly inside `mods/`, sorted by file name.
pub fn enabled_mod_jars(mods_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(mods_dir) else {
        return Vec::new();
    };
    let mut jars: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "jar"))
        .collect();
    jars.sort();
    jars
}

struct Entries {
    paths: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
}

impl Entries {
    fn new() -> Self {
        Self {
            paths: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn push(&mut self, path: PathBuf) {
        if self.seen.insert(path.clone()) {
            self.paths.push(path);
        }
    }
}

/// Ordered classpath for `version_id` built from whatever exists on disk.
///
/// Missing files are skipped; an unreadable version json yields only the
/// directory-scanned parts. Never fails.
pub fn build_classpath(
    layout: &ProfileLayout,
    version_id: &str,
    is_modded: bool,
    os: OsType,
) -> Vec<PathBuf> {
    let libraries_dir = layout.libraries_dir();
    let mut entries = Entries::new();

    match load_version(layout, version_id) {
        Ok(version) => {
            for library in version.libraries.iter().filter(|l| l.is_allowed(os)) {
                let Some(relative) = library.artifact_path() else {
                    continue;
                };
                let full = libraries_dir.join(&relative);
                if full.is_file() {
                    entries.push(full);
                } else {
                    log::debug!("[classpath] missing library skipped: {}", relative);
                }
            }
        }
        Err(e) => log::warn!("[classpath] cannot read version {}: {:#}", version_id, e),
    }

    if is_modded {
        let asm_root = ASM_GROUP_PATH
            .iter()
            .fold(libraries_dir.clone(), |p, seg| p.join(seg));

        let before = entries.paths.len();
        entries.paths.retain(|p| match asm_version(&libraries_dir, p) {
            Some(v) => version_at_least(&v, MIN_FABRIC_ASM),
            None => true,
        });
        let dropped = before - entries.paths.len();
        if dropped > 0 {
            log::info!("[classpath] dropped {} ASM jars older than {}", dropped, MIN_FABRIC_ASM);
        }
        entries.seen = entries.paths.iter().cloned().collect();

        for jar in scan_jars(&asm_root) {
            if asm_version(&libraries_dir, &jar).is_some_and(|v| version_at_least(&v, MIN_FABRIC_ASM)) {
                entries.push(jar);
            }
        }

        let fabric_root = FABRIC_GROUP_PATH
            .iter()
            .fold(libraries_dir.clone(), |p, seg| p.join(seg));
        for jar in scan_jars(&fabric_root) {
            entries.push(jar);
        }
    }

    let client_jar = layout.version_jar(version_id);
    if client_jar.is_file() {
        entries.push(client_jar);
    }

    if is_modded {
        for jar in enabled_mod_jars(&layout.mods_dir()) {
            entries.push(jar);
        }
    }

    entries.paths
}

pub fn join_classpath(entries: &[PathBuf], os: OsType) -> String {
    entries
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(os.classpath_separator())
}
