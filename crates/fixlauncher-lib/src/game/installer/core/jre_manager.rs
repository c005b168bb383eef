use crate::error::LaunchError;
use crate::game::installer::config::Endpoints;
use crate::game::installer::core::archive::{extract_tar_gz, extract_zip};
use crate::game::installer::core::downloader::{download_to_memory, fetch_json};
use crate::game::installer::types::{OsType, ProgressReporter};
use crate::utils::process::LauncherCommandExt;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Minimum Java major version the supported game versions start on.
pub const REQUIRED_JAVA_MAJOR: u32 = 21;

/// `javaPath` value meaning "whatever `java` is on PATH".
pub const JAVA_PATH_SENTINEL: &str = "java";

/// `javaPath` value meaning "pick one for me".
pub const JAVA_PATH_AUTO: &str = "auto";

/// Directory auto-installed JDKs are unpacked into.
pub fn java_install_dir(base: &Path) -> PathBuf {
    base.join("java")
}

#[derive(Debug, Deserialize)]
struct AdoptiumAsset {
    binary: AdoptiumBinary,
    #[serde(default)]
    release_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdoptiumBinary {
    package: AdoptiumPackage,
}

#[derive(Debug, Deserialize)]
struct AdoptiumPackage {
    link: String,
    name: String,
    #[serde(default)]
    checksum: Option<String>,
}

/// Major version out of `java -version` output. Handles both
/// `java version "1.8.0_311"` and `openjdk version "21.0.2"` shapes.
pub fn parse_major_version(version_output: &str) -> Option<u32> {
    let re = regex::Regex::new(r#"version\s+"(\d+)(?:\.(\d+))?"#).ok()?;
    let caps = re.captures(version_output)?;
    let major = caps.get(1)?.as_str().parse::<u32>().ok()?;
    if major == 1 {
        // 1.8.x -> 8
        return caps.get(2)?.as_str().parse::<u32>().ok();
    }
    Some(major)
}

/// Run `java -version` and parse the major version from stdout + stderr.
pub async fn probe_java_version(java: &Path) -> Result<u32> {
    let output = tokio::process::Command::new(java)
        .arg("-version")
        .suppress_console()
        .output()
        .await
        .with_context(|| format!("Failed to run {:?} -version", java))?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    parse_major_version(&combined)
        .with_context(|| format!("Could not parse Java version from: {}", combined.trim()))
}

/// Find the java executable in a JDK installation directory
pub fn find_java_executable(dir: &Path, os: OsType) -> Option<PathBuf> {
    // Common layouts:
    // - <dir>/bin/java
    // - <dir>/jdk-21.0.x+y/bin/java (nested)
    // - <dir>/jdk-21.0.x+y/Contents/Home/bin/java (macOS)
    let executable_name = os.java_executable();

    let direct = dir.join("bin").join(executable_name);
    if direct.is_file() {
        return Some(direct);
    }

    let mut nested: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    nested.sort();
    for sub in nested {
        for candidate in [
            sub.join("bin").join(executable_name),
            sub.join("Contents/Home/bin").join(executable_name),
        ] {
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Java executable for a `javaPath` setting: an explicit path as is, else
/// `JAVA_HOME`, else a previously installed JDK under `<base>/java`, else
/// the PATH sentinel.
pub fn resolve_java_path(setting: &str, base: &Path, os: OsType) -> PathBuf {
    let setting = setting.trim();
    if !setting.is_empty() && setting != JAVA_PATH_AUTO {
        return PathBuf::from(setting);
    }

    if let Some(home) = std::env::var_os("JAVA_HOME") {
        let candidate = PathBuf::from(home).join("bin").join(os.java_executable());
        if candidate.is_file() {
            return candidate;
        }
    }

    if let Some(installed) = find_java_executable(&java_install_dir(base), os) {
        return installed;
    }

    PathBuf::from(JAVA_PATH_SENTINEL)
}

fn adoptium_query_url(endpoints: &Endpoints, major: u32) -> String {
    format!(
        "{}/assets/latest/{}/hotspot?architecture=x64&image_type=jdk&os=windows&vendor=eclipse",
        endpoints.adoptium_api.trim_end_matches('/'),
        major
    )
}

/// Download the latest Temurin JDK build for `major` and unpack it under
/// `dest`. Returns the java executable inside it.
pub async fn install_adoptium_jdk(
    client: &Client,
    endpoints: &Endpoints,
    dest: &Path,
    major: u32,
    os: OsType,
    reporter: &dyn ProgressReporter,
) -> Result<PathBuf> {
    reporter.set_message(&format!("Загрузка Java {}...", major));
    let assets: Vec<AdoptiumAsset> = fetch_json(client, &adoptium_query_url(endpoints, major))
        .await
        .context("Adoptium API request failed")?;
    let asset = assets
        .first()
        .context("Adoptium returned no JDK builds")?;
    let package = &asset.binary.package;
    log::info!(
        "[java] downloading {} ({})",
        asset.release_name.as_deref().unwrap_or("jdk"),
        package.link
    );

    let bytes = download_to_memory(client, &package.link, None).await?;
    if let Some(expected) = &package.checksum {
        let computed = format!("{:x}", Sha256::digest(&bytes));
        if !computed.eq_ignore_ascii_case(expected) {
            anyhow::bail!(
                "SHA256 mismatch for {}: expected {}, got {}",
                package.name,
                expected,
                computed
            );
        }
    }

    reporter.set_message(&format!("Распаковка Java {}...", major));
    std::fs::create_dir_all(dest).with_context(|| format!("Failed to create {:?}", dest))?;
    if package.name.ends_with(".zip") {
        extract_zip(&bytes, dest)?;
    } else {
        extract_tar_gz(&bytes, dest)?;
    }

    let java = find_java_executable(dest, os)
        .context("Could not find java executable after extraction")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&java)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&java, perms)?;
    }

    log::info!("[java] installed: {:?}", java);
    Ok(java)
}

/// Make sure a Java >= [`REQUIRED_JAVA_MAJOR`] is available.
///
/// An explicit path must exist. A missing or unparseable Java is replaced by
/// an auto-installed JDK on Windows; a Java that is merely too old is
/// reported, never replaced behind the player's back.
pub async fn ensure_java(
    client: &Client,
    endpoints: &Endpoints,
    base: &Path,
    java: &Path,
    os: OsType,
    reporter: &dyn ProgressReporter,
) -> Result<(PathBuf, u32), LaunchError> {
    let is_sentinel = java.as_os_str() == JAVA_PATH_SENTINEL;
    if !is_sentinel && !java.exists() {
        return Err(LaunchError::JavaNotFound(java.to_path_buf()));
    }

    let probe = if is_sentinel {
        match which::which(JAVA_PATH_SENTINEL) {
            Ok(found) => probe_java_version(&found).await.map(|v| (found, v)),
            Err(e) => Err(anyhow::anyhow!("java is not on PATH: {}", e)),
        }
    } else {
        probe_java_version(java).await.map(|v| (java.to_path_buf(), v))
    };

    match probe {
        Ok((path, major)) if major >= REQUIRED_JAVA_MAJOR => {
            log::info!("[java] using Java {} at {:?}", major, path);
            Ok((path, major))
        }
        Ok((_, major)) => Err(LaunchError::JavaTooOld {
            required: REQUIRED_JAVA_MAJOR,
            found: major,
        }),
        Err(probe_err) => {
            log::warn!("[java] {:#}", probe_err);
            if !os.is_windows() {
                return Err(LaunchError::JavaUnavailable {
                    required: REQUIRED_JAVA_MAJOR,
                    source: probe_err,
                });
            }

            let dest = java_install_dir(base).join(format!("jdk-{}", REQUIRED_JAVA_MAJOR));
            let installed = async {
                let path = install_adoptium_jdk(
                    client,
                    endpoints,
                    &dest,
                    REQUIRED_JAVA_MAJOR,
                    os,
                    reporter,
                )
                .await?;
                let major = probe_java_version(&path).await?;
                if major < REQUIRED_JAVA_MAJOR {
                    anyhow::bail!("Installed JDK reports Java {}", major);
                }
                Ok((path, major))
            }
            .await;

            installed.map_err(|source| LaunchError::JavaUnavailable {
                required: REQUIRED_JAVA_MAJOR,
                source,
            })
        }
    }
}
