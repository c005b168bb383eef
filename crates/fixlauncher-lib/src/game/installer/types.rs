use std::path::{Path, PathBuf};

use crate::game::installer::config::{Endpoints, DEFAULT_CONCURRENCY};

/// Progress reporter trait for installer and launcher operations.
/// Implementations forward updates to whatever surface shows them.
pub trait ProgressReporter: Send + Sync {
    /// Start a new named step
    fn start_step(&self, name: &str);

    /// Update bytes transferred for the current download
    fn update_bytes(&self, transferred: u64, total: Option<u64>);

    /// Set overall percentage (0-100)
    fn set_percent(&self, percent: i32);

    /// Set a short status message
    fn set_message(&self, message: &str);

    /// Set a numeric item count for the current step (e.g. "3/12").
    fn set_step_count(&self, current: u32, total: Option<u32>);

    /// Mark operation as complete
    fn done(&self, success: bool, message: Option<&str>);

    /// Checked between work items; nothing cancels by default.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// A progress reporter that does nothing.
/// Used for background verification and tests.
pub struct SilentProgressReporter;

impl ProgressReporter for SilentProgressReporter {
    fn start_step(&self, _name: &str) {}
    fn update_bytes(&self, _transferred: u64, _total: Option<u64>) {}
    fn set_percent(&self, _percent: i32) {}
    fn set_message(&self, _message: &str) {}
    fn set_step_count(&self, _current: u32, _total: Option<u32>) {}
    fn done(&self, _success: bool, _message: Option<&str>) {}
}

/// Reporter that mirrors progress into the log. Used by the CLI when no
/// richer surface is attached.
pub struct LogProgressReporter;

impl ProgressReporter for LogProgressReporter {
    fn start_step(&self, name: &str) {
        log::info!("==> {}", name);
    }
    fn update_bytes(&self, _transferred: u64, _total: Option<u64>) {}
    fn set_percent(&self, percent: i32) {
        log::debug!("progress {}%", percent);
    }
    fn set_message(&self, message: &str) {
        log::info!("{}", message);
    }
    fn set_step_count(&self, _current: u32, _total: Option<u32>) {}
    fn done(&self, success: bool, message: Option<&str>) {
        match (success, message) {
            (true, Some(m)) => log::info!("done: {}", m),
            (true, None) => log::info!("done"),
            (false, m) => log::error!("failed: {}", m.unwrap_or("unknown error")),
        }
    }
}

/// Layout of a profile directory (one per playable build).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileLayout {
    root: PathBuf,
}

impl ProfileLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    pub fn version_dir(&self, version_id: &str) -> PathBuf {
        self.versions_dir().join(version_id)
    }

    pub fn version_json(&self, version_id: &str) -> PathBuf {
        self.version_dir(version_id)
            .join(format!("{}.json", version_id))
    }

    pub fn version_jar(&self, version_id: &str) -> PathBuf {
        self.version_dir(version_id)
            .join(format!("{}.jar", version_id))
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.root.join("libraries")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    pub fn asset_index_path(&self, index_id: &str) -> PathBuf {
        self.assets_dir()
            .join("indexes")
            .join(format!("{}.json", index_id))
    }

    /// Content-addressed location of an asset object.
    pub fn asset_object_path(&self, hash: &str) -> PathBuf {
        let prefix = hash.get(..2).unwrap_or(hash);
        self.assets_dir().join("objects").join(prefix).join(hash)
    }

    pub fn natives_dir(&self) -> PathBuf {
        self.root.join("natives")
    }

    pub fn mods_dir(&self) -> PathBuf {
        self.root.join("mods")
    }

    pub fn crash_reports_dir(&self) -> PathBuf {
        self.root.join("crash-reports")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn usercache_path(&self) -> PathBuf {
        self.root.join("usercache.json")
    }

    pub fn launcher_profiles_path(&self) -> PathBuf {
        self.root.join("launcher_profiles.json")
    }

    /// Both files present and non-empty.
    pub fn is_version_installed(&self, version_id: &str) -> bool {
        non_empty(&self.version_json(version_id)) && non_empty(&self.version_jar(version_id))
    }
}

pub(crate) fn non_empty(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Everything an install run needs besides the target version.
#[derive(Debug, Clone)]
pub struct InstallSpec {
    pub client: reqwest::Client,
    pub endpoints: Endpoints,
    pub layout: ProfileLayout,
    pub os: OsType,
    /// Parallel downloads per batch
    pub concurrency: usize,
    /// Java used to run helper jars such as the Fabric installer
    pub java: PathBuf,
}

impl InstallSpec {
    pub fn new(client: reqwest::Client, layout: ProfileLayout) -> Self {
        Self {
            client,
            endpoints: Endpoints::default(),
            layout,
            os: OsType::current(),
            concurrency: DEFAULT_CONCURRENCY,
            java: PathBuf::from("java"),
        }
    }
}

/// Operating system and architecture the game runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsType {
    Windows,
    WindowsX86,
    WindowsArm64,
    MacOS,
    MacOSArm64,
    Linux,
    LinuxArm32,
    LinuxArm64,
}

impl OsType {
    /// Detect the current OS
    pub fn current() -> Self {
        #[cfg(all(target_os = "windows", target_arch = "x86"))]
        return OsType::WindowsX86;

        #[cfg(all(target_os = "windows", target_arch = "aarch64"))]
        return OsType::WindowsArm64;

        #[cfg(all(target_os = "windows", not(any(target_arch = "x86", target_arch = "aarch64"))))]
        return OsType::Windows;

        #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
        return OsType::MacOSArm64;

        #[cfg(all(target_os = "macos", not(target_arch = "aarch64")))]
        return OsType::MacOS;

        #[cfg(all(target_os = "linux", target_arch = "arm"))]
        return OsType::LinuxArm32;

        #[cfg(all(target_os = "linux", target_arch = "aarch64"))]
        return OsType::LinuxArm64;

        #[cfg(all(target_os = "linux", not(any(target_arch = "arm", target_arch = "aarch64"))))]
        return OsType::Linux;

        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        compile_error!("Unsupported operating system");
    }

    /// OS name as used by manifest rules
    pub fn as_str(&self) -> &'static str {
        match self {
            OsType::Windows | OsType::WindowsX86 | OsType::WindowsArm64 => "windows",
            OsType::Linux | OsType::LinuxArm32 | OsType::LinuxArm64 => "linux",
            OsType::MacOS | OsType::MacOSArm64 => "osx",
        }
    }

    /// Architecture as used by manifest rules (`os.arch`)
    pub fn arch_str(&self) -> &'static str {
        match self {
            OsType::WindowsX86 => "x86",
            OsType::WindowsArm64 | OsType::MacOSArm64 | OsType::LinuxArm64 => "arm64",
            OsType::LinuxArm32 => "arm32",
            OsType::Windows | OsType::MacOS | OsType::Linux => "x86_64",
        }
    }

    pub fn is_windows(&self) -> bool {
        self.as_str() == "windows"
    }

    /// Separator used when joining classpath entries
    pub fn classpath_separator(&self) -> &'static str {
        if self.is_windows() {
            ";"
        } else {
            ":"
        }
    }

    pub fn java_executable(&self) -> &'static str {
        if self.is_windows() {
            "java.exe"
        } else {
            "java"
        }
    }
}
