/// Core types for game launching
use crate::game::installer::config::Endpoints;
use crate::game::installer::types::OsType;
use crate::game::launcher::crash::CrashReport;
use std::path::PathBuf;
use std::time::Duration;

/// How long a freshly spawned game must survive before the launch counts
/// as successful.
pub const GRACE_WINDOW: Duration = Duration::from_secs(5);

/// Everything needed for one launch. Built fresh from the settings and the
/// resolved selector, never persisted.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    /// Profile directory (game dir)
    pub minecraft_path: PathBuf,

    /// Java setting: a path or the `java` PATH sentinel
    pub java_path: PathBuf,

    /// Heap size in GB
    pub ram: u32,

    pub player_name: String,

    /// Concrete version id (e.g. "1.21.4-fabric")
    pub version: String,

    pub with_mods: bool,

    /// Passed to the game as `--versionType`
    pub version_type: String,

    /// Flag ids from the JVM flag table
    pub jvm_flags: Vec<String>,

    /// Free-form extra JVM arguments
    pub custom_jvm_args: String,
}

/// Environment shared by launches: network access for the Java auto-install
/// and the platform the game runs on.
#[derive(Debug, Clone)]
pub struct LaunchEnv {
    pub client: reqwest::Client,
    pub endpoints: Endpoints,
    /// Launcher base directory (auto-installed JDKs live here)
    pub base_path: PathBuf,
    pub os: OsType,
    pub grace_window: Duration,
}

impl LaunchEnv {
    pub fn new(client: reqwest::Client, base_path: impl Into<PathBuf>) -> Self {
        Self {
            client,
            endpoints: Endpoints::default(),
            base_path: base_path.into(),
            os: OsType::current(),
            grace_window: GRACE_WINDOW,
        }
    }
}

/// A game that survived the grace window.
#[derive(Debug, Clone)]
pub struct LaunchHandle {
    pub pid: u32,
    pub java: PathBuf,
    pub java_major: u32,
    /// Game stdout/stderr mirror
    pub log_file: PathBuf,
    /// Shell-quoted command line, for logs and bug reports
    pub command_line: String,
}

/// Collaborators interested in the game's lifetime (presence, playtime).
/// Every method defaults to doing nothing.
pub trait GameEvents: Send + Sync {
    /// The game outlived the grace window.
    fn on_game_launched(&self, _pid: u32, _version: &str) {}

    /// The game exited after the grace window. `crash` is set for abnormal
    /// exits.
    fn on_game_closed(&self, _pid: u32, _crash: Option<&CrashReport>) {}
}

pub struct NoopGameEvents;

impl GameEvents for NoopGameEvents {}
