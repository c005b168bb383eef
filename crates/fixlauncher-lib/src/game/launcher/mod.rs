/// Game launcher module: version model, natives, classpath, arguments and the launch itself
pub mod arguments;
pub mod classifier;
pub mod classpath;
pub mod crash;
pub mod identity;
pub mod natives;
pub mod playtime;
pub mod process;
pub mod types;
pub mod version_parser;

// Re-export commonly used types
pub use crate::game::installer::types::OsType;
pub use arguments::{build_launch_arguments, LaunchArguments};
pub use classpath::{build_classpath, join_classpath, maven_to_path};
pub use crash::{analyze_crash_text, latest_crash_report, CrashKind, CrashReport};
pub use identity::offline_uuid;
pub use natives::{check_natives, extract_natives, NativesCheck};
pub use playtime::PlaytimeTracker;
pub use process::{ensure_natives, launch};
pub use types::{GameEvents, LaunchEnv, LaunchHandle, LaunchPlan, NoopGameEvents};
pub use version_parser::{load_version, Library, VersionJson};
