pub mod installer;
pub mod launcher;
pub mod metadata;
pub mod mods;

// Re-export commonly used types
pub use installer::core::modpack_installer::{repair_modpack, InstallIntegrityReport, ModpackSource};
pub use installer::ensure_version_installed;
pub use installer::types::{InstallSpec, ProfileLayout, ProgressReporter};
pub use launcher::{launch, GameEvents, LaunchEnv, LaunchHandle, LaunchPlan};
pub use metadata::{fetch_version_list, resolve_install_plan, InstallPlan, VersionSelector, VersionType};
pub use mods::{detect_mod_conflicts, list_mods, InstalledMod};
