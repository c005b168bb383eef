//! Core of FixLauncher: version resolution, installation and repair of game
//! files, native library extraction, classpath assembly and game launch.

pub mod context;
pub mod error;
pub mod game;
pub mod paths;
pub mod settings;
pub mod utils;

pub use context::LauncherContext;
pub use error::{ExtractError, InstallError, LaunchError, ResolveError};
pub use settings::LauncherSettings;
