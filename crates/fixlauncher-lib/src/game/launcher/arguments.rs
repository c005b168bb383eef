//! Structured launch argument builder.
//!
//! JVM flags and game arguments are kept as separate ordered lists and
//! only concatenated in [`LaunchArguments::to_vec`].

use dunce::canonicalize;
use std::path::{Path, PathBuf};

use crate::game::installer::config::FABRIC_KNOT_MAIN_CLASS;
use crate::game::launcher::version_parser::VersionJson;

pub const VANILLA_MAIN_CLASS: &str = "net.minecraft.client.main.Main";
pub const WINDOW_WIDTH: u32 = 854;
pub const WINDOW_HEIGHT: u32 = 480;
pub const GAME_LANG: &str = "ru_RU";

/// Checkbox id -> JVM flag.
pub const JVM_FLAG_TABLE: &[(&str, &str)] = &[
    ("g1gc", "-XX:+UseG1GC"),
    ("parallel-gc", "-XX:+UseParallelGC"),
    ("serial-gc", "-XX:+UseSerialGC"),
    ("zgc", "-XX:+UseZGC"),
    ("string-dedup", "-XX:+UseStringDeduplication"),
    ("tiered", "-XX:+TieredCompilation"),
    ("large-pages", "-XX:+UseLargePages"),
    ("disable-explicit-gc", "-XX:-DisableExplicitGC"),
    ("compile-threshold", "-XX:CompileThreshold=1000"),
    ("inline", "-XX:+AggressiveOpts"),
];

pub fn jvm_flag(id: &str) -> Option<&'static str> {
    JVM_FLAG_TABLE
        .iter()
        .find(|(flag_id, _)| *flag_id == id)
        .map(|(_, flag)| *flag)
}

/// A named RAM + flag combination offered in settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformancePreset {
    pub id: &'static str,
    pub name: &'static str,
    pub ram_gb: u32,
    pub jvm_flags: &'static [&'static str],
}

const PRESETS: &[PerformancePreset] = &[
    PerformancePreset {
        id: "lowend",
        name: "Low-end",
        ram_gb: 2,
        jvm_flags: &["serial-gc", "tiered"],
    },
    PerformancePreset {
        id: "pvp",
        name: "PvP",
        ram_gb: 4,
        jvm_flags: &["g1gc", "compile-threshold"],
    },
    PerformancePreset {
        id: "shaders",
        name: "Shaders",
        ram_gb: 8,
        jvm_flags: &["g1gc", "string-dedup", "large-pages"],
    },
    PerformancePreset {
        id: "stream",
        name: "Stream",
        ram_gb: 6,
        jvm_flags: &["g1gc", "disable-explicit-gc"],
    },
];

/// Preset by id; unknown ids get the PvP preset.
pub fn performance_preset(id: &str) -> &'static PerformancePreset {
    PRESETS
        .iter()
        .find(|p| p.id == id)
        .unwrap_or(&PRESETS[1])
}

/// Split a free-form argument string. Quoted sections stay together;
/// heap flags are dropped since the launcher sets them from the RAM setting.
pub fn split_custom_args(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }
    let parts = shlex::split(raw)
        .unwrap_or_else(|| raw.split_whitespace().map(|s| s.trim_matches('"').to_string()).collect());
    parts
        .into_iter()
        .filter(|a| !a.is_empty() && !a.starts_with("-Xmx") && !a.starts_with("-Xms"))
        .collect()
}

fn flag_key(flag: &str) -> &str {
    flag.split('=').next().unwrap_or(flag)
}

/// Ordered JVM flags; `push_unique` ignores a flag whose key (text before
/// `=`) is already present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JvmArgs(Vec<String>);

impl JvmArgs {
    pub fn push(&mut self, arg: impl Into<String>) {
        self.0.push(arg.into());
    }

    pub fn push_unique(&mut self, arg: impl Into<String>) -> bool {
        let arg = arg.into();
        let key = flag_key(&arg);
        if self.0.iter().any(|a| flag_key(a) == key) {
            log::debug!("[args] skipping duplicate JVM flag {}", arg);
            return false;
        }
        self.0.push(arg);
        true
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Everything the argument builder needs besides the classpath.
#[derive(Debug, Clone)]
pub struct ArgumentInputs {
    pub version_id: String,
    pub game_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub asset_index: String,
    pub natives_dir: PathBuf,
    pub player_name: String,
    pub uuid: String,
    pub ram_gb: u32,
    pub version_type: String,
    /// `(minecraft version, loader version)` for Fabric launches.
    pub fabric: Option<(String, String)>,
    pub jvm_flag_ids: Vec<String>,
    pub custom_jvm_args: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchArguments {
    pub jvm: Vec<String>,
    pub classpath: String,
    pub main_class: String,
    pub game: Vec<String>,
}

impl LaunchArguments {
    /// Final argv after the java executable.
    pub fn to_vec(&self) -> Vec<String> {
        let mut argv = self.jvm.clone();
        argv.push("-cp".to_string());
        argv.push(self.classpath.clone());
        argv.push(self.main_class.clone());
        argv.extend(self.game.iter().cloned());
        argv
    }
}

/// Main class from the version json, else the default for the launch kind.
pub fn main_class_for(version: &VersionJson, is_modded: bool) -> String {
    match &version.main_class {
        Some(main) if !main.is_empty() => main.clone(),
        _ if is_modded => FABRIC_KNOT_MAIN_CLASS.to_string(),
        _ => VANILLA_MAIN_CLASS.to_string(),
    }
}

/// Loader version from the `net.fabricmc:fabric-loader` library entry.
pub fn fabric_loader_version(version: &VersionJson) -> Option<String> {
    version.libraries.iter().find_map(|lib| {
        let mut parts = lib.name.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("net.fabricmc"), Some("fabric-loader"), Some(v)) => Some(v.to_string()),
            _ => None,
        }
    })
}

fn absolute(path: &Path) -> String {
    canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

pub fn build_jvm_arguments(inputs: &ArgumentInputs) -> Vec<String> {
    let mut jvm = JvmArgs::default();
    let ram = inputs.ram_gb.max(1);
    jvm.push(format!("-Xmx{}G", ram));
    jvm.push(format!("-Xms{}G", ram.min(2)));

    let natives = absolute(&inputs.natives_dir);
    jvm.push(format!("-Djava.library.path={}", natives));
    jvm.push(format!("-Dorg.lwjgl.librarypath={}", natives));
    jvm.push("-Dminecraft.demo=false");
    jvm.push("-Ddemo=false");

    for id in &inputs.jvm_flag_ids {
        match jvm_flag(id) {
            Some(flag) => {
                jvm.push_unique(flag);
            }
            None => log::debug!("[args] unknown JVM flag id {}", id),
        }
    }
    for arg in split_custom_args(&inputs.custom_jvm_args) {
        jvm.push(arg);
    }
    jvm.0
}

pub fn build_game_arguments(inputs: &ArgumentInputs) -> Vec<String> {
    let mut game: Vec<String> = vec![
        "--version".into(),
        inputs.version_id.clone(),
        "--gameDir".into(),
        inputs.game_dir.to_string_lossy().into_owned(),
        "--assetsDir".into(),
        inputs.assets_dir.to_string_lossy().into_owned(),
        "--assetIndex".into(),
        inputs.asset_index.clone(),
        "--width".into(),
        WINDOW_WIDTH.to_string(),
        "--height".into(),
        WINDOW_HEIGHT.to_string(),
        "--username".into(),
        inputs.player_name.clone(),
        "--uuid".into(),
        inputs.uuid.clone(),
        "--accessToken".into(),
        "0".into(),
        "--userType".into(),
        "legacy".into(),
        "--versionType".into(),
        inputs.version_type.clone(),
        "--lang".into(),
        GAME_LANG.into(),
    ];
    if let Some((mc_version, loader_version)) = &inputs.fabric {
        game.extend([
            "--fabric.gameVersion".to_string(),
            mc_version.clone(),
            "--fabric.loaderVersion".to_string(),
            loader_version.clone(),
        ]);
    }
    game
}

pub fn build_launch_arguments(
    inputs: &ArgumentInputs,
    classpath: String,
    main_class: String,
) -> LaunchArguments {
    LaunchArguments {
        jvm: build_jvm_arguments(inputs),
        classpath,
        main_class,
        game: build_game_arguments(inputs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inputs() -> ArgumentInputs {
        ArgumentInputs {
            version_id: "1.21.4-fabric".into(),
            game_dir: PathBuf::from("/games/survival"),
            assets_dir: PathBuf::from("/games/survival/assets"),
            asset_index: "19".into(),
            natives_dir: PathBuf::from("/games/survival/natives"),
            player_name: "Steve".into(),
            uuid: "b50ad385-829d-3141-a216-7e7d7539ba7f".into(),
            ram_gb: 6,
            version_type: "release".into(),
            fabric: Some(("1.21.4".into(), "0.16.9".into())),
            jvm_flag_ids: vec!["g1gc".into(), "bogus".into(), "g1gc".into()],
            custom_jvm_args: "-Xmx16G -Dfoo=\"a b\" -XX:+UseG1GC".into(),
        }
    }

    #[test]
    fn heap_and_flags() {
        let jvm = build_jvm_arguments(&inputs());
        assert_eq!(jvm[0], "-Xmx6G");
        assert_eq!(jvm[1], "-Xms2G");
        assert!(jvm.contains(&"-Djava.library.path=/games/survival/natives".to_string()));
        assert!(jvm.contains(&"-Dminecraft.demo=false".to_string()));
        assert_eq!(jvm.iter().filter(|a| a.starts_with("-Xmx")).count(), 1);
        assert!(jvm.contains(&"-Dfoo=a b".to_string()));
        // Table flags are deduplicated, custom args are appended after them
        let g1 = jvm.iter().position(|a| a == "-XX:+UseG1GC").unwrap();
        assert_eq!(jvm[g1 + 1], "-Dfoo=a b");
        assert_eq!(jvm.last().unwrap(), "-XX:+UseG1GC");
    }

    #[test]
    fn small_ram_sets_equal_heap_bounds() {
        let mut i = inputs();
        i.ram_gb = 1;
        let jvm = build_jvm_arguments(&i);
        assert_eq!(&jvm[..2], &["-Xmx1G".to_string(), "-Xms1G".to_string()]);
    }

    #[test]
    fn argv_order() {
        let args = build_launch_arguments(&inputs(), "a.jar:b.jar".into(), FABRIC_KNOT_MAIN_CLASS.into());
        let argv = args.to_vec();
        let main_pos = argv.iter().position(|a| a == FABRIC_KNOT_MAIN_CLASS).unwrap();
        assert_eq!(argv[main_pos - 2], "-cp");
        assert_eq!(argv[main_pos - 1], "a.jar:b.jar");
        assert_eq!(argv[main_pos + 1], "--version");
        assert!(argv[..main_pos].iter().all(|a| !a.starts_with("--")));

        let tail = &argv[argv.len() - 4..];
        assert_eq!(tail, &["--fabric.gameVersion", "1.21.4", "--fabric.loaderVersion", "0.16.9"]);
    }

    #[test]
    fn vanilla_has_no_fabric_args() {
        let mut i = inputs();
        i.fabric = None;
        let game = build_game_arguments(&i);
        assert!(!game.iter().any(|a| a.starts_with("--fabric")));
        let lang = game.iter().position(|a| a == "--lang").unwrap();
        assert_eq!(game[lang + 1], "ru_RU");
        let token = game.iter().position(|a| a == "--accessToken").unwrap();
        assert_eq!(game[token + 1], "0");
    }

    #[test]
    fn custom_args_split() {
        assert!(split_custom_args("   ").is_empty());
        assert_eq!(
            split_custom_args("-Xms1G -XX:+UseZGC '-Dname=x y'"),
            vec!["-XX:+UseZGC".to_string(), "-Dname=x y".to_string()]
        );
    }

    #[test]
    fn presets_fall_back_to_pvp() {
        assert_eq!(performance_preset("shaders").ram_gb, 8);
        assert_eq!(performance_preset("unknown").id, "pvp");
        assert_eq!(jvm_flag("compile-threshold"), Some("-XX:CompileThreshold=1000"));
        assert_eq!(jvm_flag("nope"), None);
    }

    #[test]
    fn main_class_and_loader_version() {
        let v: VersionJson = serde_json::from_value(json!({
            "id": "1.21.4-fabric",
            "libraries": [
                {"name": "net.fabricmc:intermediary:1.21.4"},
                {"name": "net.fabricmc:fabric-loader:0.16.10"}
            ]
        }))
        .unwrap();
        assert_eq!(main_class_for(&v, true), FABRIC_KNOT_MAIN_CLASS);
        assert_eq!(main_class_for(&v, false), VANILLA_MAIN_CLASS);
        assert_eq!(fabric_loader_version(&v).as_deref(), Some("0.16.10"));
    }
}
