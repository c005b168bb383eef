use fixlauncher_lib::game::installer::config::FABRIC_KNOT_MAIN_CLASS;
use fixlauncher_lib::game::installer::types::ProfileLayout;
use fixlauncher_lib::game::launcher::arguments::{fabric_loader_version, main_class_for, ArgumentInputs};
use fixlauncher_lib::game::launcher::version_parser::write_version_json;
use fixlauncher_lib::game::launcher::{
    build_classpath, build_launch_arguments, join_classpath, load_version, offline_uuid, OsType,
    VersionJson,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const VERSION_ID: &str = "1.21.4-fabric";

fn touch(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"jar").unwrap();
}

/// A Fabric profile as the installer leaves it, plus an outdated ASM jar
/// listed in the json and a couple of mods.
fn fabric_profile(root: &Path) -> ProfileLayout {
    let layout = ProfileLayout::new(root);
    let version: VersionJson = serde_json::from_value(json!({
        "id": VERSION_ID,
        "mainClass": FABRIC_KNOT_MAIN_CLASS,
        "assetIndex": {"id": "19", "url": "http://127.0.0.1:9/19.json"},
        "libraries": [
            {"name": "net.fabricmc:fabric-loader:0.16.9", "url": "https://maven.fabricmc.net/"},
            {"name": "org.ow2.asm:asm:9.3", "url": "https://maven.fabricmc.net/"},
            {
                "name": "com.mojang:brigadier:1.0.18",
                "downloads": {"artifact": {"path": "com/mojang/brigadier/1.0.18/brigadier-1.0.18.jar"}}
            },
            {
                "name": "ca.weblite:java-objc-bridge:1.1",
                "rules": [{"action": "allow", "os": {"name": "osx"}}],
                "downloads": {"artifact": {"path": "ca/weblite/java-objc-bridge/1.1/java-objc-bridge-1.1.jar"}}
            },
            {"name": "org.missing:gone:1.0", "url": "https://maven.fabricmc.net/"}
        ]
    }))
    .unwrap();
    write_version_json(&layout.version_json(VERSION_ID), &version).unwrap();
    touch(&layout.version_jar(VERSION_ID));

    let libs = layout.libraries_dir();
    for rel in [
        "net/fabricmc/fabric-loader/0.16.9/fabric-loader-0.16.9.jar",
        "net/fabricmc/intermediary/1.21.4/intermediary-1.21.4.jar",
        "org/ow2/asm/asm/9.3/asm-9.3.jar",
        "org/ow2/asm/asm/9.9/asm-9.9.jar",
        "com/mojang/brigadier/1.0.18/brigadier-1.0.18.jar",
        "ca/weblite/java-objc-bridge/1.1/java-objc-bridge-1.1.jar",
    ] {
        touch(&libs.join(rel));
    }

    touch(&layout.mods_dir().join("sodium.jar"));
    touch(&layout.mods_dir().join("lithium.jar.disabled"));
    layout
}

#[test]
fn fabric_classpath_is_ordered_and_filtered() {
    let tmp = TempDir::new().unwrap();
    let layout = fabric_profile(tmp.path());
    let libs = layout.libraries_dir();

    let classpath = build_classpath(&layout, VERSION_ID, true, OsType::Linux);

    let expected: Vec<PathBuf> = vec![
        libs.join("net/fabricmc/fabric-loader/0.16.9/fabric-loader-0.16.9.jar"),
        libs.join("com/mojang/brigadier/1.0.18/brigadier-1.0.18.jar"),
        libs.join("org/ow2/asm/asm/9.9/asm-9.9.jar"),
        libs.join("net/fabricmc/intermediary/1.21.4/intermediary-1.21.4.jar"),
        layout.version_jar(VERSION_ID),
        layout.mods_dir().join("sodium.jar"),
    ];
    assert_eq!(classpath, expected);

    // Vanilla launch of the same profile: no scans, no mods, but the listed
    // ASM jar stays
    let vanilla = build_classpath(&layout, VERSION_ID, false, OsType::Linux);
    assert!(vanilla.contains(&libs.join("org/ow2/asm/asm/9.3/asm-9.3.jar")));
    assert!(!vanilla.contains(&layout.mods_dir().join("sodium.jar")));
    assert_eq!(vanilla.last(), Some(&layout.version_jar(VERSION_ID)));
}

#[test]
fn argv_puts_classpath_and_main_class_between_jvm_and_game_args() {
    let tmp = TempDir::new().unwrap();
    let layout = fabric_profile(tmp.path());
    let version = load_version(&layout, VERSION_ID).unwrap();

    let classpath = join_classpath(
        &build_classpath(&layout, VERSION_ID, true, OsType::Linux),
        OsType::Linux,
    );
    let loader = fabric_loader_version(&version).unwrap();
    assert_eq!(loader, "0.16.9");

    let inputs = ArgumentInputs {
        version_id: VERSION_ID.into(),
        game_dir: layout.root().to_path_buf(),
        assets_dir: layout.assets_dir(),
        asset_index: version.asset_index_id("1.21.4"),
        natives_dir: layout.natives_dir(),
        player_name: "Notch".into(),
        uuid: offline_uuid("Notch").to_string(),
        ram_gb: 4,
        version_type: "custom".into(),
        fabric: Some(("1.21.4".into(), loader)),
        jvm_flag_ids: vec!["g1gc".into()],
        custom_jvm_args: "-Xms8G -Dfile.encoding=UTF-8".into(),
    };
    let args = build_launch_arguments(&inputs, classpath.clone(), main_class_for(&version, true));
    let argv = args.to_vec();

    let cp = argv.iter().position(|a| a == "-cp").unwrap();
    assert_eq!(argv[cp + 1], classpath);
    assert_eq!(argv[cp + 2], FABRIC_KNOT_MAIN_CLASS);
    assert!(argv[..cp].contains(&"-XX:+UseG1GC".to_string()));
    assert!(argv[..cp].contains(&"-Dfile.encoding=UTF-8".to_string()));
    assert!(!argv.contains(&"-Xms8G".to_string()));

    let game = &argv[cp + 3..];
    let value_of = |flag: &str| {
        let i = game.iter().position(|a| a == flag).unwrap();
        game[i + 1].clone()
    };
    assert_eq!(value_of("--username"), "Notch");
    assert_eq!(value_of("--uuid"), "b50ad385-829d-3141-a216-7e7d7539ba7f");
    assert_eq!(value_of("--assetIndex"), "19");
    assert_eq!(value_of("--accessToken"), "0");
    assert_eq!(value_of("--fabric.loaderVersion"), "0.16.9");
    assert!(classpath.contains(':'));
}
