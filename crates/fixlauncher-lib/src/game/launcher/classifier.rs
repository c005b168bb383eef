//! Selection of platform-native library artifacts.

use crate::game::installer::types::OsType;
use crate::game::launcher::classpath::maven_to_path;
use crate::game::launcher::version_parser::{Library, VersionJson};

/// The canonical native classifier for an OS/arch pair.
pub fn native_classifier(os: OsType) -> &'static str {
    match os {
        OsType::Windows => "natives-windows",
        OsType::WindowsX86 => "natives-windows-x86",
        OsType::WindowsArm64 => "natives-windows-arm64",
        OsType::MacOS => "natives-macos",
        OsType::MacOSArm64 => "natives-macos-arm64",
        OsType::Linux => "natives-linux",
        OsType::LinuxArm64 => "natives-linux-arm64",
        OsType::LinuxArm32 => "natives-linux-arm32",
    }
}

/// Classifier spellings accepted for `os`, most specific first. Older
/// manifests used `natives-osx` and bitness-suffixed Windows names.
pub fn classifier_aliases(os: OsType) -> Vec<&'static str> {
    let mut aliases = vec![native_classifier(os)];
    let fallbacks: &[&'static str] = match os {
        OsType::Windows => &["natives-windows-64", "natives-windows-x64"],
        OsType::WindowsX86 => &["natives-windows-32", "natives-windows"],
        OsType::WindowsArm64 => &["natives-windows"],
        OsType::MacOS => &["natives-osx"],
        OsType::MacOSArm64 => &["natives-osx-arm64", "natives-macos", "natives-osx"],
        OsType::Linux => &["natives-linux-64"],
        OsType::LinuxArm64 | OsType::LinuxArm32 => &["natives-linux"],
    };
    aliases.extend_from_slice(fallbacks);
    aliases
}

fn bitness(os: OsType) -> &'static str {
    match os {
        OsType::WindowsX86 | OsType::LinuxArm32 => "32",
        _ => "64",
    }
}

/// A native-bearing jar to fetch and unpack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeArtifact {
    pub library: String,
    pub classifier: String,
    /// Path relative to `libraries/`
    pub path: String,
    pub url: Option<String>,
    pub sha1: Option<String>,
}

/// Resolve the classifier a library offers for `os` through its
/// `downloads.classifiers` map (legacy `natives` map first).
fn classifier_candidate(library: &Library, os: OsType) -> Option<NativeArtifact> {
    let classifiers = library.downloads.as_ref()?.classifiers.as_ref()?;

    let mut wanted: Vec<String> = Vec::new();
    if let Some(natives) = &library.natives {
        if let Some(template) = natives.get(os.as_str()) {
            wanted.push(template.replace("${arch}", bitness(os)));
        }
    }
    wanted.extend(classifier_aliases(os).into_iter().map(String::from));

    for key in wanted {
        if let Some(artifact) = classifiers.get(&key) {
            let path = match &artifact.path {
                Some(p) => p.clone(),
                None => maven_to_path(&format!("{}:{}", library.name, key)).ok()?,
            };
            return Some(NativeArtifact {
                library: library.name.clone(),
                classifier: key,
                path,
                url: artifact.url.clone(),
                sha1: artifact.sha1.clone(),
            });
        }
    }
    None
}

/// Libraries listed as `group:artifact:version:natives-xxx` entries.
/// Only LWJGL entries are considered.
fn name_candidate(library: &Library, aliases: &[&str]) -> Option<NativeArtifact> {
    if !library.name.contains("lwjgl") {
        return None;
    }
    let classifier = library.name_classifier()?;
    if !aliases.contains(&classifier) {
        return None;
    }
    let path = library.artifact_path()?;
    Some(NativeArtifact {
        library: library.name.clone(),
        classifier: classifier.to_string(),
        path,
        url: library.artifact_url(),
        sha1: library.artifact_sha1(),
    })
}

/// Native jars for `os`, classifier map entries first; the name scan is
/// used only when no library exposes a matching classifier.
pub fn select_native_artifacts(version: &VersionJson, os: OsType) -> Vec<NativeArtifact> {
    let allowed: Vec<&Library> = version
        .libraries
        .iter()
        .filter(|l| l.is_allowed(os))
        .collect();

    let from_classifiers: Vec<NativeArtifact> = allowed
        .iter()
        .filter_map(|l| classifier_candidate(l, os))
        .collect();
    if !from_classifiers.is_empty() {
        return from_classifiers;
    }

    let aliases = classifier_aliases(os);
    let from_names: Vec<NativeArtifact> = allowed
        .iter()
        .filter_map(|l| name_candidate(l, &aliases))
        .collect();
    if !from_names.is_empty() {
        log::debug!(
            "[natives] no classifier entries, using {} name-embedded natives",
            from_names.len()
        );
    }
    from_names
}
