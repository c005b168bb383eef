//! Post-exit crash classification from captured game output.

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// POSIX exit code after SIGINT; the player closed the game from a terminal.
pub const SIGINT_EXIT_CODE: i32 = 130;

/// Number of log lines surfaced by the generic fallback.
const EXCERPT_LINES: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrashKind {
    /// Fabric refused the mod set; `mods` holds the names it mentioned.
    ModIncompatibility { mods: Vec<String> },
    OutOfMemory,
    /// The JVM itself could not start the game (bad Java, wrong class version).
    JavaStartup,
    MissingNatives,
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashReport {
    pub kind: CrashKind,
    pub exit_code: Option<i32>,
    /// Most relevant captured lines, noise removed.
    pub excerpt: Vec<String>,
}

impl CrashReport {
    /// Remediation text shown to the player.
    pub fn message(&self) -> String {
        let code = self
            .exit_code
            .map(|c| format!(" (код {})", c))
            .unwrap_or_default();
        match &self.kind {
            CrashKind::ModIncompatibility { mods } if !mods.is_empty() => format!(
                "Игра не запустилась{}: несовместимые моды ({}). Отключите или обновите их в менеджере модов.",
                code,
                mods.join(", ")
            ),
            CrashKind::ModIncompatibility { .. } => format!(
                "Игра не запустилась{}: Fabric обнаружил несовместимые моды. Отключите последние установленные моды.",
                code
            ),
            CrashKind::OutOfMemory => format!(
                "Игре не хватило памяти{}. Увеличьте RAM в настройках лаунчера.",
                code
            ),
            CrashKind::JavaStartup => format!(
                "Java не смогла запустить игру{}. Установите Java 21 или укажите правильный путь к Java в настройках.",
                code
            ),
            CrashKind::MissingNatives => format!(
                "Не найдены нативные библиотеки{}. Переустановите версию игры.",
                code
            ),
            CrashKind::Generic if self.excerpt.is_empty() => format!(
                "Игра завершилась с ошибкой{}. Экспортируйте лог и отправьте в поддержку.",
                code
            ),
            CrashKind::Generic => format!(
                "Игра завершилась с ошибкой{}:\n{}",
                code,
                self.excerpt.join("\n")
            ),
        }
    }
}

fn is_logging_noise(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.contains("log4j")
        || lower.contains("slf4j")
        || lower.contains("statuslogger")
        || line.trim().is_empty()
}

fn relevant_lines(lines: &[String]) -> Vec<String> {
    let filtered: Vec<&String> = lines.iter().filter(|l| !is_logging_noise(l)).collect();
    let errors: Vec<&&String> = filtered
        .iter()
        .filter(|l| {
            let lower = l.to_ascii_lowercase();
            lower.contains("error") || lower.contains("exception") || lower.contains("caused by")
        })
        .collect();

    let chosen: Vec<String> = if errors.is_empty() {
        filtered.iter().map(|l| l.trim().to_string()).collect()
    } else {
        errors.iter().map(|l| l.trim().to_string()).collect()
    };
    let skip = chosen.len().saturating_sub(EXCERPT_LINES);
    chosen.into_iter().skip(skip).collect()
}

fn conflicting_mods(lines: &[String]) -> Vec<String> {
    let mut mods: Vec<String> = Vec::new();
    let Ok(re) = Regex::new(r"(?i)\bmod '([^']+)'") else {
        return mods;
    };
    for line in lines {
        for caps in re.captures_iter(line) {
            let name = caps[1].to_string();
            if !mods.contains(&name) {
                mods.push(name);
            }
        }
    }
    mods
}

/// A native library file name such as `lwjgl.dll` or `liblwjgl.so`.
/// Package names (`net.minecraft.sounds`) must not match.
fn mentions_native_library(text: &str) -> bool {
    Regex::new(r#"[\w-]+\.(?:dll|so|dylib)(?:[\s:'"),]|$)"#)
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

/// Classify captured output into a crash category.
pub fn classify_output(lines: &[String], exit_code: Option<i32>) -> CrashReport {
    let text = lines.join("\n");
    let has = |needle: &str| text.contains(needle);

    let kind = if has("Incompatible mods found") || has("FormattedException") {
        CrashKind::ModIncompatibility {
            mods: conflicting_mods(lines),
        }
    } else if has("OutOfMemoryError") || text.to_ascii_lowercase().contains("java heap space") {
        CrashKind::OutOfMemory
    } else if has("JNI error") || has("UnsupportedClassVersionError") {
        CrashKind::JavaStartup
    } else if has("UnsatisfiedLinkError") || mentions_native_library(&text) {
        CrashKind::MissingNatives
    } else {
        CrashKind::Generic
    };

    CrashReport {
        kind,
        exit_code,
        excerpt: relevant_lines(lines),
    }
}

/// `None` when the exit is not a failure: code 0, or SIGINT.
pub fn classify_exit(exit_code: Option<i32>, lines: &[String]) -> Option<CrashReport> {
    match exit_code {
        Some(0) | Some(SIGINT_EXIT_CODE) => None,
        code => Some(classify_output(lines, code)),
    }
}

/// Short advice for the contents of a crash report file.
pub fn analyze_crash_text(text: &str) -> &'static str {
    let src = text.to_lowercase();
    if src.trim().is_empty() {
        return "Краш-лог пустой или не найден.";
    }
    if src.contains("outofmemoryerror") || src.contains("java heap space") {
        return "Похоже, не хватает RAM. Увеличьте RAM в настройках лаунчера.";
    }
    if src.contains("nosuchmethoderror") || src.contains("classnotfoundexception") {
        return "Похоже на конфликт/неверную версию мода. Проверьте совместимость модов.";
    }
    if src.contains("exception") && src.contains("fabric") {
        return "Ошибка связана с Fabric-модами. Попробуйте временно отключить последние моды.";
    }
    "Точная причина не определена автоматически. Экспортируйте лог и отправьте в поддержку."
}

/// Most recently modified file in `crash-reports/`.
pub fn latest_crash_report(crash_reports_dir: &Path) -> Option<PathBuf> {
    let mut latest: Option<(PathBuf, SystemTime)> = None;
    for entry in fs::read_dir(crash_reports_dir).ok()?.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        match &latest {
            Some((_, prev)) if modified <= *prev => {}
            _ => latest = Some((path, modified)),
        }
    }
    latest.map(|(path, _)| path)
}
