//! Closed error kinds for each pipeline stage.
//!
//! Internals use `anyhow` for context chains; these enums are what callers
//! match on. `Display` is the message shown to the player.

use std::path::PathBuf;
use thiserror::Error;

use crate::game::launcher::crash::CrashReport;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Неизвестная версия: {0}")]
    UnknownSelector(String),

    #[error("Загрузчик {0} пока не поддерживается лаунчером")]
    UnsupportedLoader(String),
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Версия {0} не найдена в манифесте Mojang")]
    VersionNotFound(String),

    #[error("Не удалось загрузить манифест версий")]
    Manifest(#[source] anyhow::Error),

    #[error("Не удалось установить Fabric для {mc_version}")]
    Fabric {
        mc_version: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Профиль {} уже обновляется другим экземпляром лаунчера", .0.display())]
    Locked(PathBuf),

    #[error("Не удалось восстановить файлы сборки")]
    Modpack(#[source] anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Нативные библиотеки ({classifier}) не найдены в манифесте {version_id}")]
    NoCandidates {
        version_id: String,
        classifier: String,
    },

    #[error("lwjgl.dll слишком мал ({size} байт), вероятно неверная разрядность")]
    UndersizedLwjgl { size: u64 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Java не найдена по пути {}", .0.display())]
    JavaNotFound(PathBuf),

    #[error("Требуется Java {required}, обнаружена Java {found}. Установите Java {required} или выберите другой путь в настройках")]
    JavaTooOld { required: u32, found: u32 },

    #[error("Не удалось определить версию Java и установить Java {required} автоматически")]
    JavaUnavailable {
        required: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("Нативные библиотеки не найдены. Переустановите версию {0}")]
    NativesMissing(String),

    #[error("Classpath пуст: файлы версии {0} не установлены")]
    EmptyClasspath(String),

    #[error("Не удалось прочитать файл версии {version_id}")]
    VersionJson {
        version_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Не удалось запустить Java ({})", .java.display())]
    Spawn {
        java: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", .0.message())]
    Crashed(CrashReport),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
