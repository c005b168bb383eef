/// Process management and game launch orchestration
use crate::error::{ExtractError, LaunchError};
use crate::game::installer::core::jre_manager::ensure_java;
use crate::game::installer::types::{ProfileLayout, ProgressReporter};
use crate::game::launcher::{
    arguments::{build_launch_arguments, fabric_loader_version, main_class_for, ArgumentInputs},
    classpath::{build_classpath, join_classpath},
    crash::classify_exit,
    identity::{ensure_launcher_profiles, offline_uuid, update_usercache},
    natives::{check_natives, extract_natives},
    types::{GameEvents, LaunchEnv, LaunchHandle, LaunchPlan},
    version_parser::{load_version, VersionJson},
};
use crate::utils::process::LauncherCommandExt;
use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead};
use tokio::sync::oneshot;

/// Lines of game output kept for crash classification.
pub const CAPTURE_LINES: usize = 500;

pub const GAME_LOG_FILE: &str = "launcher-game.log";

/// Rolling tail of the game's stdout/stderr, mirrored to a log file.
pub struct GameOutput {
    lines: Mutex<VecDeque<String>>,
    file: Mutex<Option<std::fs::File>>,
}

impl GameOutput {
    pub fn new(log_file: Option<std::fs::File>) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(CAPTURE_LINES)),
            file: Mutex::new(log_file),
        }
    }

    pub fn push(&self, line: String) {
        if let Ok(mut file) = self.file.lock() {
            if let Some(f) = file.as_mut() {
                let _ = writeln!(f, "{}", line);
            }
        }
        if let Ok(mut lines) = self.lines.lock() {
            if lines.len() == CAPTURE_LINES {
                lines.pop_front();
            }
            lines.push_back(line);
        }
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default()
    }
}

fn pump<R>(reader: R, output: Arc<GameOutput>) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            output.push(line);
        }
    })
}

/// Shell-style quoting for the logged command line.
pub(crate) fn quote_arg_internal(s: &str) -> String {
    if s.is_empty() {
        return "\"\"".to_string();
    }
    // Add quotes if whitespace or double-quote present; escape backslashes and double quotes
    if s.chars().any(|c| c.is_whitespace() || c == '"') {
        let esc = s.replace('\\', "\\\\").replace('"', "\\\"");
        return format!("\"{}\"", esc);
    }
    s.to_string()
}

/// Validate natives, re-extracting once when they are missing or undersized.
pub async fn ensure_natives(
    env: &LaunchEnv,
    layout: &ProfileLayout,
    version: &VersionJson,
    reporter: &dyn ProgressReporter,
) -> Result<(), LaunchError> {
    let dir = layout.natives_dir();
    if check_natives(&dir, env.os).is_valid() {
        return Ok(());
    }

    log::info!("[launch] natives invalid for {}, re-extracting", version.id);
    match extract_natives(&env.client, layout, version, env.os, reporter).await {
        Ok(report) => log::debug!("[launch] extracted {} native files", report.files.len()),
        Err(e @ (ExtractError::NoCandidates { .. } | ExtractError::UndersizedLwjgl { .. })) => {
            log::warn!("[launch] {}", e);
        }
        Err(ExtractError::Other(e)) => return Err(LaunchError::Extract(ExtractError::Other(e))),
    }

    if check_natives(&dir, env.os).is_valid() {
        Ok(())
    } else {
        Err(LaunchError::NativesMissing(version.id.clone()))
    }
}

fn open_game_log(logs_dir: &Path) -> (PathBuf, Option<std::fs::File>) {
    let path = logs_dir.join(GAME_LOG_FILE);
    let file = std::fs::create_dir_all(logs_dir)
        .and_then(|_| std::fs::File::create(&path))
        .map_err(|e| log::warn!("[launch] cannot write {:?}: {}", path, e))
        .ok();
    (path, file)
}

/// Pre-flight checks, argument assembly and a detached spawn.
///
/// Returns once the game has survived the grace window. A non-zero exit
/// inside the window is classified and returned as [`LaunchError::Crashed`];
/// a later exit is reported through `events`.
pub async fn launch(
    env: &LaunchEnv,
    plan: &LaunchPlan,
    reporter: Arc<dyn ProgressReporter>,
    events: Arc<dyn GameEvents>,
) -> Result<LaunchHandle, LaunchError> {
    log::info!(
        "[launch] start: version={}, modded={}, ram={}G",
        plan.version,
        plan.with_mods,
        plan.ram
    );

    // 1. Java
    reporter.start_step("Проверка Java");
    let (java, java_major) = ensure_java(
        &env.client,
        &env.endpoints,
        &env.base_path,
        &plan.java_path,
        env.os,
        &*reporter,
    )
    .await?;

    // 2. Version json and natives
    let layout = ProfileLayout::new(&plan.minecraft_path);
    let version = load_version(&layout, &plan.version).map_err(|source| LaunchError::VersionJson {
        version_id: plan.version.clone(),
        source,
    })?;

    reporter.start_step("Проверка нативных библиотек");
    ensure_natives(env, &layout, &version, &*reporter).await?;

    // 3. Classpath
    reporter.start_step("Сборка classpath");
    let entries = build_classpath(&layout, &plan.version, plan.with_mods, env.os);
    if entries.is_empty() {
        return Err(LaunchError::EmptyClasspath(plan.version.clone()));
    }
    log::debug!("[launch] classpath has {} entries", entries.len());

    // 4. Arguments
    let uuid = offline_uuid(&plan.player_name);
    let fabric = if plan.with_mods {
        fabric_loader_version(&version).map(|loader| {
            let mc = version
                .inherits_from
                .clone()
                .unwrap_or_else(|| plan.version.trim_end_matches("-fabric").to_string());
            (mc, loader)
        })
    } else {
        None
    };
    let inputs = ArgumentInputs {
        version_id: plan.version.clone(),
        game_dir: plan.minecraft_path.clone(),
        assets_dir: layout.assets_dir(),
        asset_index: version.asset_index_id(&plan.version),
        natives_dir: layout.natives_dir(),
        player_name: plan.player_name.clone(),
        uuid: uuid.to_string(),
        ram_gb: plan.ram,
        version_type: plan.version_type.clone(),
        fabric,
        jvm_flag_ids: plan.jvm_flags.clone(),
        custom_jvm_args: plan.custom_jvm_args.clone(),
    };
    let arguments = build_launch_arguments(
        &inputs,
        join_classpath(&entries, env.os),
        main_class_for(&version, plan.with_mods),
    );

    // 5. Profile files
    if let Err(e) = update_usercache(&layout.usercache_path(), &plan.player_name, &uuid) {
        log::warn!("[launch] usercache.json not updated: {:#}", e);
    }
    if let Err(e) = ensure_launcher_profiles(&layout.launcher_profiles_path()) {
        log::warn!("[launch] launcher_profiles.json not written: {:#}", e);
    }

    // 6. Spawn
    reporter.start_step("Запуск игры");
    let argv = arguments.to_vec();
    let command_line = std::iter::once(java.to_string_lossy().into_owned())
        .chain(argv.iter().cloned())
        .map(|a| quote_arg_internal(&a))
        .collect::<Vec<_>>()
        .join(" ");
    log::info!("[launch] exec: {}", command_line);

    let mut command = tokio::process::Command::new(&java);
    command
        .args(&argv)
        .current_dir(&plan.minecraft_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .detach();

    let mut child = command.spawn().map_err(|source| LaunchError::Spawn {
        java: java.clone(),
        source,
    })?;
    let pid = child.id().unwrap_or_default();
    log::info!("[launch] game process started with PID {}", pid);

    let (log_file, file) = open_game_log(&layout.logs_dir());
    let output = Arc::new(GameOutput::new(file));
    let readers: Vec<_> = [
        child.stdout.take().map(|s| pump(s, output.clone())),
        child.stderr.take().map(|s| pump(s, output.clone())),
    ]
    .into_iter()
    .flatten()
    .collect();

    // 7. Exit monitor. While the grace window is open the exit code goes back
    // to this function; afterwards it is classified here and sent to `events`.
    let (exit_tx, exit_rx) = oneshot::channel::<Option<i32>>();
    {
        let output = output.clone();
        let events = events.clone();
        tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    log::error!("[launch] failed to wait for PID {}: {}", pid, e);
                    None
                }
            };
            for reader in readers {
                let _ = reader.await;
            }
            log::info!("[launch] PID {} exited with {:?}", pid, code);

            if let Err(code) = exit_tx.send(code) {
                let crash = classify_exit(code, &output.snapshot());
                if let Some(report) = &crash {
                    log::error!("[launch] game crashed: {:?}", report.kind);
                }
                events.on_game_closed(pid, crash.as_ref());
            }
        });
    }

    let handle = LaunchHandle {
        pid,
        java,
        java_major,
        log_file,
        command_line,
    };

    match tokio::time::timeout(env.grace_window, exit_rx).await {
        Err(_) => {
            log::info!("[launch] PID {} survived the grace window", pid);
            events.on_game_launched(pid, &plan.version);
            reporter.done(true, None);
            Ok(handle)
        }
        Ok(Ok(code)) => match classify_exit(code, &output.snapshot()) {
            Some(report) => {
                reporter.done(false, Some(&report.message()));
                Err(LaunchError::Crashed(report))
            }
            None => {
                log::info!("[launch] game closed normally within the grace window");
                events.on_game_closed(pid, None);
                reporter.done(true, None);
                Ok(handle)
            }
        },
        Ok(Err(_)) => {
            log::warn!("[launch] exit monitor for PID {} stopped early", pid);
            events.on_game_launched(pid, &plan.version);
            Ok(handle)
        }
    }
}
