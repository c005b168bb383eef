mod cli;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Notify;

use cli::{Cli, Commands, ModsCommands, Parser};
use fixlauncher_lib::game::launcher::{CrashReport, GameEvents, PlaytimeTracker};
use fixlauncher_lib::game::metadata::VersionSelector;
use fixlauncher_lib::game::mods::{
    delete_mod, detect_mod_conflicts, list_mods, set_mod_enabled, DISABLED_SUFFIX,
};
use fixlauncher_lib::game::installer::types::ProfileLayout;
use fixlauncher_lib::{paths, LauncherContext};

/// Playtime accounting plus a signal for `launch --wait`.
struct CliEvents {
    playtime: PlaytimeTracker,
    closed: Notify,
}

impl GameEvents for CliEvents {
    fn on_game_launched(&self, pid: u32, version: &str) {
        log::info!("Minecraft {} running (pid {})", version, pid);
        self.playtime.on_game_launched(pid, version);
    }

    fn on_game_closed(&self, pid: u32, crash: Option<&CrashReport>) {
        self.playtime.on_game_closed(pid, crash);
        match crash {
            Some(report) => log::error!("{}", report.message()),
            None => log::info!("game (pid {}) exited", pid),
        }
        self.closed.notify_one();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let base = match cli.data_dir {
        Some(dir) => dir,
        None => {
            let base = paths::launcher_base_path()?;
            paths::migrate_legacy_base(&base, &paths::legacy_base_paths()?)?;
            base
        }
    };

    let events = Arc::new(CliEvents {
        playtime: PlaytimeTracker::new(paths::playtime_path(&base)),
        closed: Notify::new(),
    });
    if let Err(e) = events.playtime.settle_stale_session() {
        log::warn!("playtime: {:#}", e);
    }

    let mut ctx = LauncherContext::load(base.clone())?.with_events(events.clone());

    match cli.command {
        Commands::Versions => {
            for v in ctx.versions().await {
                println!("{:<24} {:<28} {}", v.id, v.label, v.description);
            }
            Ok(())
        }
        Commands::Install { version } => {
            let selector = selector(&ctx, version)?;
            let plan = ctx.install(&selector).await?;
            println!("{} installed in {}", plan.version_id, ctx.profile_dir(&selector).display());
            Ok(())
        }
        Commands::Launch {
            version,
            player,
            ram,
            wait,
        } => {
            if let Some(player) = player {
                ctx.settings.player_name = player;
            }
            if let Some(ram) = ram {
                ctx.settings.ram = ram;
            }
            let selector = selector(&ctx, version)?;
            ctx.settings.selected_version = selector.id.clone();
            ctx.save_settings()?;

            let handle = ctx.play(&selector).await?;
            println!("Minecraft started (pid {}), log: {}", handle.pid, handle.log_file.display());
            if wait {
                events.closed.notified().await;
            }
            Ok(())
        }
        Commands::Repair => {
            let report = ctx.repair().await?;
            println!(
                "missing: {}, corrupted: {}",
                report.missing_files.len(),
                report.corrupted_files.len()
            );
            Ok(())
        }
        Commands::Mods { command } => mods(&ctx, command),
        Commands::Playtime => {
            let data = events.playtime.load();
            println!(
                "{}h {}m",
                data.total_seconds / 3600,
                (data.total_seconds % 3600) / 60
            );
            Ok(())
        }
    }
}

fn selector(ctx: &LauncherContext, raw: Option<String>) -> Result<VersionSelector> {
    let raw = raw.unwrap_or_else(|| ctx.settings.selected_version.clone());
    Ok(VersionSelector::parse(&raw)?)
}

fn mods_dir(ctx: &LauncherContext, version: Option<String>) -> Result<PathBuf> {
    let selector = selector(ctx, version)?;
    Ok(ProfileLayout::new(ctx.profile_dir(&selector)).mods_dir())
}

/// Resolve a file name to the jar on disk, whichever state it is in.
fn find_mod(dir: &Path, file_name: &str) -> Result<PathBuf> {
    let base = file_name.strip_suffix(DISABLED_SUFFIX).unwrap_or(file_name);
    [dir.join(base), dir.join(format!("{}{}", base, DISABLED_SUFFIX))]
        .into_iter()
        .find(|p| p.is_file())
        .with_context(|| format!("Mod {} not found in {}", file_name, dir.display()))
}

fn mods(ctx: &LauncherContext, command: ModsCommands) -> Result<()> {
    match command {
        ModsCommands::List { version } => {
            let mods = list_mods(&mods_dir(ctx, version)?)?;
            for m in &mods {
                println!(
                    "[{}] {:<40} {:<12} {:?}",
                    if m.enabled { "x" } else { " " },
                    m.metadata.name,
                    m.metadata.version,
                    m.metadata.loader
                );
            }
            let names: Vec<&str> = mods
                .iter()
                .filter(|m| m.enabled)
                .map(|m| m.metadata.file_name.as_str())
                .collect();
            for conflict in detect_mod_conflicts(&names) {
                println!("conflict: {}", conflict);
            }
        }
        ModsCommands::Enable { file_name, version } => {
            let dir = mods_dir(ctx, version)?;
            set_mod_enabled(&find_mod(&dir, &file_name)?, true)?;
        }
        ModsCommands::Disable { file_name, version } => {
            let dir = mods_dir(ctx, version)?;
            set_mod_enabled(&find_mod(&dir, &file_name)?, false)?;
        }
        ModsCommands::Delete { file_name, version } => {
            let dir = mods_dir(ctx, version)?;
            delete_mod(&find_mod(&dir, &file_name)?)?;
        }
    }
    Ok(())
}
