pub mod config;
pub mod core;
pub mod lock;
pub mod modloaders;
pub mod types;
pub mod vanilla;


use crate::error::InstallError;
use crate::game::installer::core::modpack_installer::{repair_modpack_locked, ModpackSource};
use crate::game::installer::core::traits::VersionInstaller;
use crate::game::installer::lock::InstallLock;
use crate::game::installer::modloaders::fabric::FabricInstaller;
use crate::game::installer::vanilla::VanillaInstaller;
use crate::game::metadata::InstallPlan;
use anyhow::Context;
use std::sync::Arc;
use types::{InstallSpec, ProgressReporter};

fn get_installer(plan: &InstallPlan) -> Box<dyn VersionInstaller> {
    if plan.is_modded {
        Box::new(FabricInstaller)
    } else {
        Box::new(VanillaInstaller)
    }
}

/// Main entry point for game installation.
///
/// Idempotent: an installed version only gets the light check of its
/// libraries, asset objects and natives. When `modpack` is given the build's
/// files are verified and repaired afterwards under the same profile lock.
pub async fn ensure_version_installed(
    spec: &InstallSpec,
    plan: &InstallPlan,
    modpack: Option<&ModpackSource>,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<(), InstallError> {
    log::info!(
        "[installer] ensuring {} (mc {}, modded={}) in {:?}",
        plan.version_id,
        plan.mc_version,
        plan.is_modded,
        spec.layout.root()
    );

    let _lock = InstallLock::acquire(spec.layout.root())?;

    let result = async {
        for dir in [
            spec.layout.versions_dir(),
            spec.layout.libraries_dir(),
            spec.layout.assets_dir(),
        ] {
            std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;
        }
        if plan.is_modded {
            let mods = spec.layout.mods_dir();
            std::fs::create_dir_all(&mods).with_context(|| format!("Failed to create {:?}", mods))?;
        }

        get_installer(plan).install(spec, plan, reporter.clone()).await?;

        if let Some(source) = modpack {
            repair_modpack_locked(spec, source, reporter.clone()).await?;
        }
        Ok::<(), InstallError>(())
    }
    .await;

    match &result {
        Ok(()) => {
            reporter.done(true, Some("Установка завершена"));
            log::info!("[installer] {} ready", plan.version_id);
        }
        Err(e) => {
            reporter.done(false, Some(&e.to_string()));
            log::error!("[installer] {} failed: {}", plan.version_id, e);
        }
    }
    result
}
