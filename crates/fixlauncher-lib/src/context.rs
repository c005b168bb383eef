//! Application context: the HTTP client, settings and collaborators that
//! every pipeline stage receives explicitly.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{InstallError, LaunchError, ResolveError};
use crate::game::installer::config::Endpoints;
use crate::game::installer::core::downloader::build_client;
use crate::game::installer::core::modpack_installer::{
    repair_modpack, InstallIntegrityReport, ModpackSource,
};
use crate::game::installer::ensure_version_installed;
use crate::game::installer::types::{
    InstallSpec, LogProgressReporter, OsType, ProfileLayout, ProgressReporter,
};
use crate::game::launcher::launch;
use crate::game::launcher::types::{
    GameEvents, LaunchEnv, LaunchHandle, LaunchPlan, NoopGameEvents, GRACE_WINDOW,
};
use crate::game::metadata::{
    fetch_version_list, resolve_install_plan, InstallPlan, VersionSelector, SURVIVAL_BUILD_ID,
};
use crate::paths;
use crate::settings::LauncherSettings;

pub struct LauncherContext {
    pub client: reqwest::Client,
    pub settings: LauncherSettings,
    pub base_path: PathBuf,
    pub endpoints: Endpoints,
    pub os: OsType,
    reporter: Arc<dyn ProgressReporter>,
    events: Arc<dyn GameEvents>,
}

impl LauncherContext {
    pub fn new(base_path: impl Into<PathBuf>, settings: LauncherSettings) -> Result<Self> {
        Ok(Self::with_client(build_client()?, base_path, settings))
    }

    pub fn with_client(
        client: reqwest::Client,
        base_path: impl Into<PathBuf>,
        settings: LauncherSettings,
    ) -> Self {
        Self {
            client,
            settings,
            base_path: base_path.into(),
            endpoints: Endpoints::default(),
            os: OsType::current(),
            reporter: Arc::new(LogProgressReporter),
            events: Arc::new(NoopGameEvents),
        }
    }

    /// Load settings from `<base>/launcher-settings.json`.
    pub fn load(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        let settings = LauncherSettings::load(&paths::settings_path(&base_path));
        Self::new(base_path, settings)
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_os(mut self, os: OsType) -> Self {
        self.os = os;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn GameEvents>) -> Self {
        self.events = events;
        self
    }

    pub fn save_settings(&self) -> Result<()> {
        self.settings.save(&paths::settings_path(&self.base_path))
    }

    pub fn selected_version(&self) -> Result<VersionSelector, ResolveError> {
        VersionSelector::parse(&self.settings.selected_version)
    }

    /// Game directory of the selector's profile.
    pub fn profile_dir(&self, selector: &VersionSelector) -> PathBuf {
        paths::profile_path(&self.settings.minecraft_root(&self.base_path), &selector.id)
    }

    pub fn java_path(&self) -> PathBuf {
        self.settings.java_executable(&self.base_path, self.os)
    }

    pub fn install_spec(&self, profile: &Path) -> InstallSpec {
        InstallSpec {
            client: self.client.clone(),
            endpoints: self.endpoints.clone(),
            layout: ProfileLayout::new(profile),
            os: self.os,
            concurrency: self.settings.concurrency(),
            java: self.java_path(),
        }
    }

    pub fn launch_env(&self) -> LaunchEnv {
        LaunchEnv {
            client: self.client.clone(),
            endpoints: self.endpoints.clone(),
            base_path: self.base_path.clone(),
            os: self.os,
            grace_window: GRACE_WINDOW,
        }
    }

    pub fn launch_plan(&self, selector: &VersionSelector, plan: &InstallPlan) -> LaunchPlan {
        LaunchPlan {
            minecraft_path: self.profile_dir(selector),
            java_path: self.java_path(),
            ram: self.settings.ram,
            player_name: self.settings.player().to_string(),
            version: plan.version_id.clone(),
            with_mods: plan.is_modded,
            version_type: selector.version_type.as_str().to_string(),
            jvm_flags: self.settings.jvm_flags.clone(),
            custom_jvm_args: self.settings.custom_jvm_args.clone(),
        }
    }

    /// The configured modpack belongs to the survival build only.
    fn modpack_for(&self, selector: &VersionSelector) -> Option<&ModpackSource> {
        if selector.id == SURVIVAL_BUILD_ID {
            self.settings.modpack.as_ref()
        } else {
            None
        }
    }

    pub async fn versions(&self) -> Vec<VersionSelector> {
        fetch_version_list(&self.client, &self.endpoints).await
    }

    pub async fn install(&self, selector: &VersionSelector) -> Result<InstallPlan, LaunchError> {
        let plan = resolve_install_plan(selector)?;
        let spec = self.install_spec(&self.profile_dir(selector));
        ensure_version_installed(&spec, &plan, self.modpack_for(selector), self.reporter.clone())
            .await?;
        Ok(plan)
    }

    /// Install (or verify) the selected version and start the game.
    pub async fn play(&self, selector: &VersionSelector) -> Result<LaunchHandle, LaunchError> {
        let plan = self.install(selector).await?;
        let launch_plan = self.launch_plan(selector, &plan);
        launch(&self.launch_env(), &launch_plan, self.reporter.clone(), self.events.clone()).await
    }

    pub async fn repair(&self) -> Result<InstallIntegrityReport, InstallError> {
        let source = self
            .settings
            .modpack
            .as_ref()
            .ok_or_else(|| InstallError::Other(anyhow::anyhow!("No modpack repository configured")))?;
        let selector = VersionSelector::parse(SURVIVAL_BUILD_ID)
            .map_err(|e| InstallError::Other(anyhow::Error::new(e)))?;
        let spec = self.install_spec(&self.profile_dir(&selector));
        repair_modpack(&spec, source, self.reporter.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(base: &Path) -> LauncherContext {
        let settings = LauncherSettings {
            ram: 6,
            player_name: "Steve".into(),
            java_path: "/opt/jdk/bin/java".into(),
            jvm_flags: vec!["g1gc".into()],
            ..Default::default()
        };
        LauncherContext::with_client(reqwest::Client::new(), base, settings).with_os(OsType::Linux)
    }

    #[test]
    fn survival_build_plan() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(tmp.path());
        let selector = ctx.selected_version().unwrap();
        let plan = resolve_install_plan(&selector).unwrap();
        let launch_plan = ctx.launch_plan(&selector, &plan);

        assert_eq!(launch_plan.minecraft_path, tmp.path().join("minecraft-survival"));
        assert_eq!(launch_plan.version, "1.21.4-fabric");
        assert!(launch_plan.with_mods);
        assert_eq!(launch_plan.version_type, "custom");
        assert_eq!(launch_plan.ram, 6);
        assert_eq!(launch_plan.player_name, "Steve");
        assert_eq!(launch_plan.java_path, Path::new("/opt/jdk/bin/java"));
        assert_eq!(launch_plan.jvm_flags, vec!["g1gc"]);
    }

    #[test]
    fn vanilla_profile_and_install_spec() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = context(tmp.path());
        ctx.settings.download_concurrency = 0;
        let selector = VersionSelector::parse("release:1.20.1").unwrap();

        let dir = ctx.profile_dir(&selector);
        assert_eq!(dir, tmp.path().join("minecraft-release-1.20.1"));
        let spec = ctx.install_spec(&dir);
        assert_eq!(spec.layout.root(), dir.as_path());
        assert_eq!(spec.concurrency, 1);
        assert!(ctx.modpack_for(&selector).is_none());
    }

    #[test]
    fn modpack_only_for_survival_build() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = context(tmp.path());
        ctx.settings.modpack = Some(ModpackSource {
            owner: "fixsirt".into(),
            repo: "build".into(),
            branch: None,
        });
        let survival = VersionSelector::parse("evacuation").unwrap();
        let fabric = VersionSelector::parse("fabric:1.21.4").unwrap();
        assert!(ctx.modpack_for(&survival).is_some());
        assert!(ctx.modpack_for(&fabric).is_none());
    }

    #[tokio::test]
    async fn unsupported_loader_fails_before_any_io() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(tmp.path());
        let selector = VersionSelector::parse("forge:1.20.1").unwrap();
        let err = ctx.install(&selector).await.unwrap_err();
        assert!(matches!(err, LaunchError::Resolve(ResolveError::UnsupportedLoader(_))));
        assert!(!ctx.profile_dir(&selector).exists());
    }

    #[tokio::test]
    async fn repair_without_modpack_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(tmp.path());
        assert!(matches!(ctx.repair().await, Err(InstallError::Other(_))));
    }
}
