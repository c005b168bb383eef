use crate::error::InstallError;
use crate::game::installer::types::{InstallSpec, ProgressReporter};
use crate::game::metadata::InstallPlan;
use futures::future::BoxFuture;
use std::sync::Arc;

/// One install path (vanilla, Fabric). Dispatch happens on the
/// resolved [`InstallPlan`].
pub trait VersionInstaller: Send + Sync {
    fn install<'a>(
        &'a self,
        spec: &'a InstallSpec,
        plan: &'a InstallPlan,
        reporter: Arc<dyn ProgressReporter>,
    ) -> BoxFuture<'a, Result<(), InstallError>>;
}
