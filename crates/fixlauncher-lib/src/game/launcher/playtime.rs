/// Accumulated play time, persisted across launcher restarts
use crate::game::launcher::crash::CrashReport;
use crate::game::launcher::types::GameEvents;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Sessions at or above this length are assumed to be clock glitches.
pub const MAX_SESSION_SECS: i64 = 86_400;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaytimeData {
    #[serde(default)]
    pub total_seconds: u64,
    /// Unix time in milliseconds of the running session
    #[serde(default)]
    pub session_start: Option<i64>,
}

impl PlaytimeData {
    /// Close the open session (if any) at `now_ms`.
    fn settle(&mut self, now_ms: i64) {
        if let Some(start) = self.session_start.take() {
            let elapsed = (now_ms - start) / 1000;
            if elapsed > 0 && elapsed < MAX_SESSION_SECS {
                self.total_seconds += elapsed as u64;
            } else {
                log::debug!("[playtime] ignoring session of {}s", elapsed);
            }
        }
    }
}

pub struct PlaytimeTracker {
    path: PathBuf,
    guard: Mutex<()>,
}

impl PlaytimeTracker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable files count as zero.
    pub fn load(&self) -> PlaytimeData {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    fn save(&self, data: &PlaytimeData) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string(data)?)
            .with_context(|| format!("Failed to write {:?}", tmp))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {:?}", self.path))?;
        log::debug!("[playtime] saved {:?}", data);
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut PlaytimeData)) -> Result<PlaytimeData> {
        let _guard = self.guard.lock().map_err(|_| anyhow::anyhow!("playtime lock poisoned"))?;
        let mut data = self.load();
        f(&mut data);
        self.save(&data)?;
        Ok(data)
    }

    pub fn start_session_at(&self, now_ms: i64) -> Result<PlaytimeData> {
        self.update(|d| {
            d.settle(now_ms);
            d.session_start = Some(now_ms);
        })
    }

    pub fn end_session_at(&self, now_ms: i64) -> Result<PlaytimeData> {
        self.update(|d| d.settle(now_ms))
    }

    pub fn start_session(&self) -> Result<PlaytimeData> {
        self.start_session_at(chrono::Utc::now().timestamp_millis())
    }

    pub fn end_session(&self) -> Result<PlaytimeData> {
        self.end_session_at(chrono::Utc::now().timestamp_millis())
    }

    /// Settle a session left open by a launcher that did not see the game exit.
    pub fn settle_stale_session(&self) -> Result<PlaytimeData> {
        let data = self.load();
        if data.session_start.is_none() {
            return Ok(data);
        }
        log::info!("[playtime] closing session left open by a previous run");
        self.end_session()
    }
}

impl GameEvents for PlaytimeTracker {
    fn on_game_launched(&self, _pid: u32, _version: &str) {
        if let Err(e) = self.start_session() {
            log::warn!("[playtime] {:#}", e);
        }
    }

    fn on_game_closed(&self, _pid: u32, _crash: Option<&CrashReport>) {
        if let Err(e) = self.end_session() {
            log::warn!("[playtime] {:#}", e);
        }
    }
}
