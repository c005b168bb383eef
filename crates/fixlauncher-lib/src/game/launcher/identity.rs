//! Offline player identity and the profile files the game reads at startup.

use anyhow::{Context, Result};
use chrono::{Duration, Local, Months};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::{Builder, Uuid};

/// Offline-mode UUID for `player_name`: MD5 of `"OfflinePlayer:<name>"`
/// with the version 3 and RFC 4122 variant bits set.
pub fn offline_uuid(player_name: &str) -> Uuid {
    let digest: [u8; 16] = Md5::digest(format!("OfflinePlayer:{}", player_name).as_bytes()).into();
    Builder::from_md5_bytes(digest).into_uuid()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserCacheEntry {
    pub name: String,
    pub uuid: String,
    pub expires_on: String,
}

fn expiry_stamp() -> String {
    let now = Local::now();
    let expires = now
        .checked_add_months(Months::new(1))
        .unwrap_or_else(|| now + Duration::days(30));
    expires.format("%Y-%m-%d %H:%M:%S %z").to_string()
}

/// Put `player_name`/`uuid` into `usercache.json`, replacing any previous
/// entry for that name and keeping the others.
pub fn update_usercache(path: &Path, player_name: &str, uuid: &Uuid) -> Result<()> {
    let mut entries: Vec<UserCacheEntry> = match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("[identity] usercache.json unreadable, recreating: {}", e);
            Vec::new()
        }),
        Err(_) => Vec::new(),
    };

    entries.retain(|e| !e.name.eq_ignore_ascii_case(player_name));
    entries.push(UserCacheEntry {
        name: player_name.to_string(),
        uuid: uuid.hyphenated().to_string(),
        expires_on: expiry_stamp(),
    });

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(&entries)?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))
}

/// Write the minimal `launcher_profiles.json` some loaders insist on.
pub fn ensure_launcher_profiles(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let stub = serde_json::json!({
        "profiles": {},
        "selectedProfile": null,
        "authenticationDatabase": {}
    });
    std::fs::write(path, serde_json::to_string_pretty(&stub)?)
        .with_context(|| format!("Failed to write {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_is_stable_and_v3() {
        let a = offline_uuid("Steve");
        assert_eq!(a, offline_uuid("Steve"));
        assert_ne!(a, offline_uuid("Alex"));

        let s = a.hyphenated().to_string();
        assert_eq!(s.len(), 36);
        for i in [8, 13, 18, 23] {
            assert_eq!(s.as_bytes()[i], b'-');
        }
        assert_eq!(s.as_bytes()[14], b'3');
        assert!(matches!(s.as_bytes()[19], b'8' | b'9' | b'a' | b'b'));
    }

    #[test]
    fn uuid_matches_known_offline_value() {
        // Same value vanilla servers assign to "Notch" in offline mode
        assert_eq!(
            offline_uuid("Notch").to_string(),
            "b50ad385-829d-3141-a216-7e7d7539ba7f"
        );
    }

    #[test]
    fn usercache_replaces_only_the_player() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("usercache.json");
        std::fs::write(
            &path,
            r#"[{"name":"Other","uuid":"x","expiresOn":"2020-01-01 00:00:00 +0000"},
                {"name":"Steve","uuid":"old","expiresOn":"2020-01-01 00:00:00 +0000"}]"#,
        )
        .unwrap();

        let uuid = offline_uuid("Steve");
        update_usercache(&path, "Steve", &uuid).unwrap();

        let entries: Vec<UserCacheEntry> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "Other");
        assert_eq!(entries[1].uuid, uuid.to_string());
        assert!(chrono::DateTime::parse_from_str(&entries[1].expires_on, "%Y-%m-%d %H:%M:%S %z").is_ok());
    }

    #[test]
    fn launcher_profiles_stub_is_not_overwritten() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("launcher_profiles.json");
        ensure_launcher_profiles(&path).unwrap();
        let stub: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(stub["selectedProfile"].is_null());

        std::fs::write(&path, "{\"profiles\":{\"x\":{}}}").unwrap();
        ensure_launcher_profiles(&path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("\"x\""));
    }
}
