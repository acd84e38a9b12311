//! Filesystem-backed cluster directory
//!
//! Bags are JSON files below a directory shared by all units on a host (or
//! a shared mount): `application.json` and `units/<unit>.json`. Every bag
//! has a single writer, so read-modify-write through an atomic rename is
//! safe without locking.
//!
//! This handler does not deliver notifications. Whatever drives the hooks
//! (the orchestrator, or an operator calling `sshproxy hook`) is
//! responsible for fanning out relation-changed after a write.

use super::{check_write_scope, merge_bag};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sshproxy_core::effects::DirectoryEffects;
use sshproxy_core::{DataBag, ProxyError, ProxyResult, Scope, UnitId};
use std::path::{Path, PathBuf};
use tokio::fs;

const APPLICATION_FILE: &str = "application.json";
const UNITS_DIR: &str = "units";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredBag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner: Option<UnitId>,
    #[serde(default)]
    data: DataBag,
}

/// Directory handler storing bags as JSON files
#[derive(Debug, Clone)]
pub struct FilesystemDirectoryHandler {
    root: PathBuf,
    unit: UnitId,
}

impl FilesystemDirectoryHandler {
    /// View of the directory under `root` for `unit`
    pub fn new(root: impl Into<PathBuf>, unit: UnitId) -> Self {
        Self {
            root: root.into(),
            unit,
        }
    }

    /// Register the local unit as a relation member
    pub async fn join(&self) -> ProxyResult<()> {
        let path = self.bag_path(&Scope::Unit(self.unit.clone()));
        if fs::try_exists(&path).await? {
            return Ok(());
        }
        let stored = StoredBag {
            owner: Some(self.unit.clone()),
            data: DataBag::new(),
        };
        write_bag_file(&path, &stored).await
    }

    /// Directory the bags live under
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bag_path(&self, scope: &Scope) -> PathBuf {
        match scope {
            Scope::Application => self.root.join(APPLICATION_FILE),
            Scope::Unit(unit) => self
                .root
                .join(UNITS_DIR)
                .join(format!("{}.json", unit.file_stem())),
        }
    }
}

async fn read_bag_file(path: &Path) -> ProxyResult<StoredBag> {
    match fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
            ProxyError::directory(format!("Corrupt bag {}: {e}", path.display()))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoredBag::default()),
        Err(e) => Err(ProxyError::directory(format!(
            "Failed to read {}: {e}",
            path.display()
        ))),
    }
}

async fn write_bag_file(path: &Path, bag: &StoredBag) -> ProxyResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| ProxyError::directory(format!("Failed to create directory: {e}")))?;
    }
    let contents = serde_json::to_vec_pretty(bag)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents)
        .await
        .map_err(|e| ProxyError::directory(format!("Failed to write {}: {e}", tmp.display())))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| ProxyError::directory(format!("Failed to replace {}: {e}", path.display())))
}

#[async_trait]
impl DirectoryEffects for FilesystemDirectoryHandler {
    fn local_unit(&self) -> &UnitId {
        &self.unit
    }

    async fn read_bag(&self, scope: &Scope) -> ProxyResult<DataBag> {
        Ok(read_bag_file(&self.bag_path(scope)).await?.data)
    }

    async fn update_bag(&self, scope: &Scope, updates: DataBag) -> ProxyResult<()> {
        check_write_scope(&self.unit, scope)?;

        let path = self.bag_path(scope);
        let mut stored = read_bag_file(&path).await?;
        if !merge_bag(&mut stored.data, updates) {
            return Ok(());
        }
        if let Scope::Unit(owner) = scope {
            stored.owner = Some(owner.clone());
        }
        write_bag_file(&path, &stored).await?;
        tracing::debug!(unit = %self.unit, scope = %scope, "Directory bag updated");
        Ok(())
    }

    async fn members(&self) -> ProxyResult<Vec<UnitId>> {
        let dir = self.root.join(UNITS_DIR);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ProxyError::directory(format!(
                    "Failed to list {}: {e}",
                    dir.display()
                )))
            }
        };

        let mut members = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ProxyError::directory(format!("Failed to read entry: {e}")))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(owner) = read_bag_file(&path).await?.owner {
                members.push(owner);
            }
        }
        members.sort();
        Ok(members)
    }
}
