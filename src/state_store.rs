// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! File-backed record of observed snapshots: accounts by handle, domains by
//! name, and everything else under the label the manifest gives it.
//!
//! The file may hold tracked credentials and app passwords, so it is written
//! owner-only.

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs as async_fs;

use crate::model::AccountState;
use crate::resources::{AppPasswordState, DomainState, RoutingRuleState, StandaloneMethod};

#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Unsupported state file version: {0}")]
    UnsupportedVersion(String),
}

const STATE_VERSION: &str = "1.0";

fn default_version() -> String {
    STATE_VERSION.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountState>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub domains: BTreeMap<String, DomainState>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub recovery_methods: BTreeMap<String, StandaloneMethod>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub routing_rules: BTreeMap<String, RoutingRuleState>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub app_passwords: BTreeMap<String, AppPasswordState>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            updated_at: Utc::now(),
            accounts: BTreeMap::new(),
            domains: BTreeMap::new(),
            recovery_methods: BTreeMap::new(),
            routing_rules: BTreeMap::new(),
            app_passwords: BTreeMap::new(),
        }
    }
}

impl StateFile {
    fn entries(&self) -> usize {
        self.accounts.len()
            + self.domains.len()
            + self.recovery_methods.len()
            + self.routing_rules.len()
            + self.app_passwords.len()
    }
}

/// A snapshot type with its own section of the state file.
pub trait Section: Sized {
    fn section(file: &mut StateFile) -> &mut BTreeMap<String, Self>;
}

impl Section for DomainState {
    fn section(file: &mut StateFile) -> &mut BTreeMap<String, Self> {
        &mut file.domains
    }
}

impl Section for StandaloneMethod {
    fn section(file: &mut StateFile) -> &mut BTreeMap<String, Self> {
        &mut file.recovery_methods
    }
}

impl Section for RoutingRuleState {
    fn section(file: &mut StateFile) -> &mut BTreeMap<String, Self> {
        &mut file.routing_rules
    }
}

impl Section for AppPasswordState {
    fn section(file: &mut StateFile) -> &mut BTreeMap<String, Self> {
        &mut file.app_passwords
    }
}

pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates an empty state file if none exists yet.
    pub async fn initialize(&self) -> Result<(), StateStoreError> {
        if !self.path.exists() {
            info!("Creating new state file at: {:?}", self.path);
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                async_fs::create_dir_all(parent).await?;
            }
            self.save(&mut StateFile::default()).await?;
        }
        Ok(())
    }

    /// A missing file reads as empty.
    pub async fn load(&self) -> Result<StateFile, StateStoreError> {
        if !self.path.exists() {
            return Ok(StateFile::default());
        }
        debug!("Loading state from: {:?}", self.path);
        let contents = async_fs::read_to_string(&self.path).await?;
        let state: StateFile = serde_json::from_str(&contents)?;
        if state.version != STATE_VERSION {
            return Err(StateStoreError::UnsupportedVersion(state.version));
        }
        debug!("Loaded {} snapshot(s)", state.entries());
        Ok(state)
    }

    async fn save(&self, state: &mut StateFile) -> Result<(), StateStoreError> {
        state.updated_at = Utc::now();
        let json = serde_json::to_string_pretty(state)?;

        let temp_path = self.path.with_extension("tmp");
        async_fs::write(&temp_path, json.as_bytes()).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut permissions = async_fs::metadata(&temp_path).await?.permissions();
            permissions.set_mode(0o600);
            async_fs::set_permissions(&temp_path, permissions).await?;
        }

        async_fs::rename(&temp_path, &self.path).await?;
        debug!("Saved {} snapshot(s) to {:?}", state.entries(), self.path);
        Ok(())
    }

    pub async fn get(&self, handle: &str) -> Result<Option<AccountState>, StateStoreError> {
        Ok(self.load().await?.accounts.remove(handle))
    }

    pub async fn list(&self) -> Result<Vec<AccountState>, StateStoreError> {
        Ok(self.load().await?.accounts.into_values().collect())
    }

    /// Stores `snapshot`, dropping the entry under `previous_handle` when the
    /// account was renamed.
    pub async fn put(&self, previous_handle: Option<&str>, snapshot: AccountState) -> Result<(), StateStoreError> {
        let mut state = self.load().await?;
        if let Some(previous) = previous_handle.filter(|p| *p != snapshot.handle) {
            state.accounts.remove(previous);
        }
        state.accounts.insert(snapshot.handle.clone(), snapshot);
        self.save(&mut state).await
    }

    /// Returns false when nothing was stored under `handle`.
    pub async fn remove(&self, handle: &str) -> Result<bool, StateStoreError> {
        let mut state = self.load().await?;
        let removed = state.accounts.remove(handle).is_some();
        if removed {
            self.save(&mut state).await?;
        }
        Ok(removed)
    }

    pub async fn entry<S: Section>(&self, key: &str) -> Result<Option<S>, StateStoreError> {
        let mut state = self.load().await?;
        Ok(S::section(&mut state).remove(key))
    }

    pub async fn put_entry<S: Section>(&self, key: &str, snapshot: S) -> Result<(), StateStoreError> {
        let mut state = self.load().await?;
        S::section(&mut state).insert(key.to_string(), snapshot);
        self.save(&mut state).await
    }

    /// Returns false when nothing was stored under `key`.
    pub async fn remove_entry<S: Section>(&self, key: &str) -> Result<bool, StateStoreError> {
        let mut state = self.load().await?;
        let removed = S::section(&mut state).remove(key).is_some();
        if removed {
            self.save(&mut state).await?;
        }
        Ok(removed)
    }
}
