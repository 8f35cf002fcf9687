// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command handlers behind the `mailforge` binary: read a manifest of desired
//! accounts, domains, routing rules, app passwords and recovery methods,
//! converge each one, and keep the state file in step.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::api::{AccountApi, DirectoryApi};
use crate::model::{AccountConfig, AccountState};
use crate::reconcile::{
    AccountFailure, AccountReconciler, ConvergeContext, ConvergeFailure, ConvergeResult, ReadOutcome, ReconcileError,
    Step,
};
use crate::resources::{
    ownership_code, AppPasswordConfig, AppPasswordResource, AppPasswordState, DomainConfig, DomainResource,
    DomainState, RecoveryMethodResource, RoutingRuleConfig, RoutingRuleResource, RoutingRuleState, StandaloneMethod,
};
use crate::state_store::{Section, StateStore, StateStoreError};

/// The kinds of thing a manifest can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Kind {
    Account,
    Domain,
    RecoveryMethod,
    RoutingRule,
    AppPassword,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::Account => "account",
            Kind::Domain => "domain",
            Kind::RecoveryMethod => "recovery method",
            Kind::RoutingRule => "routing rule",
            Kind::AppPassword => "app password",
        })
    }
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read manifest: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid TOML manifest: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid JSON manifest: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Account '{0}' appears more than once in the manifest")]
    DuplicateHandle(String),
    #[error("The {kind} '{key}' appears more than once in the manifest")]
    DuplicateKey { kind: Kind, key: String },
    #[error("State file error: {0}")]
    State(#[from] StateStoreError),
    #[error("Account {handle}: {source}")]
    Account { handle: String, source: AccountFailure },
    #[error("The {kind} '{key}': {step} failed: {error}")]
    Resource { kind: Kind, key: String, step: Step, error: ReconcileError },
    #[error("The {kind} '{key}' does not exist remotely")]
    NotFound { kind: Kind, key: String },
    #[error("No {kind} is tracked under '{key}'")]
    NotTracked { kind: Kind, key: String },
    #[error("An {0} cannot be imported: the server only reveals it when it is created")]
    NotImportable(Kind),
    #[error(transparent)]
    Ownership(#[from] ConvergeFailure<()>),
}

impl CliError {
    /// The snapshot left behind by a failed account operation, if any.
    pub fn partial(&self) -> Option<&AccountState> {
        match self {
            CliError::Account { source, .. } => source.partial.as_ref(),
            _ => None,
        }
    }
}

fn failed<S>(kind: Kind, key: &str, failure: ConvergeFailure<S>) -> CliError {
    CliError::Resource { kind, key: key.to_string(), step: failure.step, error: failure.error }
}

/// A manifest entry tracked under a name of the operator's choosing, for
/// things the server identifies by an id it picks itself or not at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labeled<T> {
    pub label: String,
    #[serde(flatten)]
    pub config: T,
}

/// Desired state, read from TOML or JSON. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    #[serde(default)]
    pub domains: Vec<DomainConfig>,
    #[serde(default)]
    pub recovery_methods: Vec<Labeled<StandaloneMethod>>,
    #[serde(default)]
    pub routing_rules: Vec<Labeled<RoutingRuleConfig>>,
    #[serde(default)]
    pub app_passwords: Vec<Labeled<AppPasswordConfig>>,
}

impl Manifest {
    pub fn from_path(path: &Path) -> Result<Self, CliError> {
        let contents = std::fs::read_to_string(path)?;
        let manifest: Manifest = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            _ => toml::from_str(&contents)?,
        };
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), CliError> {
        let mut seen = HashSet::new();
        for account in &self.accounts {
            if !seen.insert(account.target_handle()) {
                return Err(CliError::DuplicateHandle(account.target_handle().to_string()));
            }
        }
        unique(Kind::Domain, self.domains.iter().map(|d| d.name.as_str()))?;
        unique(Kind::RecoveryMethod, self.recovery_methods.iter().map(|m| m.label.as_str()))?;
        unique(Kind::RoutingRule, self.routing_rules.iter().map(|r| r.label.as_str()))?;
        unique(Kind::AppPassword, self.app_passwords.iter().map(|p| p.label.as_str()))
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
            + self.domains.len()
            + self.recovery_methods.len()
            + self.routing_rules.len()
            + self.app_passwords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn unique<'a>(kind: Kind, keys: impl Iterator<Item = &'a str>) -> Result<(), CliError> {
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key) {
            return Err(CliError::DuplicateKey { kind, key: key.to_string() });
        }
    }
    Ok(())
}

/// Entries read `"<kind> <key>"`, e.g. `"account alice"`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub warnings: Vec<String>,
}

impl ApplySummary {
    fn record(&mut self, kind: Kind, key: &str, existed: bool) {
        let entry = format!("{} {}", kind, key);
        if existed {
            self.updated.push(entry);
        } else {
            self.created.push(entry);
        }
    }

    fn warn(&mut self, kind: Kind, key: &str, warning: impl fmt::Display) {
        let line = format!("{} {}: {}", kind, key, warning);
        warn!("{}", line);
        self.warnings.push(line);
    }
}

pub struct App {
    reconciler: AccountReconciler,
    domains: DomainResource,
    methods: RecoveryMethodResource,
    rules: RoutingRuleResource,
    app_passwords: AppPasswordResource,
    directory: Arc<dyn DirectoryApi>,
    store: StateStore,
}

impl App {
    pub fn new(accounts: Arc<dyn AccountApi>, directory: Arc<dyn DirectoryApi>, store: StateStore) -> Self {
        Self {
            reconciler: AccountReconciler::new(accounts.clone()),
            methods: RecoveryMethodResource::new(accounts),
            domains: DomainResource::new(directory.clone()),
            rules: RoutingRuleResource::new(directory.clone()),
            app_passwords: AppPasswordResource::new(directory.clone()),
            directory,
            store,
        }
    }

    /// Creates whatever the state file does not know and updates the rest.
    /// Domains go first and app passwords last, so each entry can lean on
    /// the ones before it. Stops at the first entry that fails, after
    /// recording its partial snapshot.
    pub async fn apply(&self, manifest: &Manifest, ctx: &ConvergeContext) -> Result<ApplySummary, CliError> {
        let mut summary = ApplySummary::default();

        for desired in &manifest.domains {
            let observed: Option<DomainState> = self.store.entry(&desired.name).await?;
            let result = match &observed {
                Some(observed) => self.domains.update(desired, observed, ctx).await,
                None => self.domains.create(desired, ctx).await,
            };
            self.settle(Kind::Domain, &desired.name, observed.is_some(), result, &mut summary).await?;
        }

        for desired in &manifest.accounts {
            self.apply_account(desired, ctx, &mut summary).await?;
        }

        for desired in &manifest.recovery_methods {
            let observed: Option<StandaloneMethod> = self.store.entry(&desired.label).await?;
            let result = match &observed {
                Some(observed) => self.methods.update(&desired.config, observed, ctx).await,
                None => self.methods.create(&desired.config, ctx).await,
            };
            self.settle(Kind::RecoveryMethod, &desired.label, observed.is_some(), result, &mut summary).await?;
        }

        for desired in &manifest.routing_rules {
            let observed: Option<RoutingRuleState> = self.store.entry(&desired.label).await?;
            let result = match &observed {
                Some(observed) => self.rules.update(&desired.config, observed, ctx).await,
                None => self.rules.create(&desired.config, ctx).await,
            };
            self.settle(Kind::RoutingRule, &desired.label, observed.is_some(), result, &mut summary).await?;
        }

        for desired in &manifest.app_passwords {
            let observed: Option<AppPasswordState> = self.store.entry(&desired.label).await?;
            let result = match &observed {
                Some(observed) => self.app_passwords.update(&desired.config, observed, ctx).await,
                None => self.app_passwords.create(&desired.config, ctx).await,
            };
            self.settle(Kind::AppPassword, &desired.label, observed.is_some(), result, &mut summary).await?;
        }

        info!("Applied {} manifest entr(ies)", manifest.len());
        Ok(summary)
    }

    async fn apply_account(
        &self,
        desired: &AccountConfig,
        ctx: &ConvergeContext,
        summary: &mut ApplySummary,
    ) -> Result<(), CliError> {
        let observed = match self.store.get(&desired.handle).await? {
            Some(observed) => Some(observed),
            None => self.store.get(desired.target_handle()).await?,
        };

        let result = match &observed {
            Some(observed) => self.reconciler.update(desired, observed, ctx).await,
            None => self.reconciler.create(desired, ctx).await,
        };
        let previous = observed.as_ref().map(|o| o.handle.as_str());

        match result {
            Ok(converged) => {
                for warning in &converged.warnings {
                    summary.warn(Kind::Account, &converged.state.handle, warning);
                }
                summary.record(Kind::Account, &converged.state.handle, observed.is_some());
                self.store.put(previous, converged.state).await?;
                Ok(())
            }
            Err(failure) => {
                if let Some(partial) = &failure.partial {
                    self.store.put(previous, partial.clone()).await?;
                }
                Err(CliError::Account { handle: desired.handle.clone(), source: failure })
            }
        }
    }

    /// Records the outcome of one create or update. A failure with nothing
    /// known afterwards means the tracked entity is gone (replacements delete
    /// before they create), so its entry is dropped.
    async fn settle<S: Section>(
        &self,
        kind: Kind,
        key: &str,
        existed: bool,
        result: ConvergeResult<S>,
        summary: &mut ApplySummary,
    ) -> Result<(), CliError> {
        match result {
            Ok(converged) => {
                for warning in &converged.warnings {
                    summary.warn(kind, key, warning);
                }
                summary.record(kind, key, existed);
                self.store.put_entry(key, converged.state).await?;
                Ok(())
            }
            Err(failure) => {
                match failure.partial {
                    Some(partial) => self.store.put_entry(key, partial).await?,
                    None => {
                        self.store.remove_entry::<S>(key).await?;
                    }
                }
                Err(CliError::Resource { kind, key: key.to_string(), step: failure.step, error: failure.error })
            }
        }
    }

    /// Re-reads one account. Returns `None` (and forgets it) when it is gone.
    pub async fn refresh(&self, handle: &str, ctx: &ConvergeContext) -> Result<Option<AccountState>, CliError> {
        let prior = self.store.get(handle).await?.unwrap_or_else(|| AccountState::seed(handle));
        match self.reconciler.read(&prior, ctx).await {
            Ok(ReadOutcome::Found(state)) => {
                self.store.put(None, state.clone()).await?;
                Ok(Some(state))
            }
            Ok(ReadOutcome::NotFound) => {
                self.store.remove(handle).await?;
                Ok(None)
            }
            Err(failure) => Err(CliError::Account { handle: handle.to_string(), source: failure }),
        }
    }

    /// Re-reads one tracked entry of any kind and returns its description,
    /// or `None` (after forgetting it) when the server no longer has it.
    pub async fn refresh_entry(
        &self,
        kind: Kind,
        key: &str,
        ctx: &ConvergeContext,
    ) -> Result<Option<String>, CliError> {
        match kind {
            Kind::Account => Ok(self.refresh(key, ctx).await?.map(|state| describe(&state))),
            Kind::Domain => {
                let outcome = self.domains.read(key, ctx).await.map_err(|f| failed(kind, key, f))?;
                self.keep(key, outcome.found(), describe_domain).await
            }
            Kind::RecoveryMethod => {
                let tracked: StandaloneMethod = self.tracked(kind, key).await?;
                let outcome = self.methods.read(&tracked.key(), ctx).await.map_err(|f| failed(kind, key, f))?;
                self.keep(key, outcome.found(), describe_method).await
            }
            Kind::RoutingRule => {
                let tracked: RoutingRuleState = self.tracked(kind, key).await?;
                let outcome = self.rules.read(tracked.id, ctx).await.map_err(|f| failed(kind, key, f))?;
                self.keep(key, outcome.found(), describe_rule).await
            }
            Kind::AppPassword => {
                let tracked: AppPasswordState = self.tracked(kind, key).await?;
                self.keep(key, self.app_passwords.read(&tracked).found(), describe_app_password).await
            }
        }
    }

    pub async fn destroy(&self, handle: &str, ctx: &ConvergeContext) -> Result<(), CliError> {
        let observed = self.store.get(handle).await?.unwrap_or_else(|| AccountState::seed(handle));
        self.reconciler
            .delete(&observed, ctx)
            .await
            .map_err(|failure| CliError::Account { handle: handle.to_string(), source: failure })?;
        self.store.remove(handle).await?;
        Ok(())
    }

    /// Deletes one entry. Domains and accounts can be deleted by name without
    /// being tracked; the rest need the snapshot in the state file.
    pub async fn destroy_entry(&self, kind: Kind, key: &str, ctx: &ConvergeContext) -> Result<(), CliError> {
        match kind {
            Kind::Account => return self.destroy(key, ctx).await,
            Kind::Domain => {
                let observed = self
                    .store
                    .entry::<DomainState>(key)
                    .await?
                    .unwrap_or_else(|| DomainState { name: key.to_string(), ..Default::default() });
                self.domains.delete(&observed, ctx).await.map_err(|f| failed(kind, key, f))?;
                self.store.remove_entry::<DomainState>(key).await?;
            }
            Kind::RecoveryMethod => {
                let observed: StandaloneMethod = self.tracked(kind, key).await?;
                self.methods.delete(&observed, ctx).await.map_err(|f| failed(kind, key, f))?;
                self.store.remove_entry::<StandaloneMethod>(key).await?;
            }
            Kind::RoutingRule => {
                let observed: RoutingRuleState = self.tracked(kind, key).await?;
                self.rules.delete(&observed, ctx).await.map_err(|f| failed(kind, key, f))?;
                self.store.remove_entry::<RoutingRuleState>(key).await?;
            }
            Kind::AppPassword => {
                let observed: AppPasswordState = self.tracked(kind, key).await?;
                self.app_passwords.delete(&observed, ctx).await.map_err(|f| failed(kind, key, f))?;
                self.store.remove_entry::<AppPasswordState>(key).await?;
            }
        }
        Ok(())
    }

    pub async fn import(&self, handle: &str, ctx: &ConvergeContext) -> Result<AccountState, CliError> {
        let seed = self
            .reconciler
            .import(handle)
            .map_err(|failure| CliError::Account { handle: handle.to_string(), source: failure })?;
        match self.reconciler.read(&seed, ctx).await {
            Ok(ReadOutcome::Found(state)) => {
                self.store.put(None, state.clone()).await?;
                Ok(state)
            }
            Ok(ReadOutcome::NotFound) => Err(CliError::NotFound { kind: Kind::Account, key: seed.handle }),
            Err(failure) => Err(CliError::Account { handle: seed.handle, source: failure }),
        }
    }

    /// Starts tracking an existing entry. `id` is what the server knows it
    /// by; `label` is the state file key for labeled kinds and defaults to
    /// `id`. Accounts and domains are always keyed by their name.
    pub async fn import_entry(
        &self,
        kind: Kind,
        id: &str,
        label: Option<&str>,
        ctx: &ConvergeContext,
    ) -> Result<String, CliError> {
        let label = label.unwrap_or(id);
        let described = match kind {
            Kind::Account => return Ok(describe(&self.import(id, ctx).await?)),
            Kind::AppPassword => return Err(CliError::NotImportable(kind)),
            Kind::Domain => {
                let name = self.domains.import(id).map_err(|f| failed(kind, id, f))?;
                let outcome = self.domains.read(&name, ctx).await.map_err(|f| failed(kind, &name, f))?;
                return self
                    .keep(&name, outcome.found(), describe_domain)
                    .await?
                    .ok_or(CliError::NotFound { kind, key: name });
            }
            Kind::RecoveryMethod => {
                let key = self.methods.import(id).map_err(|f| failed(kind, id, f))?;
                let outcome = self.methods.read(&key, ctx).await.map_err(|f| failed(kind, label, f))?;
                self.keep(label, outcome.found(), describe_method).await?
            }
            Kind::RoutingRule => {
                let rule_id = self.rules.import(id).map_err(|f| failed(kind, id, f))?;
                let outcome = self.rules.read(rule_id, ctx).await.map_err(|f| failed(kind, label, f))?;
                self.keep(label, outcome.found(), describe_rule).await?
            }
        };
        described.ok_or_else(|| CliError::NotFound { kind, key: id.to_string() })
    }

    pub async fn show(&self) -> Result<Vec<AccountState>, CliError> {
        Ok(self.store.list().await?)
    }

    /// One line per tracked entry of every kind, secrets left out.
    pub async fn inventory(&self) -> Result<Vec<String>, CliError> {
        let file = self.store.load().await?;
        let mut lines: Vec<String> =
            file.domains.iter().map(|(k, s)| line(Kind::Domain, describe_domain(k, s))).collect();
        lines.extend(file.accounts.values().map(|s| line(Kind::Account, describe(s))));
        lines.extend(file.recovery_methods.iter().map(|(k, s)| line(Kind::RecoveryMethod, describe_method(k, s))));
        lines.extend(file.routing_rules.iter().map(|(k, s)| line(Kind::RoutingRule, describe_rule(k, s))));
        lines.extend(file.app_passwords.iter().map(|(k, s)| line(Kind::AppPassword, describe_app_password(k, s))));
        Ok(lines)
    }

    pub async fn ownership_code(&self, ctx: &ConvergeContext) -> Result<String, CliError> {
        Ok(ownership_code(&self.directory, ctx).await?)
    }

    async fn tracked<S: Section>(&self, kind: Kind, key: &str) -> Result<S, CliError> {
        self.store.entry(key).await?.ok_or_else(|| CliError::NotTracked { kind, key: key.to_string() })
    }

    /// Stores what a read found, or forgets the entry when it found nothing.
    async fn keep<S: Section>(
        &self,
        key: &str,
        found: Option<S>,
        render: fn(&str, &S) -> String,
    ) -> Result<Option<String>, CliError> {
        match found {
            Some(state) => {
                let text = render(key, &state);
                self.store.put_entry(key, state).await?;
                Ok(Some(text))
            }
            None => {
                self.store.remove_entry::<S>(key).await?;
                Ok(None)
            }
        }
    }
}

fn line(kind: Kind, text: String) -> String {
    format!("{}: {}", kind, text)
}

/// One line per account, with the credential left out.
pub fn describe(state: &AccountState) -> String {
    let flag = |v: Option<bool>| v.map_or("?".to_string(), |b| b.to_string());
    let targets: Vec<&str> = state.recovery_methods.iter().map(|m| m.target.as_str()).collect();
    format!(
        "{} two_factor={} search_indexing={} recovery_enabled={} methods=[{}]",
        state.handle,
        flag(state.require_two_factor),
        flag(state.search_indexing),
        flag(state.recovery_enabled),
        targets.join(", ")
    )
}

pub fn describe_domain(_name: &str, state: &DomainState) -> String {
    format!(
        "{} allow_account_reset={} symbolic_subaddressing={} shared={} dns_passing={}",
        state.name,
        state.allow_account_reset,
        state.symbolic_subaddressing,
        state.is_shared,
        state.dns.all_passing()
    )
}

pub fn describe_method(label: &str, state: &StandaloneMethod) -> String {
    format!(
        "{} {} type={} allow_mfa_reset={}",
        label,
        state.key(),
        state.method.kind,
        state.method.allow_mfa_reset
    )
}

pub fn describe_rule(label: &str, state: &RoutingRuleState) -> String {
    let rule = &state.rule;
    format!(
        "{} id={} {}{}@{} catchall={} targets=[{}]",
        label,
        state.id,
        rule.match_user,
        if rule.prefix { "*" } else { "" },
        rule.domain_name,
        rule.catchall,
        rule.target_addresses.join(", ")
    )
}

/// The password itself is never printed.
pub fn describe_app_password(label: &str, state: &AppPasswordState) -> String {
    format!("{} user={} name={}", label, state.config.user_handle, state.config.name.as_deref().unwrap_or("-"))
}
