// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::types::{DomainInfo, UpdateDomainSettingsRequest};
use crate::api::DirectoryApi;
use crate::reconcile::{
    ConvergeContext, ConvergeFailure, ConvergeResult, ConvergeWarning, Converged, ReadOutcome, ReconcileError, Step,
};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DomainConfig {
    pub name: String,
    #[serde(default)]
    pub allow_account_reset: bool,
    #[serde(default)]
    pub symbolic_subaddressing: bool,
    /// Ask the server to re-run its DNS checks on this pass. Not persisted.
    #[serde(default, skip_serializing)]
    pub recheck_dns: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DnsStatus {
    pub passes_mx: bool,
    pub passes_spf: bool,
    pub passes_dkim: bool,
    pub passes_dmarc: bool,
}

impl DnsStatus {
    pub fn all_passing(&self) -> bool {
        self.passes_mx && self.passes_spf && self.passes_dkim && self.passes_dmarc
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DomainState {
    pub name: String,
    pub allow_account_reset: bool,
    pub symbolic_subaddressing: bool,
    pub is_shared: bool,
    pub dns: DnsStatus,
}

impl From<DomainInfo> for DomainState {
    fn from(info: DomainInfo) -> Self {
        let dns = info.dns_summary.unwrap_or_default();
        Self {
            name: info.name.unwrap_or_default(),
            allow_account_reset: info.allow_account_reset.unwrap_or(false),
            symbolic_subaddressing: info.symbolic_subaddressing.unwrap_or(false),
            is_shared: info.is_shared.unwrap_or(false),
            dns: DnsStatus {
                passes_mx: dns.passes_mx.unwrap_or(false),
                passes_spf: dns.passes_spf.unwrap_or(false),
                passes_dkim: dns.passes_dkim.unwrap_or(false),
                passes_dmarc: dns.passes_dmarc.unwrap_or(false),
            },
        }
    }
}

pub type DomainFailure = ConvergeFailure<DomainState>;

#[derive(Clone)]
pub struct DomainResource {
    api: Arc<dyn DirectoryApi>,
}

impl DomainResource {
    pub fn new(api: Arc<dyn DirectoryApi>) -> Self {
        Self { api }
    }

    pub async fn create(&self, desired: &DomainConfig, ctx: &ConvergeContext) -> ConvergeResult<DomainState> {
        info!("Adding domain {}", desired.name);
        ctx.run(self.api.add_domain(&desired.name))
            .await
            .map_err(|e| DomainFailure::bare(Step::AddDomain, e))?;

        let mut progress = DomainState { name: desired.name.clone(), ..Default::default() };
        if desired.allow_account_reset || desired.symbolic_subaddressing || desired.recheck_dns {
            let request = UpdateDomainSettingsRequest {
                name: desired.name.clone(),
                allow_account_reset: Some(desired.allow_account_reset),
                symbolic_subaddressing: Some(desired.symbolic_subaddressing),
                recheck_dns: Some(desired.recheck_dns).filter(|r| *r),
            };
            ctx.run(self.api.update_domain_settings(request))
                .await
                .map_err(|e| DomainFailure::new(Step::UpdateDomainSettings, e, Some(progress.clone())))?;
            progress.allow_account_reset = desired.allow_account_reset;
            progress.symbolic_subaddressing = desired.symbolic_subaddressing;
        }
        Ok(self.read_back(progress, ctx).await)
    }

    pub async fn read(&self, name: &str, ctx: &ConvergeContext) -> Result<ReadOutcome<DomainState>, DomainFailure> {
        let domains = ctx
            .run(self.api.list_domains(false))
            .await
            .map_err(|e| DomainFailure::bare(Step::ListDomains, e))?;
        Ok(match domains.into_iter().find(|d| d.name.as_deref() == Some(name)) {
            Some(info) => ReadOutcome::Found(info.into()),
            None => ReadOutcome::NotFound,
        })
    }

    /// Settings change in place; a new name replaces the domain.
    pub async fn update(
        &self,
        desired: &DomainConfig,
        observed: &DomainState,
        ctx: &ConvergeContext,
    ) -> ConvergeResult<DomainState> {
        if desired.name != observed.name {
            info!("Replacing domain {} with {}", observed.name, desired.name);
            self.delete(observed, ctx).await?;
            return self.create(desired, ctx).await;
        }

        let request = UpdateDomainSettingsRequest {
            name: desired.name.clone(),
            allow_account_reset: Some(desired.allow_account_reset).filter(|v| *v != observed.allow_account_reset),
            symbolic_subaddressing: Some(desired.symbolic_subaddressing)
                .filter(|v| *v != observed.symbolic_subaddressing),
            recheck_dns: Some(desired.recheck_dns).filter(|r| *r),
        };
        let mut progress = observed.clone();
        if request.allow_account_reset.is_some()
            || request.symbolic_subaddressing.is_some()
            || request.recheck_dns.is_some()
        {
            info!("Updating settings for domain {}", desired.name);
            ctx.run(self.api.update_domain_settings(request))
                .await
                .map_err(|e| DomainFailure::new(Step::UpdateDomainSettings, e, Some(observed.clone())))?;
            progress.allow_account_reset = desired.allow_account_reset;
            progress.symbolic_subaddressing = desired.symbolic_subaddressing;
        }
        Ok(self.read_back(progress, ctx).await)
    }

    pub async fn delete(&self, observed: &DomainState, ctx: &ConvergeContext) -> Result<(), DomainFailure> {
        info!("Deleting domain {}", observed.name);
        ctx.run(self.api.delete_domain(&observed.name))
            .await
            .map_err(|e| DomainFailure::new(Step::DeleteDomain, e, Some(observed.clone())))
    }

    pub fn import(&self, name: &str) -> Result<String, DomainFailure> {
        let name = name.trim();
        if name.is_empty() || !name.contains('.') {
            return Err(DomainFailure::bare(
                Step::Import,
                ReconcileError::InvalidImportId { id: name.to_string(), reason: "expected a domain name".into() },
            ));
        }
        Ok(name.to_string())
    }

    async fn read_back(&self, progress: DomainState, ctx: &ConvergeContext) -> Converged<DomainState> {
        let warning = match self.read(&progress.name, ctx).await {
            Ok(ReadOutcome::Found(state)) => return Converged::clean(state),
            Ok(ReadOutcome::NotFound) => ConvergeWarning::ReadBackFailed {
                step: Step::ListDomains,
                error: ReconcileError::Vanished(format!("domain {}", progress.name)),
            },
            Err(failure) => ConvergeWarning::ReadBackFailed { step: failure.step, error: failure.error },
        };
        warn!("{}", warning);
        Converged { state: progress, warnings: vec![warning] }
    }
}
