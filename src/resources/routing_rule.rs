// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::types::{CreateRoutingRequest, RoutingRuleInfo};
use crate::api::DirectoryApi;
use crate::reconcile::{
    ConvergeContext, ConvergeFailure, ConvergeResult, ConvergeWarning, Converged, ReadOutcome, ReconcileError, Step,
};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoutingRuleConfig {
    pub domain_name: String,
    #[serde(default)]
    pub prefix: bool,
    pub match_user: String,
    pub target_addresses: Vec<String>,
    #[serde(default)]
    pub catchall: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRuleState {
    pub id: i64,
    #[serde(flatten)]
    pub rule: RoutingRuleConfig,
}

fn rule_from(info: RoutingRuleInfo) -> Option<RoutingRuleState> {
    Some(RoutingRuleState {
        id: info.id?,
        rule: RoutingRuleConfig {
            domain_name: info.domain_name.unwrap_or_default(),
            prefix: info.prefix.unwrap_or(false),
            match_user: info.match_user.unwrap_or_default(),
            target_addresses: info.target_addresses.unwrap_or_default(),
            catchall: info.catchall.unwrap_or(false),
        },
    })
}

pub type RuleFailure = ConvergeFailure<RoutingRuleState>;

#[derive(Clone)]
pub struct RoutingRuleResource {
    api: Arc<dyn DirectoryApi>,
}

impl RoutingRuleResource {
    pub fn new(api: Arc<dyn DirectoryApi>) -> Self {
        Self { api }
    }

    /// The create call returns no id, so the new rule is found again by its
    /// domain, match and prefix. The newest match wins.
    pub async fn create(&self, desired: &RoutingRuleConfig, ctx: &ConvergeContext) -> ConvergeResult<RoutingRuleState> {
        info!("Creating routing rule {}@{}", desired.match_user, desired.domain_name);
        let request = CreateRoutingRequest {
            domain_name: desired.domain_name.clone(),
            prefix: desired.prefix,
            match_user: desired.match_user.clone(),
            target_addresses: desired.target_addresses.clone(),
            catchall: Some(desired.catchall),
        };
        ctx.run(self.api.create_routing_rule(request))
            .await
            .map_err(|e| RuleFailure::bare(Step::CreateRoutingRule, e))?;

        let rules = self
            .list(ctx)
            .await
            .map_err(|e| RuleFailure::bare(Step::ListRoutingRules, e))?;
        let created = rules
            .into_iter()
            .filter(|r| {
                r.rule.domain_name == desired.domain_name
                    && r.rule.match_user == desired.match_user
                    && r.rule.prefix == desired.prefix
            })
            .max_by_key(|r| r.id)
            .ok_or_else(|| {
                RuleFailure::bare(
                    Step::ListRoutingRules,
                    ReconcileError::Vanished(format!("routing rule {}@{}", desired.match_user, desired.domain_name)),
                )
            })?;
        debug!("Routing rule resolved to id {}", created.id);
        Ok(Converged::clean(created))
    }

    pub async fn read(&self, id: i64, ctx: &ConvergeContext) -> Result<ReadOutcome<RoutingRuleState>, RuleFailure> {
        let rules = self
            .list(ctx)
            .await
            .map_err(|e| RuleFailure::bare(Step::ListRoutingRules, e))?;
        Ok(match rules.into_iter().find(|r| r.id == id) {
            Some(rule) => ReadOutcome::Found(rule),
            None => ReadOutcome::NotFound,
        })
    }

    /// Rules cannot be edited remotely: a changed rule is deleted and created
    /// again under a new id.
    pub async fn update(
        &self,
        desired: &RoutingRuleConfig,
        observed: &RoutingRuleState,
        ctx: &ConvergeContext,
    ) -> ConvergeResult<RoutingRuleState> {
        if *desired == observed.rule {
            return Ok(match self.read(observed.id, ctx).await {
                Ok(ReadOutcome::Found(state)) => Converged::clean(state),
                Ok(ReadOutcome::NotFound) => {
                    let vanished = ReconcileError::Vanished(format!("routing rule {}", observed.id));
                    self.stale(observed, Step::ListRoutingRules, vanished)
                }
                Err(failure) => self.stale(observed, failure.step, failure.error),
            });
        }
        info!("Replacing routing rule {}", observed.id);
        self.delete(observed, ctx).await?;
        self.create(desired, ctx).await
    }

    pub async fn delete(&self, observed: &RoutingRuleState, ctx: &ConvergeContext) -> Result<(), RuleFailure> {
        info!("Deleting routing rule {}", observed.id);
        ctx.run(self.api.delete_routing_rule(observed.id))
            .await
            .map_err(|e| RuleFailure::new(Step::DeleteRoutingRule, e, Some(observed.clone())))
    }

    pub fn import(&self, id: &str) -> Result<i64, RuleFailure> {
        id.trim().parse::<i64>().map_err(|e| {
            RuleFailure::bare(
                Step::Import,
                ReconcileError::InvalidImportId { id: id.to_string(), reason: e.to_string() },
            )
        })
    }

    async fn list(&self, ctx: &ConvergeContext) -> Result<Vec<RoutingRuleState>, ReconcileError> {
        let rules = ctx.run(self.api.list_routing_rules()).await?;
        Ok(rules.into_iter().filter_map(rule_from).collect())
    }

    fn stale(&self, observed: &RoutingRuleState, step: Step, error: ReconcileError) -> Converged<RoutingRuleState> {
        let warning = ConvergeWarning::ReadBackFailed { step, error };
        warn!("{}", warning);
        Converged { state: observed.clone(), warnings: vec![warning] }
    }
}
