// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A recovery method managed on its own rather than embedded in an account.
//!
//! Uses the same upsert/delete/list calls as the account reconciler. The
//! identity is `handle:target`.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::api::AccountApi;
use crate::model::RecoveryMethod;
use crate::reconcile::{
    methods, ConvergeContext, ConvergeFailure, ConvergeResult, ConvergeWarning, Converged, ReadOutcome,
    ReconcileError, Step,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandaloneMethod {
    pub handle: String,
    #[serde(flatten)]
    pub method: RecoveryMethod,
}

/// `handle:target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    pub handle: String,
    pub target: String,
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.handle, self.target)
    }
}

impl MethodKey {
    pub fn parse(id: &str) -> Result<Self, ReconcileError> {
        let parts: Vec<&str> = id.split(':').collect();
        match parts.as_slice() {
            [handle, target] if !handle.is_empty() && !target.is_empty() => {
                Ok(Self { handle: handle.to_string(), target: target.to_string() })
            }
            _ => Err(ReconcileError::InvalidImportId {
                id: id.to_string(),
                reason: "expected 'handle:target'".to_string(),
            }),
        }
    }
}

impl StandaloneMethod {
    pub fn key(&self) -> MethodKey {
        MethodKey { handle: self.handle.clone(), target: self.method.target.clone() }
    }
}

pub type MethodFailure = ConvergeFailure<StandaloneMethod>;

#[derive(Clone)]
pub struct RecoveryMethodResource {
    api: Arc<dyn AccountApi>,
}

impl RecoveryMethodResource {
    pub fn new(api: Arc<dyn AccountApi>) -> Self {
        Self { api }
    }

    pub async fn create(&self, desired: &StandaloneMethod, ctx: &ConvergeContext) -> ConvergeResult<StandaloneMethod> {
        info!("Creating recovery method {}", desired.key());
        methods::upsert(self.api.as_ref(), ctx, &desired.handle, &desired.method, None)
            .await
            .map_err(|e| MethodFailure::bare(Step::UpsertRecoveryMethod(desired.method.target.clone()), e))?;
        Ok(self.read_back(desired.clone(), ctx).await)
    }

    pub async fn read(
        &self,
        key: &MethodKey,
        ctx: &ConvergeContext,
    ) -> Result<ReadOutcome<StandaloneMethod>, MethodFailure> {
        let listed = match methods::list(self.api.as_ref(), ctx, &key.handle).await {
            Ok(listed) => listed,
            Err(e) if e.is_not_found() => return Ok(ReadOutcome::NotFound),
            Err(e) => return Err(MethodFailure::bare(Step::ListRecoveryMethods, e)),
        };
        Ok(match listed.into_iter().find(|m| m.target == key.target) {
            Some(method) => ReadOutcome::Found(StandaloneMethod { handle: key.handle.clone(), method }),
            None => {
                debug!("Recovery method {} not listed", key);
                ReadOutcome::NotFound
            }
        })
    }

    /// Upserts in place. A changed target moves the existing method; a
    /// changed handle means a different method, so the old one is deleted and
    /// the new one created.
    pub async fn update(
        &self,
        desired: &StandaloneMethod,
        observed: &StandaloneMethod,
        ctx: &ConvergeContext,
    ) -> ConvergeResult<StandaloneMethod> {
        if desired == observed {
            return Ok(self.read_back(observed.clone(), ctx).await);
        }
        if desired.handle != observed.handle {
            self.delete(observed, ctx).await?;
            return self.create(desired, ctx).await;
        }

        info!("Updating recovery method {}", observed.key());
        let existing = Some(observed.method.target.as_str()).filter(|t| *t != desired.method.target);
        methods::upsert(self.api.as_ref(), ctx, &desired.handle, &desired.method, existing)
            .await
            .map_err(|e| {
                MethodFailure::new(
                    Step::UpsertRecoveryMethod(desired.method.target.clone()),
                    e,
                    Some(observed.clone()),
                )
            })?;
        Ok(self.read_back(desired.clone(), ctx).await)
    }

    pub async fn delete(&self, observed: &StandaloneMethod, ctx: &ConvergeContext) -> Result<(), MethodFailure> {
        info!("Deleting recovery method {}", observed.key());
        methods::delete(self.api.as_ref(), ctx, &observed.handle, &observed.method.target)
            .await
            .map_err(|e| {
                MethodFailure::new(
                    Step::DeleteRecoveryMethod(observed.method.target.clone()),
                    e,
                    Some(observed.clone()),
                )
            })
    }

    pub fn import(&self, id: &str) -> Result<MethodKey, MethodFailure> {
        MethodKey::parse(id).map_err(|e| MethodFailure::bare(Step::Import, e))
    }

    async fn read_back(&self, written: StandaloneMethod, ctx: &ConvergeContext) -> Converged<StandaloneMethod> {
        let warning = match self.read(&written.key(), ctx).await {
            Ok(ReadOutcome::Found(state)) => return Converged::clean(state),
            Ok(ReadOutcome::NotFound) => ConvergeWarning::ReadBackFailed {
                step: Step::ListRecoveryMethods,
                error: ReconcileError::Vanished(format!("recovery method {}", written.key())),
            },
            Err(failure) => ConvergeWarning::ReadBackFailed { step: failure.step, error: failure.error },
        };
        warn!("{}", warning);
        Converged { state: written, warnings: vec![warning] }
    }
}
