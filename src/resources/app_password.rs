// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::types::CreateAppPasswordRequest;
use crate::api::DirectoryApi;
use crate::model::Secret;
use crate::reconcile::{ConvergeContext, ConvergeFailure, ConvergeResult, Converged, ReadOutcome, Step};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppPasswordConfig {
    pub user_handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The generated password is only returned by the create call, so it lives
/// here and nowhere else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppPasswordState {
    #[serde(flatten)]
    pub config: AppPasswordConfig,
    pub password: Secret,
}

pub type AppPasswordFailure = ConvergeFailure<AppPasswordState>;

#[derive(Clone)]
pub struct AppPasswordResource {
    api: Arc<dyn DirectoryApi>,
}

impl AppPasswordResource {
    pub fn new(api: Arc<dyn DirectoryApi>) -> Self {
        Self { api }
    }

    pub async fn create(&self, desired: &AppPasswordConfig, ctx: &ConvergeContext) -> ConvergeResult<AppPasswordState> {
        info!("Creating app password for {}", desired.user_handle);
        let request = CreateAppPasswordRequest { user_handle: desired.user_handle.clone(), name: desired.name.clone() };
        let password = ctx
            .run(self.api.create_app_password(request))
            .await
            .map_err(|e| AppPasswordFailure::bare(Step::CreateAppPassword, e))?;
        Ok(Converged::clean(AppPasswordState { config: desired.clone(), password: Secret::new(password) }))
    }

    /// There is no way to look an app password up; the stored snapshot is all
    /// there is.
    pub fn read(&self, prior: &AppPasswordState) -> ReadOutcome<AppPasswordState> {
        ReadOutcome::Found(prior.clone())
    }

    /// Any change issues a fresh password and revokes the old one.
    pub async fn update(
        &self,
        desired: &AppPasswordConfig,
        observed: &AppPasswordState,
        ctx: &ConvergeContext,
    ) -> ConvergeResult<AppPasswordState> {
        if *desired == observed.config {
            return Ok(Converged::clean(observed.clone()));
        }
        self.delete(observed, ctx).await?;
        self.create(desired, ctx).await
    }

    pub async fn delete(&self, observed: &AppPasswordState, ctx: &ConvergeContext) -> Result<(), AppPasswordFailure> {
        info!("Revoking app password for {}", observed.config.user_handle);
        ctx.run(self.api.delete_app_password(observed.password.expose()))
            .await
            .map_err(|e| AppPasswordFailure::new(Step::DeleteAppPassword, e, Some(observed.clone())))
    }
}
