// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Lifecycle of a mailbox account together with its recovery methods and
//! two-factor flag.
//!
//! Each operation plans first, then issues calls one at a time in a fixed
//! order and stops at the first failure:
//!
//! 1. two-factor disable, when the flag is turning off
//! 2. one combined modify (rename, credential, plain flags)
//! 3. recovery-method deletes, then upserts
//! 4. two-factor enable, when the flag is turning on
//! 5. read back
//!
//! Nothing is rolled back. A failure carries the step that failed and the best
//! snapshot available of what the account looks like afterwards.

use log::{debug, error, info, warn};
use std::sync::Arc;

use super::context::ConvergeContext;
use super::differ::{self, MethodOp};
use super::error::{ConvergeFailure, ConvergeWarning, ReconcileError, Step};
use super::gate::{self, GateDecision, GateInput};
use super::methods;
use super::outcome::{ConvergeResult, Converged, ReadOutcome};
use crate::api::types::{CreateUserRequest, ModifyUserRequest};
use crate::api::{AccountApi, ApiError};
use crate::model::{AccountConfig, AccountState, Credential, Field, RecoveryMethod};

pub type AccountFailure = ConvergeFailure<AccountState>;

/// Drives account lifecycle operations against an [`AccountApi`].
///
/// Holds no state between calls, so one reconciler can serve any number of
/// accounts concurrently.
#[derive(Clone)]
pub struct AccountReconciler {
    api: Arc<dyn AccountApi>,
}

/// Desired methods as far as the reconciler may act on them. Unset means
/// none; unknown means leave the collection alone.
fn desired_methods(desired: &AccountConfig) -> Option<&[RecoveryMethod]> {
    match &desired.recovery_methods {
        Field::Known(methods) => Some(methods),
        Field::Null => Some(&[]),
        Field::Unknown => None,
    }
}

/// What the observed snapshot should remember about the credential once the
/// modify step has gone through.
fn tracked_after(desired: &AccountConfig, current: &AccountState) -> Option<crate::model::Secret> {
    match &desired.credential {
        Field::Known(Credential::Tracked(secret)) => Some(secret.clone()),
        Field::Known(Credential::WriteOnly(_)) | Field::Null => None,
        Field::Unknown => current.tracked_credential.clone(),
    }
}

fn changed(desired: &Field<bool>, observed: Option<bool>) -> Option<bool> {
    desired.known().copied().filter(|v| Some(*v) != observed)
}

impl AccountReconciler {
    pub fn new(api: Arc<dyn AccountApi>) -> Self {
        Self { api }
    }

    pub async fn create(&self, desired: &AccountConfig, ctx: &ConvergeContext) -> ConvergeResult<AccountState> {
        let handle = desired.handle.clone();
        info!("Creating account {}", handle);
        if !desired.new_handle.is_null() {
            debug!("Ignoring rename for {} on create", handle);
        }

        let ops = match desired_methods(desired) {
            Some(methods) => differ::plan(&[], methods).map_err(|e| AccountFailure::bare(Step::Plan, e))?,
            None => Vec::new(),
        };
        let decision = gate::decide(GateInput {
            observed: false,
            desired: desired.require_two_factor.known().copied(),
            observed_methods: 0,
            desired_methods: desired_methods(desired).map(<[_]>::len),
        })
        .map_err(|veto| AccountFailure::bare(Step::Plan, veto))?;

        let request = CreateUserRequest { user_name: handle.clone() };
        if let Err(e) = ctx.run(self.api.create_account(request)).await {
            error!("Failed to create account {}: {}", handle, e);
            return Err(AccountFailure::bare(Step::CreateAccount, e));
        }
        let mut progress = AccountState::seed(handle.clone());

        let mut modify = ModifyUserRequest::new(handle.clone());
        modify.new_password = desired.credential.known().map(|c| c.secret().expose().to_string());
        modify.enable_search_indexing = desired.search_indexing.known().copied();
        modify.enable_password_reset = desired.recovery_enabled.known().copied();
        if !modify.is_empty() {
            if let Err(e) = self.modify(ctx, modify).await {
                return Err(self.abort(Step::ModifyAccount, e, progress, ctx).await);
            }
            progress.search_indexing = desired.search_indexing.known().copied();
            progress.recovery_enabled = desired.recovery_enabled.known().copied();
        }
        progress.tracked_credential = tracked_after(desired, &progress);

        let executed = methods::execute(self.api.as_ref(), ctx, &handle, &ops, &mut progress.recovery_methods).await;
        if let Err((step, e)) = executed {
            return Err(self.abort(step, e, progress, ctx).await);
        }

        if decision == GateDecision::EnableLast {
            if let Err(e) = self.set_two_factor(ctx, &handle, true).await {
                return Err(self.abort(Step::EnableTwoFactor, e, progress, ctx).await);
            }
            progress.require_two_factor = Some(true);
        }

        let converged = self.read_back(progress, ctx).await;
        info!("Created account {}", handle);
        Ok(converged)
    }

    /// Fetches the account and its methods. Methods already in `prior` keep
    /// their order; the tracked credential is carried over.
    pub async fn read(
        &self,
        prior: &AccountState,
        ctx: &ConvergeContext,
    ) -> Result<ReadOutcome<AccountState>, AccountFailure> {
        match self.fetch(prior, ctx).await {
            Ok(ReadOutcome::NotFound) => {
                info!("Account {} no longer exists", prior.handle);
                Ok(ReadOutcome::NotFound)
            }
            Ok(found) => Ok(found),
            Err((step, e)) => {
                error!("Failed to read account {}: {}", prior.handle, e);
                Err(AccountFailure::bare(step, e))
            }
        }
    }

    pub async fn update(
        &self,
        desired: &AccountConfig,
        observed: &AccountState,
        ctx: &ConvergeContext,
    ) -> ConvergeResult<AccountState> {
        info!("Updating account {}", observed.handle);
        let planning_failure = |e: ReconcileError| AccountFailure::new(Step::Plan, e, Some(observed.clone()));

        let wanted = desired_methods(desired);
        let ops: Vec<MethodOp> = match wanted {
            Some(methods) => differ::plan(&observed.recovery_methods, methods).map_err(planning_failure)?,
            None => Vec::new(),
        };
        let decision = gate::decide(GateInput {
            observed: observed.two_factor_enabled(),
            desired: desired.require_two_factor.known().copied(),
            observed_methods: observed.recovery_methods.len(),
            desired_methods: wanted.map(<[_]>::len),
        })
        .map_err(|veto| {
            warn!("Refusing to update {}: {}", observed.handle, veto);
            planning_failure(veto.into())
        })?;
        debug!("Plan for {}: {:?}, {} method op(s)", observed.handle, decision, ops.len());

        let mut progress = observed.clone();

        if decision == GateDecision::DisableFirst {
            if let Err(e) = self.set_two_factor(ctx, &progress.handle, false).await {
                return Err(self.abort(Step::DisableTwoFactor, e, progress, ctx).await);
            }
            progress.require_two_factor = Some(false);
        }

        let rename = desired.new_handle.known().filter(|h| **h != observed.handle).cloned();
        let mut modify = ModifyUserRequest::new(progress.handle.clone());
        modify.new_user_name = rename.clone();
        modify.new_password = match desired.credential.known() {
            Some(Credential::Tracked(secret)) if observed.tracked_credential.as_ref() != Some(secret) => {
                Some(secret.expose().to_string())
            }
            Some(Credential::WriteOnly(secret)) => Some(secret.expose().to_string()),
            _ => None,
        };
        modify.enable_search_indexing = changed(&desired.search_indexing, observed.search_indexing);
        modify.enable_password_reset = changed(&desired.recovery_enabled, observed.recovery_enabled);
        if !modify.is_empty() {
            let (search, recovery) = (modify.enable_search_indexing, modify.enable_password_reset);
            if let Err(e) = self.modify(ctx, modify).await {
                return Err(self.abort(Step::ModifyAccount, e, progress, ctx).await);
            }
            if let Some(new_handle) = rename {
                info!("Renamed account {} to {}", progress.handle, new_handle);
                progress.handle = new_handle;
            }
            progress.search_indexing = search.or(progress.search_indexing);
            progress.recovery_enabled = recovery.or(progress.recovery_enabled);
        }
        progress.tracked_credential = tracked_after(desired, &progress);

        let handle = progress.handle.clone();
        let executed = methods::execute(self.api.as_ref(), ctx, &handle, &ops, &mut progress.recovery_methods).await;
        if let Err((step, e)) = executed {
            return Err(self.abort(step, e, progress, ctx).await);
        }

        if decision == GateDecision::EnableLast {
            if let Err(e) = self.set_two_factor(ctx, &handle, true).await {
                return Err(self.abort(Step::EnableTwoFactor, e, progress, ctx).await);
            }
            progress.require_two_factor = Some(true);
        }

        let converged = self.read_back(progress, ctx).await;
        info!("Updated account {}", handle);
        Ok(converged)
    }

    /// Deletes the account. Its recovery methods go with it server-side.
    pub async fn delete(&self, observed: &AccountState, ctx: &ConvergeContext) -> Result<(), AccountFailure> {
        info!("Deleting account {}", observed.handle);
        ctx.run(self.api.delete_account(&observed.handle)).await.map_err(|e| {
            error!("Failed to delete account {}: {}", observed.handle, e);
            AccountFailure::new(Step::DeleteAccount, e, Some(observed.clone()))
        })
    }

    /// Starts tracking an existing account by handle. Issues no calls; a read
    /// fills in the rest.
    pub fn import(&self, handle: &str) -> Result<AccountState, AccountFailure> {
        let handle = handle.trim();
        if handle.is_empty() || handle.chars().any(char::is_whitespace) {
            return Err(AccountFailure::bare(
                Step::Import,
                ReconcileError::InvalidImportId { id: handle.to_string(), reason: "expected an account handle".into() },
            ));
        }
        debug!("Importing account {}", handle);
        Ok(AccountState::seed(handle))
    }

    async fn modify(&self, ctx: &ConvergeContext, request: ModifyUserRequest) -> Result<(), ApiError> {
        debug!("Modifying account {}", request.user_name);
        ctx.run(self.api.modify_account(request)).await
    }

    async fn set_two_factor(&self, ctx: &ConvergeContext, handle: &str, enabled: bool) -> Result<(), ApiError> {
        let mut request = ModifyUserRequest::new(handle);
        request.require_two_factor_authentication = Some(enabled);
        debug!("Setting two-factor requirement for {} to {}", handle, enabled);
        ctx.run(self.api.modify_account(request)).await
    }

    async fn fetch(
        &self,
        prior: &AccountState,
        ctx: &ConvergeContext,
    ) -> Result<ReadOutcome<AccountState>, (Step, ReconcileError)> {
        let info = match ctx.run(self.api.get_account(&prior.handle)).await {
            Ok(info) => info,
            Err(e) if e.is_not_found() => return Ok(ReadOutcome::NotFound),
            Err(e) => return Err((Step::ReadAccount, e.into())),
        };
        let fetched = match methods::list(self.api.as_ref(), ctx, &prior.handle).await {
            Ok(fetched) => fetched,
            Err(e) if e.is_not_found() => return Ok(ReadOutcome::NotFound),
            Err(e) => return Err((Step::ListRecoveryMethods, e)),
        };

        Ok(ReadOutcome::Found(AccountState {
            handle: prior.handle.clone(),
            search_indexing: Some(info.enable_search_indexing.unwrap_or(false)),
            require_two_factor: Some(info.require_two_factor_authentication.unwrap_or(false)),
            recovery_enabled: Some(info.recovery_enabled.unwrap_or(false)),
            recovery_methods: methods::align_order(&prior.recovery_methods, fetched),
            tracked_credential: prior.tracked_credential.clone(),
        }))
    }

    /// Final re-fetch after every mutation went through. A failure here is only
    /// a warning; the locally tracked snapshot stands in.
    async fn read_back(&self, progress: AccountState, ctx: &ConvergeContext) -> Converged<AccountState> {
        let (step, error) = match self.fetch(&progress, ctx).await {
            Ok(ReadOutcome::Found(state)) => return Converged::clean(state),
            Ok(ReadOutcome::NotFound) => (Step::ReadAccount, ApiError::NotFound(progress.handle.clone()).into()),
            Err(failed) => failed,
        };
        warn!("Account {} was changed but could not be read back: {}", progress.handle, error);
        Converged { state: progress, warnings: vec![ConvergeWarning::ReadBackFailed { step, error }] }
    }

    /// Builds the failure for a step that did not go through.
    ///
    /// A pass stopped between calls reports its locally tracked progress,
    /// which is exact. Otherwise one read is attempted so the partial snapshot
    /// reflects the server. When the failed call was cut off in flight that
    /// read ignores cancellation and the deadline, since the call may have
    /// been applied.
    async fn abort(
        &self,
        step: Step,
        err: ApiError,
        progress: AccountState,
        ctx: &ConvergeContext,
    ) -> AccountFailure {
        error!("Account {}: {} failed: {}", progress.handle, step, err);
        if err.is_interrupt() && !err.outcome_unknown() {
            return AccountFailure::new(step, err, Some(progress));
        }
        let read_ctx = if err.outcome_unknown() { ctx.detached() } else { ctx.clone() };
        let partial = match self.fetch(&progress, &read_ctx).await {
            Ok(ReadOutcome::Found(state)) => state,
            Ok(ReadOutcome::NotFound) | Err(_) => progress,
        };
        AccountFailure::new(step, err, Some(partial))
    }
}
