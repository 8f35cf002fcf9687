// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Recovery-method calls shared by the account reconciler and the standalone
//! recovery-method resource.

use log::{debug, warn};

use super::context::ConvergeContext;
use super::differ::MethodOp;
use super::error::{ReconcileError, Step};
use crate::api::types::{DeletePasswordResetRequest, PasswordResetItem, UpsertPasswordResetRequest};
use crate::api::{AccountApi, ApiError};
use crate::model::{MethodKind, RecoveryMethod};

/// Creates or updates one method. `existing_target` moves an existing method
/// to `method.target` instead of creating a second one.
pub async fn upsert(
    api: &dyn AccountApi,
    ctx: &ConvergeContext,
    handle: &str,
    method: &RecoveryMethod,
    existing_target: Option<&str>,
) -> Result<(), ApiError> {
    debug!("Upserting {} recovery method '{}' for {}", method.kind, method.target, handle);
    let request = UpsertPasswordResetRequest {
        user_name: handle.to_string(),
        kind: method.kind.as_str().to_string(),
        target: method.target.clone(),
        existing_target: existing_target.map(str::to_string),
        description: method.description.clone(),
        allow_mfa_reset: Some(method.allow_mfa_reset),
    };
    ctx.run(api.upsert_recovery_method(request)).await
}

pub async fn delete(api: &dyn AccountApi, ctx: &ConvergeContext, handle: &str, target: &str) -> Result<(), ApiError> {
    debug!("Deleting recovery method '{}' for {}", target, handle);
    let request = DeletePasswordResetRequest { user_name: handle.to_string(), target: target.to_string() };
    ctx.run(api.delete_recovery_method(request)).await
}

/// All methods of an account, in the order the server lists them. Entries
/// without a target or type are skipped.
pub async fn list(
    api: &dyn AccountApi,
    ctx: &ConvergeContext,
    handle: &str,
) -> Result<Vec<RecoveryMethod>, ReconcileError> {
    let items = ctx.run(api.list_recovery_methods(handle)).await?;
    Ok(items
        .into_iter()
        .filter_map(|item| match from_item(item) {
            Ok(method) => Some(method),
            Err(e) => {
                warn!("Skipping recovery method of {}: {}", handle, e);
                None
            }
        })
        .collect())
}

pub fn from_item(item: PasswordResetItem) -> Result<RecoveryMethod, ReconcileError> {
    let target = item
        .target
        .ok_or_else(|| ReconcileError::InvalidMethod("method without a target".to_string()))?;
    let kind = item
        .kind
        .as_deref()
        .unwrap_or_default()
        .parse::<MethodKind>()
        .map_err(|e| ReconcileError::InvalidMethod(format!("{} ({})", e, target)))?;
    Ok(RecoveryMethod {
        kind,
        target,
        description: item.description,
        allow_mfa_reset: item.allow_mfa_reset.unwrap_or(false),
    })
}

/// Keeps methods that were already known in their previous relative order and
/// appends newly seen ones in the order they were fetched.
pub fn align_order(prior: &[RecoveryMethod], mut fetched: Vec<RecoveryMethod>) -> Vec<RecoveryMethod> {
    let mut aligned = Vec::with_capacity(fetched.len());
    for known in prior {
        if let Some(pos) = fetched.iter().position(|m| m.target == known.target) {
            aligned.push(fetched.remove(pos));
        }
    }
    aligned.extend(fetched);
    aligned
}

/// Records a successful operation in a locally tracked method list.
pub fn record(applied: &mut Vec<RecoveryMethod>, op: &MethodOp) {
    match op {
        MethodOp::Delete { target } => applied.retain(|m| &m.target != target),
        MethodOp::Upsert(method) => match applied.iter_mut().find(|m| m.target == method.target) {
            Some(existing) => *existing = method.clone(),
            None => applied.push(method.clone()),
        },
    }
}

/// Executes a plan in order, stopping at the first failure. `applied` tracks
/// every operation that succeeded.
pub async fn execute(
    api: &dyn AccountApi,
    ctx: &ConvergeContext,
    handle: &str,
    ops: &[MethodOp],
    applied: &mut Vec<RecoveryMethod>,
) -> Result<(), (Step, ApiError)> {
    for op in ops {
        match op {
            MethodOp::Delete { target } => delete(api, ctx, handle, target)
                .await
                .map_err(|e| (Step::DeleteRecoveryMethod(target.clone()), e))?,
            MethodOp::Upsert(method) => upsert(api, ctx, handle, method, None)
                .await
                .map_err(|e| (Step::UpsertRecoveryMethod(method.target.clone()), e))?,
        }
        record(applied, op);
    }
    Ok(())
}
