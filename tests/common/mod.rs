// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helpers shared by the integration tests.

#![allow(dead_code)]

use mailforge::api::fake::{ApiCall, CallKind};
use mailforge::api::types::{PasswordResetItem, UserInfo};
use mailforge::api::InMemoryApi;
use mailforge::model::{AccountState, RecoveryMethod};
use mailforge::reconcile::AccountReconciler;
use std::sync::Arc;

pub fn fake() -> Arc<InMemoryApi> {
    Arc::new(InMemoryApi::new())
}

pub fn reconciler(api: &Arc<InMemoryApi>) -> AccountReconciler {
    AccountReconciler::new(api.clone())
}

pub fn item(method: &RecoveryMethod) -> PasswordResetItem {
    PasswordResetItem {
        kind: Some(method.kind.as_str().to_string()),
        target: Some(method.target.clone()),
        description: method.description.clone(),
        allow_mfa_reset: Some(method.allow_mfa_reset),
    }
}

/// Puts an account on the fake server and returns the snapshot a previous
/// pass would have recorded for it.
pub fn seed(api: &InMemoryApi, handle: &str, two_factor: bool, methods: &[RecoveryMethod]) -> AccountState {
    api.seed_account(
        handle,
        UserInfo {
            enable_search_indexing: Some(true),
            recovery_enabled: Some(false),
            require_two_factor_authentication: Some(two_factor),
        },
        methods.iter().map(item).collect(),
    );
    AccountState {
        search_indexing: Some(true),
        require_two_factor: Some(two_factor),
        recovery_enabled: Some(false),
        recovery_methods: methods.to_vec(),
        ..AccountState::seed(handle)
    }
}

pub fn kinds(calls: &[ApiCall]) -> Vec<CallKind> {
    calls.iter().map(ApiCall::kind).collect()
}
