// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! In-memory implementation of the remote API.
//!
//! Behaves like the hosted service closely enough to exercise reconciliation
//! end to end: it enforces the two-factor precondition server-side, records
//! every call in order, and can be told to fail a specific call.

use async_trait::async_trait;
use log::debug;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::error::ApiError;
use super::types::*;
use super::{AccountApi, DirectoryApi};

const OWNERSHIP_CODE: &str = "purelymail_ownership_proof=0a1b2c3d4e5f";

/// One recorded request, in the shape it was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    CreateAccount(CreateUserRequest),
    ModifyAccount(ModifyUserRequest),
    GetAccount(String),
    DeleteAccount(String),
    UpsertRecoveryMethod(UpsertPasswordResetRequest),
    DeleteRecoveryMethod(DeletePasswordResetRequest),
    ListRecoveryMethods(String),
    AddDomain(String),
    UpdateDomainSettings(UpdateDomainSettingsRequest),
    ListDomains(bool),
    DeleteDomain(String),
    GetOwnershipCode,
    CreateRoutingRule(CreateRoutingRequest),
    DeleteRoutingRule(i64),
    ListRoutingRules,
    CreateAppPassword(CreateAppPasswordRequest),
    DeleteAppPassword(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    CreateAccount,
    ModifyAccount,
    GetAccount,
    DeleteAccount,
    UpsertRecoveryMethod,
    DeleteRecoveryMethod,
    ListRecoveryMethods,
    AddDomain,
    UpdateDomainSettings,
    ListDomains,
    DeleteDomain,
    GetOwnershipCode,
    CreateRoutingRule,
    DeleteRoutingRule,
    ListRoutingRules,
    CreateAppPassword,
    DeleteAppPassword,
}

impl ApiCall {
    pub fn kind(&self) -> CallKind {
        match self {
            ApiCall::CreateAccount(_) => CallKind::CreateAccount,
            ApiCall::ModifyAccount(_) => CallKind::ModifyAccount,
            ApiCall::GetAccount(_) => CallKind::GetAccount,
            ApiCall::DeleteAccount(_) => CallKind::DeleteAccount,
            ApiCall::UpsertRecoveryMethod(_) => CallKind::UpsertRecoveryMethod,
            ApiCall::DeleteRecoveryMethod(_) => CallKind::DeleteRecoveryMethod,
            ApiCall::ListRecoveryMethods(_) => CallKind::ListRecoveryMethods,
            ApiCall::AddDomain(_) => CallKind::AddDomain,
            ApiCall::UpdateDomainSettings(_) => CallKind::UpdateDomainSettings,
            ApiCall::ListDomains(_) => CallKind::ListDomains,
            ApiCall::DeleteDomain(_) => CallKind::DeleteDomain,
            ApiCall::GetOwnershipCode => CallKind::GetOwnershipCode,
            ApiCall::CreateRoutingRule(_) => CallKind::CreateRoutingRule,
            ApiCall::DeleteRoutingRule(_) => CallKind::DeleteRoutingRule,
            ApiCall::ListRoutingRules => CallKind::ListRoutingRules,
            ApiCall::CreateAppPassword(_) => CallKind::CreateAppPassword,
            ApiCall::DeleteAppPassword(_) => CallKind::DeleteAppPassword,
        }
    }

    /// False for reads.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self.kind(),
            CallKind::GetAccount
                | CallKind::ListRecoveryMethods
                | CallKind::ListDomains
                | CallKind::GetOwnershipCode
                | CallKind::ListRoutingRules
        )
    }
}

type CallHook = Arc<dyn Fn(&ApiCall) + Send + Sync>;

#[derive(Debug, Clone)]
struct StoredAccount {
    search_indexing: bool,
    recovery_enabled: bool,
    two_factor: bool,
    password: Option<String>,
    methods: Vec<PasswordResetItem>,
}

impl Default for StoredAccount {
    fn default() -> Self {
        Self { search_indexing: true, recovery_enabled: false, two_factor: false, password: None, methods: Vec::new() }
    }
}

struct InjectedFailure {
    kind: CallKind,
    skip: usize,
    error: ApiError,
}

#[derive(Default)]
struct FakeState {
    accounts: BTreeMap<String, StoredAccount>,
    domains: BTreeMap<String, DomainInfo>,
    rules: Vec<RoutingRuleInfo>,
    next_rule_id: i64,
    app_passwords: BTreeMap<String, String>,
    next_app_password: u64,
    calls: Vec<ApiCall>,
    failures: Vec<InjectedFailure>,
}

#[derive(Default)]
pub struct InMemoryApi {
    state: Mutex<FakeState>,
    hook: Mutex<Option<CallHook>>,
    latency: Option<Duration>,
    reply_latency: Option<Duration>,
}

fn rejected(message: &str) -> ApiError {
    ApiError::Status { status: 400, message: Some(message.to_string()) }
}

fn not_found(what: &str) -> ApiError {
    ApiError::NotFound(what.to_string())
}

impl InMemoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps this long before touching state.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every call sleeps this long after it has been applied, before replying.
    pub fn with_reply_latency(mut self, latency: Duration) -> Self {
        self.reply_latency = Some(latency);
        self
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs `hook` with each call before the call is processed.
    pub fn set_hook(&self, hook: impl Fn(&ApiCall) + Send + Sync + 'static) {
        *self.hook.lock().unwrap_or_else(|p| p.into_inner()) = Some(Arc::new(hook));
    }

    /// Fails the call of `kind` that comes after `skip` successful ones, once.
    pub fn fail_on(&self, kind: CallKind, skip: usize, error: ApiError) {
        self.lock().failures.push(InjectedFailure { kind, skip, error });
    }

    pub fn seed_account(&self, handle: &str, info: UserInfo, methods: Vec<PasswordResetItem>) {
        let account = StoredAccount {
            search_indexing: info.enable_search_indexing.unwrap_or(true),
            recovery_enabled: info.recovery_enabled.unwrap_or(false),
            two_factor: info.require_two_factor_authentication.unwrap_or(false),
            password: None,
            methods,
        };
        self.lock().accounts.insert(handle.to_string(), account);
    }

    pub fn seed_domain(&self, domain: DomainInfo) {
        if let Some(name) = domain.name.clone() {
            self.lock().domains.insert(name, domain);
        }
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    pub fn mutations(&self) -> Vec<ApiCall> {
        self.lock().calls.iter().filter(|c| c.is_mutation()).cloned().collect()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.lock().calls.iter().filter(|c| c.kind() == kind).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn account(&self, handle: &str) -> Option<UserInfo> {
        self.lock().accounts.get(handle).map(|a| UserInfo {
            enable_search_indexing: Some(a.search_indexing),
            recovery_enabled: Some(a.recovery_enabled),
            require_two_factor_authentication: Some(a.two_factor),
        })
    }

    pub fn methods(&self, handle: &str) -> Vec<PasswordResetItem> {
        self.lock().accounts.get(handle).map(|a| a.methods.clone()).unwrap_or_default()
    }

    pub fn password(&self, handle: &str) -> Option<String> {
        self.lock().accounts.get(handle).and_then(|a| a.password.clone())
    }

    pub fn domain(&self, name: &str) -> Option<DomainInfo> {
        self.lock().domains.get(name).cloned()
    }

    pub fn routing_rules(&self) -> Vec<RoutingRuleInfo> {
        self.lock().rules.clone()
    }

    pub fn app_passwords(&self) -> Vec<String> {
        self.lock().app_passwords.keys().cloned().collect()
    }

    /// Runs `handler` against the locked state, after the request latency and
    /// before the reply latency. An injected failure replaces the handler.
    async fn serve<T, F>(&self, call: ApiCall, handler: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut FakeState) -> Result<T, ApiError>,
    {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let hook = self.hook.lock().unwrap_or_else(|p| p.into_inner()).clone();
        if let Some(hook) = hook {
            hook(&call);
        }

        let result = self.process(call, handler);
        if let Some(latency) = self.reply_latency {
            tokio::time::sleep(latency).await;
        }
        result
    }

    fn process<T, F>(&self, call: ApiCall, handler: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut FakeState) -> Result<T, ApiError>,
    {
        debug!("fake api: {:?}", call);
        let kind = call.kind();
        let mut state = self.lock();
        state.calls.push(call);

        if let Some(pos) = state.failures.iter().position(|f| f.kind == kind) {
            if state.failures[pos].skip == 0 {
                let failure = state.failures.remove(pos);
                return Err(failure.error);
            }
            state.failures[pos].skip -= 1;
        }
        handler(&mut state)
    }
}

#[async_trait]
impl AccountApi for InMemoryApi {
    async fn create_account(&self, request: CreateUserRequest) -> Result<(), ApiError> {
        let handle = request.user_name.clone();
        self.serve(ApiCall::CreateAccount(request), move |state| {
            if state.accounts.contains_key(&handle) {
                return Err(rejected("User already exists"));
            }
            state.accounts.insert(handle, StoredAccount::default());
            Ok(())
        })
        .await
    }

    async fn modify_account(&self, request: ModifyUserRequest) -> Result<(), ApiError> {
        self.serve(ApiCall::ModifyAccount(request.clone()), move |state| {
            let account = state.accounts.get(&request.user_name).ok_or_else(|| not_found("User not found"))?;
            if request.require_two_factor_authentication == Some(true) && account.methods.is_empty() {
                return Err(rejected(
                    "At least one password reset method is required to enable two-factor authentication",
                ));
            }

            let mut handle = request.user_name.clone();
            if let Some(new_name) = request.new_user_name.as_ref().filter(|n| **n != request.user_name) {
                if state.accounts.contains_key(new_name) {
                    return Err(rejected("Target user name is already taken"));
                }
                if let Some(moved) = state.accounts.remove(&handle) {
                    state.accounts.insert(new_name.clone(), moved);
                }
                handle = new_name.clone();
            }

            if let Some(account) = state.accounts.get_mut(&handle) {
                if let Some(password) = &request.new_password {
                    account.password = Some(password.clone());
                }
                if let Some(v) = request.enable_search_indexing {
                    account.search_indexing = v;
                }
                if let Some(v) = request.enable_password_reset {
                    account.recovery_enabled = v;
                }
                if let Some(v) = request.require_two_factor_authentication {
                    account.two_factor = v;
                }
            }
            Ok(())
        })
        .await
    }

    async fn get_account(&self, handle: &str) -> Result<UserInfo, ApiError> {
        self.serve(ApiCall::GetAccount(handle.to_string()), |state| {
            let account = state.accounts.get(handle).ok_or_else(|| not_found("User not found"))?;
            Ok(UserInfo {
                enable_search_indexing: Some(account.search_indexing),
                recovery_enabled: Some(account.recovery_enabled),
                require_two_factor_authentication: Some(account.two_factor),
            })
        })
        .await
    }

    async fn delete_account(&self, handle: &str) -> Result<(), ApiError> {
        self.serve(ApiCall::DeleteAccount(handle.to_string()), |state| {
            state.accounts.remove(handle).map(|_| ()).ok_or_else(|| not_found("User not found"))
        })
        .await
    }

    async fn upsert_recovery_method(&self, request: UpsertPasswordResetRequest) -> Result<(), ApiError> {
        self.serve(ApiCall::UpsertRecoveryMethod(request.clone()), move |state| {
            if request.kind != "email" && request.kind != "phone" {
                return Err(rejected("Unsupported password reset method type"));
            }
            let account =
                state.accounts.get_mut(&request.user_name).ok_or_else(|| not_found("User not found"))?;

            let item = PasswordResetItem {
                kind: Some(request.kind.clone()),
                target: Some(request.target.clone()),
                description: request.description.clone(),
                allow_mfa_reset: Some(request.allow_mfa_reset.unwrap_or(false)),
            };
            let lookup = request.existing_target.as_deref().unwrap_or(&request.target);
            match account.methods.iter().position(|m| m.target.as_deref() == Some(lookup)) {
                Some(pos) => account.methods[pos] = item,
                None => account.methods.push(item),
            }
            Ok(())
        })
        .await
    }

    async fn delete_recovery_method(&self, request: DeletePasswordResetRequest) -> Result<(), ApiError> {
        self.serve(ApiCall::DeleteRecoveryMethod(request.clone()), move |state| {
            let account =
                state.accounts.get_mut(&request.user_name).ok_or_else(|| not_found("User not found"))?;
            let pos = account
                .methods
                .iter()
                .position(|m| m.target.as_deref() == Some(request.target.as_str()))
                .ok_or_else(|| not_found("Password reset method not found"))?;
            if account.two_factor && account.methods.len() == 1 {
                return Err(rejected(
                    "Cannot remove the last password reset method while two-factor authentication is required",
                ));
            }
            account.methods.remove(pos);
            Ok(())
        })
        .await
    }

    async fn list_recovery_methods(&self, handle: &str) -> Result<Vec<PasswordResetItem>, ApiError> {
        self.serve(ApiCall::ListRecoveryMethods(handle.to_string()), |state| {
            state.accounts.get(handle).map(|a| a.methods.clone()).ok_or_else(|| not_found("User not found"))
        })
        .await
    }
}

#[async_trait]
impl DirectoryApi for InMemoryApi {
    async fn add_domain(&self, domain_name: &str) -> Result<(), ApiError> {
        self.serve(ApiCall::AddDomain(domain_name.to_string()), |state| {
            if state.domains.contains_key(domain_name) {
                return Err(rejected("Domain already added"));
            }
            let domain = DomainInfo {
                name: Some(domain_name.to_string()),
                allow_account_reset: Some(false),
                symbolic_subaddressing: Some(false),
                is_shared: Some(false),
                dns_summary: Some(DnsSummary {
                    passes_mx: Some(true),
                    passes_spf: Some(true),
                    passes_dkim: Some(false),
                    passes_dmarc: Some(false),
                }),
            };
            state.domains.insert(domain_name.to_string(), domain);
            Ok(())
        })
        .await
    }

    async fn update_domain_settings(&self, request: UpdateDomainSettingsRequest) -> Result<(), ApiError> {
        self.serve(ApiCall::UpdateDomainSettings(request.clone()), move |state| {
            let domain = state.domains.get_mut(&request.name).ok_or_else(|| not_found("Domain not found"))?;
            if let Some(v) = request.allow_account_reset {
                domain.allow_account_reset = Some(v);
            }
            if let Some(v) = request.symbolic_subaddressing {
                domain.symbolic_subaddressing = Some(v);
            }
            if request.recheck_dns == Some(true) {
                domain.dns_summary = Some(DnsSummary {
                    passes_mx: Some(true),
                    passes_spf: Some(true),
                    passes_dkim: Some(true),
                    passes_dmarc: Some(true),
                });
            }
            Ok(())
        })
        .await
    }

    async fn list_domains(&self, include_shared: bool) -> Result<Vec<DomainInfo>, ApiError> {
        self.serve(ApiCall::ListDomains(include_shared), |state| {
            Ok(state
                .domains
                .values()
                .filter(|d| include_shared || !d.is_shared.unwrap_or(false))
                .cloned()
                .collect())
        })
        .await
    }

    async fn delete_domain(&self, domain_name: &str) -> Result<(), ApiError> {
        self.serve(ApiCall::DeleteDomain(domain_name.to_string()), |state| {
            state.domains.remove(domain_name).map(|_| ()).ok_or_else(|| not_found("Domain not found"))
        })
        .await
    }

    async fn get_ownership_code(&self) -> Result<String, ApiError> {
        self.serve(ApiCall::GetOwnershipCode, |_| Ok(OWNERSHIP_CODE.to_string())).await
    }

    async fn create_routing_rule(&self, request: CreateRoutingRequest) -> Result<(), ApiError> {
        self.serve(ApiCall::CreateRoutingRule(request.clone()), move |state| {
            state.next_rule_id += 1;
            let rule = RoutingRuleInfo {
                id: Some(state.next_rule_id),
                domain_name: Some(request.domain_name),
                prefix: Some(request.prefix),
                match_user: Some(request.match_user),
                target_addresses: Some(request.target_addresses),
                catchall: Some(request.catchall.unwrap_or(false)),
            };
            state.rules.push(rule);
            Ok(())
        })
        .await
    }

    async fn delete_routing_rule(&self, rule_id: i64) -> Result<(), ApiError> {
        self.serve(ApiCall::DeleteRoutingRule(rule_id), |state| {
            let pos = state
                .rules
                .iter()
                .position(|r| r.id == Some(rule_id))
                .ok_or_else(|| not_found("Routing rule not found"))?;
            state.rules.remove(pos);
            Ok(())
        })
        .await
    }

    async fn list_routing_rules(&self) -> Result<Vec<RoutingRuleInfo>, ApiError> {
        self.serve(ApiCall::ListRoutingRules, |state| Ok(state.rules.clone())).await
    }

    async fn create_app_password(&self, request: CreateAppPasswordRequest) -> Result<String, ApiError> {
        self.serve(ApiCall::CreateAppPassword(request.clone()), move |state| {
            state.next_app_password += 1;
            let secret = format!("app-password-{}", state.next_app_password);
            state.app_passwords.insert(secret.clone(), request.user_handle);
            Ok(secret)
        })
        .await
    }

    async fn delete_app_password(&self, app_password: &str) -> Result<(), ApiError> {
        self.serve(ApiCall::DeleteAppPassword(app_password.to_string()), |state| {
            state.app_passwords.remove(app_password).map(|_| ()).ok_or_else(|| not_found("App password not found"))
        })
        .await
    }
}
