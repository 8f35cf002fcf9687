// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Remote account API: the traits the reconcilers call through, the HTTP
//! implementation and an in-memory stand-in.

pub mod client;
pub mod error;
pub mod fake;
pub mod types;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

pub use client::HttpApiClient;
pub use error::ApiError;
pub use fake::InMemoryApi;

use types::{
    CreateAppPasswordRequest, CreateRoutingRequest, CreateUserRequest, DeletePasswordResetRequest,
    DomainInfo, ModifyUserRequest, PasswordResetItem, RoutingRuleInfo, UpdateDomainSettingsRequest,
    UpsertPasswordResetRequest, UserInfo,
};

/// Account and recovery-method operations.
///
/// Every call is a single remote request. Implementations do not retry and do
/// not sequence anything; ordering is the reconciler's job.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AccountApi: Send + Sync {
    async fn create_account(&self, request: CreateUserRequest) -> Result<(), ApiError>;

    /// Applies whichever fields of the request are set. `new_user_name` renames.
    async fn modify_account(&self, request: ModifyUserRequest) -> Result<(), ApiError>;

    /// Fails with [`ApiError::NotFound`] when the account does not exist.
    async fn get_account(&self, handle: &str) -> Result<UserInfo, ApiError>;

    async fn delete_account(&self, handle: &str) -> Result<(), ApiError>;

    /// Creates the method, or updates the one at `existing_target` (or `target`).
    async fn upsert_recovery_method(&self, request: UpsertPasswordResetRequest) -> Result<(), ApiError>;

    async fn delete_recovery_method(&self, request: DeletePasswordResetRequest) -> Result<(), ApiError>;

    async fn list_recovery_methods(&self, handle: &str) -> Result<Vec<PasswordResetItem>, ApiError>;
}

/// Domain, routing and credential operations that hang off an account.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DirectoryApi: Send + Sync {
    async fn add_domain(&self, domain_name: &str) -> Result<(), ApiError>;

    async fn update_domain_settings(&self, request: UpdateDomainSettingsRequest) -> Result<(), ApiError>;

    async fn list_domains(&self, include_shared: bool) -> Result<Vec<DomainInfo>, ApiError>;

    async fn delete_domain(&self, domain_name: &str) -> Result<(), ApiError>;

    /// The TXT record value that proves ownership of a domain before it is added.
    async fn get_ownership_code(&self) -> Result<String, ApiError>;

    async fn create_routing_rule(&self, request: CreateRoutingRequest) -> Result<(), ApiError>;

    async fn delete_routing_rule(&self, rule_id: i64) -> Result<(), ApiError>;

    async fn list_routing_rules(&self) -> Result<Vec<RoutingRuleInfo>, ApiError>;

    /// Returns the generated password. It is only ever shown once.
    async fn create_app_password(&self, request: CreateAppPasswordRequest) -> Result<String, ApiError>;

    async fn delete_app_password(&self, app_password: &str) -> Result<(), ApiError>;
}
