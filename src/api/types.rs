// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Request and response bodies for the remote account API.
//!
//! Every endpoint takes a JSON object and answers with `{"result": ...}`.
//! Optional request fields are left out of the body entirely when unset, the
//! server treats a missing field as "leave unchanged".

use serde::{Deserialize, Serialize};

/// `{"result": T}` wrapper shared by every successful response.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub result: Option<T>,
}

// --- Accounts ---

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub user_name: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModifyUserRequest {
    pub user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_search_indexing: Option<bool>,
    /// Legacy account-recovery switch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_password_reset: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_two_factor_authentication: Option<bool>,
}

impl ModifyUserRequest {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self { user_name: user_name.into(), ..Default::default() }
    }

    /// True when the request would not change anything server-side.
    pub fn is_empty(&self) -> bool {
        self.new_user_name.is_none()
            && self.new_password.is_none()
            && self.enable_search_indexing.is_none()
            && self.enable_password_reset.is_none()
            && self.require_two_factor_authentication.is_none()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserNameRequest {
    pub user_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default)]
    pub enable_search_indexing: Option<bool>,
    #[serde(default)]
    pub recovery_enabled: Option<bool>,
    #[serde(default)]
    pub require_two_factor_authentication: Option<bool>,
}

// --- Recovery (password reset) methods ---

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpsertPasswordResetRequest {
    pub user_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub target: String,
    /// Set when an existing method is being moved to a new target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_mfa_reset: Option<bool>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeletePasswordResetRequest {
    pub user_name: String,
    pub target: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetItem {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub allow_mfa_reset: Option<bool>,
}

/// The list endpoint nests the methods under a field called `users`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PasswordResetList {
    #[serde(default)]
    pub users: Option<Vec<PasswordResetItem>>,
}

// --- Domains ---

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddDomainRequest {
    pub domain_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DomainNameRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDomainSettingsRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_account_reset: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbolic_subaddressing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recheck_dns: Option<bool>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListDomainsRequest {
    pub include_shared: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DnsSummary {
    #[serde(default)]
    pub passes_mx: Option<bool>,
    #[serde(default)]
    pub passes_spf: Option<bool>,
    #[serde(default)]
    pub passes_dkim: Option<bool>,
    #[serde(default)]
    pub passes_dmarc: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DomainInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub allow_account_reset: Option<bool>,
    #[serde(default)]
    pub symbolic_subaddressing: Option<bool>,
    #[serde(default)]
    pub is_shared: Option<bool>,
    #[serde(default)]
    pub dns_summary: Option<DnsSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainList {
    #[serde(default)]
    pub domains: Option<Vec<DomainInfo>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnershipCode {
    #[serde(default)]
    pub code: Option<String>,
}

// --- Routing rules ---

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoutingRequest {
    pub domain_name: String,
    pub prefix: bool,
    pub match_user: String,
    pub target_addresses: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catchall: Option<bool>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRoutingRequest {
    pub routing_rule_id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRuleInfo {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub domain_name: Option<String>,
    #[serde(default)]
    pub prefix: Option<bool>,
    #[serde(default)]
    pub match_user: Option<String>,
    #[serde(default)]
    pub target_addresses: Option<Vec<String>>,
    #[serde(default)]
    pub catchall: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingRuleList {
    #[serde(default)]
    pub rules: Option<Vec<RoutingRuleInfo>>,
}

// --- App passwords ---

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppPasswordRequest {
    pub user_handle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedAppPassword {
    #[serde(default)]
    pub app_password: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAppPasswordRequest {
    pub app_password: String,
}
