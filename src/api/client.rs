// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

use super::error::ApiError;
use super::types::*;
use super::{AccountApi, DirectoryApi};
use crate::config::Settings;

pub const DEFAULT_ENDPOINT: &str = "https://purelymail.com";
const TOKEN_HEADER: &str = "Purelymail-Api-Token";
const API_PREFIX: &str = "api/v0/";

/// JSON-over-HTTP client for the mailbox provider's API.
///
/// Every operation is a `POST {endpoint}/api/v0/{operation}` carrying the API
/// token in a header.
#[derive(Clone)]
pub struct HttpApiClient {
    http_client: Client,
    base_url: Url,
    api_token: Option<String>,
    timeout: Duration,
}

impl std::fmt::Debug for HttpApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpApiClient {
    pub fn new(endpoint: &str, api_token: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        let mut base_url =
            Url::parse(endpoint).map_err(|e| ApiError::Transport(format!("invalid endpoint '{}': {}", endpoint, e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        if api_token.is_none() {
            warn!("No API token configured; the remote API will reject most requests");
        }
        Ok(Self { http_client: Client::new(), base_url, api_token, timeout })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ApiError> {
        Self::new(
            &settings.endpoint,
            settings.api_token.clone(),
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn operation_url(&self, operation: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(API_PREFIX)
            .and_then(|u| u.join(operation))
            .map_err(|e| ApiError::Transport(format!("invalid operation url '{}': {}", operation, e)))
    }

    async fn post<B, T>(&self, operation: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned + Default,
    {
        let url = self.operation_url(operation)?;
        debug!("POST {}", url);

        let mut request = self.http_client.post(url).json(body).timeout(self.timeout);
        if let Some(token) = &self.api_token {
            request = request.header(TOKEN_HEADER, token);
        }

        let response = request.send().await.map_err(|e| {
            error!("Request to {} failed: {}", operation, e);
            ApiError::from(e)
        })?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!("{} returned status {}", operation, status);
            debug!("{} error body: {}", operation, text);
            return Err(ApiError::from_response(status.as_u16(), &text));
        }

        if text.trim().is_empty() {
            return Ok(T::default());
        }
        let envelope: Envelope<T> = serde_json::from_str(&text)?;
        Ok(envelope.result.unwrap_or_default())
    }

    /// Posts an operation whose result body carries nothing we need.
    async fn call(&self, operation: &str, body: &(impl Serialize + Sync)) -> Result<(), ApiError> {
        self.post::<_, serde_json::Value>(operation, body).await.map(|_| ())
    }
}

#[async_trait]
impl AccountApi for HttpApiClient {
    async fn create_account(&self, request: CreateUserRequest) -> Result<(), ApiError> {
        self.call("createUser", &request).await
    }

    async fn modify_account(&self, request: ModifyUserRequest) -> Result<(), ApiError> {
        self.call("modifyUser", &request).await
    }

    async fn get_account(&self, handle: &str) -> Result<UserInfo, ApiError> {
        self.post("getUser", &UserNameRequest { user_name: handle.to_string() }).await
    }

    async fn delete_account(&self, handle: &str) -> Result<(), ApiError> {
        self.call("deleteUser", &UserNameRequest { user_name: handle.to_string() }).await
    }

    async fn upsert_recovery_method(&self, request: UpsertPasswordResetRequest) -> Result<(), ApiError> {
        self.call("upsertPasswordReset", &request).await
    }

    async fn delete_recovery_method(&self, request: DeletePasswordResetRequest) -> Result<(), ApiError> {
        self.call("deletePasswordReset", &request).await
    }

    async fn list_recovery_methods(&self, handle: &str) -> Result<Vec<PasswordResetItem>, ApiError> {
        let list: PasswordResetList =
            self.post("listPasswordResetMethods", &UserNameRequest { user_name: handle.to_string() }).await?;
        Ok(list.users.unwrap_or_default())
    }
}

#[async_trait]
impl DirectoryApi for HttpApiClient {
    async fn add_domain(&self, domain_name: &str) -> Result<(), ApiError> {
        self.call("addDomain", &AddDomainRequest { domain_name: domain_name.to_string() }).await
    }

    async fn update_domain_settings(&self, request: UpdateDomainSettingsRequest) -> Result<(), ApiError> {
        self.call("updateDomainSettings", &request).await
    }

    async fn list_domains(&self, include_shared: bool) -> Result<Vec<DomainInfo>, ApiError> {
        let list: DomainList = self.post("listDomains", &ListDomainsRequest { include_shared }).await?;
        Ok(list.domains.unwrap_or_default())
    }

    async fn delete_domain(&self, domain_name: &str) -> Result<(), ApiError> {
        self.call("deleteDomain", &DomainNameRequest { name: domain_name.to_string() }).await
    }

    async fn get_ownership_code(&self) -> Result<String, ApiError> {
        let code: OwnershipCode = self.post("getOwnershipCode", &serde_json::json!({})).await?;
        code.code.ok_or_else(|| ApiError::Decode("ownership code missing from response".to_string()))
    }

    async fn create_routing_rule(&self, request: CreateRoutingRequest) -> Result<(), ApiError> {
        self.call("createRoutingRule", &request).await
    }

    async fn delete_routing_rule(&self, rule_id: i64) -> Result<(), ApiError> {
        self.call("deleteRoutingRule", &DeleteRoutingRequest { routing_rule_id: rule_id }).await
    }

    async fn list_routing_rules(&self) -> Result<Vec<RoutingRuleInfo>, ApiError> {
        let list: RoutingRuleList = self.post("listRoutingRules", &serde_json::json!({})).await?;
        Ok(list.rules.unwrap_or_default())
    }

    async fn create_app_password(&self, request: CreateAppPasswordRequest) -> Result<String, ApiError> {
        let created: CreatedAppPassword = self.post("createAppPassword", &request).await?;
        created
            .app_password
            .ok_or_else(|| ApiError::Decode("app password missing from response".to_string()))
    }

    async fn delete_app_password(&self, app_password: &str) -> Result<(), ApiError> {
        self.call("deleteAppPassword", &DeleteAppPasswordRequest { app_password: app_password.to_string() })
            .await
    }
}
