// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Desired and observed snapshots of a mailbox account.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placeholder written in a desired configuration for a value that will only
/// be known once something else has been applied.
pub const UNKNOWN_SENTINEL: &str = "(known after apply)";

/// A desired-configuration value: unset, not yet resolvable, or known.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Field<T> {
    #[default]
    Null,
    Unknown,
    Known(T),
}

impl<T> Field<T> {
    pub fn known(&self) -> Option<&T> {
        match self {
            Field::Known(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Field::Unknown)
    }

    pub fn from_option(value: Option<T>) -> Self {
        value.map(Field::Known).unwrap_or(Field::Null)
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Field::Known(value)
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Null => serializer.serialize_none(),
            Field::Unknown => serializer.serialize_str(UNKNOWN_SENTINEL),
            Field::Known(value) => value.serialize(serializer),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Option::<serde_json::Value>::deserialize(deserializer)? {
            None | Some(serde_json::Value::Null) => Ok(Field::Null),
            Some(serde_json::Value::String(s)) if s == UNKNOWN_SENTINEL => Ok(Field::Unknown),
            Some(value) => serde_json::from_value(value).map(Field::Known).map_err(de::Error::custom),
        }
    }
}

/// A secret string that never shows up in logs or debug output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Account password in one of its two mutually exclusive forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Credential {
    /// Kept in the observed snapshot so later passes can tell whether it changed.
    Tracked(Secret),
    /// Sent whenever configured and never persisted.
    WriteOnly(Secret),
}

impl Credential {
    pub fn secret(&self) -> &Secret {
        match self {
            Credential::Tracked(secret) | Credential::WriteOnly(secret) => secret,
        }
    }
}

/// Recovery method type. Types other than email and phone are kept as the
/// server spells them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MethodKind {
    Email,
    Phone,
    Other(String),
}

impl MethodKind {
    pub fn as_str(&self) -> &str {
        match self {
            MethodKind::Email => "email",
            MethodKind::Phone => "phone",
            MethodKind::Other(kind) => kind,
        }
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for MethodKind {
    fn from(kind: String) -> Self {
        match kind.to_ascii_lowercase().as_str() {
            "email" => MethodKind::Email,
            "phone" => MethodKind::Phone,
            _ => MethodKind::Other(kind),
        }
    }
}

impl From<MethodKind> for String {
    fn from(kind: MethodKind) -> Self {
        kind.as_str().to_string()
    }
}

impl FromStr for MethodKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("recovery method type is empty".to_string());
        }
        Ok(MethodKind::from(s.to_string()))
    }
}

/// A password-recovery method, identified within its account by `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryMethod {
    #[serde(rename = "type")]
    pub kind: MethodKind,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub allow_mfa_reset: bool,
}

impl RecoveryMethod {
    pub fn new(kind: MethodKind, target: impl Into<String>) -> Self {
        Self { kind, target: target.into(), description: None, allow_mfa_reset: false }
    }

    pub fn email(target: impl Into<String>) -> Self {
        Self::new(MethodKind::Email, target)
    }

    pub fn phone(target: impl Into<String>) -> Self {
        Self::new(MethodKind::Phone, target)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_mfa_reset(mut self, allow: bool) -> Self {
        self.allow_mfa_reset = allow;
        self
    }
}

/// What the caller wants an account to look like.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    pub handle: String,
    #[serde(default)]
    pub new_handle: Field<String>,
    #[serde(default)]
    pub credential: Field<Credential>,
    #[serde(default)]
    pub search_indexing: Field<bool>,
    #[serde(default)]
    pub require_two_factor: Field<bool>,
    /// Legacy account-recovery switch, separate from the method collection.
    #[serde(default)]
    pub recovery_enabled: Field<bool>,
    /// Unset means "no methods".
    #[serde(default)]
    pub recovery_methods: Field<Vec<RecoveryMethod>>,
}

impl AccountConfig {
    pub fn new(handle: impl Into<String>) -> Self {
        Self { handle: handle.into(), ..Default::default() }
    }

    /// The handle the account should end up with after this pass.
    pub fn target_handle(&self) -> &str {
        self.new_handle.known().map(String::as_str).unwrap_or(&self.handle)
    }
}

/// Last known remote reality for an account.
///
/// Flags are `None` until the account has been read at least once (an imported
/// snapshot starts out that way).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountState {
    pub handle: String,
    #[serde(default)]
    pub search_indexing: Option<bool>,
    #[serde(default)]
    pub require_two_factor: Option<bool>,
    #[serde(default)]
    pub recovery_enabled: Option<bool>,
    #[serde(default)]
    pub recovery_methods: Vec<RecoveryMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracked_credential: Option<Secret>,
}

impl AccountState {
    /// A snapshot that only knows the account's handle.
    pub fn seed(handle: impl Into<String>) -> Self {
        Self { handle: handle.into(), ..Default::default() }
    }

    pub fn two_factor_enabled(&self) -> bool {
        self.require_two_factor.unwrap_or(false)
    }

    pub fn method(&self, target: &str) -> Option<&RecoveryMethod> {
        self.recovery_methods.iter().find(|m| m.target == target)
    }

    /// The desired configuration that would leave this account untouched.
    pub fn as_config(&self) -> AccountConfig {
        AccountConfig {
            handle: self.handle.clone(),
            new_handle: Field::Null,
            credential: Field::from_option(self.tracked_credential.clone().map(Credential::Tracked)),
            search_indexing: Field::from_option(self.search_indexing),
            require_two_factor: Field::from_option(self.require_two_factor),
            recovery_enabled: Field::from_option(self.recovery_enabled),
            recovery_methods: Field::Known(self.recovery_methods.clone()),
        }
    }
}
