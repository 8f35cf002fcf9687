// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fmt;
use thiserror::Error;

use super::gate::GateVeto;
use crate::api::ApiError;

/// The point in a lifecycle operation where something went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Plan,
    CreateAccount,
    DisableTwoFactor,
    ModifyAccount,
    DeleteRecoveryMethod(String),
    UpsertRecoveryMethod(String),
    EnableTwoFactor,
    DeleteAccount,
    ReadAccount,
    ListRecoveryMethods,
    AddDomain,
    UpdateDomainSettings,
    ListDomains,
    DeleteDomain,
    CreateRoutingRule,
    DeleteRoutingRule,
    ListRoutingRules,
    CreateAppPassword,
    DeleteAppPassword,
    GetOwnershipCode,
    Import,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Plan => write!(f, "planning"),
            Step::CreateAccount => write!(f, "create account"),
            Step::DisableTwoFactor => write!(f, "disable two-factor authentication"),
            Step::ModifyAccount => write!(f, "modify account"),
            Step::DeleteRecoveryMethod(target) => write!(f, "delete recovery method '{}'", target),
            Step::UpsertRecoveryMethod(target) => write!(f, "upsert recovery method '{}'", target),
            Step::EnableTwoFactor => write!(f, "enable two-factor authentication"),
            Step::DeleteAccount => write!(f, "delete account"),
            Step::ReadAccount => write!(f, "read account"),
            Step::ListRecoveryMethods => write!(f, "list recovery methods"),
            Step::AddDomain => write!(f, "add domain"),
            Step::UpdateDomainSettings => write!(f, "update domain settings"),
            Step::ListDomains => write!(f, "list domains"),
            Step::DeleteDomain => write!(f, "delete domain"),
            Step::CreateRoutingRule => write!(f, "create routing rule"),
            Step::DeleteRoutingRule => write!(f, "delete routing rule"),
            Step::ListRoutingRules => write!(f, "list routing rules"),
            Step::CreateAppPassword => write!(f, "create app password"),
            Step::DeleteAppPassword => write!(f, "delete app password"),
            Step::GetOwnershipCode => write!(f, "get ownership code"),
            Step::Import => write!(f, "import"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Recovery method target '{0}' appears more than once in the desired configuration")]
    DuplicateTarget(String),

    /// Refused locally before any call was made.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// The server refused the request (precondition, validation or auth failure).
    #[error("Remote API rejected the request with status {status}{}", suffix(.message))]
    Rejected { status: u16, message: Option<String> },

    #[error(transparent)]
    Api(ApiError),

    #[error("Invalid import id '{id}': {reason}")]
    InvalidImportId { id: String, reason: String },

    #[error("Unexpected recovery method from remote: {0}")]
    InvalidMethod(String),

    /// A resource that was just written could not be found again.
    #[error("{0} not found after it was written")]
    Vanished(String),
}

fn suffix(message: &Option<String>) -> String {
    message.as_deref().map(|m| format!(": {}", m)).unwrap_or_default()
}

impl From<ApiError> for ReconcileError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Status { status, message } if (400..500).contains(&status) => {
                ReconcileError::Rejected { status, message }
            }
            other => ReconcileError::Api(other),
        }
    }
}

impl From<GateVeto> for ReconcileError {
    fn from(veto: GateVeto) -> Self {
        ReconcileError::Precondition(veto.to_string())
    }
}

impl ReconcileError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReconcileError::Api(e) if e.is_not_found())
    }

    pub fn is_interrupt(&self) -> bool {
        matches!(self, ReconcileError::Api(e) if e.is_interrupt())
    }

    /// True when the caller has to change something before retrying.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, ReconcileError::Api(_))
    }
}

/// A lifecycle operation stopped at `step`.
///
/// `partial` carries whatever is known about the resource after the steps that
/// did succeed. Nothing is rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergeFailure<S> {
    pub step: Step,
    pub error: ReconcileError,
    pub partial: Option<S>,
}

impl<S> ConvergeFailure<S> {
    pub fn new(step: Step, error: impl Into<ReconcileError>, partial: Option<S>) -> Self {
        Self { step, error: error.into(), partial }
    }

    /// Failure with nothing to report about the resource.
    pub fn bare(step: Step, error: impl Into<ReconcileError>) -> Self {
        Self::new(step, error, None)
    }
}

impl<S> fmt::Display for ConvergeFailure<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.step, self.error)
    }
}

impl<S: fmt::Debug> std::error::Error for ConvergeFailure<S> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Something went wrong after every mutation had already succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergeWarning {
    ReadBackFailed { step: Step, error: ReconcileError },
}

impl fmt::Display for ConvergeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvergeWarning::ReadBackFailed { step, error } => {
                write!(f, "changes were applied but {} failed afterwards: {}", step, error)
            }
        }
    }
}
