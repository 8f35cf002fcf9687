// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Library core for mailforge: converges Purelymail accounts, recovery
//! methods and two-factor settings onto a desired configuration.

// --- Modules ---
pub mod api;
pub mod cli;
pub mod config;
pub mod model;
pub mod reconcile;
pub mod resources;
pub mod state_store;

pub mod prelude {
    // Config
    pub use crate::config::Settings;

    // Remote API
    pub use crate::api::{AccountApi, ApiError, DirectoryApi, HttpApiClient};

    // Reconciliation
    pub use crate::model::{AccountConfig, AccountState, Credential, Field, MethodKind, RecoveryMethod, Secret};
    pub use crate::reconcile::{
        AccountFailure, AccountReconciler, ConvergeContext, ConvergeFailure, ConvergeResult, Converged, ReadOutcome,
        ReconcileError, Step,
    };
    pub use crate::state_store::StateStore;

    // Common Libs
    pub use log::{debug, error, info, trace, warn};
    pub use std::sync::Arc;
}
