// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Convergence of desired configuration against observed remote state.

pub mod account;
pub mod context;
pub mod differ;
pub mod error;
pub mod gate;
pub mod methods;
pub mod outcome;

pub use account::{AccountFailure, AccountReconciler};
pub use context::ConvergeContext;
pub use differ::MethodOp;
pub use error::{ConvergeFailure, ConvergeWarning, ReconcileError, Step};
pub use gate::{GateDecision, GateInput, GateVeto};
pub use outcome::{ConvergeResult, Converged, ReadOutcome};
