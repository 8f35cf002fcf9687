// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Plans the operations that turn one recovery-method set into another.
//!
//! Both sides are keyed by target. The target is part of a method's identity,
//! so a method whose target changed shows up as a delete of the old target plus
//! an upsert of the new one. Input order never matters: the plan is built from
//! sorted maps and comes out the same for any permutation of either side.

use std::collections::BTreeMap;

use super::error::ReconcileError;
use crate::model::RecoveryMethod;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodOp {
    Delete { target: String },
    Upsert(RecoveryMethod),
}

impl MethodOp {
    pub fn target(&self) -> &str {
        match self {
            MethodOp::Delete { target } => target,
            MethodOp::Upsert(method) => &method.target,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, MethodOp::Delete { .. })
    }
}

/// Keys the desired collection by target, rejecting repeats.
pub fn index_desired(desired: &[RecoveryMethod]) -> Result<BTreeMap<&str, &RecoveryMethod>, ReconcileError> {
    let mut by_target = BTreeMap::new();
    for method in desired {
        if by_target.insert(method.target.as_str(), method).is_some() {
            return Err(ReconcileError::DuplicateTarget(method.target.clone()));
        }
    }
    Ok(by_target)
}

/// Deletes for every observed target that is no longer desired, then upserts
/// for every desired method that is new or differs from what was observed.
/// Unchanged methods produce nothing.
pub fn plan(observed: &[RecoveryMethod], desired: &[RecoveryMethod]) -> Result<Vec<MethodOp>, ReconcileError> {
    let desired = index_desired(desired)?;
    let observed: BTreeMap<&str, &RecoveryMethod> = observed.iter().map(|m| (m.target.as_str(), m)).collect();

    let deletes = observed
        .keys()
        .filter(|target| !desired.contains_key(*target))
        .map(|target| MethodOp::Delete { target: target.to_string() });

    let upserts = desired
        .iter()
        .filter(|(target, method)| observed.get(*target).copied() != Some(*method))
        .map(|(_, method)| MethodOp::Upsert((*method).clone()));

    Ok(deletes.chain(upserts).collect())
}
