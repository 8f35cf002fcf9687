// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Sequencing of the two-factor flag relative to recovery-method changes.
//!
//! The server only accepts two-factor as required while the account has at
//! least one recovery method. Turning it off therefore has to happen before the
//! method set is touched, and turning it on only after.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateInput {
    pub observed: bool,
    /// `None` when the desired flag is unset or not yet known.
    pub desired: Option<bool>,
    pub observed_methods: usize,
    /// `None` when the desired method collection is not yet known.
    pub desired_methods: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    NoOp,
    /// Send the disable before any method operation.
    DisableFirst,
    /// Send the enable after every method operation.
    EnableLast,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GateVeto {
    #[error(
        "two-factor authentication stays required but all {observed_methods} recovery method(s) would be removed; \
         disable two-factor authentication or keep at least one method"
    )]
    DrainWhileRequired { observed_methods: usize },
}

pub fn decide(input: GateInput) -> Result<GateDecision, GateVeto> {
    let after = input.desired.unwrap_or(input.observed);

    if input.observed && after && input.desired_methods == Some(0) && input.observed_methods > 0 {
        return Err(GateVeto::DrainWhileRequired { observed_methods: input.observed_methods });
    }

    Ok(match (input.observed, after) {
        (true, false) => GateDecision::DisableFirst,
        (false, true) => GateDecision::EnableLast,
        _ => GateDecision::NoOp,
    })
}
