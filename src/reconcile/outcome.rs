// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::error::{ConvergeFailure, ConvergeWarning};

/// Result of a successful create or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converged<S> {
    pub state: S,
    pub warnings: Vec<ConvergeWarning>,
}

impl<S> Converged<S> {
    pub fn clean(state: S) -> Self {
        Self { state, warnings: Vec::new() }
    }

    pub fn map<U>(self, f: impl FnOnce(S) -> U) -> Converged<U> {
        Converged { state: f(self.state), warnings: self.warnings }
    }
}

/// A read either finds the resource or reports it gone. Gone is not an error:
/// the caller stops tracking the resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome<S> {
    Found(S),
    NotFound,
}

impl<S> ReadOutcome<S> {
    pub fn found(self) -> Option<S> {
        match self {
            ReadOutcome::Found(state) => Some(state),
            ReadOutcome::NotFound => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ReadOutcome::NotFound)
    }
}

pub type ConvergeResult<S> = Result<Converged<S>, ConvergeFailure<S>>;
