// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::api::ApiError;

/// Cancellation and deadline for one convergence pass.
///
/// Every remote call goes through [`ConvergeContext::run`], which refuses to
/// start once the pass is cancelled or past its deadline. Cancellation lets a
/// call already in flight finish. The deadline does not: a call it cuts off
/// fails with [`ApiError::Abandoned`] and may still have been applied.
#[derive(Debug, Clone, Default)]
pub struct ConvergeContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl ConvergeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// A context with neither cancellation nor deadline, for the one read that
    /// reports what an interrupted pass left behind.
    pub fn detached(&self) -> Self {
        Self::default()
    }

    pub fn check(&self) -> Result<(), ApiError> {
        if self.cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        if matches!(self.deadline, Some(deadline) if Instant::now() >= deadline) {
            return Err(ApiError::DeadlineExceeded);
        }
        Ok(())
    }

    pub async fn run<T, F>(&self, call: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        self.check()?;
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, call)
                .await
                .unwrap_or(Err(ApiError::Abandoned)),
            None => call.await,
        }
    }
}
