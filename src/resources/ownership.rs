// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use crate::api::DirectoryApi;
use crate::reconcile::{ConvergeContext, ConvergeFailure, Step};

/// Looks up the DNS TXT value that proves domain ownership.
pub async fn ownership_code(api: &Arc<dyn DirectoryApi>, ctx: &ConvergeContext) -> Result<String, ConvergeFailure<()>> {
    ctx.run(api.get_ownership_code())
        .await
        .map_err(|e| ConvergeFailure::bare(Step::GetOwnershipCode, e))
}
