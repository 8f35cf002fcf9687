// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Entities with no ordering constraints beyond "one call at a time".

pub mod app_password;
pub mod domain;
pub mod ownership;
pub mod recovery_method;
pub mod routing_rule;

pub use app_password::{AppPasswordConfig, AppPasswordResource, AppPasswordState};
pub use domain::{DomainConfig, DomainResource, DomainState};
pub use ownership::ownership_code;
pub use recovery_method::{MethodKey, RecoveryMethodResource, StandaloneMethod};
pub use routing_rule::{RoutingRuleConfig, RoutingRuleResource, RoutingRuleState};
