// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

// Integration tests for mailforge
// This module organizes all integration tests

#[path = "../common/mod.rs"]
pub mod common;

pub mod account_lifecycle;
pub mod cli_app;
pub mod interruption;
