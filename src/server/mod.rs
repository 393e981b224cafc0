// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod engine;
pub mod service;

pub use crate::server::engine::PbapServer;
pub use crate::server::service::PbapService;
