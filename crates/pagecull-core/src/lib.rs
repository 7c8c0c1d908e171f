// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pagecull — Core types, configuration, and error definitions shared across
// all crates.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod types;

pub use config::{RunConfig, StampSettings};
pub use diagnostics::{ContentPreview, RenderDebugRecord, StructuralDebugRecord};
pub use error::PagecullError;
pub use types::*;
