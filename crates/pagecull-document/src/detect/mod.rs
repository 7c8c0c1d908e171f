// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Detection module — structural and render emptiness detectors and the
// combiner that merges their verdicts.

pub mod combine;
pub mod render;
pub mod structural;

pub use combine::{combine, summarize};
pub use render::{RenderDetector, RenderReport};
pub use structural::{StructuralDetector, StructuralReport, VisibilityState};
