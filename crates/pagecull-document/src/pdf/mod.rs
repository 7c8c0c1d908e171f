// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — typed reading, content-stream parsing, text strings, and
// output assembly.

pub mod content;
pub mod reader;
pub mod strings;
pub mod writer;

pub use reader::{OutlineEntry, PageContents, PageModel, PdfReader};
pub use writer::{OutlineHandle, PdfWriter, write_atomic};
