// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for pagecull.

use thiserror::Error;

/// Top-level error type for all pagecull operations.
///
/// Only configuration, read, and serialisation failures are fatal for a file.
/// Structure, render, and outline failures are normally degraded into
/// fail-open decisions or warnings by the component that catches them.
#[derive(Debug, Error)]
pub enum PagecullError {
    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Input documents --
    #[error("document is encrypted")]
    Encrypted,

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("malformed page structure: {0}")]
    Structure(String),

    // -- Rendering --
    #[error("rendering backend unavailable: {0}")]
    RendererUnavailable(String),

    #[error("rendering page {page} failed: {message}")]
    Render { page: usize, message: String },

    // -- Rewriting --
    #[error("outline copy failed: {0}")]
    OutlineCopy(String),

    #[error("page-number stamping failed: {0}")]
    Stamp(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PagecullError>;
