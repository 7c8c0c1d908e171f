// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pagecull — remove empty pages from PDF documents.
//
// Entry point. Initialises logging, loads the run configuration, checks for
// the PDFium renderer and processes every PDF named on the command line.
//
// A PATH that is a directory contributes the `.pdf` files directly inside it.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use pagecull_core::config::RunConfig;
use pagecull_core::error::Result;
use pagecull_core::{FileResult, FileStatus};
use pagecull_document::{PdfiumRasterizer, Rasterizer, is_edited_output, process_pdf};

const DEFAULT_CONFIG: &str = "pagecull.json";

#[derive(Debug, Parser)]
#[command(name = "pagecull", version, about = "Remove empty pages from PDF documents")]
struct Cli {
    /// PDF files, or directories whose `.pdf` files are processed.
    #[arg(value_name = "PATH", required = true)]
    paths: Vec<PathBuf>,
    /// Write edited documents here instead of next to each input.
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,
    /// JSON run configuration; defaults to `$PAGECULL_CONFIG` or `pagecull.json`.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(cli) {
        Ok(results) if results.iter().any(|r| r.status == FileStatus::Failed) => ExitCode::from(2),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "pagecull aborted");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<Vec<FileResult>> {
    let config_path = cli
        .config
        .or_else(|| std::env::var_os("PAGECULL_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = RunConfig::load_or_default(&config_path)?;
    tracing::info!(config = %config_path.display(), mode = config.mode.as_str(), "pagecull starting");

    let pdfium = match PdfiumRasterizer::new() {
        Ok(renderer) => Some(renderer),
        Err(e) => {
            tracing::warn!(error = %e, "PDFium unavailable; render detection and stamping disabled");
            None
        }
    };
    let rasterizer = pdfium.as_ref().map(|r| r as &dyn Rasterizer);

    let inputs = discover(&cli.paths)?;
    let mut results = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let result = process_pdf(input, cli.out_dir.as_deref(), &config, rasterizer);
        println!("{}", serde_json::to_string(&result)?);
        results.push(result);
    }

    let failed = results.iter().filter(|r| r.status == FileStatus::Failed).count();
    let removed: usize = results.iter().map(|r| r.pages_removed).sum();
    tracing::info!(files = results.len(), failed, pages_removed = removed, "Run complete");
    Ok(results)
}

/// Expand directories one level and drop anything that is not a source PDF.
fn discover(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file())
                .collect();
            entries.sort();
            found.extend(entries.into_iter().filter(|p| is_source_pdf(p)));
        } else if is_source_pdf(path) {
            found.push(path.clone());
        } else {
            tracing::debug!(path = %path.display(), "Skipping non-PDF or edited output");
        }
    }
    Ok(found)
}

fn is_source_pdf(path: &Path) -> bool {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    is_pdf && !is_edited_output(path)
}
