// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rewriter — materialise a keep-list as a new document next to the
// source, remapping bookmarks onto the surviving pages and optionally
// re-stamping page numbers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use pagecull_core::error::{PagecullError, Result};
use pagecull_core::{BookmarkPolicy, RewriteResult};
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::pdf::reader::{OutlineEntry, PdfReader};
use crate::pdf::writer::{OutlineHandle, PdfWriter, write_atomic};
use crate::stamp::Stamper;

// -- Output naming ------------------------------------------------------------

/// `<stem>.edited.pdf` or `<stem>.edited.<n>.pdf`, ignoring case.
static EDITED_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\.edited(?:\.[0-9]+)?\.pdf\z").ok());

/// Whether `path` is named like a rewrite output.
pub fn is_edited_output(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    EDITED_NAME.as_ref().is_some_and(|pattern| pattern.is_match(name))
}

/// First free output path for `input` inside `out_dir`, creating the
/// directory if needed. A warning is returned when the plain name was taken.
pub fn edited_output_path(input: &Path, out_dir: &Path) -> Result<(PathBuf, Vec<String>)> {
    std::fs::create_dir_all(out_dir)?;
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let candidate = out_dir.join(format!("{stem}.edited.pdf"));
    if !candidate.exists() {
        return Ok((candidate, Vec::new()));
    }

    let mut counter = 1u32;
    loop {
        let candidate = out_dir.join(format!("{stem}.edited.{counter}.pdf"));
        if !candidate.exists() {
            let name = candidate
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            warn!(path = %candidate.display(), "Output name taken; using a numbered name");
            return Ok((
                candidate,
                vec![format!("Output path already existed; wrote to '{name}' instead.")],
            ));
        }
        counter += 1;
    }
}

// -- Rewriter -----------------------------------------------------------------

pub struct PageRewriter<'a> {
    reader: &'a PdfReader,
    bookmark_policy: BookmarkPolicy,
    stamper: Option<Stamper<'a>>,
}

impl<'a> PageRewriter<'a> {
    pub fn new(reader: &'a PdfReader, bookmark_policy: BookmarkPolicy) -> Self {
        Self {
            reader,
            bookmark_policy,
            stamper: None,
        }
    }

    /// Re-stamp page numbers on the retained pages before writing.
    pub fn with_stamper(mut self, stamper: Stamper<'a>) -> Self {
        self.stamper = Some(stamper);
        self
    }

    /// Write the pages listed in `keep` (ascending source indices) to
    /// `output`, which must carry an edited-output name and must not exist.
    #[instrument(skip_all, fields(output = %output.display(), keep = keep.len()))]
    pub fn rewrite(&self, keep: &[usize], output: &Path) -> Result<RewriteResult> {
        if !is_edited_output(output) {
            return Err(PagecullError::Config(
                "output path must follow the edited naming scheme \
                 ('<stem>.edited.pdf' or '<stem>.edited.<n>.pdf')"
                    .into(),
            ));
        }
        let page_count = self.reader.page_count();
        if keep.windows(2).any(|pair| pair[0] >= pair[1]) || keep.last().is_some_and(|last| *last >= page_count) {
            return Err(PagecullError::Config(format!(
                "pages to keep must be ascending, unique and below {page_count}"
            )));
        }
        if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let full_keep = keep.len() == page_count;
        let mut result = RewriteResult {
            output_path: output.to_path_buf(),
            pages_output: keep.len(),
            outlines_copied: 0,
            outlines_dropped: 0,
            stamp_decisions: Vec::new(),
            warnings: Vec::new(),
        };

        if full_keep && self.stamper.is_none() {
            write_atomic(output, self.reader.source_bytes())?;
            result.outlines_copied = self.source_outline_count();
            info!("Source copied unchanged");
            return Ok(result);
        }

        let mut writer = if full_keep {
            result.outlines_copied = self.source_outline_count();
            PdfWriter::clone_of(self.reader)?
        } else {
            self.select(keep, &mut result)?
        };

        if let Some(stamper) = &self.stamper {
            let outcome = stamper.stamp(&mut writer)?;
            result.stamp_decisions = outcome.decisions;
            result.warnings.extend(outcome.warnings);
        }

        let bytes = writer.serialize()?;
        write_atomic(output, &bytes)?;
        info!(
            pages = result.pages_output,
            outlines_copied = result.outlines_copied,
            outlines_dropped = result.outlines_dropped,
            "Rewrite complete"
        );
        Ok(result)
    }

    fn source_outline_count(&self) -> usize {
        self.reader
            .outlines()
            .map(|entries| entries.iter().map(OutlineEntry::item_count).sum())
            .unwrap_or(0)
    }

    fn select(&self, keep: &[usize], result: &mut RewriteResult) -> Result<PdfWriter> {
        let mut writer = PdfWriter::for_selection(self.reader)?;
        let source_ids = self.reader.page_ids();
        for &index in keep {
            writer.add_page(source_ids[index])?;
        }
        for (key, value) in self.reader.metadata() {
            writer.set_metadata(key, value);
        }

        match self.bookmark_policy {
            BookmarkPolicy::Drop => {
                let index_map: HashMap<usize, usize> = keep
                    .iter()
                    .enumerate()
                    .map(|(new_index, old_index)| (*old_index, new_index))
                    .collect();
                self.remap_outlines(&mut writer, &index_map, result);
            }
        }

        let named = self.reader.named_destination_count();
        if named > 0 {
            result
                .warnings
                .push(format!("Dropped {named} named destination(s) during rewrite."));
        }
        Ok(writer)
    }

    fn remap_outlines(&self, writer: &mut PdfWriter, index_map: &HashMap<usize, usize>, result: &mut RewriteResult) {
        let entries = match self.reader.outlines() {
            Ok(entries) => entries,
            Err(err) => {
                warn!(%err, "Outline tree unreadable; dropping all bookmarks");
                result
                    .warnings
                    .push(format!("Dropped all outlines due to outline read error: {err}"));
                return;
            }
        };

        let mut tally = OutlineTally::default();
        if let Err(err) = remap_level(writer, &entries, None, index_map, &mut tally) {
            warn!(%err, "Outline copy failed; dropping all bookmarks");
            writer.clear_outlines();
            result
                .warnings
                .push(format!("Dropped all outlines due to outline copy error: {err}"));
            return;
        }

        debug!(copied = tally.copied, dropped = tally.dropped, "Outlines remapped");
        result.outlines_copied = tally.copied;
        result.outlines_dropped = tally.dropped;
        if tally.dropped > 0 {
            result.warnings.push(format!(
                "Dropped {} outline item(s) that referenced removed or unsupported pages.",
                tally.dropped
            ));
        }
    }
}

#[derive(Default)]
struct OutlineTally {
    copied: usize,
    dropped: usize,
}

/// Depth-first copy. Children of a dropped entry attach to the nearest
/// surviving ancestor.
fn remap_level(
    writer: &mut PdfWriter,
    entries: &[OutlineEntry],
    parent: Option<OutlineHandle>,
    index_map: &HashMap<usize, usize>,
    tally: &mut OutlineTally,
) -> Result<()> {
    for entry in entries {
        let target = entry.page_index.and_then(|index| index_map.get(&index));
        let child_parent = match target {
            Some(&new_index) => {
                tally.copied += 1;
                Some(writer.add_outline_item(&entry.title, new_index, parent, entry.open)?)
            }
            None => {
                tally.dropped += 1;
                parent
            }
        };
        remap_level(writer, &entry.children, child_parent, index_map, tally)?;
    }
    Ok(())
}
