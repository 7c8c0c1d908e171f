// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Structural visibility interpreter — decides whether a page is empty from
// its resources and content-stream operators alone, tracking the graphics
// state that can make text or paths invisible.

use std::collections::BTreeMap;

use pagecull_core::{
    ContentPreview, DecisionDetails, DecisionReason, PageDecision, StructuralDebugRecord,
    StructuralDetails,
};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::pdf::content::{Instruction, Operator, OperatorCategory, is_blank, name, number, parse_content};
use crate::pdf::reader::{PageModel, PdfReader};

const PREVIEW_BYTES: usize = 200;

/// Graphics state that affects visibility, saved and restored by `q`/`Q`.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityState {
    pub fill_opacity: f32,
    pub stroke_opacity: f32,
    pub text_rendering_mode: i64,
    pub font_size: Option<f32>,
    /// Name of the last ExtGState applied with `gs`.
    pub extgstate_name: Option<String>,
}

impl Default for VisibilityState {
    fn default() -> Self {
        Self {
            fill_opacity: 1.0,
            stroke_opacity: 1.0,
            text_rendering_mode: 0,
            font_size: None,
            extgstate_name: None,
        }
    }
}

impl VisibilityState {
    fn fully_transparent(&self) -> bool {
        self.fill_opacity <= 0.0 && self.stroke_opacity <= 0.0
    }

    fn text_visible(&self) -> bool {
        self.text_rendering_mode != 3 && self.font_size != Some(0.0) && !self.fully_transparent()
    }
}

/// Decisions (and optional debug records) for every page of one document.
#[derive(Debug, Clone, Default)]
pub struct StructuralReport {
    pub decisions: Vec<PageDecision>,
    pub debug_records: Vec<StructuralDebugRecord>,
}

/// Classifies pages without rasterising them.
#[derive(Debug, Clone, Copy)]
pub struct StructuralDetector {
    treat_annotations_as_empty: bool,
    collect_debug: bool,
}

impl StructuralDetector {
    pub fn new(treat_annotations_as_empty: bool) -> Self {
        Self {
            treat_annotations_as_empty,
            collect_debug: false,
        }
    }

    /// Also produce a [`StructuralDebugRecord`] per page.
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.collect_debug = enabled;
        self
    }

    /// Classify every page of `reader` in order.
    ///
    /// Pages whose dictionaries cannot be resolved are kept with reason
    /// `unknown_structure`.
    #[instrument(skip_all, fields(pages = reader.page_count()))]
    pub fn detect(&self, reader: &PdfReader) -> StructuralReport {
        let mut report = StructuralReport::default();

        for index in 0..reader.page_count() {
            match reader.page(index) {
                Ok(page) => {
                    let (decision, record) = self.classify(&page);
                    report.decisions.push(decision);
                    report.debug_records.extend(record);
                }
                Err(err) => {
                    warn!(page = index, %err, "Unresolvable page structure; keeping page");
                    let details = StructuralDetails {
                        notes: vec![format!("error: {err}")],
                        ..StructuralDetails::default()
                    };
                    if self.collect_debug {
                        report.debug_records.push(StructuralDebugRecord {
                            page_index: index,
                            is_empty: false,
                            reason: DecisionReason::UnknownStructure,
                            resource_keys: Vec::new(),
                            font_names: Vec::new(),
                            xobject_names: Vec::new(),
                            extgstate_names: Vec::new(),
                            operator_counts: BTreeMap::new(),
                            content_streams: Vec::new(),
                            details: details.clone(),
                        });
                    }
                    report.decisions.push(PageDecision {
                        page_index: index,
                        is_empty: false,
                        reason: DecisionReason::UnknownStructure,
                        details: DecisionDetails::Structural(details),
                    });
                }
            }
        }

        debug!(
            empty = report.decisions.iter().filter(|d| d.is_empty).count(),
            "Structural detection complete"
        );
        report
    }

    /// Classify one resolved page.
    pub fn classify(&self, page: &PageModel) -> (PageDecision, Option<StructuralDebugRecord>) {
        let evaluation = evaluate(page, self.treat_annotations_as_empty);
        debug!(
            page = page.index,
            is_empty = evaluation.is_empty,
            reason = %evaluation.reason,
            "Structural verdict"
        );

        let record = self
            .collect_debug
            .then(|| debug_record(page, &evaluation));
        let decision = PageDecision {
            page_index: page.index,
            is_empty: evaluation.is_empty,
            reason: evaluation.reason,
            details: DecisionDetails::Structural(evaluation.details),
        };
        (decision, record)
    }
}

// -- Evaluation ---------------------------------------------------------------

struct Evaluation {
    is_empty: bool,
    reason: DecisionReason,
    details: StructuralDetails,
    operator_counts: BTreeMap<String, usize>,
}

fn evaluate(page: &PageModel, treat_annotations_as_empty: bool) -> Evaluation {
    let mut details = StructuralDetails {
        fonts_present: !page.resources.fonts.is_empty(),
        xobjects_present: !page.resources.xobjects.is_empty(),
        annotations_count: page.annotations_count,
        has_contents: page.contents.is_present(),
        ..StructuralDetails::default()
    };
    let finish = |is_empty, reason, details, operator_counts| Evaluation {
        is_empty,
        reason,
        details,
        operator_counts,
    };

    if details.xobjects_present {
        return finish(false, DecisionReason::HasXobject, details, BTreeMap::new());
    }
    if page.annotations_count > 0 && !treat_annotations_as_empty {
        return finish(false, DecisionReason::HasAnnotations, details, BTreeMap::new());
    }
    if !page.contents.is_present() {
        return finish(true, DecisionReason::NoContents, details, BTreeMap::new());
    }
    if page.contents.streams().into_iter().all(is_blank) {
        return finish(
            true,
            DecisionReason::ContentsWhitespaceOnly,
            details,
            BTreeMap::new(),
        );
    }

    let instructions = match parse_content(&page.contents.joined()) {
        Ok(instructions) => instructions,
        Err(err) => {
            details.notes.push(format!("error: content stream: {err}"));
            return finish(false, DecisionReason::UnknownStructure, details, BTreeMap::new());
        }
    };

    let mut interpreter = Interpreter::new(page, details);
    let outcome = interpreter.run(&instructions);
    let Interpreter {
        mut details,
        operator_counts,
        ..
    } = interpreter;

    match outcome {
        Ok(Some(reason)) => finish(false, reason, details, operator_counts),
        Ok(None) if details.paint_ops_found.is_empty() => {
            finish(true, DecisionReason::NoPaintOps, details, operator_counts)
        }
        Ok(None) => finish(true, DecisionReason::OnlyInvisiblePaint, details, operator_counts),
        Err(message) => {
            details.notes.push(format!("error: {message}"));
            finish(false, DecisionReason::UnknownStructure, details, operator_counts)
        }
    }
}

struct Interpreter<'p> {
    page: &'p PageModel,
    state: VisibilityState,
    stack: Vec<VisibilityState>,
    details: StructuralDetails,
    operator_counts: BTreeMap<String, usize>,
}

impl<'p> Interpreter<'p> {
    fn new(page: &'p PageModel, details: StructuralDetails) -> Self {
        Self {
            page,
            state: VisibilityState::default(),
            stack: Vec::new(),
            details,
            operator_counts: BTreeMap::new(),
        }
    }

    /// Returns the visible-event reason that ended the scan, or `None` when the
    /// whole stream was consumed without one.
    fn run(&mut self, instructions: &[Instruction]) -> Result<Option<DecisionReason>, String> {
        for instruction in instructions {
            let mnemonic = instruction.operator.mnemonic();
            *self.operator_counts.entry(mnemonic.to_string()).or_default() += 1;

            match instruction.operator.category() {
                OperatorCategory::State => {
                    remember(&mut self.details.state_ops_found, mnemonic);
                }
                OperatorCategory::TextShow
                | OperatorCategory::PathPaint
                | OperatorCategory::XObjectPaint
                | OperatorCategory::InlineImage => {
                    remember(&mut self.details.paint_ops_found, mnemonic);
                }
                OperatorCategory::StateStack | OperatorCategory::Unknown => {}
            }

            if let Some(reason) = self.step(instruction)? {
                return Ok(Some(reason));
            }
        }
        Ok(None)
    }

    fn step(&mut self, instruction: &Instruction) -> Result<Option<DecisionReason>, String> {
        match &instruction.operator {
            Operator::SaveState => self.stack.push(self.state.clone()),
            Operator::RestoreState => match self.stack.pop() {
                Some(saved) => self.state = saved,
                None => self.details.notes.push(format!(
                    "unbalanced Q at operation {} ignored",
                    instruction.index
                )),
            },
            Operator::SetFont => {
                let size = instruction
                    .operands
                    .get(1)
                    .and_then(number)
                    .ok_or_else(|| format!("Tf at operation {} has no size operand", instruction.index))?;
                self.state.font_size = Some(size as f32);
                self.details.last_seen_font_size = Some(size as f32);
            }
            Operator::SetTextRenderingMode => {
                let mode = instruction
                    .operands
                    .first()
                    .and_then(number)
                    .ok_or_else(|| format!("Tr at operation {} has no mode operand", instruction.index))?;
                self.state.text_rendering_mode = mode as i64;
                self.details.last_seen_tr = Some(mode as i64);
            }
            Operator::SetExtGState => {
                let resource = instruction
                    .operands
                    .first()
                    .and_then(name)
                    .ok_or_else(|| format!("gs at operation {} has no name operand", instruction.index))?;
                self.apply_ext_gstate(&resource);
            }
            Operator::ShowText
            | Operator::ShowTextArray
            | Operator::NextLineShowText
            | Operator::NextLineSpacingShowText => {
                if self.state.text_visible() {
                    return Ok(Some(DecisionReason::VisibleText));
                }
                self.details.invisible_text_events_count += 1;
            }
            Operator::PaintXObject => return Ok(Some(DecisionReason::XobjectPaint)),
            Operator::InlineImage => return Ok(Some(DecisionReason::InlineImage)),
            op if op.category() == OperatorCategory::PathPaint => {
                if !self.state.fully_transparent() {
                    return Ok(Some(DecisionReason::VisiblePaint));
                }
                self.details.invisible_path_events_count += 1;
            }
            _ => {}
        }
        Ok(None)
    }

    fn apply_ext_gstate(&mut self, name: &str) {
        let states = &self.page.resources.ext_gstates;
        let Some(state) = states.get(name) else {
            self.details
                .notes
                .push(format!("unresolved ExtGState /{name}"));
            return;
        };

        if let Some(fill) = state.fill_opacity {
            self.state.fill_opacity = fill;
        }
        if let Some(stroke) = state.stroke_opacity {
            self.state.stroke_opacity = stroke;
        }
        self.state.extgstate_name = Some(name.to_string());
        self.details.last_seen_extgstate = Some(name.to_string());
        self.details.last_seen_fill_opacity = self.state.fill_opacity;
        self.details.last_seen_stroke_opacity = self.state.stroke_opacity;
    }
}

fn remember(seen: &mut Vec<String>, mnemonic: &str) {
    if !seen.iter().any(|known| known == mnemonic) {
        seen.push(mnemonic.to_string());
    }
}

fn debug_record(page: &PageModel, evaluation: &Evaluation) -> StructuralDebugRecord {
    let content_streams = page
        .contents
        .streams()
        .into_iter()
        .map(|bytes| ContentPreview {
            length: bytes.len(),
            sha256: hex::encode(Sha256::digest(bytes)),
            preview: String::from_utf8_lossy(&bytes[..bytes.len().min(PREVIEW_BYTES)]).into_owned(),
        })
        .collect();

    StructuralDebugRecord {
        page_index: page.index,
        is_empty: evaluation.is_empty,
        reason: evaluation.reason,
        resource_keys: page.resources.keys.clone(),
        font_names: page.resources.fonts.clone(),
        xobject_names: page.resources.xobjects.clone(),
        extgstate_names: page.resources.ext_gstates.keys().cloned().collect(),
        operator_counts: evaluation.operator_counts.clone(),
        content_streams,
        details: evaluation.details.clone(),
    }
}
