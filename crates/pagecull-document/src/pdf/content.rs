// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-stream decoding. `lopdf` turns page content into operations; this
// module maps each operator onto a closed enum with a category table and
// rejects streams that decoded only partially.

use lopdf::Object;
use lopdf::content::{Content, Operation};
use pagecull_core::error::{PagecullError, Result};

/// Graphics operators that need no special handling but are part of the PDF
/// operator set. Anything outside this table and the named variants is
/// [`Operator::Unknown`].
const STATE_OPERATORS: &[&str] = &[
    "cm", "w", "J", "j", "M", "d", "ri", "i", "CS", "cs", "SC", "SCN", "sc", "scn", "G", "g",
    "RG", "rg", "K", "k", "BT", "ET", "Tc", "Tw", "Tz", "TL", "Td", "TD", "Tm", "T*", "Ts", "m",
    "l", "c", "v", "y", "h", "re", "n", "W", "W*", "BMC", "BDC", "EMC", "MP", "DP", "d0", "d1",
    "BX", "EX",
];

/// A content-stream operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operator {
    SaveState,
    RestoreState,
    SetFont,
    SetTextRenderingMode,
    SetExtGState,
    ShowText,
    ShowTextArray,
    NextLineShowText,
    NextLineSpacingShowText,
    PaintXObject,
    /// Any part of a `BI ... ID ... EI` sequence.
    InlineImage,
    Stroke,
    CloseStroke,
    Fill,
    FillCompat,
    FillEvenOdd,
    FillStroke,
    FillStrokeEvenOdd,
    CloseFillStroke,
    CloseFillStrokeEvenOdd,
    PaintShading,
    State(&'static str),
    Unknown(String),
}

/// Coarse role of an operator in visibility analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCategory {
    /// `q` / `Q`.
    StateStack,
    /// Changes graphics or text state.
    State,
    TextShow,
    XObjectPaint,
    InlineImage,
    PathPaint,
    Unknown,
}

impl Operator {
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "q" => Self::SaveState,
            "Q" => Self::RestoreState,
            "Tf" => Self::SetFont,
            "Tr" => Self::SetTextRenderingMode,
            "gs" => Self::SetExtGState,
            "Tj" => Self::ShowText,
            "TJ" => Self::ShowTextArray,
            "'" => Self::NextLineShowText,
            "\"" => Self::NextLineSpacingShowText,
            "Do" => Self::PaintXObject,
            "BI" | "ID" | "EI" => Self::InlineImage,
            "S" => Self::Stroke,
            "s" => Self::CloseStroke,
            "f" => Self::Fill,
            "F" => Self::FillCompat,
            "f*" => Self::FillEvenOdd,
            "B" => Self::FillStroke,
            "B*" => Self::FillStrokeEvenOdd,
            "b" => Self::CloseFillStroke,
            "b*" => Self::CloseFillStrokeEvenOdd,
            "sh" => Self::PaintShading,
            other => match STATE_OPERATORS.iter().find(|known| **known == other) {
                Some(known) => Self::State(*known),
                None => Self::Unknown(other.to_string()),
            },
        }
    }

    /// The operator as written in a content stream.
    pub fn mnemonic(&self) -> &str {
        match self {
            Self::SaveState => "q",
            Self::RestoreState => "Q",
            Self::SetFont => "Tf",
            Self::SetTextRenderingMode => "Tr",
            Self::SetExtGState => "gs",
            Self::ShowText => "Tj",
            Self::ShowTextArray => "TJ",
            Self::NextLineShowText => "'",
            Self::NextLineSpacingShowText => "\"",
            Self::PaintXObject => "Do",
            Self::InlineImage => "BI",
            Self::Stroke => "S",
            Self::CloseStroke => "s",
            Self::Fill => "f",
            Self::FillCompat => "F",
            Self::FillEvenOdd => "f*",
            Self::FillStroke => "B",
            Self::FillStrokeEvenOdd => "B*",
            Self::CloseFillStroke => "b",
            Self::CloseFillStrokeEvenOdd => "b*",
            Self::PaintShading => "sh",
            Self::State(name) => name,
            Self::Unknown(name) => name,
        }
    }

    pub fn category(&self) -> OperatorCategory {
        match self {
            Self::SaveState | Self::RestoreState => OperatorCategory::StateStack,
            Self::SetFont | Self::SetTextRenderingMode | Self::SetExtGState | Self::State(_) => {
                OperatorCategory::State
            }
            Self::ShowText
            | Self::ShowTextArray
            | Self::NextLineShowText
            | Self::NextLineSpacingShowText => OperatorCategory::TextShow,
            Self::PaintXObject => OperatorCategory::XObjectPaint,
            Self::InlineImage => OperatorCategory::InlineImage,
            Self::Stroke
            | Self::CloseStroke
            | Self::Fill
            | Self::FillCompat
            | Self::FillEvenOdd
            | Self::FillStroke
            | Self::FillStrokeEvenOdd
            | Self::CloseFillStroke
            | Self::CloseFillStrokeEvenOdd
            | Self::PaintShading => OperatorCategory::PathPaint,
            Self::Unknown(_) => OperatorCategory::Unknown,
        }
    }
}

/// One decoded operation with its operator classified.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub operator: Operator,
    pub operands: Vec<Object>,
    /// Position of the operation in the decoded stream.
    pub index: usize,
}

impl Instruction {
    fn from_operation(index: usize, operation: Operation) -> Self {
        Self {
            operator: Operator::from_keyword(&operation.operator),
            operands: operation.operands,
            index,
        }
    }
}

/// Numeric value of an integer or real operand.
pub fn number(operand: &Object) -> Option<f64> {
    match operand {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(f64::from(*value)),
        _ => None,
    }
}

/// Name operand without its leading slash.
pub fn name(operand: &Object) -> Option<String> {
    match operand {
        Object::Name(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

/// True when the stream holds nothing but whitespace and `%` comments.
pub fn is_blank(bytes: &[u8]) -> bool {
    significant_tail(bytes).is_empty()
}

/// Decode a content stream into classified instructions.
///
/// `lopdf` stops quietly at the first token it cannot parse, so a stream is
/// only accepted when its last decoded operator is also the last token in the
/// source.
pub fn parse_content(bytes: &[u8]) -> Result<Vec<Instruction>> {
    let content = Content::decode(bytes)
        .map_err(|err| PagecullError::Structure(format!("content stream: {err}")))?;

    let tail = significant_tail(bytes);
    if !tail.is_empty() {
        let Some(last) = content.operations.last() else {
            return Err(PagecullError::Structure(
                "content stream has no decodable operators".into(),
            ));
        };
        let expected: &[u8] = match last.operator.as_str() {
            "BI" | "ID" | "EI" => b"EI",
            other => other.as_bytes(),
        };
        if !ends_with_token(tail, expected) {
            return Err(PagecullError::Structure(format!(
                "content stream stops decoding after operation {} ({})",
                content.operations.len(),
                last.operator
            )));
        }
    }

    Ok(content
        .operations
        .into_iter()
        .enumerate()
        .map(|(index, operation)| Instruction::from_operation(index, operation))
        .collect())
}

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b'\0' | b'\t' | b'\n' | 0x0C | b'\r' | b' ')
}

fn is_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// The stream with trailing whitespace and trailing comment lines removed.
fn significant_tail(bytes: &[u8]) -> &[u8] {
    let mut end = bytes.len();
    loop {
        while end > 0 && is_whitespace(bytes[end - 1]) {
            end -= 1;
        }
        let line_start = bytes[..end]
            .iter()
            .rposition(|byte| *byte == b'\n' || *byte == b'\r')
            .map_or(0, |pos| pos + 1);
        let line = &bytes[line_start..end];
        match line.iter().position(|byte| !is_whitespace(*byte)) {
            Some(first) if line[first] == b'%' => end = line_start,
            _ => return &bytes[..end],
        }
    }
}

fn ends_with_token(tail: &[u8], token: &[u8]) -> bool {
    if !tail.ends_with(token) {
        return false;
    }
    let before = tail.len() - token.len();
    before == 0 || is_whitespace(tail[before - 1]) || is_delimiter(tail[before - 1])
}
