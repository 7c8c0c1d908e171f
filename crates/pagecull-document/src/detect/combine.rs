// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Merge structural and render verdicts into one decision per page.

use std::collections::BTreeMap;

use pagecull_core::error::{PagecullError, Result};
use pagecull_core::{
    CombinedDetails, DecisionDetails, DecisionReason, DecisionSummary, DetectionMode, PageDecision,
};

/// Reduce the detector outputs to the authoritative decision list.
///
/// `both` is a logical OR: a page is empty when either detector says so.
pub fn combine(
    mode: DetectionMode,
    structural: &[PageDecision],
    render: Option<&[PageDecision]>,
) -> Result<Vec<PageDecision>> {
    if mode.needs_render() {
        let Some(render) = render else {
            return Err(PagecullError::Config(format!(
                "mode '{}' requires render decisions",
                mode.as_str()
            )));
        };
        if render.len() != structural.len() {
            return Err(PagecullError::Config(format!(
                "decision length mismatch: {} structural vs {} render",
                structural.len(),
                render.len()
            )));
        }
    }

    let combined = structural
        .iter()
        .enumerate()
        .map(|(index, structural)| {
            let render = render.and_then(|decisions| decisions.get(index));
            let (is_empty, reason) = verdict(mode, structural, render);
            PageDecision {
                page_index: index,
                is_empty,
                reason,
                details: DecisionDetails::Combined(Box::new(CombinedDetails {
                    mode,
                    structural_is_empty: structural.is_empty,
                    structural_reason: structural.reason,
                    structural: structural.details.clone(),
                    render_is_empty: render.map(|d| d.is_empty),
                    render_reason: render.map(|d| d.reason),
                    render: render.map(|d| d.details.clone()),
                })),
            }
        })
        .collect();
    Ok(combined)
}

fn verdict(
    mode: DetectionMode,
    structural: &PageDecision,
    render: Option<&PageDecision>,
) -> (bool, DecisionReason) {
    let render_empty = render.is_some_and(|d| d.is_empty);
    match mode {
        DetectionMode::Structural if structural.is_empty => (true, DecisionReason::StructuralEmpty),
        DetectionMode::Render if render_empty => (true, DecisionReason::RenderEmpty),
        DetectionMode::Both => match (structural.is_empty, render_empty) {
            (true, true) => (true, DecisionReason::BothEmpty),
            (true, false) => (true, DecisionReason::StructuralEmpty),
            (false, true) => (true, DecisionReason::RenderEmpty),
            (false, false) => (false, DecisionReason::NonEmpty),
        },
        _ => (false, DecisionReason::NonEmpty),
    }
}

/// Count combined decisions by outcome and by underlying structural reason.
pub fn summarize(decisions: &[PageDecision]) -> DecisionSummary {
    let mut summary = DecisionSummary {
        by_reason: BTreeMap::new(),
        ..DecisionSummary::default()
    };

    for decision in decisions {
        if decision.is_empty {
            summary.empty_pages += 1;
        } else {
            summary.non_empty_pages += 1;
        }
        *summary.by_reason.entry(decision.reason).or_default() += 1;

        let Some(combined) = decision.details.as_combined() else {
            continue;
        };
        let render_empty = combined.render_is_empty == Some(true);
        if combined.structural_is_empty {
            summary.structural_empty_pages += 1;
        }
        if render_empty {
            summary.render_empty_pages += 1;
        }
        if combined.structural_is_empty && render_empty {
            summary.both_empty_pages += 1;
        }

        match combined.structural_reason {
            DecisionReason::OnlyInvisiblePaint => summary.only_invisible_paint_pages += 1,
            reason if reason.is_paintless() => summary.no_paint_ops_pages += 1,
            _ if !decision.is_empty => summary.visible_pages += 1,
            _ => {}
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagecull_core::{RenderDetails, StructuralDetails};

    fn structural(index: usize, is_empty: bool, reason: DecisionReason) -> PageDecision {
        PageDecision {
            page_index: index,
            is_empty,
            reason,
            details: DecisionDetails::Structural(StructuralDetails::default()),
        }
    }

    fn render(index: usize, is_empty: bool) -> PageDecision {
        PageDecision {
            page_index: index,
            is_empty,
            reason: if is_empty {
                DecisionReason::InkBelowThreshold
            } else {
                DecisionReason::InkAboveThreshold
            },
            details: DecisionDetails::Render(RenderDetails {
                dpi: 72,
                scale: 1.0,
                background: Default::default(),
                sample_margin_inches: [0.0; 4],
                measurement: None,
                error: None,
            }),
        }
    }

    /// Every (structural, render) truth combination, in order.
    fn grid() -> (Vec<PageDecision>, Vec<PageDecision>) {
        let pairs = [(false, false), (true, false), (false, true), (true, true)];
        let structural_side = pairs
            .iter()
            .enumerate()
            .map(|(i, (s, _))| {
                let reason = if *s {
                    DecisionReason::NoContents
                } else {
                    DecisionReason::VisibleText
                };
                structural(i, *s, reason)
            })
            .collect();
        let render_side = pairs.iter().enumerate().map(|(i, (_, r))| render(i, *r)).collect();
        (structural_side, render_side)
    }

    fn outcomes(decisions: &[PageDecision]) -> Vec<(bool, DecisionReason)> {
        decisions.iter().map(|d| (d.is_empty, d.reason)).collect()
    }

    #[test]
    fn both_mode_is_logical_or() {
        let (s, r) = grid();
        let combined = combine(DetectionMode::Both, &s, Some(&r)).unwrap();
        assert_eq!(
            outcomes(&combined),
            vec![
                (false, DecisionReason::NonEmpty),
                (true, DecisionReason::StructuralEmpty),
                (true, DecisionReason::RenderEmpty),
                (true, DecisionReason::BothEmpty),
            ]
        );
    }

    #[test]
    fn single_modes_follow_only_their_detector() {
        let (s, r) = grid();
        let by_structure = combine(DetectionMode::Structural, &s, Some(&r)).unwrap();
        let by_render = combine(DetectionMode::Render, &s, Some(&r)).unwrap();

        for (index, decision) in by_structure.iter().enumerate() {
            assert_eq!(decision.is_empty, s[index].is_empty);
        }
        for (index, decision) in by_render.iter().enumerate() {
            assert_eq!(decision.is_empty, r[index].is_empty);
        }
        assert_eq!(by_render[2].reason, DecisionReason::RenderEmpty);
    }

    #[test]
    fn structural_mode_needs_no_render_input() {
        let (s, _) = grid();
        let combined = combine(DetectionMode::Structural, &s, None).unwrap();
        let details = combined[1].details.as_combined().unwrap();
        assert!(details.structural_is_empty);
        assert_eq!(details.structural_reason, DecisionReason::NoContents);
        assert_eq!(details.render_is_empty, None);
    }

    #[test]
    fn render_modes_reject_missing_or_misaligned_input() {
        let (s, r) = grid();
        assert!(matches!(
            combine(DetectionMode::Render, &s, None),
            Err(PagecullError::Config(_))
        ));
        assert!(matches!(
            combine(DetectionMode::Both, &s, Some(&r[..3])),
            Err(PagecullError::Config(_))
        ));
    }

    #[test]
    fn summary_counts_each_category() {
        let structural_side = vec![
            structural(0, false, DecisionReason::VisibleText),
            structural(1, true, DecisionReason::NoContents),
            structural(2, true, DecisionReason::OnlyInvisiblePaint),
            structural(3, false, DecisionReason::HasXobject),
        ];
        let render_side = vec![render(0, false), render(1, true), render(2, false), render(3, true)];
        let combined = combine(DetectionMode::Both, &structural_side, Some(&render_side)).unwrap();
        let summary = summarize(&combined);

        assert_eq!(summary.empty_pages, 3);
        assert_eq!(summary.non_empty_pages, 1);
        assert_eq!(summary.structural_empty_pages, 2);
        assert_eq!(summary.render_empty_pages, 2);
        assert_eq!(summary.both_empty_pages, 1);
        assert_eq!(summary.only_invisible_paint_pages, 1);
        assert_eq!(summary.no_paint_ops_pages, 1);
        assert_eq!(summary.visible_pages, 1);
        assert_eq!(summary.by_reason.get(&DecisionReason::RenderEmpty), Some(&1));
    }
}
