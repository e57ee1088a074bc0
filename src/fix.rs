//! Apply violation fixes to source text.
//!
//! Fixes are all-or-nothing: either every edit of a fix is applied or
//! none is. A fix whose edits overlap an already accepted fix is skipped
//! and reported, never merged.

use crate::error::FixError;
use crate::rules::{TextEdit, Violation};

/// Result of applying a batch of fixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixOutcome {
    pub text: String,
    /// Ids of violations whose fix was applied.
    pub applied: Vec<String>,
    /// Ids of violations whose fix overlapped an applied one.
    pub skipped: Vec<String>,
}

impl FixOutcome {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Apply the fixes carried by `violations`, in order, to `source`.
///
/// Violations without a fix are ignored. Any edit outside the source or
/// splitting a UTF-8 character fails the whole batch.
pub fn apply_fixes(source: &str, violations: &[Violation]) -> Result<FixOutcome, FixError> {
    let mut accepted: Vec<&TextEdit> = Vec::new();
    let mut applied = Vec::new();
    let mut skipped = Vec::new();

    for violation in violations {
        let Some(fix) = &violation.fix else {
            continue;
        };
        for edit in &fix.edits {
            check_edit(source, edit)?;
        }

        let clashes = fix
            .edits
            .iter()
            .any(|edit| accepted.iter().any(|other| overlaps(edit, other)));
        if clashes {
            skipped.push(violation.id.clone());
            continue;
        }

        accepted.extend(fix.edits.iter());
        applied.push(violation.id.clone());
    }

    // Apply back to front so earlier offsets stay valid.
    accepted.sort_by(|a, b| b.range.cmp(&a.range));
    let mut text = source.to_string();
    for edit in accepted {
        text.replace_range(edit.range.0..edit.range.1, &edit.new_text);
    }

    Ok(FixOutcome {
        text,
        applied,
        skipped,
    })
}

fn check_edit(source: &str, edit: &TextEdit) -> Result<(), FixError> {
    let (start, end) = edit.range;
    if start > end {
        return Err(FixError::Inverted { start, end });
    }
    if end > source.len() {
        return Err(FixError::OutOfBounds {
            start,
            end,
            len: source.len(),
        });
    }
    for offset in [start, end] {
        if !source.is_char_boundary(offset) {
            return Err(FixError::CharBoundary(offset));
        }
    }
    Ok(())
}

/// Two edits clash when their ranges share a byte, or when both insert
/// at the same offset.
fn overlaps(a: &TextEdit, b: &TextEdit) -> bool {
    let (a_start, a_end) = a.range;
    let (b_start, b_end) = b.range;
    if a_start == a_end && b_start == b_end {
        return a_start == b_start;
    }
    a_start < b_end && b_start < a_end
}
