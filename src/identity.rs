//! Deterministic violation identity and ordering.
//!
//! Ids depend only on (seed, byte span, rule id), and the sort key only
//! on location and rule id, so repeated runs over the same input produce
//! the same list regardless of traversal order.

use std::cmp::Ordering;

use sha2::{Digest, Sha256};

use crate::ast::Span;
use crate::rules::Violation;

/// Hex digits of the digest kept in an id.
const ID_DIGEST_LEN: usize = 16;

/// Compute the stable id for a violation of `rule_id` on `span`.
pub fn violation_id(seed: u64, span: &Span, rule_id: &str) -> String {
    let key = format!("{:08x}_{}_{}_{}", seed, span.start_byte, span.end_byte, rule_id);
    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    format!("violation_{}", &digest[..ID_DIGEST_LEN])
}

/// Total order over violations: `(start line, start column, rule id)`,
/// then end position and id to break ties between coincident nodes.
pub fn compare(a: &Violation, b: &Violation) -> Ordering {
    (a.location.start.line, a.location.start.column, a.rule_id.as_str())
        .cmp(&(b.location.start.line, b.location.start.column, b.rule_id.as_str()))
        .then_with(|| a.location.end.cmp(&b.location.end))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort violations into their canonical order.
pub fn sort_violations(violations: &mut [Violation]) {
    violations.sort_by(compare);
}
