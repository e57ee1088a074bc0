//! Article II: determinism. Flags the platform's unseeded RNG.

use super::{Fix, Rule, RuleContext, Severity, TextEdit, Violation};
use crate::ast::{Callee, NodeKind, SyntaxNode};
use crate::error::RuleError;

pub const PROBABILISTIC_API: Rule = Rule {
    id: "probabilistic-api",
    severity: Severity::Warning,
    summary: "`Math.random()` is non-deterministic; use a seeded generator",
    check,
};

fn check(ctx: &RuleContext<'_>, node: &SyntaxNode) -> Result<Option<Violation>, RuleError> {
    let NodeKind::Call { callee, .. } = &node.kind else {
        return Ok(None);
    };
    let Callee::Member {
        object,
        property,
        span,
    } = callee
    else {
        return Ok(None);
    };

    if object.as_deref() != Some("Math") {
        return Ok(None);
    }
    let property = property
        .as_deref()
        .ok_or_else(|| RuleError::malformed("call", "member callee without a property"))?;
    if property != "random" {
        return Ok(None);
    }

    Ok(Some(ctx.violation(
        node,
        "Constitutional consideration: Math.random() creates non-deterministic behavior. Use seedable RNG.",
        Some(Fix::new(
            "Replace with a deterministic seeded generator",
            vec![TextEdit::replace(*span, "deterministicRandom")],
        )),
    )))
}
