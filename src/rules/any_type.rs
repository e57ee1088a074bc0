//! Article IV: explicit contracts. Flags `: any` annotations.

use super::{Fix, Rule, RuleContext, Severity, TextEdit, Violation};
use crate::ast::{NodeKind, SyntaxNode};
use crate::error::RuleError;

pub const ANY_TYPE: Rule = Rule {
    id: "any-type",
    severity: Severity::Error,
    summary: "Type annotations must not use the dynamic `any` type",
    check,
};

fn check(ctx: &RuleContext<'_>, node: &SyntaxNode) -> Result<Option<Violation>, RuleError> {
    let NodeKind::TypeAnnotation { annotated } = &node.kind else {
        return Ok(None);
    };
    let annotated = annotated
        .as_ref()
        .ok_or_else(|| RuleError::malformed("type-annotation", "annotation without a type"))?;

    if !annotated.is_any {
        return Ok(None);
    }

    Ok(Some(ctx.violation(
        node,
        "Constitutional violation: `any` type detected. Sovereignty requires explicit contracts.",
        Some(Fix::new(
            "Replace with `unknown` or a domain-specific interface",
            vec![TextEdit::replace(annotated.span, "unknown")],
        )),
    )))
}
