//! Production hygiene: console logging calls.

use super::{Fix, Rule, RuleContext, Severity, TextEdit, Violation};
use crate::ast::{Callee, NodeKind, SyntaxNode};
use crate::error::RuleError;

pub const CONSOLE_LOG: Rule = Rule {
    id: "console-log",
    severity: Severity::Info,
    summary: "Console logging should be removed or gated behind a debug flag",
    check,
};

const CONSOLE_METHODS: &[&str] = &["log", "warn", "error", "info", "debug"];

fn check(ctx: &RuleContext<'_>, node: &SyntaxNode) -> Result<Option<Violation>, RuleError> {
    let NodeKind::Call { callee, statement } = &node.kind else {
        return Ok(None);
    };
    let Callee::Member {
        object, property, ..
    } = callee
    else {
        return Ok(None);
    };

    if object.as_deref() != Some("console") {
        return Ok(None);
    }
    let method = property
        .as_deref()
        .ok_or_else(|| RuleError::malformed("call", "member callee without a property"))?;
    if !CONSOLE_METHODS.contains(&method) {
        return Ok(None);
    }

    // Only a call that is its own statement can be deleted; inside an
    // expression the deletion would leave broken syntax.
    let fix = statement.map(|stmt| {
        Fix::new("Remove or wrap in DEBUG flag", vec![TextEdit::delete(stmt)])
    });
    Ok(Some(ctx.violation(
        node,
        format!(
            "Constitutional consideration: console.{}() detected. Remove for production sovereignty.",
            method
        ),
        fix,
    )))
}
