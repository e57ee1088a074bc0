//! Article III: explicit shallow copies. Flags deep-clone utilities.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Fix, Rule, RuleContext, Severity, TextEdit, Violation};
use crate::ast::{NodeKind, SyntaxNode};
use crate::error::RuleError;

pub const CLONE_DEEP: Rule = Rule {
    id: "clone-deep",
    severity: Severity::Warning,
    summary: "Deep-clone utilities hide copying cost; use explicit shallow copies",
    check,
};

static DEEP_CLONE_MODULE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"clone-deep|lodash\.clonedeep|lodash(-es)?/cloneDeep")
        .expect("deep clone pattern is valid")
});

fn check(ctx: &RuleContext<'_>, node: &SyntaxNode) -> Result<Option<Violation>, RuleError> {
    let NodeKind::Import { source } = &node.kind else {
        return Ok(None);
    };
    let source = source
        .as_deref()
        .ok_or_else(|| RuleError::malformed("import", "import without a module source"))?;

    if !DEEP_CLONE_MODULE.is_match(source) {
        return Ok(None);
    }

    Ok(Some(ctx.violation(
        node,
        format!(
            "Constitutional violation: Deep clone detected ({}). Sovereignty requires explicit shallow copies only.",
            source
        ),
        Some(Fix::new(
            "Remove the import; use `{...obj}` or `structuredClone(obj)` at call sites",
            vec![TextEdit::delete(node.span)],
        )),
    )))
}
