//! Article I: sovereign imports. Modules must resolve locally.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Fix, Rule, RuleContext, Severity, TextEdit, Violation};
use crate::ast::{NodeKind, SyntaxNode};
use crate::error::RuleError;

pub const SOVEREIGN_IMPORTS_ONLY: Rule = Rule {
    id: "sovereign-imports-only",
    severity: Severity::Error,
    summary: "Imports must not load code from remote URLs or api./cloud. hosts",
    check,
};

static REMOTE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:https?:)?//").expect("remote url pattern is valid"));

static CLOUD_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[/.@])(?:api|cloud)\.").expect("cloud host pattern is valid"));

/// True when `source` points outside the local module graph.
pub fn is_remote_source(source: &str) -> bool {
    REMOTE_URL.is_match(source) || CLOUD_HOST.is_match(source)
}

fn check(ctx: &RuleContext<'_>, node: &SyntaxNode) -> Result<Option<Violation>, RuleError> {
    let NodeKind::Import { source } = &node.kind else {
        return Ok(None);
    };
    let source = source
        .as_deref()
        .ok_or_else(|| RuleError::malformed("import", "import without a module source"))?;

    if !is_remote_source(source) {
        return Ok(None);
    }

    Ok(Some(ctx.violation(
        node,
        format!("Constitutional violation: Non-sovereign import ({})", source),
        Some(Fix::new(
            "Replace with local module",
            vec![TextEdit::replace(node.span, blocked_marker(source))],
        )),
    )))
}

/// Block comment standing in for the removed import, so code after it on
/// the same line stays live.
fn blocked_marker(source: &str) -> String {
    format!("/* IMPORT BLOCKED: {} */", source.replace("*/", "*\\/"))
}
