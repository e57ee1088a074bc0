//! Article I: sovereignty. No cloud telemetry or analytics SDKs.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Fix, Rule, RuleContext, Severity, TextEdit, Violation};
use crate::ast::{Callee, NodeKind, SyntaxNode};
use crate::error::RuleError;

pub const CLOUD_TELEMETRY: Rule = Rule {
    id: "cloud-telemetry",
    severity: Severity::Error,
    summary: "Imports of telemetry, error-tracking and analytics SDKs are forbidden",
    check: check_import,
};

pub const TELEMETRY_CALL: Rule = Rule {
    id: "telemetry-call",
    severity: Severity::Error,
    summary: "Calls to `logEvent` on analytics or telemetry clients are forbidden",
    check: check_call,
};

static TELEMETRY_MODULE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"@sentry/|dd-trace|newrelic|applicationinsights|logrocket|rollbar|mixpanel|amplitude|@segment/|analytics-node|posthog|@datadog/|bugsnag",
    )
    .expect("telemetry pattern is valid")
});

static TELEMETRY_CLIENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)analytics|telemetry|mixpanel|amplitude").expect("client pattern is valid")
});

/// True when `source` names a telemetry or analytics module.
pub fn is_telemetry_module(source: &str) -> bool {
    TELEMETRY_MODULE.is_match(source)
}

fn check_import(ctx: &RuleContext<'_>, node: &SyntaxNode) -> Result<Option<Violation>, RuleError> {
    let NodeKind::Import { source } = &node.kind else {
        return Ok(None);
    };
    let source = source
        .as_deref()
        .ok_or_else(|| RuleError::malformed("import", "import without a module source"))?;

    if !is_telemetry_module(source) {
        return Ok(None);
    }

    Ok(Some(ctx.violation(
        node,
        format!(
            "Constitutional violation: Cloud telemetry detected ({}). Code must remain sovereign and offline.",
            source
        ),
        Some(Fix::new(
            "Remove dependency. Use local audit logs only.",
            vec![TextEdit::delete(node.span)],
        )),
    )))
}

fn check_call(ctx: &RuleContext<'_>, node: &SyntaxNode) -> Result<Option<Violation>, RuleError> {
    let NodeKind::Call { callee, statement } = &node.kind else {
        return Ok(None);
    };
    let Callee::Member {
        object, property, ..
    } = callee
    else {
        return Ok(None);
    };

    if property.as_deref() != Some("logEvent") {
        return Ok(None);
    }
    let object = object
        .as_deref()
        .ok_or_else(|| RuleError::malformed("call", "member callee without an object"))?;
    if !TELEMETRY_CLIENT.is_match(object) {
        return Ok(None);
    }

    let fix = statement.map(|stmt| Fix::new("Remove telemetry call", vec![TextEdit::delete(stmt)]));
    Ok(Some(ctx.violation(
        node,
        format!(
            "Constitutional violation: Cloud telemetry call detected ({}.logEvent)",
            object
        ),
        fix,
    )))
}
