//! Rule registry and the built-in constitutional rules.
//!
//! A rule is a plain function over one node. It inspects exactly one
//! kind of syntax, never mutates the tree, and performs no I/O, so the
//! analyzer may call rules in any order.

mod any_type;
mod clone_deep;
mod console_log;
mod probabilistic;
mod sovereign_imports;
mod telemetry;
mod types;

pub use any_type::ANY_TYPE;
pub use clone_deep::CLONE_DEEP;
pub use console_log::CONSOLE_LOG;
pub use probabilistic::PROBABILISTIC_API;
pub use sovereign_imports::SOVEREIGN_IMPORTS_ONLY;
pub use telemetry::{CLOUD_TELEMETRY, TELEMETRY_CALL};
pub use types::{Fix, Location, Severity, TextEdit, Violation};

use crate::ast::SyntaxNode;
use crate::error::RuleError;
use crate::identity;

/// Signature of a rule check.
pub type CheckFn = fn(&RuleContext<'_>, &SyntaxNode) -> Result<Option<Violation>, RuleError>;

/// A registered rule.
#[derive(Clone, Copy)]
pub struct Rule {
    pub id: &'static str,
    pub severity: Severity,
    /// One-line description for listings and SARIF metadata.
    pub summary: &'static str,
    pub check: CheckFn,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("severity", &self.severity)
            .finish()
    }
}

/// Per-call context handed to a rule check.
pub struct RuleContext<'a> {
    pub file_path: &'a str,
    pub source: &'a str,
    rule: &'a Rule,
    seed: u64,
}

impl<'a> RuleContext<'a> {
    pub fn new(rule: &'a Rule, file_path: &'a str, source: &'a str, seed: u64) -> Self {
        Self {
            file_path,
            source,
            rule,
            seed,
        }
    }

    /// Build a violation for `node` with this rule's id and severity.
    pub fn violation(
        &self,
        node: &SyntaxNode,
        message: impl Into<String>,
        fix: Option<Fix>,
    ) -> Violation {
        Violation {
            id: identity::violation_id(self.seed, &node.span, self.rule.id),
            rule_id: self.rule.id.to_string(),
            severity: self.rule.severity,
            message: message.into(),
            location: node.span.into(),
            fix,
        }
    }
}

/// Ordered collection of rules keyed by id.
///
/// Declaration order is the order in which the analyzer invokes enabled
/// rules on each node. The registry is immutable once handed to an
/// analyzer.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in constitutional rule set.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(ANY_TYPE);
        registry.register(CLOUD_TELEMETRY);
        registry.register(CLONE_DEEP);
        registry.register(PROBABILISTIC_API);
        registry.register(CONSOLE_LOG);
        registry.register(SOVEREIGN_IMPORTS_ONLY);
        registry.register(TELEMETRY_CALL);
        registry
    }

    /// Add a rule, or replace the rule with the same id in place.
    pub fn register(&mut self, rule: Rule) {
        match self.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.register(rule);
        self
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn all(&self) -> &[Rule] {
        &self.rules
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.id).collect()
    }

    /// Rules whose id appears in `enabled`, in declaration order.
    /// Unknown ids in `enabled` are ignored.
    pub fn resolve<'a, I, S>(&self, enabled: I) -> Vec<&Rule>
    where
        I: IntoIterator<Item = &'a S>,
        S: AsRef<str> + ?Sized + 'a,
    {
        let wanted: Vec<&str> = enabled.into_iter().map(|s| s.as_ref()).collect();
        self.rules
            .iter()
            .filter(|r| wanted.contains(&r.id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{NodeKind, Span, TreeBuilder};

    fn always_fires(ctx: &RuleContext<'_>, node: &SyntaxNode) -> Result<Option<Violation>, RuleError> {
        Ok(Some(ctx.violation(node, "fired", None)))
    }

    const ALWAYS: Rule = Rule {
        id: "always",
        severity: Severity::Info,
        summary: "fires on every node",
        check: always_fires,
    };

    #[test]
    fn test_builtin_declaration_order() {
        let registry = RuleRegistry::builtin();
        assert_eq!(
            registry.ids(),
            vec![
                "any-type",
                "cloud-telemetry",
                "clone-deep",
                "probabilistic-api",
                "console-log",
                "sovereign-imports-only",
                "telemetry-call",
            ]
        );
    }

    #[test]
    fn test_resolve_drops_unknown_and_keeps_declared_order() {
        let registry = RuleRegistry::builtin();
        let enabled = ["console-log", "no-such-rule", "any-type"];
        let resolved: Vec<_> = registry.resolve(&enabled).iter().map(|r| r.id).collect();
        assert_eq!(resolved, vec!["any-type", "console-log"]);
    }

    #[test]
    fn test_register_replaces_same_id_in_place() {
        let mut registry = RuleRegistry::builtin();
        let before = registry.len();
        registry.register(Rule {
            id: "any-type",
            ..ALWAYS
        });
        assert_eq!(registry.len(), before);
        assert_eq!(registry.ids()[0], "any-type");
        assert_eq!(registry.get("any-type").unwrap().severity, Severity::Info);

        registry.register(ALWAYS);
        assert_eq!(registry.len(), before + 1);
        assert!(registry.contains("always"));
    }

    #[test]
    fn test_context_violation_uses_rule_metadata() {
        let tree = TreeBuilder::new(NodeKind::Other("program"), Span::on_line(3, 2, 9, 40)).finish();
        let ctx = RuleContext::new(&ALWAYS, "a.ts", "", 7);
        let v = ctx.violation(tree.root(), "fired", None);
        assert_eq!(v.rule_id, "always");
        assert_eq!(v.severity, Severity::Info);
        assert_eq!(v.location.start.line, 3);
        assert_eq!(v.location.start.column, 2);
        assert_eq!(v.id, identity::violation_id(7, &tree.root().span, "always"));
    }
}
