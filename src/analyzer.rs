//! The analysis pass: parse, walk, apply enabled rules, sort.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ast::{AstProvider, SyntaxNode};
use crate::config::AnalysisConfig;
use crate::error::{panic_message, RuleError};
use crate::identity;
use crate::rules::{Rule, RuleContext, RuleRegistry, Violation};

/// Output envelope of one analysis.
///
/// A parse failure is still a completed analysis: `violations` is empty
/// and `error_message` says why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub file_path: String,
    pub violations: Vec<Violation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Completion time, Unix milliseconds.
    pub completed_at: u64,
}

impl AnalysisResult {
    pub fn is_failure(&self) -> bool {
        self.error_message.is_some()
    }
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Runs registered rules over syntax trees.
///
/// Holds no per-call state: every `analyze` call is independent and
/// returns the same violations for the same inputs.
#[derive(Clone)]
pub struct Analyzer {
    provider: Arc<dyn AstProvider>,
    registry: Arc<RuleRegistry>,
}

impl Analyzer {
    pub fn new(provider: Arc<dyn AstProvider>, registry: Arc<RuleRegistry>) -> Self {
        Self { provider, registry }
    }

    /// Tree-sitter TypeScript provider with the built-in rules.
    #[cfg(feature = "tree-sitter")]
    pub fn typescript() -> Self {
        Self::new(
            Arc::new(crate::ast::TreeSitterProvider::new()),
            Arc::new(RuleRegistry::builtin()),
        )
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Language name reported by the provider.
    pub fn language(&self) -> &str {
        self.provider.language()
    }

    /// Analyze one source text.
    pub fn analyze(&self, source: &str, file_path: &str, config: &AnalysisConfig) -> AnalysisResult {
        let tree = match self.provider.parse(source, file_path) {
            Ok(tree) => tree,
            Err(e) => {
                warn!(
                    file = %file_path,
                    language = self.language(),
                    error = %e,
                    "analysis skipped: source did not parse"
                );
                return AnalysisResult {
                    file_path: file_path.to_string(),
                    violations: Vec::new(),
                    error_message: Some(format!("AST parse failed: {}", e)),
                    completed_at: now_millis(),
                };
            }
        };

        let rules = self.registry.resolve(&config.enabled_rules);
        let mut violations = Vec::new();

        for node in tree.walk() {
            for rule in &rules {
                let ctx = RuleContext::new(rule, file_path, source, config.seed);
                match run_rule(rule, &ctx, node) {
                    Ok(Some(violation)) => violations.push(violation),
                    Ok(None) => {}
                    Err(e) => {
                        debug!(
                            rule = rule.id,
                            file = %file_path,
                            node = node.kind.name(),
                            line = node.span.start.line,
                            error = %e,
                            "rule skipped for node"
                        );
                    }
                }
            }
        }

        identity::sort_violations(&mut violations);

        AnalysisResult {
            file_path: file_path.to_string(),
            violations,
            error_message: None,
            completed_at: now_millis(),
        }
    }
}

/// Run one rule on one node, turning a panic into a `RuleError`.
fn run_rule(
    rule: &Rule,
    ctx: &RuleContext<'_>,
    node: &SyntaxNode,
) -> Result<Option<Violation>, RuleError> {
    catch_unwind(AssertUnwindSafe(|| (rule.check)(ctx, node)))
        .unwrap_or_else(|payload| Err(RuleError::Panicked(panic_message(payload.as_ref()))))
}
