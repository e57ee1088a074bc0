//! Guardian - constitutional static analysis for TypeScript and JavaScript.
//!
//! Guardian parses source text, walks every node once and applies a
//! registry of small rules. Each rule flags one pattern that breaks
//! sovereignty or determinism policy. Results are deterministic: the same
//! source, path and config always produce the same violations, with the
//! same ids, in the same order.
//!
//! # Architecture
//!
//! - `ast`: the provider-neutral syntax tree and the tree-sitter provider
//! - `rules`: the rule registry and built-in rules
//! - `identity`: violation ids and canonical ordering
//! - `analyzer`: parse, walk, apply rules, sort
//! - `host`: message-based execution hosts (inline and worker thread)
//! - `client`: debounced caller-facing adapter over a host
//! - `config`: analysis config, strictness policy, guardian.yaml
//! - `fix`: applying rule fixes to source text
//! - `report` and `cli`: the `guardian` binary
//!
//! # Adding a Rule
//!
//! Write a `fn(&RuleContext, &SyntaxNode) -> Result<Option<Violation>, RuleError>`,
//! wrap it in a `Rule` and register it with `RuleRegistry::register`.

pub mod analyzer;
pub mod ast;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod fix;
pub mod host;
pub mod identity;
pub mod report;
pub mod rules;

pub use analyzer::{AnalysisResult, Analyzer};
pub use ast::{AstProvider, NodeKind, Position, Span, SyntaxNode, SyntaxTree};
pub use client::{ClientOptions, ClientState, GuardianClient};
pub use config::{AnalysisConfig, GuardianConfig, Strictness};
pub use error::{FixError, HostError, ParseError, RuleError};
pub use host::{ExecutionHost, InlineHost, Request, Response, WorkerHost};
pub use rules::{Rule, RuleContext, RuleRegistry, Severity, Violation};

#[cfg(feature = "tree-sitter")]
pub use ast::TreeSitterProvider;
