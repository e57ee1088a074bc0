//! Provider-neutral syntax tree consumed by the rule engine.
//!
//! This module provides:
//! - `AstProvider` trait: abstract interface for turning source text into a tree
//! - `SyntaxTree`: an owned arena of nodes with a pre-order `walk()`
//! - `NodeKind`: tagged variants for the constructs rules care about
//! - `TreeBuilder`: hand-assembly of trees for stub providers
//! - A tree-sitter TypeScript/TSX provider behind the `tree-sitter` feature
//!
//! Rules dispatch on `NodeKind` rather than on parser-specific node types,
//! so a provider only has to lower its own tree into these variants.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

#[cfg(feature = "tree-sitter")]
pub mod treesitter;

#[cfg(feature = "tree-sitter")]
pub use treesitter::TreeSitterProvider;

/// Source file extensions the analyzer accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["ts", "mts", "cts", "tsx", "js", "jsx", "mjs", "cjs"];

/// A point in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column in bytes (0-indexed).
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Source span with byte offsets and line/column positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    /// Start byte offset (0-indexed).
    pub start_byte: usize,
    /// End byte offset (0-indexed, exclusive).
    pub end_byte: usize,
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start_byte: usize, end_byte: usize, start: Position, end: Position) -> Self {
        Self {
            start_byte,
            end_byte,
            start,
            end,
        }
    }

    /// Build a span for single-line text, where columns equal byte offsets
    /// from the start of the line. Handy for stub trees.
    pub fn on_line(line: usize, start_col: usize, end_col: usize, line_offset: usize) -> Self {
        Self {
            start_byte: line_offset + start_col,
            end_byte: line_offset + end_col,
            start: Position::new(line, start_col),
            end: Position::new(line, end_col),
        }
    }

    /// Create a span from a tree-sitter node.
    #[cfg(feature = "tree-sitter")]
    pub fn from_node(node: tree_sitter::Node) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        Self {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start: Position::new(start.row + 1, start.column), // tree-sitter rows are 0-indexed
            end: Position::new(end.row + 1, end.column),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start)
    }
}

/// How a call expression names the function it calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    /// `object.property(...)`.
    Member {
        object: Option<String>,
        property: Option<String>,
        span: Span,
    },
    /// `name(...)`.
    Identifier(String),
    /// Anything else (computed callees, call chains, IIFEs).
    Other,
}

/// A type written after a `:` annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedType {
    pub text: String,
    pub span: Span,
    /// True when the type is the bare dynamic `any` keyword.
    pub is_any: bool,
}

/// Tagged node variants. Fields are optional so that providers can hand
/// over partially recovered nodes; rules treat a missing field as a
/// malformed node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// An `import` declaration or an `export ... from` re-export.
    Import { source: Option<String> },
    /// A call expression. `statement` is the span of the enclosing
    /// expression statement when the call stands on its own inside a
    /// block, so removing that span leaves valid code.
    Call {
        callee: Callee,
        statement: Option<Span>,
    },
    /// A `: Type` annotation on a binding, parameter, or return.
    TypeAnnotation { annotated: Option<AnnotatedType> },
    /// Any node kind the rules do not inspect, keyed by the provider's name.
    Other(&'static str),
}

impl NodeKind {
    /// Short name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Import { .. } => "import",
            NodeKind::Call { .. } => "call",
            NodeKind::TypeAnnotation { .. } => "type-annotation",
            NodeKind::Other(kind) => kind,
        }
    }
}

/// Index of a node inside its `SyntaxTree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// A node in the owned syntax tree.
#[derive(Debug, Clone)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    pub span: Span,
    children: Vec<NodeId>,
}

impl SyntaxNode {
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// An owned syntax tree. Every node has exactly one parent except the root,
/// so `walk()` visits each node exactly once.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    nodes: Vec<SyntaxNode>,
}

impl SyntaxTree {
    pub fn root(&self) -> &SyntaxNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pre-order traversal starting at the root.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            tree: self,
            stack: vec![NodeId(0)],
        }
    }
}

/// Pre-order iterator over a `SyntaxTree`.
pub struct Walk<'a> {
    tree: &'a SyntaxTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a SyntaxNode;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.tree.node(id);
        self.stack.extend(node.children.iter().rev().copied());
        Some(node)
    }
}

/// Incremental construction of a `SyntaxTree`.
///
/// Children are attached to existing nodes only, so the result is always
/// a tree rooted at the first node.
pub struct TreeBuilder {
    nodes: Vec<SyntaxNode>,
}

impl TreeBuilder {
    pub fn new(root_kind: NodeKind, root_span: Span) -> Self {
        Self {
            nodes: vec![SyntaxNode {
                kind: root_kind,
                span: root_span,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Append a child under `parent` and return its id.
    pub fn child(&mut self, parent: NodeId, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(SyntaxNode {
            kind,
            span,
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn finish(self) -> SyntaxTree {
        SyntaxTree { nodes: self.nodes }
    }
}

/// Turns source text into a `SyntaxTree`.
///
/// Implementations must be pure: the same input always yields the same
/// tree, and a provider is shared read-only across analyses.
pub trait AstProvider: Send + Sync {
    /// Parse `source`. `file_path` may be used to pick a dialect.
    fn parse(&self, source: &str, file_path: &str) -> Result<SyntaxTree, ParseError>;

    /// Name of the language or dialect family handled.
    fn language(&self) -> &str;
}
