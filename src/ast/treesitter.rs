//! Tree-sitter based provider for TypeScript, TSX and JavaScript.
//!
//! The tree-sitter parse tree is lowered into the owned `SyntaxTree` once,
//! so rules never touch parser-specific node types.

use std::path::Path;

use tree_sitter::{Language, Node, Parser};

use super::{AnnotatedType, AstProvider, Callee, NodeKind, Span, SyntaxTree, TreeBuilder};
use crate::error::ParseError;

/// Extensions parsed with the plain TypeScript grammar. Everything else
/// goes through TSX, which also accepts JavaScript and JSX.
const TYPESCRIPT_EXTENSIONS: &[&str] = &["ts", "mts", "cts"];

pub struct TreeSitterProvider {
    typescript: Language,
    tsx: Language,
}

impl TreeSitterProvider {
    pub fn new() -> Self {
        Self {
            typescript: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            tsx: tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    fn language_for(&self, file_path: &str) -> &Language {
        let ext = Path::new(file_path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        if TYPESCRIPT_EXTENSIONS.contains(&ext) {
            &self.typescript
        } else {
            &self.tsx
        }
    }

    fn create_parser(&self, language: &Language) -> Result<Parser, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(language)
            .map_err(|e| ParseError::Language(e.to_string()))?;
        Ok(parser)
    }
}

impl Default for TreeSitterProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AstProvider for TreeSitterProvider {
    fn parse(&self, source: &str, file_path: &str) -> Result<SyntaxTree, ParseError> {
        let mut parser = self.create_parser(self.language_for(file_path))?;
        let tree = parser.parse(source, None).ok_or(ParseError::Aborted)?;
        let root = tree.root_node();

        if root.has_error() {
            return Err(first_syntax_error(root, source.as_bytes()));
        }

        Ok(lower(root, source.as_bytes()))
    }

    fn language(&self) -> &str {
        "typescript"
    }
}

/// Locate the first ERROR or MISSING node in document order.
fn first_syntax_error(root: Node, source: &[u8]) -> ParseError {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_missing() {
            let pos = node.start_position();
            return ParseError::Syntax {
                line: pos.row + 1,
                column: pos.column,
                detail: format!("missing {}", node.kind()),
            };
        }
        if node.is_error() {
            let pos = node.start_position();
            let text = node.utf8_text(source).unwrap_or("");
            let snippet: String = text.chars().take(24).collect();
            return ParseError::Syntax {
                line: pos.row + 1,
                column: pos.column,
                detail: format!("unexpected {:?}", snippet),
            };
        }

        let mut cursor = node.walk();
        let children: Vec<_> = node
            .children(&mut cursor)
            .filter(|c| c.has_error())
            .collect();
        stack.extend(children.into_iter().rev());
    }

    // has_error() was true but no node claimed it; report the root.
    ParseError::Syntax {
        line: 1,
        column: 0,
        detail: "unrecognized syntax".to_string(),
    }
}

/// Lower the named nodes of a tree-sitter tree into a `SyntaxTree`.
///
/// Iterative so that deeply nested sources cannot exhaust the stack.
fn lower(root: Node, source: &[u8]) -> SyntaxTree {
    let mut builder = TreeBuilder::new(classify(root, source), Span::from_node(root));
    let mut stack = vec![(root, builder.root())];

    while let Some((node, id)) = stack.pop() {
        let mut cursor = node.walk();
        let children: Vec<_> = node.named_children(&mut cursor).collect();
        let mut lowered = Vec::with_capacity(children.len());
        for child in children {
            let child_id = builder.child(id, classify(child, source), Span::from_node(child));
            lowered.push((child, child_id));
        }
        stack.extend(lowered.into_iter().rev());
    }

    builder.finish()
}

fn classify(node: Node, source: &[u8]) -> NodeKind {
    match node.kind() {
        "import_statement" => NodeKind::Import {
            source: module_source(node, source),
        },
        "export_statement" if node.child_by_field_name("source").is_some() => NodeKind::Import {
            source: module_source(node, source),
        },
        "call_expression" => NodeKind::Call {
            callee: callee(node, source),
            statement: removable_statement(node).map(Span::from_node),
        },
        "type_annotation" => NodeKind::TypeAnnotation {
            annotated: node.named_child(0).map(|ty| {
                let text = node_text(ty, source);
                AnnotatedType {
                    is_any: ty.kind() == "predefined_type" && text == "any",
                    text,
                    span: Span::from_node(ty),
                }
            }),
        },
        other => NodeKind::Other(other),
    }
}

/// The expression statement wrapping `call`, when deleting it leaves the
/// enclosing block intact. The body of a braceless `if` or loop does not
/// qualify.
fn removable_statement(call: Node) -> Option<Node> {
    let statement = call.parent().filter(|p| p.kind() == "expression_statement")?;
    let block = statement.parent()?;
    matches!(
        block.kind(),
        "program" | "statement_block" | "switch_case" | "switch_default"
    )
    .then_some(statement)
}

/// The module specifier of an import or re-export. `import x = require('m')`
/// keeps it on the inner `import_require_clause`.
fn module_source(node: Node, source: &[u8]) -> Option<String> {
    let literal = node.child_by_field_name("source").or_else(|| {
        let mut cursor = node.walk();
        let clause = node
            .named_children(&mut cursor)
            .find(|child| child.kind() == "import_require_clause")?;
        clause.child_by_field_name("source")
    })?;
    let text = node_text(literal, source);
    Some(text.trim_matches(|c| c == '\'' || c == '"').to_string())
}

fn callee(node: Node, source: &[u8]) -> Callee {
    let Some(function) = node.child_by_field_name("function") else {
        return Callee::Other;
    };

    match function.kind() {
        "member_expression" => Callee::Member {
            object: function
                .child_by_field_name("object")
                .map(|o| node_text(o, source)),
            property: function
                .child_by_field_name("property")
                .map(|p| node_text(p, source)),
            span: Span::from_node(function),
        },
        "identifier" => Callee::Identifier(node_text(function, source)),
        _ => Callee::Other,
    }
}

fn node_text(node: Node, source: &[u8]) -> String {
    node.utf8_text(source).unwrap_or("").to_string()
}
