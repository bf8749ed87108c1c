//! Helpers shared by the tree-sitter backends.

use crate::error::{Error, Result};
use std::path::Path;
use tree_sitter::{Node, Parser, Tree};

/// Parse `content` with a fresh parser for `language`.
///
/// Parsers are cheap and not `Sync`, so each call owns one.
pub fn parse_tree(path: &Path, language: tree_sitter::Language, content: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    parser.set_language(&language)?;
    parser
        .parse(content, None)
        .ok_or_else(|| Error::parse(path, "tree-sitter produced no tree"))
}

/// Source text of `node`, empty when the range is not valid UTF-8.
pub fn text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// Source text of the named field `field`, if present.
pub fn field_text<'a>(node: Node, field: &str, source: &'a str) -> Option<&'a str> {
    node.child_by_field_name(field).map(|n| text(n, source))
}

/// 1-based line of the node's first byte.
pub fn line(node: Node) -> usize {
    node.start_position().row + 1
}

/// Named children of `node`, in order.
pub fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// Siblings immediately before `node` whose kind is in `kinds`, in source order.
///
/// Walking stops at the first sibling of another kind.
pub fn preceding_siblings<'t>(node: Node<'t>, kinds: &[&str]) -> Vec<Node<'t>> {
    let mut found = Vec::new();
    let mut current = node.prev_sibling();
    while let Some(sibling) = current {
        if !kinds.contains(&sibling.kind()) {
            break;
        }
        found.push(sibling);
        current = sibling.prev_sibling();
    }
    found.reverse();
    found
}
