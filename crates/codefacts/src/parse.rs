//! Java parsing front end using tree-sitter.
//!
//! A malformed unit is fatal for that unit only: [`parse_unit`] refuses to
//! hand a tree containing syntax errors to the walker, so no partial fact
//! stream can ever be produced for it.

use std::cell::RefCell;

use crate::{ExtractError, Result};

// Thread-local parser reuse - avoids creating a new parser per unit
thread_local! {
    static JAVA_PARSER: RefCell<tree_sitter::Parser> = RefCell::new({
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_java::LANGUAGE.into())
            .expect("tree-sitter-java grammar incompatible with tree-sitter version");
        parser
    });
}

/// One parsed, syntactically valid compilation unit.
#[derive(Debug)]
pub struct ParsedUnit {
    pub tree: tree_sitter::Tree,
}

impl ParsedUnit {
    pub fn root(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }
}

/// Parse one compilation unit, rejecting units with syntax errors.
pub fn parse_unit(source: &str) -> Result<ParsedUnit> {
    let tree = JAVA_PARSER.with(|parser| parser.borrow_mut().parse(source, None));

    let tree = match tree {
        Some(tree) => tree,
        None => {
            return Err(ExtractError::ParserFailure(
                "tree-sitter returned no tree".to_string(),
            ))
        }
    };

    let root = tree.root_node();
    if root.has_error() {
        let (line, column) = first_error_position(&root);
        return Err(ExtractError::SyntaxError { line, column });
    }

    Ok(ParsedUnit { tree })
}

/// Locate the first error or missing node, 1-indexed.
fn first_error_position(root: &tree_sitter::Node) -> (u32, u32) {
    let mut cursor = root.walk();
    let mut position = None;

    'outer: loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            let start = node.start_position();
            position = Some(((start.row + 1) as u32, (start.column + 1) as u32));
            break;
        }
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                break 'outer;
            }
        }
    }

    position.unwrap_or((1, 1))
}

/// The UTF-8 text of a node. Slicing is safe: node byte ranges always fall on
/// character boundaries of the source the tree was parsed from.
pub fn node_text<'a>(node: &tree_sitter::Node, source: &'a str) -> &'a str {
    &source[node.byte_range()]
}

/// Find a child node by its kind.
pub fn find_child_by_kind<'a>(
    node: &tree_sitter::Node<'a>,
    kind: &str,
) -> Option<tree_sitter::Node<'a>> {
    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            if cursor.node().kind() == kind {
                return Some(cursor.node());
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    None
}

/// All named children of a node, in order.
pub fn named_children<'a>(node: &tree_sitter::Node<'a>) -> Vec<tree_sitter::Node<'a>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}
