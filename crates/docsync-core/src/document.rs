//! MDX document parsing and prose stripping.
//!
//! [`ParsedDocument::parse`] turns raw markdown/MDX into a [`ContentTree`]
//! (top-level mdast nodes). The unstripped tree feeds metadata extraction;
//! [`ParsedDocument::strip`] then removes every non-prose node kind (ESM,
//! JSX, expressions, frontmatter) to produce the tree that gets sectioned.
//!
//! Sections are re-serialized from the original text: each kept node is
//! rendered from its source span with the spans of stripped descendants cut
//! out, so headings, lists, and code fences keep the author's formatting.

use std::ops::Range;

use anyhow::{anyhow, Result};
use markdown::mdast::Node;
use markdown::{MdxEsmParse, MdxSignal, ParseOptions};

use crate::meta::is_unfinished_statement;

/// An ordered list of top-level mdast nodes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentTree {
    pub children: Vec<Node>,
}

impl ContentTree {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// A document parsed with the MDX grammar, borrowing its source text.
#[derive(Debug, Clone)]
pub struct ParsedDocument<'a> {
    source: &'a str,
    tree: ContentTree,
}

/// The prose-only view of a [`ParsedDocument`].
#[derive(Debug, Clone)]
pub struct StrippedDocument<'a> {
    source: &'a str,
    tree: ContentTree,
    /// Byte ranges of removed nodes, sorted by start.
    removed: Vec<Range<usize>>,
}

// An ESM block ends at the first blank line after which its code is a
// finished statement; until then it keeps absorbing lines. Finished code is
// not validated further. The metadata extractor reads the statement later.
fn check_esm(code: &str) -> MdxSignal {
    if is_unfinished_statement(code) {
        return MdxSignal::Eof(
            "Unexpected end of file in ESM statement".to_string(),
            Box::new("docsync".to_string()),
            Box::new("unexpected-eof".to_string()),
        );
    }
    MdxSignal::Ok
}

fn parse_options() -> ParseOptions {
    let mut options = ParseOptions::mdx();
    options.constructs.frontmatter = true;
    let esm_parse: Box<MdxEsmParse> = Box::new(check_esm);
    options.mdx_esm_parse = Some(esm_parse);
    options
}

impl<'a> ParsedDocument<'a> {
    /// Parse `source` as MDX.
    ///
    /// # Errors
    ///
    /// Returns the parser's message for invalid MDX (e.g. an unclosed JSX tag).
    pub fn parse(source: &'a str) -> Result<Self> {
        let root = markdown::to_mdast(source, &parse_options())
            .map_err(|err| anyhow!("invalid MDX: {}", err))?;

        let children = match root {
            Node::Root(root) => root.children,
            other => vec![other],
        };

        Ok(Self {
            source,
            tree: ContentTree::new(children),
        })
    }

    /// The full tree, including ESM and JSX nodes.
    pub fn tree(&self) -> &ContentTree {
        &self.tree
    }

    /// Remove non-prose nodes at every depth.
    ///
    /// A parent whose children were all removed is removed too. Returns
    /// `None` when that empties a root which had children.
    pub fn strip(&self) -> Option<StrippedDocument<'a>> {
        let mut children = self.tree.children.clone();
        let had_children = !children.is_empty();
        let mut removed = Vec::new();

        strip_children(&mut children, &mut removed);

        if had_children && children.is_empty() {
            return None;
        }

        removed.sort_by_key(|range| range.start);
        Some(StrippedDocument {
            source: self.source,
            tree: ContentTree::new(children),
            removed,
        })
    }
}

impl<'a> StrippedDocument<'a> {
    pub fn tree(&self) -> &ContentTree {
        &self.tree
    }

    /// Serialize a (sub)tree of this document back to markdown.
    ///
    /// Top-level nodes are separated by one blank line.
    pub fn to_markdown(&self, tree: &ContentTree) -> String {
        tree.children
            .iter()
            .map(|node| self.render_node(node))
            .filter(|rendered| !rendered.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn render_node(&self, node: &Node) -> String {
        let Some(range) = span(node) else {
            return plain_text(node);
        };

        let mut out = String::new();
        let mut cursor = range.start;
        for cut in &self.removed {
            if cut.start >= range.end {
                break;
            }
            if cut.end <= cursor {
                continue;
            }
            if cut.start > cursor {
                out.push_str(self.slice(cursor..cut.start));
            }
            cursor = cut.end.min(range.end);
        }
        if cursor < range.end {
            out.push_str(self.slice(cursor..range.end));
        }

        out.trim().to_string()
    }

    fn slice(&self, range: Range<usize>) -> &'a str {
        self.source.get(range).unwrap_or_default()
    }
}

fn is_stripped(node: &Node) -> bool {
    matches!(
        node,
        Node::MdxjsEsm(_)
            | Node::MdxJsxFlowElement(_)
            | Node::MdxJsxTextElement(_)
            | Node::MdxFlowExpression(_)
            | Node::MdxTextExpression(_)
            | Node::Yaml(_)
            | Node::Toml(_)
    )
}

fn span(node: &Node) -> Option<Range<usize>> {
    node.position()
        .map(|position| position.start.offset..position.end.offset)
}

fn strip_children(children: &mut Vec<Node>, removed: &mut Vec<Range<usize>>) {
    children.retain_mut(|node| {
        let node_span = span(node);
        if is_stripped(node) {
            removed.extend(node_span);
            return false;
        }
        if let Some(grandchildren) = node.children_mut() {
            let had_children = !grandchildren.is_empty();
            strip_children(grandchildren, removed);
            if had_children && grandchildren.is_empty() {
                removed.extend(node_span);
                return false;
            }
        }
        true
    });
}

/// Concatenated text content of a node (headings, links, emphasis, ...).
pub fn plain_text(node: &Node) -> String {
    match node {
        Node::Text(text) => text.value.clone(),
        Node::InlineCode(code) => code.value.clone(),
        Node::InlineMath(math) => math.value.clone(),
        Node::Code(code) => code.value.clone(),
        Node::Math(math) => math.value.clone(),
        Node::Html(html) => html.value.clone(),
        Node::Image(image) => image.alt.clone(),
        other => other
            .children()
            .map(|children| children.iter().map(plain_text).collect())
            .unwrap_or_default(),
    }
}
