//! Splitting a stripped document into heading-delimited sections.
//!
//! [`split_tree_by`] is the generic splitter; [`process_sections`] applies
//! it with "any heading" as the boundary, resolves each section's heading
//! and custom anchor, and assigns per-document unique slugs.

use std::sync::OnceLock;

use markdown::mdast::Node;
use regex::Regex;

use crate::document::{plain_text, ContentTree, StrippedDocument};
use crate::models::Section;
use crate::slug::Slugger;

/// Heading text with its optional `[#anchor]` tag separated out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHeading {
    pub heading: String,
    pub custom_anchor: Option<String>,
}

fn anchor_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*)\[#(.*)\]$").expect("anchor regex is valid"))
}

/// Split off a trailing `[#custom-anchor]` tag.
///
/// Without a tag the input comes back unchanged, brackets and all.
pub fn parse_heading(text: &str) -> ParsedHeading {
    let Some(caps) = anchor_tag().captures(text) else {
        return ParsedHeading {
            heading: text.to_string(),
            custom_anchor: None,
        };
    };

    let heading = caps[1].trim().to_string();
    let anchor = &caps[2];
    ParsedHeading {
        heading,
        custom_anchor: (!anchor.is_empty()).then(|| anchor.to_string()),
    }
}

/// Partition the top-level children of `tree` into consecutive groups.
///
/// A group starts at the first node and at every node matching `predicate`.
/// Concatenating the output in order gives back the input children.
pub fn split_tree_by<F>(tree: &ContentTree, predicate: F) -> Vec<ContentTree>
where
    F: Fn(&Node) -> bool,
{
    let mut sections: Vec<ContentTree> = Vec::new();

    for node in &tree.children {
        if sections.is_empty() || predicate(node) {
            sections.push(ContentTree::new(vec![node.clone()]));
        } else if let Some(current) = sections.last_mut() {
            current.children.push(node.clone());
        }
    }

    sections
}

pub fn is_heading(node: &Node) -> bool {
    matches!(node, Node::Heading(_))
}

/// Section a stripped document at every heading.
///
/// A leading run of content before the first heading becomes a section
/// with an empty heading and slug.
pub fn process_sections(doc: &StrippedDocument<'_>) -> Vec<Section> {
    let mut slugger = Slugger::new();

    split_tree_by(doc.tree(), is_heading)
        .into_iter()
        .map(|tree| {
            let (heading, slug) = match tree.children.first() {
                Some(node @ Node::Heading(_)) => {
                    let parsed = parse_heading(&plain_text(node));
                    let slug = slugger.slug(parsed.custom_anchor.as_deref().unwrap_or(&parsed.heading));
                    (parsed.heading, slug)
                }
                _ => (String::new(), String::new()),
            };
            Section {
                content: doc.to_markdown(&tree),
                heading,
                slug,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ParsedDocument;

    fn sections_of(source: &str) -> Vec<Section> {
        let parsed = ParsedDocument::parse(source).unwrap();
        parsed
            .strip()
            .map(|stripped| process_sections(&stripped))
            .unwrap_or_default()
    }

    fn tree_of(source: &str) -> ContentTree {
        ParsedDocument::parse(source).unwrap().tree().clone()
    }

    #[test]
    fn parse_heading_with_custom_anchor() {
        assert_eq!(
            parse_heading("Heading [with] [#custom-anchor]"),
            ParsedHeading {
                heading: "Heading [with]".into(),
                custom_anchor: Some("custom-anchor".into()),
            }
        );
    }

    #[test]
    fn parse_heading_without_anchor_is_unchanged() {
        assert_eq!(
            parse_heading("Plain [bracketed] heading"),
            ParsedHeading {
                heading: "Plain [bracketed] heading".into(),
                custom_anchor: None,
            }
        );
        assert_eq!(parse_heading("").heading, "");
        assert_eq!(parse_heading("").custom_anchor, None);
    }

    #[test]
    fn parse_heading_requires_tag_at_end() {
        let parsed = parse_heading("Title [#anchor] trailing");
        assert_eq!(parsed.heading, "Title [#anchor] trailing");
        assert_eq!(parsed.custom_anchor, None);
    }

    #[test]
    fn parse_heading_with_empty_anchor() {
        let parsed = parse_heading("Title [#]");
        assert_eq!(parsed.heading, "Title");
        assert_eq!(parsed.custom_anchor, None);
    }

    #[test]
    fn split_empty_tree_gives_no_sections() {
        assert!(split_tree_by(&ContentTree::default(), is_heading).is_empty());
    }

    #[test]
    fn split_without_matches_gives_one_section() {
        let tree = tree_of("First paragraph.\n\nSecond paragraph.");
        let sections = split_tree_by(&tree, is_heading);
        assert_eq!(sections, vec![tree]);
    }

    #[test]
    fn split_concatenation_reconstructs_input() {
        let tree = tree_of("Intro.\n\n# A\n\nText.\n\n# B\n\n## C\n\nMore.");
        let sections = split_tree_by(&tree, is_heading);
        assert_eq!(sections.len(), 4);
        let rejoined: Vec<Node> = sections.into_iter().flat_map(|s| s.children).collect();
        assert_eq!(rejoined, tree.children);
    }

    #[test]
    fn consecutive_matches_each_start_a_section() {
        let tree = tree_of("# One\n\n# Two\n\n# Three");
        let sections = split_tree_by(&tree, is_heading);
        assert_eq!(sections.len(), 3);
        assert!(sections.iter().all(|s| s.children.len() == 1));
    }

    #[test]
    fn first_node_always_starts_a_section() {
        let tree = tree_of("# A\n\ntext");
        let sections = split_tree_by(&tree, |_| false);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].children.len(), 2);
    }

    #[test]
    fn sections_split_at_every_heading() {
        let sections = sections_of(
            "# Main Heading\n\nSome content.\n\n## Subheading\n\nMore content.\n\n# Another Heading\n\nEven more.",
        );
        let headings: Vec<&str> = sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(headings, vec!["Main Heading", "Subheading", "Another Heading"]);
        assert_eq!(sections[0].content, "# Main Heading\n\nSome content.");
        assert_eq!(sections[1].slug, "subheading");
    }

    #[test]
    fn leading_content_has_empty_heading_and_slug() {
        let sections = sections_of("Preamble text.\n\n# Title\n\nBody.");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].heading, "");
        assert_eq!(sections[0].slug, "");
        assert_eq!(sections[0].content, "Preamble text.");
        assert_eq!(sections[1].slug, "title");
    }

    #[test]
    fn duplicate_headings_get_suffixed_slugs() {
        let sections = sections_of("# Setup\n\na\n\n# Setup\n\nb\n\n# Setup\n\nc");
        let slugs: Vec<&str> = sections.iter().map(|s| s.slug.as_str()).collect();
        assert_eq!(slugs, vec!["setup", "setup-1", "setup-2"]);
    }

    #[test]
    fn custom_anchor_drives_slug() {
        let sections = sections_of("# Getting Started [#start]\n\nText.");
        assert_eq!(sections[0].heading, "Getting Started");
        assert_eq!(sections[0].slug, "start");
    }

    #[test]
    fn heading_text_ignores_inline_formatting() {
        let sections = sections_of("# The `config` **file**\n\nText.");
        assert_eq!(sections[0].heading, "The config file");
        assert_eq!(sections[0].slug, "the-config-file");
    }

    #[test]
    fn jsx_inside_heading_is_left_out_of_text_and_slug() {
        let sections = sections_of("# Hello <Badge /> world\n\nText.");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].heading, "Hello  world");
        assert_eq!(sections[0].slug, "hello--world");
        assert_eq!(sections[0].content, "# Hello  world\n\nText.");
    }

    #[test]
    fn meta_export_with_blank_lines_does_not_become_a_section() {
        let sections =
            sections_of("export const meta = {\n  title: \"T\",\n\n  order: 2\n};\n\n# Heading\n\nBody.");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].heading, "Heading");
        assert_eq!(sections[0].content, "# Heading\n\nBody.");
    }

    #[test]
    fn slugs_do_not_leak_between_documents() {
        let first = sections_of("# Overview");
        let second = sections_of("# Overview");
        assert_eq!(first[0].slug, "overview");
        assert_eq!(second[0].slug, "overview");
    }

    #[test]
    fn jsx_is_not_part_of_section_content() {
        let sections =
            sections_of("export const meta = {};\n\n# Title\n\n<Tabs items={[1]} />\n\nBody.");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].content, "# Title\n\nBody.");
    }
}
