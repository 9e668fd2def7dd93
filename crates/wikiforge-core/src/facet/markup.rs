//! Article markup parsing.
//!
//! [`LightMarkupParser`] understands a deliberately small markup subset:
//!
//! - `== Heading ==` opens a new section (text before the first heading is
//!   section 0, "Introduction")
//! - blank lines separate paragraphs
//! - `[[Target]]` and `[[Target|anchor]]` are links
//! - `[[Category:Name]]` records a category; `File:` and `Image:` links vanish
//! - `{{name|...}}` is a template: recorded by name, removed from the text
//! - runs of two or more apostrophes (bold/italic) are dropped
//!
//! Link offsets are character offsets into the paragraph's plaintext.

use crate::primitives::{FORBIDDEN_LINK_PREFIXES, INTRO_SECTION_NAME};
use serde::{Deserialize, Serialize};

// =============================================================================
// DOCUMENT MODEL
// =============================================================================

/// A link inside a paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiLink {
    /// Normalized target title.
    pub target: String,
    /// Anchor text as rendered.
    pub anchor: String,
    /// First character of the anchor in the plaintext.
    pub start: u32,
    /// One past the last character of the anchor.
    pub end: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    pub section_idx: u32,
    pub section_name: String,
    pub plaintext: String,
    pub wikilinks: Vec<WikiLink>,
}

/// Parsed form of one article.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredDocument {
    pub paragraphs: Vec<Paragraph>,
    pub categories: Vec<String>,
    /// Template names, lowercase with underscores as spaces, in order of appearance.
    pub templates: Vec<String>,
}

/// Turns raw article markup into a [`StructuredDocument`].
pub trait MarkupParser: Send + Sync {
    fn parse(&self, raw: &str) -> StructuredDocument;
}

/// Canonical page title form: trimmed, fragment removed, spaces as
/// underscores, first character uppercase.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    let base = title.split('#').next().unwrap_or_default().trim();
    let mut chars = base.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first
            .to_uppercase()
            .chain(chars)
            .map(|c| if c == ' ' { '_' } else { c })
            .collect(),
    }
}

// =============================================================================
// LIGHT PARSER
// =============================================================================

/// Parser for the minimal markup described in the module docs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LightMarkupParser;

impl MarkupParser for LightMarkupParser {
    fn parse(&self, raw: &str) -> StructuredDocument {
        let mut doc = StructuredDocument::default();
        let mut section_idx = 0u32;
        let mut section_name = INTRO_SECTION_NAME.to_string();
        let mut block: Vec<&str> = Vec::new();

        for line in raw.lines() {
            let trimmed = line.trim();
            if let Some(heading) = heading(trimmed) {
                flush(&mut doc, &mut block, section_idx, &section_name);
                section_idx = section_idx.saturating_add(1);
                section_name = heading;
            } else if trimmed.is_empty() {
                flush(&mut doc, &mut block, section_idx, &section_name);
            } else {
                block.push(trimmed);
            }
        }
        flush(&mut doc, &mut block, section_idx, &section_name);
        doc
    }
}

fn heading(line: &str) -> Option<String> {
    if line.len() < 4 || !line.starts_with("==") || !line.ends_with("==") {
        return None;
    }
    let name = line.trim_matches('=').trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn flush(doc: &mut StructuredDocument, block: &mut Vec<&str>, section_idx: u32, section_name: &str) {
    if block.is_empty() {
        return;
    }
    let joined = block.join(" ");
    block.clear();

    let (plaintext, wikilinks) = render(&joined, doc);
    if plaintext.is_empty() {
        return;
    }
    doc.paragraphs.push(Paragraph {
        section_idx,
        section_name: section_name.to_string(),
        plaintext,
        wikilinks,
    });
}

/// Render one paragraph, collecting templates and categories into `doc`.
fn render(source: &str, doc: &mut StructuredDocument) -> (String, Vec<WikiLink>) {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::new();
    let mut out_len = 0u32;
    let mut links = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if starts_with(&chars, i, "{{") {
            if let Some(close) = template_end(&chars, i) {
                let inner: String = chars[i + 2..close].iter().collect();
                let name = inner
                    .split('|')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_lowercase()
                    .replace('_', " ");
                if !name.is_empty() {
                    doc.templates.push(name);
                }
                i = close + 2;
                continue;
            }
        }
        if starts_with(&chars, i, "[[") {
            if let Some(close) = find(&chars, i + 2, "]]") {
                let inner: String = chars[i + 2..close].iter().collect();
                i = close + 2;
                let (target, anchor) = match inner.split_once('|') {
                    Some((t, a)) => (t.trim(), a.trim()),
                    None => (inner.trim(), inner.trim()),
                };
                let lower = target.to_lowercase();
                if lower.starts_with("category:") {
                    let name = target.split_once(':').map_or("", |(_, name)| name);
                    doc.categories.push(normalize_title(name));
                    continue;
                }
                if FORBIDDEN_LINK_PREFIXES
                    .iter()
                    .any(|prefix| lower.starts_with(prefix) && lower[prefix.len()..].starts_with(':'))
                {
                    continue;
                }
                let start = out_len;
                for c in anchor.chars() {
                    out.push(c);
                    out_len += 1;
                }
                let target = normalize_title(target);
                if !target.is_empty() && out_len > start {
                    links.push(WikiLink {
                        target,
                        anchor: anchor.to_string(),
                        start,
                        end: out_len,
                    });
                }
                continue;
            }
        }
        if starts_with(&chars, i, "''") {
            while chars.get(i) == Some(&'\'') {
                i += 1;
            }
            continue;
        }
        if let Some(&c) = chars.get(i) {
            out.push(c);
            out_len += 1;
        }
        i += 1;
    }

    // Trim, shifting link offsets past the removed leading whitespace.
    let lead = out.chars().take_while(|c| c.is_whitespace()).count() as u32;
    for link in &mut links {
        link.start = link.start.saturating_sub(lead);
        link.end = link.end.saturating_sub(lead);
    }
    (out.trim().to_string(), links)
}

fn starts_with(chars: &[char], at: usize, pattern: &str) -> bool {
    let mut idx = at;
    for p in pattern.chars() {
        if chars.get(idx) != Some(&p) {
            return false;
        }
        idx += 1;
    }
    true
}

fn find(chars: &[char], from: usize, pattern: &str) -> Option<usize> {
    (from..chars.len()).find(|&i| starts_with(chars, i, pattern))
}

/// Index of the `}}` closing the template opened at `open`, honoring nesting.
fn template_end(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        if starts_with(chars, i, "{{") {
            depth += 1;
            i += 2;
        } else if starts_with(chars, i, "}}") {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
            i += 2;
        } else {
            i += 1;
        }
    }
    None
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_titles() {
        assert_eq!(normalize_title("anarchism in france"), "Anarchism_in_france");
        assert_eq!(normalize_title(" ångström#History "), "Ångström");
        assert_eq!(normalize_title("#Section"), "");
    }

    #[test]
    fn sections_and_paragraphs() {
        let doc = LightMarkupParser.parse("Intro one.\nstill intro.\n\nSecond para.\n== History ==\nOld.\n");
        let shape: Vec<_> = doc
            .paragraphs
            .iter()
            .map(|p| (p.section_idx, p.section_name.as_str(), p.plaintext.as_str()))
            .collect();
        assert_eq!(
            shape,
            vec![
                (0, "Introduction", "Intro one. still intro."),
                (0, "Introduction", "Second para."),
                (1, "History", "Old."),
            ]
        );
    }

    #[test]
    fn links_have_char_offsets() {
        let doc = LightMarkupParser.parse("Über [[political philosophy|politics]] and [[Anarchy]].");
        let p = &doc.paragraphs[0];
        assert_eq!(p.plaintext, "Über politics and Anarchy.");
        let first = &p.wikilinks[0];
        assert_eq!(first.target, "Political_philosophy");
        assert_eq!((first.start, first.end), (5, 13));
        let second = &p.wikilinks[1];
        let anchor: String = p
            .plaintext
            .chars()
            .skip(second.start as usize)
            .take((second.end - second.start) as usize)
            .collect();
        assert_eq!(anchor, "Anarchy");
    }

    #[test]
    fn templates_and_categories_are_removed() {
        let doc = LightMarkupParser.parse(
            "{{Good article}}{{Infobox|name={{nested}}}} '''Bold''' text.[[Category:Political ideologies]][[File:A.png|thumb]]",
        );
        assert_eq!(doc.templates, vec!["good article", "infobox"]);
        assert_eq!(doc.categories, vec!["Political_ideologies"]);
        assert_eq!(doc.paragraphs[0].plaintext, "Bold text.");
        assert!(doc.paragraphs[0].wikilinks.is_empty());
    }

    #[test]
    fn leading_template_does_not_shift_links() {
        let doc = LightMarkupParser.parse("{{Short description|x}}\n[[Paris]] is big.");
        let p = &doc.paragraphs[0];
        assert_eq!(p.plaintext, "Paris is big.");
        assert_eq!((p.wikilinks[0].start, p.wikilinks[0].end), (0, 5));
    }

    #[test]
    fn empty_paragraphs_dropped() {
        let doc = LightMarkupParser.parse("{{Only template}}\n\n\n");
        assert!(doc.paragraphs.is_empty());
        assert_eq!(doc.templates, vec!["only template"]);
    }
}
