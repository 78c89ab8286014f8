/// SmartyPants: typographic quotes, dashes and ellipses in text nodes.
use crate::ast::Node;

pub(crate) fn educate(document: Node) -> Node {
    Educator { prev: None }.visit(document)
}

/// Walks the tree in document order carrying the character that precedes
/// the current text, so quote direction is decided across inline node
/// boundaries (`"*word*"`).
struct Educator {
    prev: Option<char>,
}

impl Educator {
    fn visit(&mut self, node: Node) -> Node {
        match node {
            Node::Text(text) => Node::Text(self.educate(&text)),
            Node::CodeBlock { .. } | Node::HtmlBlock(_) | Node::ThematicBreak => {
                self.prev = None;
                node
            }
            Node::Code(_)
            | Node::Entity(_)
            | Node::HtmlInline(_)
            | Node::Autolink { .. }
            | Node::Hashtag(_)
            | Node::Username(_)
            | Node::HardBreak
            | Node::FootnoteReference { .. } => {
                if let Some(last) = node.plain_text().chars().last() {
                    self.prev = Some(last);
                }
                node
            }
            Node::Document(_)
            | Node::Paragraph(_)
            | Node::Heading { .. }
            | Node::List { .. }
            | Node::ListItem(_)
            | Node::BlockQuote(_)
            | Node::SpoilerBlock(_)
            | Node::FootnoteDefinition { .. } => {
                self.prev = None;
                let node = node.map_children(|child| self.visit(child));
                self.prev = None;
                node
            }
            inline => inline.map_children(|child| self.visit(child)),
        }
    }

    fn educate(&mut self, text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;
        while i < chars.len() {
            let next = chars.get(i + 1).copied();
            let (glyph, width) = match chars[i] {
                '-' if next == Some('-') && chars.get(i + 2) == Some(&'-') => ('\u{2014}', 3),
                '-' if next == Some('-') => ('\u{2013}', 2),
                '.' if next == Some('.') && chars.get(i + 2) == Some(&'.') => ('\u{2026}', 3),
                '"' if opens_quote(self.prev, next) => ('\u{201c}', 1),
                '"' => ('\u{201d}', 1),
                // Elided digits: '90s
                '\'' if next.is_some_and(|n| n.is_ascii_digit()) => ('\u{2019}', 1),
                '\'' if opens_quote(self.prev, next) => ('\u{2018}', 1),
                '\'' => ('\u{2019}', 1),
                c => (c, 1),
            };
            out.push(glyph);
            self.prev = Some(glyph);
            i += width;
        }
        out
    }
}

const OPENING_PUNCTUATION: &str = "([{\u{2013}\u{2014}\u{201c}\u{2018}";

/// A quote opens after whitespace or opening punctuation and before
/// something that is not whitespace.
fn opens_quote(prev: Option<char>, next: Option<char>) -> bool {
    let after_break = prev.is_none_or(|p| p.is_whitespace() || OPENING_PUNCTUATION.contains(p));
    after_break && next.is_none_or(|n| !n.is_whitespace())
}
