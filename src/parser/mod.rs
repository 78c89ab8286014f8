/// Markdown parser: block grammar, then inline grammar, then the optional
/// footnote and SmartyPants passes.
///
/// All state (cursor, reference table, footnote table, failure cache) lives
/// in values created by [`Parser::parse`] and dropped when it returns.
mod block;
pub(crate) mod html;
mod inline;

use crate::ast::Node;
use crate::footnotes::{self, FootnoteTable};
use crate::matcher::Grammar;
use crate::options::Options;
use crate::smart;
use block::{Block, BlockParser};
use inline::InlineParser;
use std::collections::HashMap;
use unicode_casefold::UnicodeCaseFold;

/// Containers (block quotes, lists, spoilers) nested deeper than this are
/// left as literal text.
const MAX_BLOCK_NESTING: usize = 32;

/// Inline constructs nested deeper than this are left as literal text.
const MAX_INLINE_NESTING: usize = 48;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LinkTarget {
    pub url: String,
    pub title: Option<String>,
}

/// Link reference and footnote definitions collected by the block grammar.
#[derive(Debug, Default)]
pub(crate) struct Definitions {
    pub references: HashMap<String, LinkTarget>,
    pub notes: Vec<(String, Vec<Block>)>,
}

impl Definitions {
    /// The first definition of a label wins.
    fn add_reference(&mut self, label: &str, target: LinkTarget) {
        self.references
            .entry(normalize_label(label))
            .or_insert(target);
    }

    fn add_note(&mut self, label: &str, blocks: Vec<Block>) {
        let key = normalize_label(label);
        if !self.notes.iter().any(|(existing, _)| *existing == key) {
            self.notes.push((key, blocks));
        }
    }
}

/// Normalize a label for matching (Unicode case folding, collapsed whitespace)
pub(crate) fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .map(|word| word.chars().case_fold().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Line-level terminals shared by every Markdown grammar.
pub(crate) trait Terminals<'a>: Grammar<'a> {
    fn spacechar(&mut self) -> Option<char> {
        self.matcher().one_of(" \t")
    }

    /// `Sp`: optional run of spaces and tabs.
    fn sp(&mut self) {
        self.matcher().skip_while(|c| c == ' ' || c == '\t');
    }

    fn newline(&mut self) -> Option<()> {
        self.lit("\n")
    }

    /// `Spnl`: optional spaces, at most one newline, optional spaces.
    fn spnl(&mut self) {
        self.sp();
        self.optional(|g| {
            g.newline()?;
            g.sp();
            Some(())
        });
    }

    fn blank_line(&mut self) -> Option<()> {
        self.sp();
        self.newline()
    }

    /// A raw line including its newline. The last line of the input may
    /// lack one.
    fn line(&mut self) -> Option<&'a str> {
        let m = self.matcher();
        if m.at_end() {
            return None;
        }
        let start = m.pos();
        m.skip_while(|c| c != '\n');
        m.literal("\n");
        Some(m.since(start))
    }

    /// Up to three spaces.
    fn nonindent_space(&mut self) {
        let m = self.matcher();
        for _ in 0..3 {
            if !m.literal(" ") {
                break;
            }
        }
    }

    fn indent(&mut self) -> Option<()> {
        self.lit("    ")
    }
}

impl<'a, G: Grammar<'a>> Terminals<'a> for G {}

/// Expand tabs to four-column stops, unify line endings and terminate the
/// text with a blank line.
fn normalize(text: &str) -> String {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut out = String::with_capacity(text.len() + 2);
    let mut column = 0;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\t' => {
                let width = 4 - column % 4;
                out.extend(std::iter::repeat_n(' ', width));
                column += width;
            }
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
                column = 0;
            }
            '\n' => {
                out.push('\n');
                column = 0;
            }
            _ => {
                out.push(c);
                column += 1;
            }
        }
    }
    out.push_str("\n\n");
    out
}

pub(crate) struct Parser<'o> {
    options: &'o Options,
}

impl<'o> Parser<'o> {
    pub fn new(options: &'o Options) -> Self {
        Parser { options }
    }

    pub fn parse(&self, text: &str) -> Node {
        let source = normalize(text);
        let mut definitions = Definitions::default();
        let blocks = BlockParser::new(&source, self.options, &mut definitions).document();
        tracing::debug!(
            blocks = blocks.len(),
            references = definitions.references.len(),
            notes = definitions.notes.len(),
            "block structure parsed"
        );

        let Definitions { references, notes } = definitions;
        let builder = Builder {
            options: self.options,
            references: &references,
        };
        let mut document = Node::Document(builder.blocks(blocks));

        if self.options.notes {
            let table: FootnoteTable = notes
                .into_iter()
                .map(|(label, blocks)| (label, builder.blocks(blocks)))
                .collect();
            document = footnotes::resolve(document, table);
        }
        if self.options.smart {
            document = smart::educate(document);
        }
        document
    }
}

/// Turns the block tree into AST nodes, running the inline grammar over the
/// text each leaf block captured.
struct Builder<'c> {
    options: &'c Options,
    references: &'c HashMap<String, LinkTarget>,
}

impl Builder<'_> {
    fn blocks(&self, blocks: Vec<Block>) -> Vec<Node> {
        blocks.into_iter().map(|block| self.block(block)).collect()
    }

    fn block(&self, block: Block) -> Node {
        match block {
            Block::Paragraph(text) => Node::Paragraph(self.inlines(&text)),
            Block::Heading { level, text } => Node::Heading {
                level,
                children: self.inlines(&text),
            },
            Block::BlockQuote(children) => Node::BlockQuote(self.blocks(children)),
            Block::Spoiler(children) => Node::SpoilerBlock(self.blocks(children)),
            Block::CodeBlock { info, literal } => Node::CodeBlock { info, literal },
            Block::HorizontalRule => Node::ThematicBreak,
            Block::List {
                ordered,
                tight,
                items,
            } => Node::List {
                ordered,
                tight,
                children: items
                    .into_iter()
                    .map(|item| Node::ListItem(self.blocks(item)))
                    .collect(),
            },
            Block::Html(raw) => Node::HtmlBlock(raw),
        }
    }

    fn inlines(&self, text: &str) -> Vec<Node> {
        InlineParser::new(text, self.options, self.references).parse()
    }
}
