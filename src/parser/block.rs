/// Block grammar: segments the normalized source into block nodes.
///
/// Leaf blocks keep their text verbatim for the inline grammar. Container
/// blocks (quotes, list items, spoilers, footnote bodies) capture their raw
/// text with the container markers stripped and re-parse it as a nested
/// document.
use super::html::HtmlScanner;
use super::{Definitions, LinkTarget, MAX_BLOCK_NESTING, Terminals};
use crate::matcher::{Grammar, Matcher};
use crate::options::Options;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Block {
    Paragraph(String),
    Heading { level: u8, text: String },
    BlockQuote(Vec<Block>),
    Spoiler(Vec<Block>),
    CodeBlock { info: String, literal: String },
    HorizontalRule,
    List {
        ordered: bool,
        tight: bool,
        items: Vec<Vec<Block>>,
    },
    Html(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bullet,
    Ordered,
}

/// Raw text of one list item, split where a continuation block followed the
/// item text without a blank line. Each chunk is parsed on its own.
type ItemChunks = Vec<String>;

pub(crate) struct BlockParser<'a, 'c> {
    m: Matcher<'a>,
    options: &'c Options,
    definitions: &'c mut Definitions,
    depth: usize,
}

impl<'a> Grammar<'a> for BlockParser<'a, '_> {
    fn matcher(&mut self) -> &mut Matcher<'a> {
        &mut self.m
    }
}

impl<'a, 'c> BlockParser<'a, 'c> {
    pub fn new(source: &'a str, options: &'c Options, definitions: &'c mut Definitions) -> Self {
        BlockParser {
            m: Matcher::new(source),
            options,
            definitions,
            depth: 0,
        }
    }

    /// `Doc = Block*`
    pub fn document(mut self) -> Vec<Block> {
        let mut blocks: Vec<Block> = self.many(Self::block).into_iter().flatten().collect();
        let rest = self.m.rest().trim();
        if !rest.is_empty() {
            blocks.push(Block::Paragraph(rest.to_string()));
        }
        blocks
    }

    /// Parse text captured by a container as a document of its own.
    fn nested(&mut self, mut raw: String) -> Vec<Block> {
        raw.push('\n');
        BlockParser {
            m: Matcher::new(&raw),
            options: self.options,
            definitions: &mut *self.definitions,
            depth: self.depth + 1,
        }
        .document()
    }

    fn can_nest(&self) -> Option<()> {
        (self.depth < MAX_BLOCK_NESTING).then_some(())
    }

    /// A block, or `Some(None)` for a definition that leaves the flow.
    fn block(&mut self) -> Option<Option<Block>> {
        self.skip_many(Self::blank_line);
        if self.m.at_end() {
            return None;
        }
        if self.choice(&[Self::footnote_definition, Self::reference]).is_some() {
            return Some(None);
        }
        self.choice(&[
            Self::block_quote,
            Self::spoiler_block,
            Self::verbatim,
            Self::fenced_code,
            Self::horizontal_rule,
            Self::heading,
            Self::ordered_list,
            Self::bullet_list,
            Self::html_block,
            Self::style_block,
            Self::paragraph,
        ])
        .map(Some)
    }

    fn block_quote(&mut self) -> Option<Block> {
        self.can_nest()?;
        let raw = self.quoted_lines(">")?;
        Some(Block::BlockQuote(self.nested(raw)))
    }

    fn spoiler_block(&mut self) -> Option<Block> {
        if !self.options.spoilerblock {
            return None;
        }
        self.can_nest()?;
        let raw = self.quoted_lines("?>")?;
        Some(Block::Spoiler(self.nested(raw)))
    }

    /// `( marker ' '? Line ( !marker !BlankLine Line )* BlankLine* )+`
    fn quoted_lines(&mut self, marker: &str) -> Option<String> {
        let chunks = self.many1(|p| {
            p.lit(marker)?;
            p.optional(|p| p.lit(" "));
            let mut raw = p.line()?.to_string();
            for lazy in p.many(|p| {
                p.not_followed_by(|p| p.lit(marker))?;
                p.not_followed_by(Self::blank_line)?;
                p.line()
            }) {
                raw.push_str(lazy);
            }
            for _ in 0..p.skip_many(Self::blank_line) {
                raw.push('\n');
            }
            Some(raw)
        })?;
        Some(chunks.concat())
    }

    /// Indented code: `( BlankLine* ( !BlankLine Indent Line )+ )+`
    fn verbatim(&mut self) -> Option<Block> {
        let chunks = self.many1(|p| {
            let mut chunk = "\n".repeat(p.skip_many(Self::blank_line));
            let lines = p.many1(|p| {
                p.not_followed_by(Self::blank_line)?;
                p.indent()?;
                p.line()
            })?;
            chunk.extend(lines);
            Some(chunk)
        })?;
        let mut literal = chunks.concat();
        if !literal.ends_with('\n') {
            literal.push('\n');
        }
        Some(Block::CodeBlock {
            info: String::new(),
            literal,
        })
    }

    fn fence(&mut self) -> Option<usize> {
        self.nonindent_space();
        let length = self.m.skip_while(|c| c == '~');
        (length >= 3).then_some(length)
    }

    /// `~~~ info` ... `~~~`
    fn fenced_code(&mut self) -> Option<Block> {
        if !self.options.codeblock {
            return None;
        }
        let length = self.fence()?;
        self.sp();
        let (info, _) = self.capture(|p| Some(p.m.skip_while(|c| !c.is_whitespace())))?;
        let info = info.to_string();
        self.sp();
        self.newline()?;

        let mut literal = String::new();
        loop {
            let closed = self.attempt(|p| {
                (p.fence()? >= length).then_some(())?;
                p.blank_line()
            });
            if closed.is_some() {
                break;
            }
            literal.push_str(self.line()?);
        }
        Some(Block::CodeBlock { info, literal })
    }

    /// `[^label]`
    fn note_label(&mut self) -> Option<&'a str> {
        self.lit("[^")?;
        let (label, _) =
            self.capture(|p| p.many1(|p| p.m.char_if(|c| c != '\n' && c != ']')))?;
        self.lit("]")?;
        Some(label)
    }

    fn footnote_definition(&mut self) -> Option<()> {
        if !self.options.notes {
            return None;
        }
        self.can_nest()?;
        self.nonindent_space();
        let label = self.note_label()?;
        self.lit(":")?;
        self.sp();
        let mut raw = self.raw_note_block()?;
        for block in self.many(|p| {
            p.followed_by(Self::indent)?;
            p.raw_note_block()
        }) {
            raw.push_str(&block);
        }
        let blocks = self.nested(raw);
        self.definitions.add_note(label, blocks);
        Some(())
    }

    /// `( !BlankLine OptionallyIndentedLine )+ BlankLine*`
    fn raw_note_block(&mut self) -> Option<String> {
        let lines = self.many1(|p| {
            p.not_followed_by(Self::blank_line)?;
            p.not_followed_by(|p| {
                p.nonindent_space();
                p.note_label()
            })?;
            p.optional(Self::indent);
            p.line()
        })?;
        let mut raw = lines.concat();
        for _ in 0..self.skip_many(Self::blank_line) {
            raw.push('\n');
        }
        Some(raw)
    }

    /// `[label]: url "title"`
    fn reference(&mut self) -> Option<()> {
        self.nonindent_space();
        self.not_followed_by(|p| p.lit("[]"))?;
        self.lit("[")?;
        if self.options.notes {
            self.not_followed_by(|p| p.lit("^"))?;
        }
        let (label, _) = self.capture(|p| {
            p.many1(|p| p.m.char_if(|c| c != ']' && c != '[' && c != '\n'))
        })?;
        self.lit("]:")?;
        self.spnl();
        let url = self.reference_source()?;
        let title = self.optional(Self::reference_title);
        self.blank_line()?;
        self.definitions.add_reference(label, LinkTarget { url, title });
        Some(())
    }

    fn reference_source(&mut self) -> Option<String> {
        let angled = self.attempt(|p| {
            p.lit("<")?;
            let (url, _) = p.capture(|p| Some(p.m.skip_while(|c| c != '>' && c != '\n')))?;
            p.lit(">")?;
            Some(url)
        });
        if let Some(url) = angled {
            return Some(url.to_string());
        }
        let (url, _) = self.capture(|p| p.many1(|p| p.m.char_if(|c| !c.is_whitespace())))?;
        Some(url.to_string())
    }

    /// Title in `"…"`, `'…'` or `(…)`, possibly on the next line. The closing
    /// delimiter must end the line.
    fn reference_title(&mut self) -> Option<String> {
        self.spnl();
        let open = self.m.one_of("\"'(")?;
        let close = if open == '(' { ')' } else { open };
        let start = self.m.pos();
        loop {
            let end = self.m.pos();
            let closed = self.attempt(|p| {
                p.m.char_if(|c| c == close)?;
                p.followed_by(Self::blank_line)
            });
            if closed.is_some() {
                return Some(self.m.slice(start, end).to_string());
            }
            self.m.char_if(|c| c != '\n')?;
        }
    }

    /// Three or more `*`, `-` or `_`, optionally separated by spaces.
    fn horizontal_rule(&mut self) -> Option<Block> {
        self.nonindent_space();
        let rule = self.m.one_of("*-_")?;
        let mut count = 1;
        loop {
            self.sp();
            if self.m.char_if(|c| c == rule).is_none() {
                break;
            }
            count += 1;
        }
        if count < 3 {
            return None;
        }
        self.newline()?;
        Some(Block::HorizontalRule)
    }

    /// ATX headings are tried before Setext headings.
    fn heading(&mut self) -> Option<Block> {
        self.choice(&[Self::atx_heading, Self::setext_heading])
    }

    /// A run of `#` giving the heading level, capped at 6. With hashtags
    /// enabled the run must be followed by whitespace.
    fn atx_start(&mut self) -> Option<u8> {
        let run = self.m.skip_while(|c| c == '#');
        if run == 0 {
            return None;
        }
        if self.options.hashtags && !matches!(self.m.peek(), Some(' ' | '\t' | '\n')) {
            return None;
        }
        Some(run.min(6) as u8)
    }

    fn atx_heading(&mut self) -> Option<Block> {
        let level = self.atx_start()?;
        self.sp();
        let text = strip_closing_hashes(self.line()?.trim_end());
        if text.is_empty() {
            return None;
        }
        Some(Block::Heading {
            level,
            text: text.to_string(),
        })
    }

    fn setext_underline(&mut self) -> Option<u8> {
        let c = self.m.one_of("=-")?;
        let run = 1 + self.m.skip_while(|x| x == c);
        if run < 3 {
            return None;
        }
        self.blank_line()?;
        Some(if c == '=' { 1 } else { 2 })
    }

    fn setext_heading(&mut self) -> Option<Block> {
        self.not_followed_by(Self::blank_line)?;
        let text = self.line()?.trim();
        let level = self.setext_underline()?;
        Some(Block::Heading {
            level,
            text: text.to_string(),
        })
    }

    fn bullet(&mut self) -> Option<()> {
        self.not_followed_by(Self::horizontal_rule)?;
        self.nonindent_space();
        self.m.one_of("+*-")?;
        self.many1(Self::spacechar)?;
        Some(())
    }

    fn enumerator(&mut self) -> Option<()> {
        self.nonindent_space();
        self.many1(|p| p.m.char_if(|c| c.is_ascii_digit()))?;
        self.lit(".")?;
        self.many1(Self::spacechar)?;
        Some(())
    }

    fn marker(&mut self, kind: ListKind) -> Option<()> {
        match kind {
            ListKind::Bullet => self.bullet(),
            ListKind::Ordered => self.enumerator(),
        }
    }

    fn any_marker(&mut self) -> Option<()> {
        self.choice(&[Self::bullet, Self::enumerator])
    }

    fn ordered_list(&mut self) -> Option<Block> {
        self.list(ListKind::Ordered)
    }

    fn bullet_list(&mut self) -> Option<Block> {
        self.list(ListKind::Bullet)
    }

    /// `&marker ( ListTight | ListLoose )`
    fn list(&mut self, kind: ListKind) -> Option<Block> {
        self.can_nest()?;
        self.followed_by(|p| p.marker(kind))?;
        let (tight, raw_items) = match self.attempt(|p| p.tight_items(kind)) {
            Some(items) => (true, items),
            None => (false, self.loose_items(kind)?),
        };
        let mut items = Vec::with_capacity(raw_items.len());
        for chunks in raw_items {
            let mut item = Vec::new();
            for chunk in chunks {
                item.extend(self.nested(chunk));
            }
            items.push(item);
        }
        Some(Block::List {
            ordered: kind == ListKind::Ordered,
            tight,
            items,
        })
    }

    /// `ListItemTight+ BlankLine* !marker`
    fn tight_items(&mut self, kind: ListKind) -> Option<Vec<ItemChunks>> {
        let items = self.many1(|p| p.tight_item(kind))?;
        self.skip_many(Self::blank_line);
        self.not_followed_by(|p| p.marker(kind))?;
        Some(items)
    }

    fn tight_item(&mut self, kind: ListKind) -> Option<ItemChunks> {
        self.marker(kind)?;
        let mut chunks = vec![self.list_block()?];
        for (_, text) in self.many(|p| {
            p.not_followed_by(Self::blank_line)?;
            p.list_continuation()
        }) {
            chunks.push(text);
        }
        self.not_followed_by(Self::list_continuation)?;
        Some(chunks)
    }

    /// `( ListItem BlankLine* )+`
    fn loose_items(&mut self, kind: ListKind) -> Option<Vec<ItemChunks>> {
        self.many1(|p| {
            let mut chunks = p.loose_item(kind)?;
            p.skip_many(Self::blank_line);
            if let Some(last) = chunks.last_mut() {
                last.push_str("\n\n");
            }
            Some(chunks)
        })
    }

    fn loose_item(&mut self, kind: ListKind) -> Option<ItemChunks> {
        self.marker(kind)?;
        let mut chunks = vec![self.list_block()?];
        for (after_blank, text) in self.many(Self::list_continuation) {
            if after_blank && let Some(last) = chunks.last_mut() {
                last.push_str(&text);
            } else {
                chunks.push(text);
            }
        }
        Some(chunks)
    }

    /// `!BlankLine Line ListBlockLine*`
    fn list_block(&mut self) -> Option<String> {
        self.not_followed_by(Self::blank_line)?;
        let mut text = self.line()?.to_string();
        text.extend(self.many(Self::list_block_line));
        Some(text)
    }

    fn list_block_line(&mut self) -> Option<&'a str> {
        self.not_followed_by(Self::blank_line)?;
        self.not_followed_by(|p| {
            p.optional(Self::indent);
            p.any_marker()
        })?;
        self.not_followed_by(Self::horizontal_rule)?;
        self.optional(Self::indent);
        self.line()
    }

    /// `BlankLine* ( Indent ListBlock )+`, reporting whether blank lines
    /// preceded the indented blocks.
    fn list_continuation(&mut self) -> Option<(bool, String)> {
        let blanks = self.skip_many(Self::blank_line);
        let blocks = self.many1(|p| {
            p.indent()?;
            p.list_block()
        })?;
        let mut text = "\n".repeat(blanks);
        text.extend(blocks);
        Some((blanks > 0, text))
    }

    fn html_block(&mut self) -> Option<Block> {
        self.raw_html_block(HtmlScanner::block_element)
    }

    fn style_block(&mut self) -> Option<Block> {
        self.raw_html_block(HtmlScanner::style_element)
    }

    /// An HTML element that must end its line.
    fn raw_html_block(&mut self, element: fn(&mut HtmlScanner<'a>) -> Option<()>) -> Option<Block> {
        self.followed_by(|p| p.lit("<"))?;
        let start = self.m.pos();
        let length = HtmlScanner::scan(self.m.rest(), element)?;
        self.m.advance(length);
        let raw = self.m.since(start).to_string();
        self.blank_line()?;
        self.skip_many(Self::blank_line);
        Some(Block::Html(raw))
    }

    /// Lines up to a blank line or a line that starts another block.
    fn paragraph(&mut self) -> Option<Block> {
        self.nonindent_space();
        self.not_followed_by(Self::blank_line)?;
        let mut text = self.line()?.trim_start().to_string();
        for line in self.many(Self::paragraph_line) {
            text.push_str(line.trim_start());
        }
        Some(Block::Paragraph(text.trim_end().to_string()))
    }

    fn paragraph_line(&mut self) -> Option<&'a str> {
        self.not_followed_by(Self::blank_line)?;
        self.not_followed_by(|p| p.lit(">"))?;
        self.not_followed_by(Self::atx_start)?;
        self.not_followed_by(|p| {
            p.line()?;
            p.setext_underline()
        })?;
        if self.options.codeblock {
            self.not_followed_by(Self::fence)?;
        }
        if self.options.spoilerblock {
            self.not_followed_by(|p| p.lit("?>"))?;
        }
        self.line()
    }
}

/// Remove an optional closing run of `#` (it must follow whitespace).
fn strip_closing_hashes(text: &str) -> &str {
    let without = text.trim_end_matches('#');
    if without.len() == text.len() {
        return text;
    }
    if without.is_empty() || without.ends_with([' ', '\t']) {
        without.trim_end()
    } else {
        text
    }
}
