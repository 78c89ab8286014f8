/// Inline grammar: spans inside the text of a paragraph, heading, link label
/// or note.
///
/// Recursive constructs (emphasis, links, inline notes) go through
/// [`InlineParser::memoized`], which bounds nesting depth and remembers
/// failed attempts per position so runs of unmatched delimiters or brackets
/// do not trigger exponential backtracking.
use super::html::HtmlScanner;
use super::{LinkTarget, MAX_INLINE_NESTING, Terminals, normalize_label};
use crate::ast::{MediaKind, Node};
use crate::matcher::{Grammar, Matcher};
use crate::options::Options;
use std::collections::HashMap;

/// Characters that may start a construct, so a plain run of text stops
/// before them.
const SPECIAL_CHARS: &str = "*_`&[]<!\\^~@#(";

const ESCAPABLE_CHARS: &str = "\\`*_{}[]()#+-.!><|~@^?";

const URL_PREFIXES: [&str; 3] = ["http://", "https://", "ftp://"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Construct {
    Delimited(char, usize),
    Link,
    InlineNote,
}

pub(crate) struct InlineParser<'a, 'c> {
    m: Matcher<'a>,
    options: &'c Options,
    references: &'c HashMap<String, LinkTarget>,
    depth: usize,
    // Set when a rule failed only because the nesting limit was reached.
    truncated: bool,
    // Failed constructs by position, with the shallowest depth the failure
    // is known to hold at.
    failures: HashMap<(usize, Construct), usize>,
}

impl<'a> Grammar<'a> for InlineParser<'a, '_> {
    fn matcher(&mut self) -> &mut Matcher<'a> {
        &mut self.m
    }
}

impl<'a, 'c> InlineParser<'a, 'c> {
    pub fn new(
        text: &'a str,
        options: &'c Options,
        references: &'c HashMap<String, LinkTarget>,
    ) -> Self {
        InlineParser {
            m: Matcher::new(text),
            options,
            references,
            depth: 0,
            truncated: false,
            failures: HashMap::new(),
        }
    }

    pub fn parse(mut self) -> Vec<Node> {
        let nodes = self.many(Self::inline);
        merge_text(nodes)
    }

    fn inline(&mut self) -> Option<Node> {
        self.choice(&[
            Self::bare_autolink,
            Self::str_run,
            Self::endline,
            Self::literal_delimiters,
            Self::space,
            Self::code,
            Self::image,
            Self::link,
            Self::autolink,
            Self::note_reference,
            Self::inline_note,
            Self::strong,
            Self::emphasis,
            Self::strikethrough,
            Self::raw_html,
            Self::entity,
            Self::escaped_char,
            Self::hashtag,
            Self::username,
            Self::symbol,
        ])
    }

    fn nest<T>(&mut self, rule: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        if self.depth >= MAX_INLINE_NESTING {
            if !self.truncated {
                tracing::trace!(pos = self.m.pos(), "inline nesting limit reached");
            }
            self.truncated = true;
            return None;
        }
        self.depth += 1;
        let result = self.attempt(rule);
        self.depth -= 1;
        result
    }

    /// Run a recursive construct with the depth limit and the failure cache.
    ///
    /// A failure caused by the depth limit only holds at that depth or
    /// deeper; any other failure holds everywhere.
    fn memoized<T>(
        &mut self,
        construct: Construct,
        rule: impl FnOnce(&mut Self) -> Option<T>,
    ) -> Option<T> {
        let key = (self.m.pos(), construct);
        if self
            .failures
            .get(&key)
            .is_some_and(|&depth| depth <= self.depth)
        {
            return None;
        }
        let outer_truncated = std::mem::replace(&mut self.truncated, false);
        let result = self.nest(rule);
        if result.is_none() {
            let depth = if self.truncated { self.depth } else { 0 };
            self.failures.insert(key, depth);
        }
        self.truncated |= outer_truncated;
        result
    }

    fn at_word_start(&self) -> bool {
        self.m.prev_char().is_none_or(|c| !c.is_alphanumeric())
    }

    /// A run of characters that cannot start any other construct.
    fn str_run(&mut self) -> Option<Node> {
        let (text, _) = self.capture(|p| {
            p.many1(|p| match p.m.char_if(is_normal_char) {
                Some(_) => Some(()),
                None => p.intraword_underscores(),
            })
        })?;
        Some(Node::Text(text.to_string()))
    }

    /// `_` between two alphanumerics is literal.
    fn intraword_underscores(&mut self) -> Option<()> {
        if !self.m.prev_char().is_some_and(char::is_alphanumeric) {
            return None;
        }
        if self.m.skip_while(|c| c == '_') == 0 {
            return None;
        }
        self.followed_by(|p| p.m.char_if(char::is_alphanumeric))
    }

    fn endline(&mut self) -> Option<Node> {
        self.choice(&[Self::line_break, Self::soft_break])
    }

    /// Two or more spaces before a newline.
    fn line_break(&mut self) -> Option<Node> {
        if self.m.skip_while(|c| c == ' ') < 2 {
            return None;
        }
        self.newline()?;
        self.sp();
        self.followed_by(|p| p.m.any_char())?;
        Some(Node::HardBreak)
    }

    fn soft_break(&mut self) -> Option<Node> {
        self.sp();
        self.newline()?;
        self.sp();
        Some(Node::Text("\n".to_string()))
    }

    /// `*` or `_` runs that cannot open or close anything: four or more in a
    /// row, or a run with whitespace on both sides.
    fn literal_delimiters(&mut self) -> Option<Node> {
        let before = self.m.prev_char();
        let (run, length) = self.capture(|p| {
            let c = p.m.one_of("*_")?;
            Some(1 + p.m.skip_while(|x| x == c))
        })?;
        let spaced = before.is_none_or(char::is_whitespace)
            && self.m.peek().is_none_or(char::is_whitespace);
        (length >= 4 || spaced).then(|| Node::Text(run.to_string()))
    }

    /// Runs of spaces collapse to one.
    fn space(&mut self) -> Option<Node> {
        self.many1(Self::spacechar)?;
        Some(Node::Text(" ".to_string()))
    }

    /// A code span closes at the next run of exactly as many backticks. An
    /// unclosed run is literal text.
    fn code(&mut self) -> Option<Node> {
        let start = self.m.pos();
        let ticks = self.m.skip_while(|c| c == '`');
        if ticks == 0 {
            return None;
        }
        let content_start = self.m.pos();
        loop {
            if self.m.at_end() {
                self.m.reset(content_start);
                return Some(Node::Text(self.m.since(start).to_string()));
            }
            let end = self.m.pos();
            match self.m.skip_while(|c| c == '`') {
                0 => {
                    self.m.any_char();
                }
                run if run == ticks => {
                    let content = self.m.slice(content_start, end);
                    return Some(Node::Code(content.replace('\n', " ").trim().to_string()));
                }
                _ => {}
            }
        }
    }

    fn image(&mut self) -> Option<Node> {
        self.lit("!")?;
        let (alt_text, target) = self.link_parts()?;
        if let Some(media) = self.media(&target, &alt_text) {
            return Some(media);
        }
        let LinkTarget { url, title } = target;
        if self.options.no_images {
            return Some(Node::Link {
                destination: url,
                title,
                children: alt_text,
            });
        }
        Some(Node::Image {
            destination: url,
            title,
            alt_text,
        })
    }

    fn link(&mut self) -> Option<Node> {
        let (children, target) = self.link_parts()?;
        if let Some(media) = self.media(&target, &children) {
            return Some(media);
        }
        Some(Node::Link {
            destination: target.url,
            title: target.title,
            children,
        })
    }

    fn media(&self, target: &LinkTarget, children: &[Node]) -> Option<Node> {
        if !self.options.media {
            return None;
        }
        let kind = MediaKind::from_destination(&target.url)?;
        Some(Node::Media {
            destination: target.url.clone(),
            title: target.title.clone(),
            kind,
            children: children.to_vec(),
        })
    }

    /// Label followed by an explicit `(url "title")`, a `[reference]`, or
    /// nothing (the label is its own reference). References that are not
    /// defined do not match.
    fn link_parts(&mut self) -> Option<(Vec<Node>, LinkTarget)> {
        self.memoized(Construct::Link, |p| {
            let start = p.m.pos();
            let children = p.label()?;
            let label = p.m.slice(start + 1, p.m.pos() - 1);
            if let Some(target) = p.attempt(Self::explicit_target) {
                return Some((children, target));
            }
            let target = match p.attempt(|p| p.second_label(label)) {
                Some(target) => target,
                None => p.lookup(label)?,
            };
            Some((children, target))
        })
    }

    fn label(&mut self) -> Option<Vec<Node>> {
        self.lit("[")?;
        if self.options.notes {
            self.not_followed_by(|p| p.lit("^"))?;
        }
        let children = self.many(|p| {
            p.not_followed_by(|p| p.lit("]"))?;
            p.inline()
        });
        self.lit("]")?;
        Some(merge_text(children))
    }

    /// `[ref]` after a label; `[]` refers to the label itself.
    fn second_label(&mut self, label: &str) -> Option<LinkTarget> {
        self.spnl();
        self.lit("[")?;
        let (key, _) = self.capture(|p| Some(p.m.skip_while(|c| c != ']' && c != '[')))?;
        self.lit("]")?;
        if key.trim().is_empty() {
            self.lookup(label)
        } else {
            self.lookup(key)
        }
    }

    fn lookup(&self, label: &str) -> Option<LinkTarget> {
        let target = self.references.get(&normalize_label(label)).cloned();
        if target.is_none() {
            tracing::trace!(label, "undefined link reference");
        }
        target
    }

    /// `( url "title"? )`
    fn explicit_target(&mut self) -> Option<LinkTarget> {
        self.lit("(")?;
        self.sp();
        let url = self.link_source()?;
        self.spnl();
        let title = self.optional(Self::link_title);
        self.sp();
        self.lit(")")?;
        Some(LinkTarget { url, title })
    }

    /// A destination in `<…>`, or a run of non-space characters with
    /// balanced parentheses.
    fn link_source(&mut self) -> Option<String> {
        if self.lit("<").is_some() {
            let (url, _) = self.capture(|p| Some(p.m.skip_while(|c| c != '>' && c != '\n')))?;
            self.lit(">")?;
            return Some(url.to_string());
        }
        let start = self.m.pos();
        let mut depth = 0usize;
        while let Some(c) = self.m.peek() {
            match c {
                '(' => depth += 1,
                ')' if depth == 0 => break,
                ')' => depth -= 1,
                c if c.is_whitespace() => break,
                _ => {}
            }
            self.m.advance(c.len_utf8());
        }
        Some(self.m.since(start).to_string())
    }

    /// Quoted title; the closing quote must be followed by `)`.
    fn link_title(&mut self) -> Option<String> {
        let quote = self.m.one_of("\"'")?;
        let start = self.m.pos();
        loop {
            let end = self.m.pos();
            let closed = self.attempt(|p| {
                p.m.char_if(|c| c == quote)?;
                p.sp();
                p.followed_by(|p| p.lit(")"))
            });
            if closed.is_some() {
                return Some(self.m.slice(start, end).to_string());
            }
            self.m.any_char()?;
        }
    }

    /// `<scheme://…>` or `<address@host>`.
    fn autolink(&mut self) -> Option<Node> {
        self.lit("<")?;
        if let Some(url) = self.attempt(|p| {
            let (url, _) = p.capture(|p| {
                p.many1(|p| p.m.char_if(|c| c.is_ascii_alphabetic()))?;
                p.lit("://")?;
                p.many1(|p| p.m.char_if(|c| c != '>' && !c.is_whitespace()))
            })?;
            p.lit(">")?;
            Some(url)
        }) {
            return Some(Node::Autolink {
                destination: url.to_string(),
                text: url.to_string(),
            });
        }
        self.optional(|p| p.lit("mailto:"));
        let address = self.email_address(false)?;
        self.lit(">")?;
        Some(mail_link(address))
    }

    /// `local@host`. A bare address needs a dotted host and a local part
    /// starting with an alphanumeric, so an enclosing `_` stays a delimiter.
    fn email_address(&mut self, bare: bool) -> Option<&'a str> {
        let (address, _) = self.capture(|p| {
            if bare {
                p.followed_by(|p| p.m.char_if(|c| c.is_ascii_alphanumeric()))?;
            }
            p.many1(|p| p.m.char_if(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c)))?;
            p.lit("@")?;
            p.host_label()?;
            let dots = p.many(|p| {
                p.lit(".")?;
                p.host_label()
            });
            (!bare || !dots.is_empty()).then_some(())
        })?;
        Some(address)
    }

    fn host_label(&mut self) -> Option<()> {
        self.many1(|p| p.m.char_if(|c| c.is_ascii_alphanumeric() || c == '-'))
            .map(drop)
    }

    /// URLs and e-mail addresses in running text, recognized at a word start.
    fn bare_autolink(&mut self) -> Option<Node> {
        if !self.options.autolink || !self.at_word_start() {
            return None;
        }
        if let Some(node) = self.attempt(Self::bare_url) {
            return Some(node);
        }
        let address = self.email_address(true)?;
        Some(mail_link(address))
    }

    fn bare_url(&mut self) -> Option<Node> {
        let start = self.m.pos();
        let prefix = match URL_PREFIXES.into_iter().find(|p| self.m.literal(p)) {
            Some(prefix) => prefix,
            None => {
                self.lit("www.")?;
                "www."
            }
        };
        self.many1(|p| p.m.char_if(|c| !c.is_whitespace() && !matches!(c, '<' | '>')))?;
        let url = trim_url(self.m.since(start));
        if url.len() <= prefix.len() {
            return None;
        }
        self.m.reset(start + url.len());
        let destination = if prefix == "www." {
            format!("http://{url}")
        } else {
            url.to_string()
        };
        Some(Node::Autolink {
            destination,
            text: url.to_string(),
        })
    }

    fn note_reference(&mut self) -> Option<Node> {
        if !self.options.notes {
            return None;
        }
        self.lit("[^")?;
        let (label, _) =
            self.capture(|p| p.many1(|p| p.m.char_if(|c| !matches!(c, ']' | '[' | '\n'))))?;
        self.lit("]")?;
        Some(Node::FootnoteReference {
            label: label.to_string(),
            number: None,
        })
    }

    /// `^[text]`
    fn inline_note(&mut self) -> Option<Node> {
        if !self.options.notes {
            return None;
        }
        self.memoized(Construct::InlineNote, |p| {
            p.lit("^[")?;
            let content = p.many1(|p| {
                p.not_followed_by(|p| p.lit("]"))?;
                p.inline()
            })?;
            p.lit("]")?;
            Some(Node::InlineNote(merge_text(content)))
        })
    }

    fn strong(&mut self) -> Option<Node> {
        self.delimited('*', 2)
            .or_else(|| self.delimited('_', 2))
            .map(Node::Strong)
    }

    fn emphasis(&mut self) -> Option<Node> {
        self.delimited('*', 1)
            .or_else(|| self.delimited('_', 1))
            .map(Node::Emphasis)
    }

    fn strikethrough(&mut self) -> Option<Node> {
        if !self.options.strike {
            return None;
        }
        self.delimited('~', 2).map(Node::Strikethrough)
    }

    /// Content between `count` copies of `delim`. The opener must be followed
    /// by non-whitespace and the closer preceded by non-whitespace; a closing
    /// `_` must not be followed by an alphanumeric. Single delimiters may
    /// contain a double-delimited span of the same character.
    fn delimited(&mut self, delim: char, count: usize) -> Option<Vec<Node>> {
        let marker: String = std::iter::repeat_n(delim, count).collect();
        self.memoized(Construct::Delimited(delim, count), |p| {
            p.lit(&marker)?;
            p.not_followed_by(|p| p.m.char_if(char::is_whitespace))?;
            let content = p.many1(|p| {
                let inline = p.attempt(|p| {
                    p.not_followed_by(|p| p.lit(&marker))?;
                    p.inline()
                });
                match inline {
                    Some(node) => Some(node),
                    None if count == 1 => p.delimited(delim, 2).map(Node::Strong),
                    None => None,
                }
            })?;
            if p.m.prev_char().is_none_or(char::is_whitespace) {
                return None;
            }
            p.lit(&marker)?;
            if delim == '_' {
                p.not_followed_by(|p| p.m.char_if(char::is_alphanumeric))?;
            }
            Some(merge_text(content))
        })
    }

    fn raw_html(&mut self) -> Option<Node> {
        self.followed_by(|p| p.lit("<"))?;
        let start = self.m.pos();
        let length = HtmlScanner::scan(self.m.rest(), HtmlScanner::inline_tag)?;
        self.m.advance(length);
        Some(Node::HtmlInline(self.m.since(start).to_string()))
    }

    /// `&name;`, `&#123;` or `&#x1F;`
    fn entity(&mut self) -> Option<Node> {
        let start = self.m.pos();
        let length = HtmlScanner::scan(self.m.rest(), HtmlScanner::entity)?;
        self.m.advance(length);
        Some(Node::Entity(self.m.since(start).to_string()))
    }

    fn escaped_char(&mut self) -> Option<Node> {
        self.lit("\\")?;
        let c = self.m.one_of(ESCAPABLE_CHARS)?;
        Some(Node::Text(c.to_string()))
    }

    fn hashtag(&mut self) -> Option<Node> {
        if !self.options.hashtags || !self.at_word_start() {
            return None;
        }
        self.lit("#")?;
        let tag = self.name(|c| c.is_alphanumeric() || c == '_' || c == '-')?;
        Some(Node::Hashtag(tag.to_string()))
    }

    fn username(&mut self) -> Option<Node> {
        if !self.options.usernames || !self.at_word_start() {
            return None;
        }
        self.lit("@")?;
        let name = self.name(|c| c.is_alphanumeric() || c == '_')?;
        Some(Node::Username(name.to_string()))
    }

    /// A hashtag or username body. Trailing underscores are left for an
    /// enclosing `_` span to close on.
    fn name(&mut self, is_name_char: impl Fn(char) -> bool) -> Option<&'a str> {
        let start = self.m.pos();
        self.m.skip_while(is_name_char);
        let name = self.m.since(start).trim_end_matches('_');
        self.m.reset(start + name.len());
        (!name.is_empty()).then_some(name)
    }

    fn symbol(&mut self) -> Option<Node> {
        self.m.any_char().map(|c| Node::Text(c.to_string()))
    }
}

fn is_normal_char(c: char) -> bool {
    !c.is_whitespace() && !SPECIAL_CHARS.contains(c)
}

fn mail_link(address: &str) -> Node {
    Node::Autolink {
        destination: format!("mailto:{address}"),
        text: address.to_string(),
    }
}

/// Drop trailing punctuation, span delimiters and unbalanced closing
/// parentheses from a bare URL.
fn trim_url(url: &str) -> &str {
    const TRAILING: &[char] = &['.', ',', ':', ';', '!', '?', '"', '\'', '*', '_', '~'];
    let mut url = url.trim_end_matches(TRAILING);
    while url.ends_with(')') && url.matches(')').count() > url.matches('(').count() {
        url = url[..url.len() - 1].trim_end_matches(TRAILING);
    }
    url
}

/// Join adjacent text nodes.
fn merge_text(nodes: Vec<Node>) -> Vec<Node> {
    let mut merged: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if let Node::Text(text) = &node
            && let Some(Node::Text(last)) = merged.last_mut()
        {
            last.push_str(text);
            continue;
        }
        merged.push(node);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn parse_with(text: &str, options: Options) -> Vec<Node> {
        let mut references = HashMap::new();
        references.insert(
            "ref".to_string(),
            LinkTarget {
                url: "/r".to_string(),
                title: Some("T".to_string()),
            },
        );
        InlineParser::new(text, &options, &references).parse()
    }

    fn parse(text: &str) -> Vec<Node> {
        parse_with(text, Options::default())
    }

    fn text(s: &str) -> Node {
        Node::Text(s.to_string())
    }

    fn autolink(destination: &str, label: &str) -> Node {
        Node::Autolink {
            destination: destination.to_string(),
            text: label.to_string(),
        }
    }

    fn link(url: &str, title: Option<&str>, children: Vec<Node>) -> Node {
        Node::Link {
            destination: url.to_string(),
            title: title.map(str::to_string),
            children,
        }
    }

    #[rstest]
    #[case("Hello, World.")]
    #[case("a_b_c")]
    #[case("a * b _ c")]
    #[case("2 * 3 = 6")]
    #[case("****")]
    #[case("[x][y]")]
    #[case("[undefined]")]
    #[case("foo_bar_")]
    #[case("~~no strike~~")]
    #[case("#tag @user")]
    #[case("[^1]")]
    fn literal_text(#[case] input: &str) {
        assert_eq!(parse(input), vec![text(input)]);
    }

    #[test]
    fn spaces_collapse_and_soft_breaks_stay() {
        assert_eq!(parse("a   b\n   c"), vec![text("a b\nc")]);
    }

    #[test]
    fn two_trailing_spaces_make_a_hard_break() {
        assert_eq!(parse("a  \nb"), vec![text("a"), Node::HardBreak, text("b")]);
    }

    #[rstest]
    #[case("*em*", Node::Emphasis(vec![text("em")]))]
    #[case("_em_", Node::Emphasis(vec![text("em")]))]
    #[case("**strong**", Node::Strong(vec![text("strong")]))]
    #[case("__strong__", Node::Strong(vec![text("strong")]))]
    #[case("_a_b_", Node::Emphasis(vec![text("a_b")]))]
    #[case("***both***", Node::Strong(vec![Node::Emphasis(vec![text("both")])]))]
    #[case(
        "*a **b** c*",
        Node::Emphasis(vec![text("a "), Node::Strong(vec![text("b")]), text(" c")])
    )]
    fn emphasis_forms(#[case] input: &str, #[case] expected: Node) {
        assert_eq!(parse(input), vec![expected]);
    }

    #[test]
    fn closer_preceded_by_space_does_not_close() {
        assert_eq!(parse("*a *"), vec![text("*a *")]);
    }

    #[rstest]
    #[case("`code`", "code")]
    #[case("`` a ` b ``", "a ` b")]
    #[case("`multi\nline`", "multi line")]
    fn code_spans(#[case] input: &str, #[case] literal: &str) {
        assert_eq!(parse(input), vec![Node::Code(literal.to_string())]);
    }

    #[test]
    fn unclosed_backticks_are_literal() {
        assert_eq!(parse("``a`"), vec![text("``a`")]);
    }

    #[test]
    fn explicit_link_with_parens_and_title() {
        assert_eq!(
            parse("[x](/a_(b) \"t\")"),
            vec![link("/a_(b)", Some("t"), vec![text("x")])]
        );
        assert_eq!(
            parse("[x](<with space>)"),
            vec![link("with space", None, vec![text("x")])]
        );
    }

    #[rstest]
    #[case("[text][Ref]", "text")]
    #[case("[Ref]", "Ref")]
    #[case("[Ref][]", "Ref")]
    #[case("[text] [ref]", "text")]
    fn reference_links(#[case] input: &str, #[case] label: &str) {
        assert_eq!(parse(input), vec![link("/r", Some("T"), vec![text(label)])]);
    }

    #[test]
    fn undefined_second_label_falls_back_to_first() {
        assert_eq!(
            parse("[ref][nope]"),
            vec![link("/r", Some("T"), vec![text("ref")]), text("[nope]")]
        );
    }

    #[test]
    fn images() {
        let image = Node::Image {
            destination: "i.png".to_string(),
            title: None,
            alt_text: vec![text("alt")],
        };
        assert_eq!(parse("![alt](i.png)"), vec![image]);

        let options = Options {
            no_images: true,
            ..Options::default()
        };
        assert_eq!(
            parse_with("![alt](i.png)", options),
            vec![link("i.png", None, vec![text("alt")])]
        );
    }

    #[test]
    fn media_links() {
        let options = Options {
            media: true,
            ..Options::default()
        };
        assert_eq!(
            parse_with("[song](a.mp3) ![clip](b.webm)", options),
            vec![
                Node::Media {
                    destination: "a.mp3".to_string(),
                    title: None,
                    kind: MediaKind::Audio,
                    children: vec![text("song")],
                },
                text(" "),
                Node::Media {
                    destination: "b.webm".to_string(),
                    title: None,
                    kind: MediaKind::Video,
                    children: vec![text("clip")],
                },
            ]
        );
        assert!(matches!(parse("[song](a.mp3)")[0], Node::Link { .. }));
    }

    #[rstest]
    #[case("<http://a.b/c>", "http://a.b/c", "http://a.b/c")]
    #[case("<me@example.org>", "mailto:me@example.org", "me@example.org")]
    #[case("<mailto:me@host>", "mailto:me@host", "me@host")]
    fn angle_autolinks(#[case] input: &str, #[case] destination: &str, #[case] label: &str) {
        assert_eq!(
            parse(input),
            vec![Node::Autolink {
                destination: destination.to_string(),
                text: label.to_string(),
            }]
        );
    }

    #[rstest]
    #[case("see www.x.com.", "http://www.x.com", "www.x.com", ".")]
    #[case("see https://x.org/a?b=1,", "https://x.org/a?b=1", "https://x.org/a?b=1", ",")]
    #[case("see me@x.org!", "mailto:me@x.org", "me@x.org", "!")]
    fn bare_autolinks(
        #[case] input: &str,
        #[case] destination: &str,
        #[case] label: &str,
        #[case] tail: &str,
    ) {
        let options = Options {
            autolink: true,
            ..Options::default()
        };
        assert_eq!(
            parse_with(input, options),
            vec![
                text("see "),
                Node::Autolink {
                    destination: destination.to_string(),
                    text: label.to_string(),
                },
                text(tail),
            ]
        );
    }

    #[rstest]
    #[case("*http://x.com*", Node::Emphasis(vec![autolink("http://x.com", "http://x.com")]))]
    #[case("_http://x.com_", Node::Emphasis(vec![autolink("http://x.com", "http://x.com")]))]
    #[case("**www.x.com**", Node::Strong(vec![autolink("http://www.x.com", "www.x.com")]))]
    #[case("_me@x.org_", Node::Emphasis(vec![autolink("mailto:me@x.org", "me@x.org")]))]
    #[case(
        "*see http://x.com*",
        Node::Emphasis(vec![text("see "), autolink("http://x.com", "http://x.com")])
    )]
    fn emphasis_closes_after_bare_autolink(#[case] input: &str, #[case] expected: Node) {
        let options = Options {
            autolink: true,
            strike: true,
            ..Options::default()
        };
        assert_eq!(parse_with(input, options), vec![expected]);
    }

    #[test]
    fn strikethrough_closes_after_bare_autolink() {
        let options = Options {
            autolink: true,
            strike: true,
            ..Options::default()
        };
        assert_eq!(
            parse_with("~~http://x.com~~", options),
            vec![Node::Strikethrough(vec![autolink("http://x.com", "http://x.com")])]
        );
    }

    #[rstest]
    #[case("_#rust_ rocks", vec![
        Node::Emphasis(vec![Node::Hashtag("rust".to_string())]),
        text(" rocks"),
    ])]
    #[case("_@bob_ says", vec![
        Node::Emphasis(vec![Node::Username("bob".to_string())]),
        text(" says"),
    ])]
    #[case("*#rust* and #snake_case", vec![
        Node::Emphasis(vec![Node::Hashtag("rust".to_string())]),
        text(" and "),
        Node::Hashtag("snake_case".to_string()),
    ])]
    fn emphasis_closes_after_hashtag_or_username(
        #[case] input: &str,
        #[case] expected: Vec<Node>,
    ) {
        let options = Options {
            hashtags: true,
            usernames: true,
            ..Options::default()
        };
        assert_eq!(parse_with(input, options), expected);
    }

    #[test]
    fn bare_url_drops_unbalanced_paren() {
        let options = Options {
            autolink: true,
            ..Options::default()
        };
        assert_eq!(
            parse_with("(http://x.org/a_(b))", options),
            vec![
                text("("),
                Node::Autolink {
                    destination: "http://x.org/a_(b)".to_string(),
                    text: "http://x.org/a_(b)".to_string(),
                },
                text(")"),
            ]
        );
    }

    #[test]
    fn entities_escapes_and_raw_html() {
        assert_eq!(
            parse("&amp; &#169; \\*a\\* <b>x</b> AT&T"),
            vec![
                Node::Entity("&amp;".to_string()),
                text(" "),
                Node::Entity("&#169;".to_string()),
                text(" *a* "),
                Node::HtmlInline("<b>".to_string()),
                text("x"),
                Node::HtmlInline("</b>".to_string()),
                text(" AT&T"),
            ]
        );
    }

    #[test]
    fn hashtags_and_usernames() {
        let options = Options {
            hashtags: true,
            usernames: true,
            ..Options::default()
        };
        assert_eq!(
            parse_with("#rust and @ferris, not a#b", options),
            vec![
                Node::Hashtag("rust".to_string()),
                text(" and "),
                Node::Username("ferris".to_string()),
                text(", not a#b"),
            ]
        );
    }

    #[test]
    fn footnote_references_and_inline_notes() {
        let options = Options {
            notes: true,
            ..Options::default()
        };
        assert_eq!(
            parse_with("a[^1] b^[inline *note*]", options),
            vec![
                text("a"),
                Node::FootnoteReference {
                    label: "1".to_string(),
                    number: None,
                },
                text(" b"),
                Node::InlineNote(vec![text("inline "), Node::Emphasis(vec![text("note")])]),
            ]
        );
    }

    #[test]
    fn strikethrough() {
        let options = Options {
            strike: true,
            ..Options::default()
        };
        assert_eq!(
            parse_with("~~gone~~", options),
            vec![Node::Strikethrough(vec![text("gone")])]
        );
    }

    #[test]
    fn deeply_nested_brackets_stay_literal() {
        let input = format!("{}a{}", "[".repeat(60), "]".repeat(60));
        assert_eq!(parse(&input), vec![text(&input)]);
    }

    #[test]
    fn unmatched_delimiter_runs_stay_literal() {
        let input = "*a _b ".repeat(40);
        assert_eq!(parse(&input), vec![text(&input)]);
    }
}
