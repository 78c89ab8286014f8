/// Recognizer for raw HTML embedded in Markdown.
///
/// Only the extent of the markup is computed; the text itself is passed
/// through untouched (or dropped by the renderer's filters).
use crate::matcher::{Grammar, Matcher};

pub(crate) struct HtmlScanner<'a> {
    m: Matcher<'a>,
}

impl<'a> Grammar<'a> for HtmlScanner<'a> {
    fn matcher(&mut self) -> &mut Matcher<'a> {
        &mut self.m
    }
}

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "canvas", "center", "dd", "details", "dir",
    "div", "dl", "dt", "figcaption", "figure", "fieldset", "footer", "form", "frameset", "h1",
    "h2", "h3", "h4", "h5", "h6", "header", "hgroup", "hr", "iframe", "isindex", "li", "main",
    "menu", "nav", "noframes", "noscript", "ol", "p", "pre", "script", "section", "summary",
    "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

/// Block tags that never have a closing tag.
const VOID_BLOCK_TAGS: &[&str] = &["hr", "isindex"];

impl<'a> HtmlScanner<'a> {
    /// Run `rule` at the start of `text`, returning the length it matched.
    pub fn scan<T>(text: &'a str, rule: impl FnOnce(&mut Self) -> Option<T>) -> Option<usize> {
        let mut scanner = HtmlScanner {
            m: Matcher::new(text),
        };
        scanner.attempt(rule)?;
        Some(scanner.m.pos())
    }

    fn space(&mut self) {
        self.m.skip_while(char::is_whitespace);
    }

    fn tag_name(&mut self) -> Option<String> {
        let (name, _) = self.capture(|p| {
            p.m.char_if(|c| c.is_ascii_alphabetic())?;
            Some(p.m.skip_while(|c| c.is_ascii_alphanumeric()))
        })?;
        Some(name.to_ascii_lowercase())
    }

    fn attribute_value(&mut self) -> Option<()> {
        if let Some(quote) = self.m.one_of("\"'") {
            self.m.skip_while(|c| c != quote);
            return self.m.char_if(|c| c == quote).map(drop);
        }
        self.many1(|p| {
            p.m.char_if(|c| !c.is_whitespace() && !matches!(c, '>' | '"' | '\'' | '='))
        })
        .map(drop)
    }

    /// `name ( = value )?`
    fn attribute(&mut self) -> Option<()> {
        self.space();
        self.many1(|p| {
            p.m.char_if(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
        })?;
        self.optional(|p| {
            p.space();
            p.lit("=")?;
            p.space();
            p.attribute_value()
        });
        Some(())
    }

    /// `<name attr* /?>`, returning the lowercased name and whether the tag
    /// closed itself.
    fn start_tag(&mut self) -> Option<(String, bool)> {
        self.lit("<")?;
        let name = self.tag_name()?;
        self.many(Self::attribute);
        self.space();
        let self_closing = self.lit("/").is_some();
        self.lit(">")?;
        Some((name, self_closing))
    }

    fn end_tag(&mut self) -> Option<String> {
        self.lit("</")?;
        let name = self.tag_name()?;
        self.space();
        self.lit(">")?;
        Some(name)
    }

    /// A character reference: `&name;`, `&#123;` or `&#x1F;`.
    pub fn entity(&mut self) -> Option<()> {
        self.lit("&")?;
        if self.lit("#").is_some() {
            if self.m.one_of("xX").is_some() {
                self.many1(|p| p.m.char_if(|c| c.is_ascii_hexdigit()))?;
            } else {
                self.many1(|p| p.m.char_if(|c| c.is_ascii_digit()))?;
            }
        } else {
            self.many1(|p| p.m.char_if(|c| c.is_ascii_alphanumeric()))?;
        }
        self.lit(";")
    }

    pub fn comment(&mut self) -> Option<()> {
        self.lit("<!--")?;
        while !self.m.starts_with("-->") {
            self.m.any_char()?;
        }
        self.lit("-->")
    }

    /// A single inline tag or comment.
    pub fn inline_tag(&mut self) -> Option<()> {
        if self.attempt(Self::comment).is_some() {
            return Some(());
        }
        if self.attempt(Self::end_tag).is_some() {
            return Some(());
        }
        self.start_tag().map(drop)
    }

    /// A block-level element through its matching close tag, or a block
    /// comment.
    pub fn block_element(&mut self) -> Option<()> {
        if self.attempt(Self::comment).is_some() {
            return Some(());
        }
        self.element(|name| BLOCK_TAGS.contains(&name))
    }

    pub fn style_element(&mut self) -> Option<()> {
        self.element(|name| name == "style")
    }

    fn element(&mut self, accept: impl Fn(&str) -> bool) -> Option<()> {
        let (name, self_closing) = self.start_tag()?;
        if !accept(&name) {
            return None;
        }
        if self_closing || VOID_BLOCK_TAGS.contains(&name.as_str()) {
            return Some(());
        }
        let mut depth = 1;
        loop {
            if let Some(closed) = self.attempt(Self::end_tag) {
                if closed == name {
                    depth -= 1;
                    if depth == 0 {
                        return Some(());
                    }
                }
            } else if let Some((opened, self_closing)) = self.attempt(Self::start_tag) {
                if opened == name && !self_closing {
                    depth += 1;
                }
            } else {
                self.m.any_char()?;
            }
        }
    }
}
