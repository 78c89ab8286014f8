/// HTML renderer for the Markdown AST
///
/// Block separation follows a padding model: before a block element the
/// writer asks for `n` newlines of separation and only emits the ones that
/// are still missing since the last output. This gives one blank line
/// between top-level blocks, a single newline between list items, and no
/// leading or trailing newlines.
use crate::ast::Node;
use crate::options::Options;
use crate::parser::html::HtmlScanner;
use std::collections::HashSet;

pub(crate) struct HtmlRenderer<'o> {
    options: &'o Options,
}

impl<'o> HtmlRenderer<'o> {
    pub fn new(options: &'o Options) -> Self {
        HtmlRenderer { options }
    }

    pub fn render(&self, node: &Node) -> String {
        let mut writer = Writer {
            options: self.options,
            out: String::new(),
            padded: 2,
            tight: false,
            referenced: HashSet::new(),
        };
        match node {
            Node::Document(children) => writer.document(children),
            other => writer.node(other),
        }
        writer.out
    }
}

struct Writer<'o> {
    options: &'o Options,
    out: String,
    // Newlines emitted since the last element.
    padded: usize,
    // Inside an item of a tight list: paragraphs lose their <p>.
    tight: bool,
    // Notes whose first reference already carries the `fnrefN` id.
    referenced: HashSet<usize>,
}

impl Writer<'_> {
    fn pad(&mut self, newlines: usize) {
        while self.padded < newlines {
            self.out.push('\n');
            self.padded += 1;
        }
    }

    fn write(&mut self, s: &str) {
        if !s.is_empty() {
            self.out.push_str(s);
            self.padded = 0;
        }
    }

    fn write_escaped(&mut self, s: &str) {
        self.write(&escape_html(s));
    }

    fn document(&mut self, children: &[Node]) {
        let (notes, flow): (Vec<&Node>, Vec<&Node>) = children
            .iter()
            .partition(|node| matches!(node, Node::FootnoteDefinition { .. }));
        for node in flow {
            self.node(node);
        }
        if !notes.is_empty() {
            self.notes(&notes);
        }
    }

    fn nodes(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.node(node);
        }
    }

    /// Render `children` outside any tight list.
    fn loose(&mut self, children: &[Node]) {
        let tight = std::mem::replace(&mut self.tight, false);
        self.nodes(children);
        self.tight = tight;
    }

    fn node(&mut self, node: &Node) {
        match node {
            Node::Document(children) => self.document(children),
            Node::Paragraph(children) => {
                if self.tight {
                    self.pad(1);
                    self.nodes(children);
                } else {
                    self.pad(2);
                    self.write("<p>");
                    self.nodes(children);
                    self.write("</p>");
                }
            }
            Node::Heading { level, children } => {
                self.pad(2);
                self.write(&format!("<h{level}>"));
                self.nodes(children);
                self.write(&format!("</h{level}>"));
            }
            Node::CodeBlock { info, literal } => {
                self.pad(2);
                if info.is_empty() {
                    self.write("<pre><code>");
                } else {
                    self.write(&format!("<pre><code class=\"language-{}\">", escape_html(info)));
                }
                self.write_escaped(literal);
                self.write("</code></pre>");
            }
            Node::ThematicBreak => {
                self.pad(2);
                self.write("<hr />");
            }
            Node::HtmlBlock(raw) => {
                if self.keeps_html_block(raw) {
                    self.pad(2);
                    self.write(raw);
                } else {
                    tracing::trace!(len = raw.len(), "raw HTML block filtered");
                }
            }
            Node::BlockQuote(children) => self.container("<blockquote>", children, "</blockquote>"),
            Node::SpoilerBlock(children) => {
                self.container("<div class=\"spoiler\">", children, "</div>")
            }
            Node::List {
                ordered,
                tight,
                children,
            } => {
                let tag = if *ordered { "ol" } else { "ul" };
                self.pad(2);
                self.write(&format!("<{tag}>"));
                let outer = std::mem::replace(&mut self.tight, *tight);
                for item in children {
                    self.node(item);
                }
                self.tight = outer;
                self.pad(1);
                self.write(&format!("</{tag}>"));
            }
            Node::ListItem(children) => {
                self.pad(1);
                self.write("<li>");
                self.padded = 2;
                self.nodes(children);
                self.write("</li>");
            }
            // Rendered in the notes section at the end of the document.
            Node::FootnoteDefinition { .. } => {}

            Node::Text(text) => {
                let escaped = escape_html(text);
                if self.options.hard_wrap {
                    self.write(&escaped.replace('\n', "<br />\n"));
                } else {
                    self.write(&escaped);
                }
            }
            Node::Entity(raw) => self.write(raw),
            Node::Code(code) => {
                self.write("<code>");
                self.write_escaped(code);
                self.write("</code>");
            }
            Node::Emphasis(children) => self.wrap("em", children),
            Node::Strong(children) => self.wrap("strong", children),
            Node::Strikethrough(children) => self.wrap("del", children),
            Node::Link {
                destination,
                title,
                children,
            } => {
                self.write(&format!("<a href=\"{}\"", escape_attribute(destination)));
                self.title(title.as_deref());
                self.write(">");
                self.nodes(children);
                self.write("</a>");
            }
            Node::Image {
                destination,
                title,
                alt_text,
            } => {
                let alt: String = alt_text.iter().map(Node::plain_text).collect();
                self.write(&format!(
                    "<img src=\"{}\" alt=\"{}\"",
                    escape_attribute(destination),
                    escape_attribute(&alt)
                ));
                self.title(title.as_deref());
                self.write(" />");
            }
            Node::Autolink { destination, text } => {
                self.write(&format!("<a href=\"{}\">", escape_attribute(destination)));
                self.write(&escape_attribute(text));
                self.write("</a>");
            }
            Node::HardBreak => self.write("<br />\n"),
            Node::HtmlInline(raw) => {
                if !self.options.filter_html {
                    self.write(raw);
                }
            }
            Node::FootnoteReference {
                number: Some(n), ..
            } => {
                // Only the first reference is the back link's target.
                let id = if self.referenced.insert(*n) {
                    format!(" id=\"fnref{n}\"")
                } else {
                    String::new()
                };
                self.write(&format!(
                    "<a class=\"noteref\"{id} href=\"#fn{n}\" title=\"Jump to note {n}\">[{n}]</a>"
                ));
            }
            Node::FootnoteReference {
                label,
                number: None,
            } => self.write_escaped(&format!("[^{label}]")),
            Node::InlineNote(children) => self.nodes(children),
            Node::Hashtag(tag) => {
                self.write(&format!("<span class=\"hashtag\">#{}</span>", escape_html(tag)))
            }
            Node::Username(name) => {
                self.write(&format!("<span class=\"username\">@{}</span>", escape_html(name)))
            }
            Node::Media {
                destination,
                title,
                kind,
                children,
            } => {
                let tag = kind.tag();
                self.write(&format!("<{tag} src=\"{}\"", escape_attribute(destination)));
                self.title(title.as_deref());
                self.write(" controls=\"controls\">");
                self.nodes(children);
                self.write(&format!("</{tag}>"));
            }
        }
    }

    fn wrap(&mut self, tag: &str, children: &[Node]) {
        self.write(&format!("<{tag}>"));
        self.nodes(children);
        self.write(&format!("</{tag}>"));
    }

    fn title(&mut self, title: Option<&str>) {
        if let Some(title) = title.filter(|t| !t.is_empty()) {
            self.write(&format!(" title=\"{}\"", escape_attribute(title)));
        }
    }

    fn container(&mut self, open: &str, children: &[Node], close: &str) {
        self.pad(2);
        self.write(open);
        self.write("\n");
        self.padded = 2;
        self.loose(children);
        self.pad(1);
        self.write(close);
    }

    fn keeps_html_block(&self, raw: &str) -> bool {
        if self.options.filter_html {
            return false;
        }
        let is_style = raw
            .get(..6)
            .is_some_and(|start| start.eq_ignore_ascii_case("<style"));
        !(self.options.filter_styles && is_style)
    }

    fn notes(&mut self, notes: &[&Node]) {
        self.pad(2);
        self.write("<hr />");
        self.pad(1);
        self.write("<ol class=\"notes\">");
        let outer = std::mem::replace(&mut self.tight, false);
        for note in notes {
            let Node::FootnoteDefinition {
                number, children, ..
            } = note
            else {
                continue;
            };
            self.pad(1);
            self.write(&format!("<li id=\"fn{number}\">"));
            self.padded = 2;
            self.note_body(*number, children);
            self.pad(1);
            self.write("</li>");
        }
        self.tight = outer;
        self.pad(1);
        self.write("</ol>");
    }

    /// The back link goes inside the last paragraph when there is one.
    fn note_body(&mut self, number: usize, children: &[Node]) {
        let back = format!(" <a href=\"#fnref{number}\" title=\"Jump to reference\">[back]</a>");
        match children.split_last() {
            Some((Node::Paragraph(last), rest)) => {
                self.nodes(rest);
                self.pad(2);
                self.write("<p>");
                self.nodes(last);
                self.write(&back);
                self.write("</p>");
            }
            _ => {
                self.nodes(children);
                self.write(&back);
            }
        }
    }
}

fn escape_char(escaped: &mut String, c: char) {
    match c {
        '<' => escaped.push_str("&lt;"),
        '>' => escaped.push_str("&gt;"),
        '&' => escaped.push_str("&amp;"),
        '"' => escaped.push_str("&quot;"),
        _ => escaped.push(c),
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        escape_char(&mut escaped, c);
    }
    escaped
}

/// Like [`escape_html`], but character references that are already
/// escaped (`&amp;`, `&#169;`) are kept as written. Used for URLs, titles
/// and other text taken verbatim from the source.
fn escape_attribute(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        if c == '&'
            && let Some(length) = HtmlScanner::scan(rest, HtmlScanner::entity)
        {
            escaped.push_str(&rest[..length]);
            rest = &rest[length..];
            continue;
        }
        escape_char(&mut escaped, c);
        rest = &rest[c.len_utf8()..];
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::MediaKind;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn render_with(node: &Node, options: Options) -> String {
        HtmlRenderer::new(&options).render(node)
    }

    fn render(node: &Node) -> String {
        render_with(node, Options::default())
    }

    fn text(s: &str) -> Node {
        Node::Text(s.to_string())
    }

    fn para(s: &str) -> Node {
        Node::Paragraph(vec![text(s)])
    }

    fn list(tight: bool, items: Vec<Vec<Node>>) -> Node {
        Node::List {
            ordered: false,
            tight,
            children: items.into_iter().map(Node::ListItem).collect(),
        }
    }

    #[test]
    fn empty_document_renders_nothing() {
        assert_eq!(render(&Node::Document(vec![])), "");
    }

    #[test]
    fn blocks_are_separated_by_blank_lines() {
        let doc = Node::Document(vec![
            Node::Heading {
                level: 2,
                children: vec![text("Title")],
            },
            para("body"),
            Node::ThematicBreak,
            Node::CodeBlock {
                info: "rust".to_string(),
                literal: "a < b\n".to_string(),
            },
        ]);
        assert_eq!(
            render(&doc),
            "<h2>Title</h2>\n\n<p>body</p>\n\n<hr />\n\n<pre><code class=\"language-rust\">a &lt; b\n</code></pre>"
        );
    }

    #[test]
    fn tight_and_loose_lists() {
        let tight = Node::Document(vec![list(true, vec![vec![para("a")], vec![para("b")]])]);
        assert_eq!(render(&tight), "<ul>\n<li>a</li>\n<li>b</li>\n</ul>");

        let loose = Node::Document(vec![list(false, vec![vec![para("a")], vec![para("b")]])]);
        assert_eq!(
            render(&loose),
            "<ul>\n<li><p>a</p></li>\n<li><p>b</p></li>\n</ul>"
        );
    }

    #[test]
    fn nested_list_in_tight_item() {
        let doc = Node::Document(vec![list(
            true,
            vec![vec![para("a"), list(true, vec![vec![para("b")]])]],
        )]);
        assert_eq!(
            render(&doc),
            "<ul>\n<li>a\n\n<ul>\n<li>b</li>\n</ul></li>\n</ul>"
        );
    }

    #[test]
    fn block_quote_children_start_on_new_line() {
        let doc = Node::Document(vec![Node::BlockQuote(vec![para("a"), para("b")])]);
        assert_eq!(
            render(&doc),
            "<blockquote>\n<p>a</p>\n\n<p>b</p>\n</blockquote>"
        );
    }

    #[test]
    fn spoiler_block() {
        let doc = Node::Document(vec![Node::SpoilerBlock(vec![para("secret")])]);
        assert_eq!(
            render(&doc),
            "<div class=\"spoiler\">\n<p>secret</p>\n</div>"
        );
    }

    #[test]
    fn escapes_text_but_not_entities() {
        let doc = Node::Paragraph(vec![text("<a & \"b\">"), Node::Entity("&copy;".to_string())]);
        assert_eq!(render(&doc), "<p>&lt;a &amp; &quot;b&quot;&gt;&copy;</p>");
    }

    #[rstest]
    #[case(Node::Emphasis(vec![text("x")]), "<em>x</em>")]
    #[case(Node::Strong(vec![text("x")]), "<strong>x</strong>")]
    #[case(Node::Strikethrough(vec![text("x")]), "<del>x</del>")]
    #[case(Node::Code("a<b".to_string()), "<code>a&lt;b</code>")]
    #[case(Node::HardBreak, "<br />\n")]
    #[case(Node::Hashtag("rust".to_string()), "<span class=\"hashtag\">#rust</span>")]
    #[case(Node::Username("bob".to_string()), "<span class=\"username\">@bob</span>")]
    #[case(
        Node::Link {
            destination: "/u?a=1&b=2".to_string(),
            title: Some("T".to_string()),
            children: vec![text("x")],
        },
        "<a href=\"/u?a=1&amp;b=2\" title=\"T\">x</a>"
    )]
    #[case(
        Node::Image {
            destination: "/i.png".to_string(),
            title: None,
            alt_text: vec![text("an "), Node::Emphasis(vec![text("image")])],
        },
        "<img src=\"/i.png\" alt=\"an image\" />"
    )]
    #[case(
        Node::Autolink {
            destination: "mailto:me@x.org".to_string(),
            text: "me@x.org".to_string(),
        },
        "<a href=\"mailto:me@x.org\">me@x.org</a>"
    )]
    #[case(
        Node::Media {
            destination: "a.mp3".to_string(),
            title: None,
            kind: MediaKind::Audio,
            children: vec![text("song")],
        },
        "<audio src=\"a.mp3\" controls=\"controls\">song</audio>"
    )]
    #[case(
        Node::FootnoteReference { label: "x".to_string(), number: None },
        "[^x]"
    )]
    fn inline_markup(#[case] node: Node, #[case] expected: &str) {
        assert_eq!(render(&node), expected);
    }

    #[rstest]
    #[case("/a?b=1&amp;c=2", "/a?b=1&amp;c=2")]
    #[case("/a?b=1&c=2", "/a?b=1&amp;c=2")]
    #[case("&#169; & &#xZ; &amp", "&#169; &amp; &amp;#xZ; &amp;amp")]
    #[case("say \"hi\" <now>", "say &quot;hi&quot; &lt;now&gt;")]
    fn attribute_escaping_keeps_entities(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(escape_attribute(input), expected);
    }

    #[test]
    fn link_attributes_are_not_escaped_twice() {
        let node = Node::Link {
            destination: "/a?b=1&amp;c=2".to_string(),
            title: Some("a &amp; b".to_string()),
            children: vec![text("x")],
        };
        assert_eq!(
            render(&node),
            "<a href=\"/a?b=1&amp;c=2\" title=\"a &amp; b\">x</a>"
        );
    }

    #[test]
    fn hard_wrap_turns_newlines_into_breaks() {
        let node = Node::Paragraph(vec![text("a\nb")]);
        let options = Options {
            hard_wrap: true,
            ..Options::default()
        };
        assert_eq!(render_with(&node, options), "<p>a<br />\nb</p>");
        assert_eq!(render(&node), "<p>a\nb</p>");
    }

    #[test]
    fn html_filters() {
        let doc = Node::Document(vec![
            Node::HtmlBlock("<div>x</div>".to_string()),
            Node::HtmlBlock("<STYLE>p {}</STYLE>".to_string()),
            Node::Paragraph(vec![text("a "), Node::HtmlInline("<b>".to_string())]),
        ]);
        assert_eq!(
            render(&doc),
            "<div>x</div>\n\n<STYLE>p {}</STYLE>\n\n<p>a <b></p>"
        );

        let styles = Options {
            filter_styles: true,
            ..Options::default()
        };
        assert_eq!(
            render_with(&doc, styles),
            "<div>x</div>\n\n<p>a <b></p>"
        );

        let html = Options {
            filter_html: true,
            ..Options::default()
        };
        assert_eq!(render_with(&doc, html), "<p>a </p>");
    }

    #[test]
    fn notes_section() {
        let doc = Node::Document(vec![
            Node::Paragraph(vec![
                text("See"),
                Node::FootnoteReference {
                    label: "n".to_string(),
                    number: Some(1),
                },
            ]),
            Node::FootnoteDefinition {
                label: "n".to_string(),
                number: 1,
                children: vec![para("First."), para("Second.")],
            },
        ]);
        assert_eq!(
            render(&doc),
            "<p>See<a class=\"noteref\" id=\"fnref1\" href=\"#fn1\" title=\"Jump to note 1\">[1]</a></p>\n\n\
             <hr />\n\
             <ol class=\"notes\">\n\
             <li id=\"fn1\"><p>First.</p>\n\n\
             <p>Second. <a href=\"#fnref1\" title=\"Jump to reference\">[back]</a></p>\n\
             </li>\n\
             </ol>"
        );
    }

    #[test]
    fn repeated_note_reference_has_no_duplicate_id() {
        let reference = Node::FootnoteReference {
            label: "n".to_string(),
            number: Some(1),
        };
        let doc = Node::Paragraph(vec![reference.clone(), text(" "), reference]);
        assert_eq!(
            render(&doc),
            "<p><a class=\"noteref\" id=\"fnref1\" href=\"#fn1\" title=\"Jump to note 1\">[1]</a> \
             <a class=\"noteref\" href=\"#fn1\" title=\"Jump to note 1\">[1]</a></p>"
        );
    }
}
