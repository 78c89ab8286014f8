/// AST node types produced by the block and inline grammars.
///
/// The tree is owned top-down and has no parent links. Passes consume a tree
/// and return a new one; nothing mutates it in place.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Document(Vec<Node>),
    // Block-level nodes
    Paragraph(Vec<Node>),
    Heading {
        level: u8,
        children: Vec<Node>,
    },
    List {
        ordered: bool,
        tight: bool,         // Tight lists render item paragraphs without <p>
        children: Vec<Node>, // Contains ListItem nodes
    },
    ListItem(Vec<Node>),
    BlockQuote(Vec<Node>),
    CodeBlock {
        info: String,
        literal: String,
    },
    ThematicBreak,
    HtmlBlock(String),
    FootnoteDefinition {
        label: String,
        number: usize,
        children: Vec<Node>,
    },
    SpoilerBlock(Vec<Node>),
    // Inline nodes
    Text(String),
    Entity(String), // Character reference, passed through verbatim
    Code(String),
    Emphasis(Vec<Node>),
    Strong(Vec<Node>),
    Strikethrough(Vec<Node>),
    Link {
        destination: String,
        title: Option<String>,
        children: Vec<Node>,
    },
    Image {
        destination: String,
        title: Option<String>,
        alt_text: Vec<Node>,
    },
    Autolink {
        destination: String,
        text: String,
    },
    HardBreak,
    HtmlInline(String),
    FootnoteReference {
        label: String,
        number: Option<usize>, // Assigned by the footnote pass
    },
    InlineNote(Vec<Node>),
    Hashtag(String),
    Username(String),
    Media {
        destination: String,
        title: Option<String>,
        kind: MediaKind,
        children: Vec<Node>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    const AUDIO: &'static [&'static str] = &["mp3", "ogg", "oga", "wav", "m4a", "aac", "flac"];
    const VIDEO: &'static [&'static str] = &["mp4", "m4v", "webm", "ogv", "mov"];

    /// Classify a link destination by the extension of its path.
    pub fn from_destination(destination: &str) -> Option<Self> {
        let path = destination
            .split(['?', '#'])
            .next()
            .unwrap_or(destination);
        let (_, extension) = path.rsplit_once('.')?;
        if extension.contains('/') {
            return None;
        }
        let extension = extension.to_ascii_lowercase();
        if Self::AUDIO.contains(&extension.as_str()) {
            Some(MediaKind::Audio)
        } else if Self::VIDEO.contains(&extension.as_str()) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl Node {
    /// Rebuild this node with `f` applied to each child, in document order.
    pub fn map_children(self, mut f: impl FnMut(Node) -> Node) -> Node {
        let mut map =
            |children: Vec<Node>| -> Vec<Node> { children.into_iter().map(&mut f).collect() };
        match self {
            Node::Document(children) => Node::Document(map(children)),
            Node::Paragraph(children) => Node::Paragraph(map(children)),
            Node::Heading { level, children } => Node::Heading {
                level,
                children: map(children),
            },
            Node::List {
                ordered,
                tight,
                children,
            } => Node::List {
                ordered,
                tight,
                children: map(children),
            },
            Node::ListItem(children) => Node::ListItem(map(children)),
            Node::BlockQuote(children) => Node::BlockQuote(map(children)),
            Node::FootnoteDefinition {
                label,
                number,
                children,
            } => Node::FootnoteDefinition {
                label,
                number,
                children: map(children),
            },
            Node::SpoilerBlock(children) => Node::SpoilerBlock(map(children)),
            Node::Emphasis(children) => Node::Emphasis(map(children)),
            Node::Strong(children) => Node::Strong(map(children)),
            Node::Strikethrough(children) => Node::Strikethrough(map(children)),
            Node::Link {
                destination,
                title,
                children,
            } => Node::Link {
                destination,
                title,
                children: map(children),
            },
            Node::Image {
                destination,
                title,
                alt_text,
            } => Node::Image {
                destination,
                title,
                alt_text: map(alt_text),
            },
            Node::InlineNote(children) => Node::InlineNote(map(children)),
            Node::Media {
                destination,
                title,
                kind,
                children,
            } => Node::Media {
                destination,
                title,
                kind,
                children: map(children),
            },
            leaf @ (Node::CodeBlock { .. }
            | Node::ThematicBreak
            | Node::HtmlBlock(_)
            | Node::Text(_)
            | Node::Entity(_)
            | Node::Code(_)
            | Node::Autolink { .. }
            | Node::HardBreak
            | Node::HtmlInline(_)
            | Node::FootnoteReference { .. }
            | Node::Hashtag(_)
            | Node::Username(_)) => leaf,
        }
    }

    /// Concatenated text content, used for image alt attributes.
    pub fn plain_text(&self) -> String {
        match self {
            Node::Text(text) | Node::Code(text) | Node::Entity(text) => text.clone(),
            Node::Autolink { text, .. } => text.clone(),
            Node::Hashtag(tag) => format!("#{tag}"),
            Node::Username(name) => format!("@{name}"),
            Node::HardBreak => "\n".to_string(),
            Node::Emphasis(children)
            | Node::Strong(children)
            | Node::Strikethrough(children)
            | Node::Link { children, .. }
            | Node::Media { children, .. }
            | Node::Image {
                alt_text: children, ..
            } => children.iter().map(Node::plain_text).collect(),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("song.mp3", Some(MediaKind::Audio))]
    #[case("http://example.com/clip.WebM?t=10", Some(MediaKind::Video))]
    #[case("movie.mov#start", Some(MediaKind::Video))]
    #[case("http://example.com/page.html", None)]
    #[case("http://example.com/dir.mp3/index", None)]
    #[case("no-extension", None)]
    fn classifies_media_destinations(#[case] destination: &str, #[case] kind: Option<MediaKind>) {
        assert_eq!(MediaKind::from_destination(destination), kind);
    }

    #[test]
    fn map_children_preserves_order() {
        let tree = Node::Paragraph(vec![
            Node::Text("a".into()),
            Node::Emphasis(vec![Node::Text("b".into())]),
        ]);
        let mut seen = Vec::new();
        let rebuilt = tree.clone().map_children(|child| {
            seen.push(child.plain_text());
            child
        });
        assert_eq!(seen, vec!["a", "b"]);
        assert_eq!(rebuilt, tree);
    }
}
