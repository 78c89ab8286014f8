/// Footnote numbering pass.
///
/// Notes are numbered in order of first reference. Definitions that are
/// never referenced are dropped; references to labels with no definition
/// are turned back into their literal `[^label]` text. The numbered
/// definitions are appended to the end of the document, where the renderer
/// collects them into the notes list.
use crate::ast::Node;
use crate::parser::normalize_label;
use std::collections::HashMap;

/// Footnote bodies by normalized label.
pub(crate) type FootnoteTable = HashMap<String, Vec<Node>>;

pub(crate) fn resolve(document: Node, table: FootnoteTable) -> Node {
    let children = match document {
        Node::Document(children) => children,
        other => return other,
    };
    let mut resolver = Resolver {
        table,
        numbers: HashMap::new(),
        queue: Vec::new(),
        anonymous: 0,
    };
    let mut children: Vec<Node> = children
        .into_iter()
        .map(|child| resolver.visit(child))
        .collect();

    // Note bodies may reference further notes, which join the queue.
    let mut next = 0;
    while next < resolver.queue.len() {
        let (label, number, body) = std::mem::take(&mut resolver.queue[next]);
        let body = body.into_iter().map(|child| resolver.visit(child)).collect();
        children.push(Node::FootnoteDefinition {
            label,
            number,
            children: body,
        });
        next += 1;
    }

    tracing::debug!(
        numbered = resolver.queue.len(),
        unreferenced = resolver.table.len(),
        "footnotes resolved"
    );
    Node::Document(children)
}

struct Resolver {
    table: FootnoteTable,
    numbers: HashMap<String, usize>,
    queue: Vec<(String, usize, Vec<Node>)>,
    anonymous: usize,
}

impl Resolver {
    fn visit(&mut self, node: Node) -> Node {
        match node {
            Node::FootnoteReference { label, .. } => self.reference(label),
            Node::InlineNote(children) => {
                self.anonymous += 1;
                let label = format!("inline-{}", self.anonymous);
                let body = vec![Node::Paragraph(children)];
                let number = self.enqueue(label.clone(), body);
                Node::FootnoteReference {
                    label,
                    number: Some(number),
                }
            }
            other => other.map_children(|child| self.visit(child)),
        }
    }

    fn reference(&mut self, label: String) -> Node {
        let key = normalize_label(&label);
        if let Some(&number) = self.numbers.get(&key) {
            return Node::FootnoteReference {
                label: key,
                number: Some(number),
            };
        }
        match self.table.remove(&key) {
            Some(body) => {
                let number = self.enqueue(key.clone(), body);
                Node::FootnoteReference {
                    label: key,
                    number: Some(number),
                }
            }
            None => {
                tracing::trace!(label = %label, "reference to undefined footnote");
                Node::Text(format!("[^{label}]"))
            }
        }
    }

    fn enqueue(&mut self, label: String, body: Vec<Node>) -> usize {
        let number = self.queue.len() + 1;
        self.numbers.insert(label.clone(), number);
        self.queue.push((label, number, body));
        number
    }
}
