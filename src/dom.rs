// src/dom.rs

//! Tree-query capability over a rendered document.
//!
//! Extraction code walks pages only through [`DomTree`]: selector lookup,
//! parent links, following siblings and visible text. [`HtmlPage`] backs it
//! with `scraper`; tests can substitute a hand-built tree.

use scraper::{ElementRef, Html, Selector};

use crate::utils::text::normalize;

/// Elements whose text never counts as visible content.
const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Read-only structural queries over a document.
pub trait DomTree {
    /// Handle to an element node.
    type Node<'a>: Copy + PartialEq
    where
        Self: 'a;

    /// All elements matching a CSS selector, in document order.
    ///
    /// An invalid selector matches nothing.
    fn select<'a>(&'a self, selector: &str) -> Vec<Self::Node<'a>>;

    /// Lowercase tag name.
    fn tag<'a>(&'a self, node: Self::Node<'a>) -> &'a str;

    fn attr<'a>(&'a self, node: Self::Node<'a>, name: &str) -> Option<&'a str>;

    /// Whitespace-normalized visible text of the node and its descendants.
    fn text<'a>(&'a self, node: Self::Node<'a>) -> String;

    fn parent<'a>(&'a self, node: Self::Node<'a>) -> Option<Self::Node<'a>>;

    /// Element siblings after `node`, nearest first.
    fn next_siblings<'a>(&'a self, node: Self::Node<'a>) -> Vec<Self::Node<'a>>;

    /// Whitespace-normalized visible text of the whole page body.
    fn page_text(&self) -> String;

    /// Ancestor chain from the parent up to the root.
    fn ancestors<'a>(&'a self, node: Self::Node<'a>) -> Vec<Self::Node<'a>> {
        let mut chain = Vec::new();
        let mut current = self.parent(node);
        while let Some(parent) = current {
            chain.push(parent);
            current = self.parent(parent);
        }
        chain
    }

    /// First element matching `selector` strictly inside `node`.
    fn find_within<'a>(&'a self, node: Self::Node<'a>, selector: &str) -> Option<Self::Node<'a>> {
        self.select(selector)
            .into_iter()
            .find(|candidate| self.ancestors(*candidate).contains(&node))
    }

    /// Text of a node, reading `content` for `<meta>` elements.
    fn display_text<'a>(&'a self, node: Self::Node<'a>) -> String {
        if self.tag(node) == "meta" {
            return self.attr(node, "content").map(normalize).unwrap_or_default();
        }
        self.text(node)
    }
}

/// Number of edges between two nodes through their lowest common ancestor.
pub fn tree_distance<'a, T: DomTree + ?Sized>(
    tree: &'a T,
    a: T::Node<'a>,
    b: T::Node<'a>,
) -> Option<usize> {
    if a == b {
        return Some(0);
    }
    let mut chain_a = vec![a];
    chain_a.extend(tree.ancestors(a));
    let mut chain_b = vec![b];
    chain_b.extend(tree.ancestors(b));

    chain_a.iter().enumerate().find_map(|(up_a, node)| {
        chain_b
            .iter()
            .position(|other| other == node)
            .map(|up_b| up_a + up_b)
    })
}

/// A parsed HTML document.
pub struct HtmlPage {
    html: Html,
}

impl HtmlPage {
    /// Parse a full HTML document.
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }
}

impl DomTree for HtmlPage {
    type Node<'a> = ElementRef<'a>;

    fn select<'a>(&'a self, selector: &str) -> Vec<ElementRef<'a>> {
        match Selector::parse(selector) {
            Ok(sel) => self.html.select(&sel).collect(),
            Err(e) => {
                log::debug!("Invalid selector '{}': {:?}", selector, e);
                Vec::new()
            }
        }
    }

    fn tag<'a>(&'a self, node: ElementRef<'a>) -> &'a str {
        node.value().name()
    }

    fn attr<'a>(&'a self, node: ElementRef<'a>, name: &str) -> Option<&'a str> {
        node.value().attr(name)
    }

    fn text<'a>(&'a self, node: ElementRef<'a>) -> String {
        visible_text(node)
    }

    fn parent<'a>(&'a self, node: ElementRef<'a>) -> Option<ElementRef<'a>> {
        node.parent().and_then(ElementRef::wrap)
    }

    fn next_siblings<'a>(&'a self, node: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        node.next_siblings().filter_map(ElementRef::wrap).collect()
    }

    fn page_text(&self) -> String {
        let body = self.select("body").into_iter().next();
        visible_text(body.unwrap_or_else(|| self.html.root_element()))
    }
}

fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| INVISIBLE_TAGS.contains(&e.name()))
        });
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    normalize(&out)
}

/// Hand-built tree for exercising extraction without an HTML parser.
#[cfg(test)]
pub(crate) mod fixture {
    use super::DomTree;
    use crate::utils::text::normalize;

    struct FixtureNode {
        tag: String,
        attrs: Vec<(String, String)>,
        text: String,
        parent: Option<usize>,
        children: Vec<usize>,
    }

    /// Arena tree; node 0 is the `body` root.
    pub(crate) struct FixtureTree {
        nodes: Vec<FixtureNode>,
    }

    impl FixtureTree {
        pub(crate) fn new() -> Self {
            Self {
                nodes: vec![FixtureNode {
                    tag: "body".into(),
                    attrs: Vec::new(),
                    text: String::new(),
                    parent: None,
                    children: Vec::new(),
                }],
            }
        }

        /// Append a child element and return its handle.
        pub(crate) fn add(
            &mut self,
            parent: usize,
            tag: &str,
            attrs: &[(&str, &str)],
            text: &str,
        ) -> usize {
            let id = self.nodes.len();
            self.nodes.push(FixtureNode {
                tag: tag.to_string(),
                attrs: attrs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                text: text.to_string(),
                parent: Some(parent),
                children: Vec::new(),
            });
            self.nodes[parent].children.push(id);
            id
        }

        fn matches(&self, id: usize, simple: &str) -> bool {
            let simple = simple.trim();
            if simple == "*" {
                return true;
            }
            let (tag, attr) = match simple.split_once('[') {
                Some((tag, rest)) => (tag, Some(rest.trim_end_matches(']'))),
                None => (simple, None),
            };
            let node = &self.nodes[id];
            (tag.is_empty() || node.tag == tag)
                && attr.is_none_or(|a| node.attrs.iter().any(|(k, _)| k == a))
        }

        fn collect_text(&self, id: usize, out: &mut String) {
            out.push_str(&self.nodes[id].text);
            out.push(' ');
            for child in &self.nodes[id].children {
                self.collect_text(*child, out);
            }
        }

        fn preorder(&self, id: usize, out: &mut Vec<usize>) {
            out.push(id);
            for child in &self.nodes[id].children {
                self.preorder(*child, out);
            }
        }
    }

    impl DomTree for FixtureTree {
        type Node<'a> = usize;

        fn select<'a>(&'a self, selector: &str) -> Vec<usize> {
            let mut order = Vec::new();
            self.preorder(0, &mut order);
            order
                .into_iter()
                .filter(|id| selector.split(',').any(|s| self.matches(*id, s)))
                .collect()
        }

        fn tag<'a>(&'a self, node: usize) -> &'a str {
            &self.nodes[node].tag
        }

        fn attr<'a>(&'a self, node: usize, name: &str) -> Option<&'a str> {
            self.nodes[node]
                .attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        }

        fn text<'a>(&'a self, node: usize) -> String {
            let mut out = String::new();
            self.collect_text(node, &mut out);
            normalize(&out)
        }

        fn parent<'a>(&'a self, node: usize) -> Option<usize> {
            self.nodes[node].parent
        }

        fn next_siblings<'a>(&'a self, node: usize) -> Vec<usize> {
            let Some(parent) = self.nodes[node].parent else {
                return Vec::new();
            };
            let siblings = &self.nodes[parent].children;
            match siblings.iter().position(|id| *id == node) {
                Some(pos) => siblings[pos + 1..].to_vec(),
                None => Vec::new(),
            }
        }

        fn page_text(&self) -> String {
            self.text(0)
        }
    }
}
