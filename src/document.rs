//! Capability-typed view over a parsed HTML page.
//!
//! The extractor and image resolver only need a handful of traversal
//! operations, so they are written against [`PageDocument`] and
//! [`PageElement`] rather than against `scraper` directly. [`HtmlPage`] is
//! the `scraper`-backed implementation used in production.
//!
//! Invalid selectors never panic: they log at debug level and match nothing.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// An element in a parsed page.
pub trait PageElement: Sized {
    /// Concatenated descendant text, unnormalized.
    fn text(&self) -> String;
    /// Attribute value, if present.
    fn attr(&self, name: &str) -> Option<String>;
    /// Descendants matching `selector`, in document order.
    fn find(&self, selector: &str) -> Vec<Self>;
    /// This element or its nearest ancestor matching `selector`.
    fn closest(&self, selector: &str) -> Option<Self>;
    /// Parent element, if any.
    fn parent(&self) -> Option<Self>;
    /// Element siblings in document order, excluding `self`.
    fn siblings(&self) -> Vec<Self>;
}

/// A whole parsed page.
pub trait PageDocument {
    type Element<'a>: PageElement
    where
        Self: 'a;

    /// Elements anywhere in the page matching `selector`, in document order.
    fn find(&self, selector: &str) -> Vec<Self::Element<'_>>;
}

fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(s) => Some(s),
        Err(e) => {
            debug!(%selector, error = %e, "Invalid CSS selector; matching nothing");
            None
        }
    }
}

/// A page parsed with `scraper`.
pub struct HtmlPage {
    html: Html,
}

impl HtmlPage {
    pub fn parse(body: &str) -> Self {
        Self {
            html: Html::parse_document(body),
        }
    }
}

impl PageDocument for HtmlPage {
    type Element<'a>
        = HtmlNode<'a>
    where
        Self: 'a;

    fn find(&self, selector: &str) -> Vec<HtmlNode<'_>> {
        let Some(sel) = parse_selector(selector) else {
            return Vec::new();
        };
        self.html.select(&sel).map(HtmlNode).collect()
    }
}

/// An element of an [`HtmlPage`].
#[derive(Clone, Copy)]
pub struct HtmlNode<'a>(ElementRef<'a>);

impl<'a> PageElement for HtmlNode<'a> {
    fn text(&self) -> String {
        self.0.text().collect::<String>()
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.0.value().attr(name).map(str::to_string)
    }

    fn find(&self, selector: &str) -> Vec<Self> {
        let Some(sel) = parse_selector(selector) else {
            return Vec::new();
        };
        self.0.select(&sel).map(HtmlNode).collect()
    }

    fn closest(&self, selector: &str) -> Option<Self> {
        let sel = parse_selector(selector)?;
        std::iter::once(self.0)
            .chain(self.0.ancestors().filter_map(ElementRef::wrap))
            .find(|el| sel.matches(el))
            .map(HtmlNode)
    }

    fn parent(&self) -> Option<Self> {
        self.0.parent().and_then(ElementRef::wrap).map(HtmlNode)
    }

    fn siblings(&self) -> Vec<Self> {
        let me = self.0.id();
        match self.0.parent() {
            Some(parent) => parent
                .children()
                .filter(|n| n.id() != me)
                .filter_map(ElementRef::wrap)
                .map(HtmlNode)
                .collect(),
            None => Vec::new(),
        }
    }
}
