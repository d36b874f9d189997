//! Illustrative image lookup for scraped candidates.
//!
//! Listing pages rarely tie an image to a headline explicitly, so the
//! resolver looks around the anchor in widening circles and takes the first
//! image that is not obvious page chrome:
//!
//! 1. the nearest article-like container (`article`, `.article`, `.post`, `.story`, `.card`)
//! 2. the anchor's sibling elements
//! 3. the anchor's parent container
//! 4. the page's `og:image` meta tag
//!
//! When nothing usable turns up, an optional stock fallback picks one of a
//! fixed set of images by a stable hash of the title, so reruns agree.

use crate::document::{PageDocument, PageElement};
use crate::scrapers::absolutize;
use crate::utils::stable_hash;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

const CONTAINER_SELECTOR: &str = "article, .article, .post, .story, .card";
const OG_IMAGE_SELECTOR: &str = r#"meta[property="og:image"]"#;

/// Attributes checked on an `<img>`, in order; lazy loaders park the real URL in `data-*`.
const IMAGE_ATTRS: [&str; 3] = ["src", "data-src", "data-lazy-src"];

static NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(logo|icon|avatar|profile|placeholder|social|banner|sprite|pixel|spacer|/ads?/|[_\-/]ad[_\-.])",
    )
    .expect("static regex")
});

/// `NxM` tokens where both sides are below 100px: tracking pixels and thumbnails.
static SMALL_DIMENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9])[0-9]{1,2}x[0-9]{1,2}(?:[^0-9]|$)").expect("static regex"));

/// Stock running photos used when fallback images are enabled.
pub const FALLBACK_IMAGES: [&str; 5] = [
    "https://images.unsplash.com/photo-1452626038306-9aae5e071dd3?w=1200",
    "https://images.unsplash.com/photo-1476480862126-209bfaa8edc8?w=1200",
    "https://images.unsplash.com/photo-1502904550040-7534597429ae?w=1200",
    "https://images.unsplash.com/photo-1530143311094-34d807799e8f?w=1200",
    "https://images.unsplash.com/photo-1571008887538-b36bb32f4571?w=1200",
];

/// True when the URL looks like a logo, icon, ad or tracking pixel.
pub fn is_noise_image(url: &str) -> bool {
    NOISE.is_match(url) || SMALL_DIMENSION.is_match(url)
}

/// Deterministic stock image for a title.
pub fn fallback_image(title: &str) -> &'static str {
    FALLBACK_IMAGES[stable_hash(title) as usize % FALLBACK_IMAGES.len()]
}

fn first_image_url<E: PageElement>(scope: &E) -> Option<String> {
    let img = scope.find("img").into_iter().next()?;
    IMAGE_ATTRS
        .iter()
        .filter_map(|name| img.attr(name))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty() && !v.starts_with("data:"))
}

fn accept(raw: Option<String>, source_url: &str) -> Option<String> {
    let url = absolutize(&raw?, source_url)?;
    if is_noise_image(&url) {
        debug!(%url, "Rejected noise image");
        return None;
    }
    Some(url)
}

/// Find an image for the anchor `anchor` on `page`, or `None`.
pub fn resolve_image<E, D>(anchor: &E, page: &D, source_url: &str) -> Option<String>
where
    E: PageElement,
    D: PageDocument,
{
    if let Some(found) = anchor
        .closest(CONTAINER_SELECTOR)
        .and_then(|container| accept(first_image_url(&container), source_url))
    {
        return Some(found);
    }

    if let Some(found) = anchor
        .siblings()
        .iter()
        .find_map(|sibling| first_image_url(sibling))
        .and_then(|raw| accept(Some(raw), source_url))
    {
        return Some(found);
    }

    if let Some(found) = anchor
        .parent()
        .and_then(|parent| accept(first_image_url(&parent), source_url))
    {
        return Some(found);
    }

    let og = page
        .find(OG_IMAGE_SELECTOR)
        .into_iter()
        .find_map(|meta| meta.attr("content"));
    accept(og, source_url)
}

/// [`resolve_image`], falling back to a stock image when `fallback` is set.
pub fn image_for<E, D>(anchor: &E, page: &D, source_url: &str, title: &str, fallback: bool) -> Option<String>
where
    E: PageElement,
    D: PageDocument,
{
    resolve_image(anchor, page, source_url)
        .or_else(|| fallback.then(|| fallback_image(title).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    // A tiny in-memory page. Selectors understood: `tag`, `.class`,
    // `tag[attr="value"]`, and comma-separated lists of those.
    #[derive(Default)]
    struct Arena {
        nodes: Vec<Node>,
    }

    struct Node {
        tag: String,
        attrs: Vec<(String, String)>,
        parent: Option<usize>,
        children: Vec<usize>,
    }

    impl Arena {
        fn add(&mut self, parent: Option<usize>, tag: &str, attrs: &[(&str, &str)]) -> usize {
            let idx = self.nodes.len();
            self.nodes.push(Node {
                tag: tag.to_string(),
                attrs: attrs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                parent,
                children: Vec::new(),
            });
            if let Some(p) = parent {
                self.nodes[p].children.push(idx);
            }
            idx
        }
    }

    #[derive(Clone)]
    struct FakeEl {
        arena: Rc<Arena>,
        idx: usize,
    }

    impl FakeEl {
        fn node(&self) -> &Node {
            &self.arena.nodes[self.idx]
        }

        fn at(&self, idx: usize) -> Self {
            FakeEl { arena: Rc::clone(&self.arena), idx }
        }

        fn matches(&self, selector: &str) -> bool {
            selector.split(',').map(str::trim).any(|simple| {
                let node = self.node();
                let attr_of = |k: &str| node.attrs.iter().find(|(n, _)| n == k).map(|(_, v)| v.as_str());
                if let Some(class) = simple.strip_prefix('.') {
                    return attr_of("class").is_some_and(|c| c.split_whitespace().any(|x| x == class));
                }
                match simple.split_once('[') {
                    Some((tag, rest)) => {
                        let (k, v) = rest.trim_end_matches(']').split_once('=').unwrap();
                        node.tag == tag && attr_of(k) == Some(v.trim_matches(|c| c == '"' || c == '\''))
                    }
                    None => node.tag == simple,
                }
            })
        }

        fn descendants(&self, out: &mut Vec<FakeEl>) {
            for &c in &self.node().children {
                let child = self.at(c);
                out.push(child.clone());
                child.descendants(out);
            }
        }
    }

    impl PageElement for FakeEl {
        fn text(&self) -> String {
            String::new()
        }

        fn attr(&self, name: &str) -> Option<String> {
            self.node().attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
        }

        fn find(&self, selector: &str) -> Vec<Self> {
            let mut all = Vec::new();
            self.descendants(&mut all);
            all.into_iter().filter(|e| e.matches(selector)).collect()
        }

        fn closest(&self, selector: &str) -> Option<Self> {
            let mut cur = Some(self.clone());
            while let Some(el) = cur {
                if el.matches(selector) {
                    return Some(el);
                }
                cur = el.parent();
            }
            None
        }

        fn parent(&self) -> Option<Self> {
            self.node().parent.map(|p| self.at(p))
        }

        fn siblings(&self) -> Vec<Self> {
            match self.node().parent {
                Some(p) => self.arena.nodes[p]
                    .children
                    .iter()
                    .filter(|&&c| c != self.idx)
                    .map(|&c| self.at(c))
                    .collect(),
                None => Vec::new(),
            }
        }
    }

    struct FakePage {
        root: FakeEl,
    }

    impl PageDocument for FakePage {
        type Element<'a>
            = FakeEl
        where
            Self: 'a;

        fn find(&self, selector: &str) -> Vec<FakeEl> {
            self.root.find(selector)
        }
    }

    fn page(arena: Arena) -> FakePage {
        FakePage {
            root: FakeEl { arena: Rc::new(arena), idx: 0 },
        }
    }

    const SRC: &str = "https://www.flotrack.org/news";

    #[test]
    fn test_container_image_wins() {
        let mut a = Arena::default();
        let body = a.add(None, "body", &[]);
        let card = a.add(Some(body), "div", &[("class", "story")]);
        a.add(Some(card), "img", &[("data-src", "/photos/race.jpg")]);
        let h = a.add(Some(card), "h2", &[]);
        let anchor = a.add(Some(h), "a", &[("href", "/articles/1")]);
        let page = page(a);
        let anchor = page.root.at(anchor);

        assert_eq!(
            resolve_image(&anchor, &page, SRC).as_deref(),
            Some("https://www.flotrack.org/photos/race.jpg")
        );
    }

    #[test]
    fn test_logo_in_container_falls_through_to_og_image() {
        let mut a = Arena::default();
        let body = a.add(None, "body", &[]);
        a.add(Some(body), "meta", &[("property", "og:image"), ("content", "https://cdn.flotrack.org/hero.jpg")]);
        let art = a.add(Some(body), "article", &[]);
        a.add(Some(art), "img", &[("src", "/static/site-logo.png")]);
        let anchor = a.add(Some(art), "a", &[("href", "/articles/2")]);
        let page = page(a);
        let anchor = page.root.at(anchor);

        assert_eq!(
            resolve_image(&anchor, &page, SRC).as_deref(),
            Some("https://cdn.flotrack.org/hero.jpg")
        );
    }

    #[test]
    fn test_sibling_then_parent_images() {
        let mut a = Arena::default();
        let body = a.add(None, "body", &[]);
        let wrap = a.add(Some(body), "div", &[]);
        let fig = a.add(Some(wrap), "figure", &[]);
        a.add(Some(fig), "img", &[("src", "img/sibling.jpg")]);
        let anchor = a.add(Some(wrap), "a", &[("href", "/x")]);
        let page = page(a);
        let anchor = page.root.at(anchor);

        assert_eq!(
            resolve_image(&anchor, &page, SRC).as_deref(),
            Some("https://www.flotrack.org/news/img/sibling.jpg")
        );
    }

    #[test]
    fn test_nothing_found_without_fallback() {
        let mut a = Arena::default();
        let body = a.add(None, "body", &[]);
        let anchor = a.add(Some(body), "a", &[("href", "/x")]);
        let page = page(a);
        let anchor = page.root.at(anchor);

        assert_eq!(image_for(&anchor, &page, SRC, "Some title here", false), None);
        let fallback = image_for(&anchor, &page, SRC, "Some title here", true).unwrap();
        assert!(FALLBACK_IMAGES.contains(&fallback.as_str()));
    }

    #[test]
    fn test_noise_filter() {
        assert!(is_noise_image("https://x.org/assets/logo.svg"));
        assert!(is_noise_image("https://x.org/img/Avatar_42.png"));
        assert!(is_noise_image("https://x.org/track/1x1.gif"));
        assert!(is_noise_image("https://x.org/thumbs/photo-50x50.jpg"));
        assert!(is_noise_image("https://x.org/ads/promo.jpg"));
        assert!(!is_noise_image("https://x.org/photos/marathon-1200x800.jpg"));
        assert!(!is_noise_image("https://x.org/photos/road-race.jpg"));
    }

    #[test]
    fn test_fallback_is_stable_per_title() {
        let a = fallback_image("Kiplimo breaks half marathon world record");
        let b = fallback_image("Kiplimo breaks half marathon world record");
        assert_eq!(a, b);
        let idx = stable_hash("Kiplimo breaks half marathon world record") as usize % FALLBACK_IMAGES.len();
        assert_eq!(a, FALLBACK_IMAGES[idx]);
    }
}
