//! Icon hints harvested from HTML `<link>` elements.
//!
//! A regex scan rather than a full HTML parser: real-world markup is messy, so
//! matching is case-insensitive, tolerant of unquoted values and independent
//! of attribute order.

use once_cell::sync::Lazy;
use regex::Regex;
use url::{ParseError, Url};

static LINK_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<link\b[^>]*>").expect("link tag pattern is valid"));

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)([a-z_:][-a-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .expect("attribute pattern is valid")
});

/// `rel` tokens that mark a link as an icon. `shortcut icon` matches via `icon`.
const ICON_RELS: &[&str] = &[
    "icon",
    "apple-touch-icon",
    "apple-touch-icon-precomposed",
    "mask-icon",
];

/// `href` values of icon links, in document order.
pub fn extract_icon_hrefs(html: &str) -> Vec<String> {
    LINK_TAG
        .find_iter(html)
        .filter_map(|tag| {
            let mut rel = None;
            let mut href = None;
            for caps in ATTRIBUTE.captures_iter(tag.as_str()) {
                let value = caps
                    .get(2)
                    .or_else(|| caps.get(3))
                    .or_else(|| caps.get(4))
                    .map(|m| m.as_str());
                match caps[1].to_ascii_lowercase().as_str() {
                    "rel" if rel.is_none() => rel = value,
                    "href" if href.is_none() => href = value,
                    _ => {}
                }
            }
            let is_icon = rel?
                .split_ascii_whitespace()
                .any(|token| ICON_RELS.iter().any(|r| token.eq_ignore_ascii_case(r)));
            let href = decode_entities(href?.trim());
            (is_icon && !href.is_empty()).then_some(href)
        })
        .collect()
}

fn decode_entities(raw: &str) -> String {
    raw.replace("&amp;", "&")
        .replace("&#38;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

/// Turn an `href` into an absolute URL against the site origin.
///
/// Absolute hrefs pass through untouched (the caller still has to vet them);
/// relative and root-relative ones are joined onto `origin`.
pub fn resolve_href(origin: &Url, href: &str) -> Option<Url> {
    match Url::parse(href) {
        Ok(url) => Some(url),
        Err(ParseError::RelativeUrlWithoutBase) => origin.join(href).ok(),
        Err(_) => None,
    }
}
