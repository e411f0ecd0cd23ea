//! Meta-tag pruning for mirrored HTML pages.

use scraper::node::Element;
use scraper::{Html, Selector};

/// Meta `name`/`property` values that survive pruning.
pub const ALLOWED_META_NAMES: &[&str] = &["charset", "viewport", "theme-color", "description"];

/// Remove `<head>` meta tags that are not on the allow-list.
///
/// A meta tag is kept when it carries a `charset` attribute or its `name` or
/// `property` is one of [`ALLOWED_META_NAMES`]. Documents with nothing to
/// prune are returned byte-for-byte unchanged.
pub fn prune_meta_tags(html: &str) -> String {
    let mut document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("head > meta") else {
        return html.to_string();
    };

    let doomed: Vec<_> = document
        .select(&selector)
        .filter(|meta| !is_allowed_meta(meta.value()))
        .map(|meta| meta.id())
        .collect();

    if doomed.is_empty() {
        return html.to_string();
    }

    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    document.html()
}

fn is_allowed_meta(meta: &Element) -> bool {
    let allowed = |value: &str| {
        ALLOWED_META_NAMES
            .iter()
            .any(|name| name.eq_ignore_ascii_case(value))
    };

    meta.attr("charset").is_some()
        || meta.attr("name").is_some_and(allowed)
        || meta.attr("property").is_some_and(allowed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_allow_listed_meta() {
        let html = r#"<html><head>
            <meta charset="utf-8">
            <meta name="viewport" content="width=device-width">
            <meta property="description" content="A page">
            <meta name="generator" content="WordPress 4.2">
            <meta http-equiv="refresh" content="0">
            </head><body><p>hi</p></body></html>"#;

        let pruned = prune_meta_tags(html);

        assert!(pruned.contains("charset=\"utf-8\""));
        assert!(pruned.contains("width=device-width"));
        assert!(pruned.contains("A page"));
        assert!(!pruned.contains("WordPress"));
        assert!(!pruned.contains("refresh"));
        assert!(pruned.contains("<p>hi</p>"));
    }

    #[test]
    fn untouched_when_nothing_to_prune() {
        let html = "<html><head><meta charset=\"utf-8\"></head><body></body></html>";
        assert_eq!(prune_meta_tags(html), html);
    }

    #[test]
    fn body_meta_is_ignored() {
        let html = "<html><head></head><body><div><meta name=\"keywords\" content=\"x\"></div></body></html>";
        assert_eq!(prune_meta_tags(html), html);
    }
}
