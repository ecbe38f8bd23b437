//! `url(...)` reference parsing and reference resolution.
//!
//! Shared by the inline-style, stylesheet and computed-style strategies.
//! Embedded `data:` URIs are never references.

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

fn url_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)url\s*\(\s*(?:"([^"]*)"|'([^']*)'|([^"')\s]+))\s*\)"#)
            .expect("css url regex is valid")
    })
}

/// Every `url(...)` reference in a CSS fragment, in source order,
/// excluding `data:` URIs. Quoted references may contain spaces.
pub fn css_url_references(css: &str) -> Vec<String> {
    url_ref_regex()
        .captures_iter(css)
        .filter_map(|cap| cap.get(1).or_else(|| cap.get(2)).or_else(|| cap.get(3)))
        .map(|m| m.as_str().trim())
        .filter(|r| !r.is_empty() && !is_data_uri(r))
        .map(str::to_string)
        .collect()
}

/// URLs listed in a `srcset` value: the first token of each comma-separated
/// candidate, descriptors dropped.
pub fn srcset_candidates(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
        .filter(|u| !is_data_uri(u))
        .map(str::to_string)
        .collect()
}

/// Resolve a raw reference against `base`. Only `http`/`https` results are
/// kept.
pub fn resolve_reference(base: &Url, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() || is_data_uri(reference) {
        return None;
    }
    let resolved = base.join(reference).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

fn is_data_uri(reference: &str) -> bool {
    reference
        .get(..5)
        .map(|p| p.eq_ignore_ascii_case("data:"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_url_references_all_quote_styles() {
        let css = r#"
            .a { background: url(/img/a.png) no-repeat; }
            .b { background-image: URL( "b.jpg" ); }
            .c { background: url('../c.webp'), url(d.svg); }
        "#;
        assert_eq!(
            css_url_references(css),
            vec!["/img/a.png", "b.jpg", "../c.webp", "d.svg"]
        );
    }

    #[test]
    fn test_quoted_references_keep_spaces() {
        let css = r#".a { background: url('/img/my photo.jpg'); } .b { background: url( "two words.png" ) }"#;
        assert_eq!(
            css_url_references(css),
            vec!["/img/my photo.jpg", "two words.png"]
        );
        assert!(css_url_references("url('')").is_empty());

        let page = Url::parse("https://site.test/").unwrap();
        assert_eq!(
            resolve_reference(&page, "/img/my photo.jpg").as_deref(),
            Some("https://site.test/img/my%20photo.jpg")
        );
    }

    #[test]
    fn test_css_url_references_skip_data_uris() {
        let css = "background-image:url('data:image/png;base64,iVBORw0KGgo=')";
        assert!(css_url_references(css).is_empty());
        assert!(css_url_references("background:url(DATA:image/gif;base64,R0l)").is_empty());
    }

    #[test]
    fn test_srcset_candidates() {
        assert_eq!(
            srcset_candidates("small.jpg 480w, /large.jpg 1080w,  hi.png 2x"),
            vec!["small.jpg", "/large.jpg", "hi.png"]
        );
        assert!(srcset_candidates("  ").is_empty());
    }

    #[test]
    fn test_resolve_reference() {
        let page = Url::parse("https://site.test/blog/post").unwrap();
        assert_eq!(
            resolve_reference(&page, "img/a.png").as_deref(),
            Some("https://site.test/blog/img/a.png")
        );
        assert_eq!(
            resolve_reference(&page, "//cdn.test/x.jpg").as_deref(),
            Some("https://cdn.test/x.jpg")
        );

        let sheet = Url::parse("https://site.test/assets/css/main.css").unwrap();
        assert_eq!(
            resolve_reference(&sheet, "../img/bg.jpg").as_deref(),
            Some("https://site.test/assets/img/bg.jpg")
        );
    }

    #[test]
    fn test_resolve_reference_rejects_other_schemes() {
        let page = Url::parse("https://site.test/").unwrap();
        assert_eq!(resolve_reference(&page, "data:image/png;base64,AAAA"), None);
        assert_eq!(resolve_reference(&page, "javascript:void(0)"), None);
        assert_eq!(resolve_reference(&page, "   "), None);
    }
}
