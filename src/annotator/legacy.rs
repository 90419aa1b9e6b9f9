use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::html::{attr, attr_lower, head_of, strip_tags, LINK_RE, META_RE, SCRIPT_RE};
use super::markers;
use super::render::{PROFILE_META_PROPERTIES, SEO_META_NAMES, SEO_META_PROPERTIES};
use crate::settings::SiteConfig;

/// Substrings identifying third-party snippets that predate marked blocks.
/// Matched against the lower-cased script tag, body included.
const LEGACY_SCRIPT_SIGNATURES: &[&str] = &[
    // Monetag
    "monetag",
    "fpyf8.com/",
    // AdRoll
    "s.adroll.com/j/",
    "adroll_adv_id",
    // Unmarked AdSense loader, now owned by the AdSense block
    "pagead2.googlesyndication.com/pagead/js/adsbygoogle.js",
    // Pre-marker JSON-LD written by the first SEO injector
    "data-techability=\"seo\"",
];

static TITLE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)[ \t]*<title\b[^>]*>(.*?)</title\s*>(?:[ \t]*\r?\n)?").unwrap()
});

/// Remove every marked block and every known legacy snippet.
///
/// Safe to call on any text: when nothing matches the input comes back as is.
pub fn strip_legacy_and_marked_content(text: &str) -> String {
    let unmarked = markers::strip_marked(text);
    strip_legacy(&unmarked)
}

fn strip_legacy(text: &str) -> String {
    let scripts = SCRIPT_RE.replace_all(text, |caps: &Captures<'_>| {
        let tag = caps[0].to_lowercase();
        if LEGACY_SCRIPT_SIGNATURES.iter().any(|sig| tag.contains(sig)) {
            String::new()
        } else {
            caps[0].to_string()
        }
    });
    META_RE
        .replace_all(&scripts, |caps: &Captures<'_>| {
            if attr_lower(&caps[0], "name") == "google-adsense-account" {
                String::new()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Remove unmarked copies of the head tags the SEO block writes, so a
/// processed page carries exactly one of each. The body is left alone.
///
/// An authored description stays in place unless it is blank; the SEO block
/// then leaves its own description out.
pub fn strip_owned_tags(text: &str, cfg: &SiteConfig) -> String {
    let head = head_of(text);
    let rest = &text[head.len()..];

    let metas = META_RE.replace_all(head, |caps: &Captures<'_>| {
        if is_owned_meta(&caps[0], cfg) {
            String::new()
        } else {
            caps[0].to_string()
        }
    });
    let links = LINK_RE.replace_all(&metas, |caps: &Captures<'_>| {
        let rel = attr_lower(&caps[0], "rel");
        if rel.split_whitespace().any(|r| r == "canonical") {
            String::new()
        } else {
            caps[0].to_string()
        }
    });
    let titles = TITLE_TAG_RE.replace_all(&links, |caps: &Captures<'_>| {
        if strip_tags(&caps[1]).is_empty() {
            String::new()
        } else {
            caps[0].to_string()
        }
    });

    format!("{titles}{rest}")
}

fn is_owned_meta(tag: &str, cfg: &SiteConfig) -> bool {
    let name = attr_lower(tag, "name");
    let property = attr_lower(tag, "property");
    if name == "description" {
        return attr(tag, "content").map_or(true, |c| c.trim().is_empty());
    }
    SEO_META_NAMES.contains(&name.as_str())
        || SEO_META_PROPERTIES.contains(&property.as_str())
        || (cfg.profile_url.is_some() && PROFILE_META_PROPERTIES.contains(&property.as_str()))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn removes_every_copy_of_legacy_scripts() {
        let html = concat!(
            "<head>\n",
            "  <script src=\"https://fpyf8.com/88/tag.min.js\" data-zone=\"1\" async></script>\n",
            "  <script src=\"/scripts/monetag-control.js\"></script>\n",
            "  <script src=\"https://fpyf8.com/88/tag.min.js\" data-zone=\"1\" async></script>\n",
            "  <script>adroll_adv_id = \"X\"; if (a < b) { go(); }</script>\n",
            "  <script async src=\"https://pagead2.googlesyndication.com/pagead/js/adsbygoogle.js?client=ca-pub-1\"></script>\n",
            "  <meta name=\"google-adsense-account\" content=\"ca-pub-1\">\n",
            "  <script src=\"/app.js\"></script>\n",
            "</head>"
        );
        assert_eq!(
            strip_legacy_and_marked_content(html),
            "<head>\n  <script src=\"/app.js\"></script>\n</head>"
        );
    }

    #[test]
    fn removes_pre_marker_json_ld() {
        let html = "<head><script type=\"application/ld+json\" data-techability=\"seo\">[{}]</script></head>";
        assert_eq!(strip_legacy_and_marked_content(html), "<head></head>");
    }

    #[test]
    fn nothing_to_strip_is_fine() {
        let html = "<html><head><title>Plain</title></head><body><script>run()</script></body></html>";
        assert_eq!(strip_legacy_and_marked_content(html), html);
    }

    #[test]
    fn owned_tags_are_removed_others_kept() {
        let html = concat!(
            "<head>\n",
            "  <meta charset=\"utf-8\">\n",
            "  <title></title>\n",
            "  <meta name=\"Description\" content=\" \">\n",
            "  <meta property=\"og:title\" content=\"old\">\n",
            "  <meta name=\"twitter:card\" content=\"summary\">\n",
            "  <link rel=\"canonical\" href=\"https://old.test/\">\n",
            "  <link rel=\"stylesheet\" href=\"/site.css\">\n",
            "  <meta name=\"robots\" content=\"noindex\">\n",
            "</head>"
        );
        assert_eq!(
            strip_owned_tags(html, &SiteConfig::default()),
            concat!(
                "<head>\n",
                "  <meta charset=\"utf-8\">\n",
                "  <link rel=\"stylesheet\" href=\"/site.css\">\n",
                "  <meta name=\"robots\" content=\"noindex\">\n",
                "</head>"
            )
        );
    }

    #[test]
    fn social_tags_the_block_never_writes_are_kept() {
        let html = concat!(
            "<head>",
            "<meta name=\"twitter:site\" content=\"@ta\">",
            "<meta name=\"twitter:creator\" content=\"@me\">",
            "<meta property=\"og:locale\" content=\"en_NZ\">",
            "<meta property=\"og:image:alt\" content=\"Logo\">",
            "<meta property=\"article:publisher\" content=\"https://facebook.com/me\">",
            "<meta property=\"og:image\" content=\"/old.png\">",
            "</head>"
        );
        let out = strip_owned_tags(html, &SiteConfig::default());
        assert!(out.contains("twitter:site"));
        assert!(out.contains("twitter:creator"));
        assert!(out.contains("og:locale"));
        assert!(out.contains("og:image:alt"));
        // only replaced when the block writes its own
        assert!(out.contains("article:publisher"));
        assert!(!out.contains("/old.png"));

        let with_profile = SiteConfig {
            profile_url: Some("https://facebook.com/x".into()),
            ..Default::default()
        };
        assert!(!strip_owned_tags(html, &with_profile).contains("article:publisher"));
    }

    #[test]
    fn authored_description_is_kept() {
        let html = "<head><meta name=\"description\" content=\"Author text.\"></head>";
        assert_eq!(strip_owned_tags(html, &SiteConfig::default()), html);
    }

    #[test]
    fn body_is_never_touched() {
        let html = concat!(
            "<head><title><!-- todo --></title></head>",
            "<body><svg><title></title><path/></svg>",
            "<meta property=\"og:title\" content=\"inline\"></body>"
        );
        assert_eq!(
            strip_owned_tags(html, &SiteConfig::default()),
            concat!(
                "<head></head>",
                "<body><svg><title></title><path/></svg>",
                "<meta property=\"og:title\" content=\"inline\"></body>"
            )
        );
    }
}
