//! Rendering of the marked blocks. Output depends only on the page metadata
//! and the configuration, so re-rendering an unchanged page is byte-stable.

use serde_json::{json, Value};

use super::html::{escape_attr, escape_text};
use super::markers::BlockKind;
use crate::settings::SiteConfig;

/// `name` metas written by the SEO block.
pub const SEO_META_NAMES: &[&str] = &[
    "description",
    "twitter:card",
    "twitter:title",
    "twitter:description",
    "twitter:image",
];

/// `property` metas written by the SEO block.
pub const SEO_META_PROPERTIES: &[&str] = &[
    "og:type",
    "og:site_name",
    "og:url",
    "og:title",
    "og:description",
    "og:image",
];

/// `property` metas written only when a profile URL is configured.
pub const PROFILE_META_PROPERTIES: &[&str] = &["article:publisher", "og:see_also"];

/// Everything the SEO block needs to know about one page.
#[derive(Debug, Clone)]
pub struct PageMeta {
    pub canonical_url: String,
    pub title: String,
    /// Emit a `<title>` because the document has none.
    pub needs_title: bool,
    pub description: String,
    /// Emit the description meta because the author did not write one.
    pub needs_description: bool,
    /// Emit `robots` because the document has no robots meta of its own.
    pub needs_robots: bool,
}

/// Blocks for a processed page in insertion order. Integrations that are not
/// configured produce nothing, so their old blocks stay removed.
pub fn blocks_for(page: &PageMeta, cfg: &SiteConfig) -> Vec<(BlockKind, String)> {
    let mut blocks = vec![(BlockKind::Seo, seo_block(page, cfg))];
    if let Some(id) = &cfg.analytics_id {
        blocks.push((BlockKind::Analytics, analytics_block(id)));
    }
    if let Some(client) = &cfg.adsense_client {
        blocks.push((BlockKind::AdSense, adsense_block(client)));
    }
    if let Some(url) = &cfg.direct_link_url {
        blocks.push((BlockKind::DirectAds, direct_ads_block(url, cfg)));
    }
    blocks
}

pub fn seo_block(page: &PageMeta, cfg: &SiteConfig) -> String {
    let image = cfg.image_url();
    let mut lines = Vec::new();

    if page.needs_title {
        lines.push(format!("<title>{}</title>", escape_text(&page.title)));
    }
    if page.needs_robots {
        lines.push(meta_name("robots", "index,follow"));
    }
    lines.push(format!(
        r#"<link rel="canonical" href="{}">"#,
        escape_attr(&page.canonical_url)
    ));
    if page.needs_description {
        lines.push(meta_name("description", &page.description));
    }

    lines.push(meta_property("og:type", "website"));
    lines.push(meta_property("og:site_name", &cfg.site_name));
    lines.push(meta_property("og:url", &page.canonical_url));
    lines.push(meta_property("og:title", &page.title));
    lines.push(meta_property("og:description", &page.description));
    lines.push(meta_property("og:image", &image));

    lines.push(meta_name("twitter:card", "summary_large_image"));
    lines.push(meta_name("twitter:title", &page.title));
    lines.push(meta_name("twitter:description", &page.description));
    lines.push(meta_name("twitter:image", &image));

    if let Some(profile) = &cfg.profile_url {
        lines.push(meta_property("article:publisher", profile));
        lines.push(meta_property("og:see_also", profile));
    }

    lines.push(format!(
        r#"<script type="application/ld+json">{}</script>"#,
        script_safe(&structured_data(page, cfg).to_string())
    ));

    BlockKind::Seo.wrap(&lines.join("\n"))
}

/// Organization, WebSite and WebPage in one JSON-LD array.
fn structured_data(page: &PageMeta, cfg: &SiteConfig) -> Value {
    let mut organization = json!({
        "@context": "https://schema.org",
        "@type": "Organization",
        "name": cfg.site_name,
        "url": cfg.site_url,
        "logo": cfg.image_url(),
    });
    if let Some(profile) = &cfg.profile_url {
        organization["sameAs"] = json!([profile]);
    }

    let mut website = json!({
        "@context": "https://schema.org",
        "@type": "WebSite",
        "name": cfg.site_name,
        "url": cfg.site_url,
    });
    if let Some(lang) = &cfg.site_language {
        website["inLanguage"] = json!(lang);
    }

    let webpage = json!({
        "@context": "https://schema.org",
        "@type": "WebPage",
        "name": page.title,
        "url": page.canonical_url,
    });

    json!([organization, website, webpage])
}

pub fn analytics_block(measurement_id: &str) -> String {
    let body = format!(
        r#"<script async src="https://www.googletagmanager.com/gtag/js?id={src_id}"></script>
<script>
window.dataLayer = window.dataLayer || [];
function gtag(){{dataLayer.push(arguments);}}
gtag('js', new Date());
gtag('config', {js_id});
</script>"#,
        src_id = escape_attr(measurement_id),
        js_id = js_literal(&json!(measurement_id)),
    );
    BlockKind::Analytics.wrap(&body)
}

pub fn adsense_block(client: &str) -> String {
    let client = escape_attr(client);
    let body = format!(
        r#"<meta name="google-adsense-account" content="{client}">
<script async src="https://pagead2.googlesyndication.com/pagead/js/adsbygoogle.js?client={client}" crossorigin="anonymous"></script>"#
    );
    BlockKind::AdSense.wrap(&body)
}

/// Sponsored direct-link call-to-action shown with a probability and a daily
/// per-device cap. Pages opt out with `class="no-ads"` on `<html>`.
const DIRECT_ADS_SCRIPT: &str = r#"<script>
(function () {
  var DIRECT_URL = __DIRECT_URL__;
  var DAILY_CAP = __DAILY_CAP__;
  var SHOW_PROB = __SHOW_PROB__;
  if (document.documentElement.classList.contains('no-ads')) return;

  var now = new Date();
  var DAY_KEY = 'ta_ad_count_' + now.getFullYear() + '-' +
    String(now.getMonth() + 1).padStart(2, '0') + '-' +
    String(now.getDate()).padStart(2, '0');

  function shownToday() {
    try { return Number(localStorage.getItem(DAY_KEY) || '0'); } catch (e) { return DAILY_CAP; }
  }
  function canShow() {
    return shownToday() < DAILY_CAP && Math.random() < SHOW_PROB;
  }
  function markShown() {
    try { localStorage.setItem(DAY_KEY, String(shownToday() + 1)); } catch (e) {}
  }

  function inject() {
    var box = document.createElement('div');
    box.className = 'ta-ad-cta';
    box.setAttribute('role', 'presentation');
    box.style.cssText = 'position:fixed;bottom:16px;right:16px;z-index:2147483646;display:flex;align-items:center;gap:8px';

    var a = document.createElement('a');
    a.href = DIRECT_URL;
    a.target = '_blank';
    a.rel = 'nofollow sponsored';
    a.style.cssText = 'display:inline-block;padding:10px 12px;background:#111;color:#fff;border-radius:12px;text-decoration:none;font:600 14px/1.2 system-ui,sans-serif;opacity:.94';
    a.textContent = 'Sponsored: useful tech offers';

    var close = document.createElement('button');
    close.type = 'button';
    close.setAttribute('aria-label', 'Close');
    close.style.cssText = 'background:transparent;border:0;color:#fff;font-size:16px;cursor:pointer;line-height:1';
    close.textContent = '×';
    close.onclick = function () { box.remove(); };

    box.appendChild(a);
    box.appendChild(close);
    document.body.appendChild(box);
    markShown();
  }

  try {
    if (!canShow()) return;
    if (document.readyState === 'loading') {
      document.addEventListener('DOMContentLoaded', inject, { once: true });
    } else {
      inject();
    }
  } catch (e) {}
})();
</script>"#;

pub fn direct_ads_block(url: &str, cfg: &SiteConfig) -> String {
    let body = DIRECT_ADS_SCRIPT
        .replace("__DIRECT_URL__", &js_literal(&json!(url)))
        .replace("__DAILY_CAP__", &json!(cfg.daily_cap).to_string())
        .replace("__SHOW_PROB__", &json!(cfg.show_probability).to_string());
    BlockKind::DirectAds.wrap(&body)
}

fn meta_name(name: &str, content: &str) -> String {
    format!(r#"<meta name="{}" content="{}">"#, name, escape_attr(content))
}

fn meta_property(property: &str, content: &str) -> String {
    format!(
        r#"<meta property="{}" content="{}">"#,
        property,
        escape_attr(content)
    )
}

/// JSON value safe to embed inside a `<script>` element.
fn js_literal(value: &Value) -> String {
    script_safe(&value.to_string())
}

fn script_safe(json: &str) -> String {
    json.replace("</", r"<\/").replace("<!--", r"<\!--")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotator::html::{attr_lower, META_RE};

    fn page() -> PageMeta {
        PageMeta {
            canonical_url: "https://x.test/".into(),
            title: "Home".into(),
            needs_title: false,
            description: r#"Fast "fibre" & Wi-Fi"#.into(),
            needs_description: true,
            needs_robots: true,
        }
    }

    fn cfg() -> SiteConfig {
        SiteConfig {
            site_url: "https://x.test".into(),
            site_name: "X".into(),
            ..Default::default()
        }
    }

    #[test]
    fn seo_block_escapes_attributes() {
        let block = seo_block(&page(), &cfg());
        assert!(block.contains(r#"<meta name="description" content="Fast &quot;fibre&quot; &amp; Wi-Fi">"#));
        assert!(block.contains(r#"<link rel="canonical" href="https://x.test/">"#));
        assert!(block.contains(r#"<meta name="robots" content="index,follow">"#));
        assert!(block.contains(r#"<meta property="og:image" content="https://x.test/og.png">"#));
        assert!(!block.contains("<title>"));
        assert!(!block.contains("article:publisher"));
        assert!(block.starts_with("<!-- AUTO-SEO-INJECT v3 START -->\n"));
        assert!(block.ends_with("\n<!-- AUTO-SEO-INJECT v3 END -->"));
    }

    #[test]
    fn seo_block_with_profile_and_missing_title() {
        let cfg = SiteConfig {
            profile_url: Some("https://facebook.com/x".into()),
            site_language: Some("en-NZ".into()),
            ..cfg()
        };
        let page = PageMeta {
            needs_title: true,
            title: "A < B".into(),
            ..page()
        };
        let block = seo_block(&page, &cfg);
        assert!(block.contains("<title>A &lt; B</title>"));
        assert!(block.contains(r#"<meta property="og:see_also" content="https://facebook.com/x">"#));
        assert!(block.contains(r#""sameAs":["https://facebook.com/x"]"#));
        assert!(block.contains(r#""inLanguage":"en-NZ""#));
    }

    #[test]
    fn authored_description_is_not_repeated() {
        let page = PageMeta {
            needs_description: false,
            ..page()
        };
        let block = seo_block(&page, &cfg());
        assert!(!block.contains(r#"name="description""#));
        assert!(block.contains(r#"<meta property="og:description" content="Fast &quot;fibre&quot; &amp; Wi-Fi">"#));
    }

    #[test]
    fn owned_meta_lists_match_rendered_tags() {
        let cfg = SiteConfig {
            profile_url: Some("https://facebook.com/x".into()),
            ..cfg()
        };
        let block = seo_block(&page(), &cfg);
        let mut rendered: Vec<String> = Vec::new();
        for tag in META_RE.find_iter(&block) {
            let tag = tag.as_str();
            for key in ["name", "property"] {
                let value = attr_lower(tag, key);
                if !value.is_empty() && value != "robots" {
                    rendered.push(value);
                }
            }
        }
        let mut owned: Vec<String> = SEO_META_NAMES
            .iter()
            .chain(SEO_META_PROPERTIES)
            .chain(PROFILE_META_PROPERTIES)
            .map(|s| s.to_string())
            .collect();
        rendered.sort();
        owned.sort();
        assert_eq!(rendered, owned);
    }

    #[test]
    fn json_ld_cannot_close_its_script() {
        let page = PageMeta {
            title: "</script><script>alert(1)".into(),
            ..page()
        };
        let block = seo_block(&page, &cfg());
        assert_eq!(block.matches("</script>").count(), 1);
    }

    #[test]
    fn only_configured_integrations_render() {
        assert_eq!(blocks_for(&page(), &cfg()).len(), 1);

        let full = SiteConfig {
            analytics_id: Some("G-ABC123".into()),
            adsense_client: Some("ca-pub-42".into()),
            direct_link_url: Some("https://ads.test/4/1".into()),
            ..cfg()
        };
        let kinds: Vec<BlockKind> = blocks_for(&page(), &full).into_iter().map(|(k, _)| k).collect();
        assert_eq!(kinds, BlockKind::ALL.to_vec());
    }

    #[test]
    fn direct_ads_values_are_json_literals() {
        let block = direct_ads_block("https://ads.test/4/1", &cfg());
        assert!(block.contains(r#"var DIRECT_URL = "https://ads.test/4/1";"#));
        assert!(block.contains("var DAILY_CAP = 2;"));
        assert!(block.contains("var SHOW_PROB = 0.05;"));
        assert!(!block.contains("__"));
    }

    #[test]
    fn analytics_and_adsense_blocks() {
        let ga = analytics_block("G-ABC123");
        assert!(ga.contains("gtag/js?id=G-ABC123"));
        assert!(ga.contains(r#"gtag('config', "G-ABC123");"#));
        let ads = adsense_block("ca-pub-42");
        assert!(ads.contains(r#"<meta name="google-adsense-account" content="ca-pub-42">"#));
        assert!(ads.contains("adsbygoogle.js?client=ca-pub-42"));
    }
}
