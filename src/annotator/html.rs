//! Regex-level HTML helpers. No DOM: every transformation in this crate is a
//! bounded search-and-replace over the raw document text.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Opening tag body that tolerates `>` inside quoted attribute values.
const TAG_BODY: &str = r#"(?:[^>"']|"[^"]*"|'[^']*')*"#;

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .unwrap()
});
static OPEN_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?s)^\s*<[A-Za-z][A-Za-z0-9]*\b{TAG_BODY}>")).unwrap());
static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static HEAD_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</head\s*>").unwrap());
static BODY_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<body\b").unwrap());

pub static META_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?is)[ \t]*<meta\b{TAG_BODY}>(?:[ \t]*\r?\n)?")).unwrap()
});
pub static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?is)[ \t]*<link\b{TAG_BODY}>(?:[ \t]*\r?\n)?")).unwrap()
});
pub static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?is)[ \t]*<script\b{TAG_BODY}>.*?</script\s*>(?:[ \t]*\r?\n)?"
    ))
    .unwrap()
});

/// Value of attribute `name` in a single tag, entity-decoded.
pub fn attr(tag: &str, name: &str) -> Option<String> {
    let open = OPEN_TAG_RE.find(tag).map_or(tag, |m| m.as_str());
    ATTR_RE
        .captures_iter(open)
        .find(|c| c[1].eq_ignore_ascii_case(name))
        .and_then(|c| c.get(2).or_else(|| c.get(3)).or_else(|| c.get(4)))
        .map(|m| decode_entities(m.as_str()))
}

/// Lower-cased attribute value, convenient for predicate checks.
pub fn attr_lower(tag: &str, name: &str) -> String {
    attr(tag, name).unwrap_or_default().to_lowercase()
}

pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    ENTITY_RE
        .replace_all(s, |caps: &Captures<'_>| {
            let ent = &caps[1];
            let decoded = if let Some(hex) = ent.strip_prefix("#x").or_else(|| ent.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = ent.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match ent {
                    "amp" => Some('&'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "nbsp" => Some(' '),
                    "ndash" => Some('–'),
                    "mdash" => Some('—'),
                    "hellip" => Some('…'),
                    "rsquo" => Some('’'),
                    "lsquo" => Some('‘'),
                    "rdquo" => Some('”'),
                    "ldquo" => Some('“'),
                    "copy" => Some('©'),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

pub fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub fn collapse_ws(s: &str) -> String {
    WS_RE.replace_all(s, " ").trim().to_string()
}

/// Visible text of an HTML fragment.
pub fn strip_tags(fragment: &str) -> String {
    let no_comments = COMMENT_RE.replace_all(fragment, " ");
    let no_tags = TAG_RE.replace_all(&no_comments, " ");
    collapse_ws(&decode_entities(&no_tags))
}

/// Text up to the first `</head>`, or the whole document when it has none.
pub fn head_of(text: &str) -> &str {
    HEAD_CLOSE_RE.find(text).map_or(text, |m| &text[..m.start()])
}

/// Text from the first `<body` on, or the whole document when it has none.
pub fn body_of(text: &str) -> &str {
    BODY_OPEN_RE.find(text).map_or(text, |m| &text[m.start()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attr_handles_quotes_and_order() {
        let tag = r#"<meta content='A "quoted" > value' NAME="Description">"#;
        assert_eq!(attr(tag, "name").as_deref(), Some("Description"));
        assert_eq!(attr(tag, "content").as_deref(), Some(r#"A "quoted" > value"#));
        assert_eq!(attr("<link rel=canonical href=/x>", "rel").as_deref(), Some("canonical"));
        assert_eq!(attr("<meta charset=\"utf-8\">", "name"), None);
    }

    #[test]
    fn meta_re_spans_quoted_gt() {
        let html = "<head>\n  <meta name=\"description\" content=\"a > b\">\n</head>";
        let m = META_RE.find(html).unwrap();
        assert_eq!(m.as_str(), "  <meta name=\"description\" content=\"a > b\">\n");
    }

    #[test]
    fn entities_round_trip_through_escape() {
        let raw = "Tom & Jerry's \"best\" <deal>";
        assert_eq!(decode_entities(&escape_attr(raw)), raw);
        assert_eq!(decode_entities("&amp;quot;"), "&quot;");
        assert_eq!(decode_entities("caf&#233; &#x2014; &bogus;"), "café — &bogus;");
    }

    #[test]
    fn strip_tags_collapses_markup() {
        assert_eq!(
            strip_tags("<b>Fast</b>\n   <!-- x --> fibre&nbsp;<a href=\"/\">today</a>"),
            "Fast fibre today"
        );
    }

    #[test]
    fn head_and_body_regions() {
        let html = "<html><HEAD><title>t</title></HEAD><body><p>x</p></body></html>";
        assert_eq!(head_of(html), "<html><HEAD><title>t</title>");
        assert!(body_of(html).starts_with("<body><p>"));
        assert_eq!(head_of("no head"), "no head");
    }
}
