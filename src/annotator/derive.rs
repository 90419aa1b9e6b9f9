use std::sync::LazyLock;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;

use super::html::{attr, attr_lower, body_of, collapse_ws, head_of, strip_tags, META_RE};
use crate::settings::SiteConfig;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").unwrap());
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h([1-6])\b[^>]*>(.*?)</h[1-6]\s*>").unwrap());
static PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p\s*>").unwrap());
static LEAD_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<([a-z][a-z0-9]*)\b[^>]*\bclass\s*=\s*["'][^"']*\blead\b[^"']*["'][^>]*>"#)
        .unwrap()
});

const SENTENCE_END: [char; 3] = ['.', '!', '?'];

/// Characters escaped inside a URL path segment; non-ASCII is always encoded.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Title {
    pub text: String,
    /// The document already has a non-empty `<title>`.
    pub from_document: bool,
}

/// Absolute URL a document should be indexed under.
///
/// `index.html` maps to its directory with a trailing slash; anything else is
/// appended to the base. Segments are percent-encoded, empty ones dropped.
pub fn canonical_url(rel: &str, site_url: &str) -> String {
    let base = site_url.trim_end_matches('/');
    let rel = rel.replace('\\', "/");
    let mut segments: Vec<&str> = rel.split('/').filter(|s| !s.is_empty()).collect();
    let is_index = segments.last() == Some(&"index.html");
    if is_index {
        segments.pop();
    }

    let mut path: String = segments
        .iter()
        .map(|s| format!("/{}", utf8_percent_encode(s, PATH_SEGMENT)))
        .collect();
    if is_index || path.is_empty() {
        path.push('/');
    }
    format!("{base}{path}")
}

pub fn derive_title(text: &str, site_name: &str) -> Title {
    let existing = TITLE_RE
        .captures_iter(head_of(text))
        .map(|c| strip_tags(&c[1]))
        .find(|t| !t.is_empty());
    if let Some(text) = existing {
        return Title {
            text,
            from_document: true,
        };
    }

    let text = match first_heading(body_of(text)) {
        Some(h) if h == site_name => h,
        Some(h) => format!("{h} | {site_name}"),
        None => site_name.to_string(),
    };
    Title {
        text,
        from_document: false,
    }
}

/// First `<meta name="description">` content in document order, entity-decoded.
pub fn find_meta_description(text: &str) -> Option<String> {
    META_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .find(|tag| attr_lower(tag, "name") == "description")
        .and_then(|tag| attr(tag, "content"))
        .map(|c| collapse_ws(&c))
        .filter(|c| !c.is_empty())
}

/// Whether any `<meta>` in `text` carries `name` (case-insensitive).
pub fn has_meta_named(text: &str, name: &str) -> bool {
    META_RE
        .find_iter(text)
        .any(|m| attr_lower(m.as_str(), "name") == name)
}

/// Page description: an existing one clamped to the window maximum, or text
/// synthesized from the page, or the site default when the page is too thin.
pub fn derive_description(existing: Option<&str>, text: &str, cfg: &SiteConfig) -> String {
    let (min, max) = (cfg.description_min_len, cfg.description_max_len);
    let fallback = || {
        let default = fit_to_window(&collapse_ws(cfg.default_description()), min, max);
        if default.is_empty() {
            cfg.site_name.clone()
        } else {
            default
        }
    };

    if let Some(existing) = existing.map(collapse_ws).filter(|e| !e.is_empty()) {
        return fit_to_window(&existing, min, max);
    }

    let synthesized = accumulate(&content_sources(text), min);
    if synthesized.chars().count() < min {
        return fallback();
    }
    fit_to_window(&synthesized, min, max)
}

/// Candidate description text in priority order: lead, paragraphs, heading.
fn content_sources(text: &str) -> Vec<String> {
    let body = body_of(text);
    let mut sources = Vec::new();
    if let Some(lead) = lead_text(body) {
        sources.push(lead);
    }
    for caps in PARAGRAPH_RE.captures_iter(body) {
        let p = strip_tags(&caps[1]);
        if !p.is_empty() && !sources.contains(&p) {
            sources.push(p);
        }
    }
    if let Some(h) = first_heading(body) {
        if !sources.contains(&h) {
            sources.push(h);
        }
    }
    sources
}

fn accumulate(sources: &[String], min: usize) -> String {
    let mut acc = String::new();
    for source in sources {
        if acc.chars().count() >= min {
            break;
        }
        if !acc.is_empty() {
            if !acc.ends_with(SENTENCE_END) {
                acc.push('.');
            }
            acc.push(' ');
        }
        acc.push_str(source);
    }
    acc
}

/// Cut `s` to at most `max` chars, preferring a sentence end at or past `min`.
fn fit_to_window(s: &str, min: usize, max: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max {
        return s.to_string();
    }

    let sentence_cut = (min.max(1)..=max).rev().find(|&end| {
        SENTENCE_END.contains(&chars[end - 1]) && chars.get(end).map_or(true, |c| c.is_whitespace())
    });
    if let Some(end) = sentence_cut {
        return chars[..end].iter().collect();
    }

    let mut cut: String = chars[..max - 1].iter().collect();
    let trimmed = cut.trim_end().len();
    if cut[..trimmed].chars().count() + 1 >= min {
        cut.truncate(trimmed);
    }
    cut.push('…');
    cut
}

fn first_heading(body: &str) -> Option<String> {
    let headings: Vec<(u8, String)> = HEADING_RE
        .captures_iter(body)
        .filter_map(|c| {
            let level = c[1].parse::<u8>().ok()?;
            let text = strip_tags(&c[2]);
            (!text.is_empty()).then_some((level, text))
        })
        .collect();
    headings
        .iter()
        .find(|(level, _)| *level == 1)
        .or_else(|| headings.first())
        .map(|(_, text)| text.clone())
}

fn lead_text(body: &str) -> Option<String> {
    let caps = LEAD_OPEN_RE.captures(body)?;
    let open = caps.get(0)?;
    let close = format!("</{}", caps[1].to_ascii_lowercase());
    let rest = &body[open.end()..];
    let end = rest.to_ascii_lowercase().find(&close)?;
    Some(strip_tags(&rest[..end])).filter(|t| !t.is_empty())
}
