//! Marked blocks: tool-owned regions delimited by an HTML comment pair.
//!
//! Removal recognizes every marker generation the tool has written
//! (`<!-- NAME -->`, `<!-- NAME START -->`, `<!-- NAME vN START -->`,
//! `<!-- NAME vN --> ... <!-- /NAME -->`); insertion only ever writes the
//! current `v3` pair. Insertion adds exactly one newline on each side of the
//! block and removal takes exactly those newlines back, so strip-then-insert
//! reproduces the previous output byte for byte.
//!
//! An end marker closes the nearest start marker before it. Markers left
//! without a partner are dropped on their own, the text around them is kept.

use std::sync::LazyLock;

use regex::{Captures, Regex};

pub const MARKER_VERSION: &str = "v3";

static HEAD_ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</head\s*>").unwrap());
static BODY_ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</body\s*>").unwrap());

static MARKER_RES: LazyLock<Vec<(BlockKind, MarkerPatterns)>> = LazyLock::new(|| {
    BlockKind::ALL
        .iter()
        .map(|kind| (*kind, MarkerPatterns::new(kind.marker_name())))
        .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Seo,
    Analytics,
    AdSense,
    DirectAds,
}

/// Where a block kind is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Immediately before the first `</head>`.
    HeadClose,
    /// Immediately before the first `</body>`.
    BodyClose,
}

impl BlockKind {
    /// Insertion order; head blocks keep this order inside `<head>`.
    pub const ALL: [BlockKind; 4] = [
        BlockKind::Seo,
        BlockKind::Analytics,
        BlockKind::AdSense,
        BlockKind::DirectAds,
    ];

    pub fn marker_name(self) -> &'static str {
        match self {
            BlockKind::Seo => "AUTO-SEO-INJECT",
            BlockKind::Analytics => "AUTO-ANALYTICS-INJECT",
            BlockKind::AdSense => "AUTO-ADSENSE-INJECT",
            BlockKind::DirectAds => "AUTO-ADS-INJECT",
        }
    }

    pub fn anchor(self) -> Anchor {
        match self {
            BlockKind::DirectAds => Anchor::BodyClose,
            _ => Anchor::HeadClose,
        }
    }

    pub fn start_marker(self) -> String {
        format!("<!-- {} {} START -->", self.marker_name(), MARKER_VERSION)
    }

    pub fn end_marker(self) -> String {
        format!("<!-- {} {} END -->", self.marker_name(), MARKER_VERSION)
    }

    /// Surround rendered content with the current marker pair.
    pub fn wrap(self, content: &str) -> String {
        format!(
            "{}\n{}\n{}",
            self.start_marker(),
            content.trim_matches('\n'),
            self.end_marker()
        )
    }
}

impl Anchor {
    fn regex(self) -> &'static Regex {
        match self {
            Anchor::HeadClose => &HEAD_ANCHOR_RE,
            Anchor::BodyClose => &BODY_ANCHOR_RE,
        }
    }

    pub fn is_present(self, text: &str) -> bool {
        self.regex().is_match(text)
    }
}

struct MarkerPatterns {
    start: Regex,
    end: Regex,
    /// Either marker on its own, with its indentation and line break.
    lone: Regex,
}

impl MarkerPatterns {
    fn new(name: &str) -> Self {
        let name = regex::escape(name);
        let start = format!(r"<!--\s*{name}(?:\s+v\d+)?(?:\s+START)?\s*-->");
        let end = format!(r"<!--\s*(?:/\s*{name}(?:\s+v\d+)?|{name}(?:\s+v\d+)?\s+END)\s*-->");
        Self {
            start: Regex::new(&format!("(?i){start}")).unwrap(),
            end: Regex::new(&format!("(?i){end}")).unwrap(),
            lone: Regex::new(&format!(r"(?i)[ \t]*(?:{start}|{end})(?:[ \t]*\r?\n)?")).unwrap(),
        }
    }
}

/// Remove every block of `kind`, whatever marker version wrote it, then any
/// unpaired marker of that kind.
pub fn strip_kind(text: &str, kind: BlockKind) -> String {
    let Some((_, patterns)) = MARKER_RES.iter().find(|(k, _)| *k == kind) else {
        return text.to_string();
    };

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    while let Some(end) = patterns.end.find_at(text, cursor) {
        let between = &text[cursor..end.start()];
        match patterns.start.find_iter(between).last() {
            Some(start) => {
                out.push_str(trim_line_break(&between[..start.start()]));
                let rest = &text[end.end()..];
                let skip = if rest.starts_with("\r\n") {
                    2
                } else if rest.starts_with('\n') {
                    1
                } else {
                    0
                };
                cursor = end.end() + skip;
            }
            None => {
                out.push_str(&text[cursor..end.end()]);
                cursor = end.end();
            }
        }
    }
    out.push_str(&text[cursor..]);

    patterns.lone.replace_all(&out, "").into_owned()
}

fn trim_line_break(s: &str) -> &str {
    match s.strip_suffix('\n') {
        Some(s) => s.strip_suffix('\r').unwrap_or(s),
        None => s,
    }
}

/// Remove blocks of every kind.
pub fn strip_marked(text: &str) -> String {
    BlockKind::ALL
        .iter()
        .fold(text.to_string(), |acc, kind| strip_kind(&acc, *kind))
}

/// Insert a wrapped block before the kind's anchor. A document without the
/// anchor comes back unchanged.
pub fn insert_block(text: &str, kind: BlockKind, block: &str) -> String {
    kind.anchor()
        .regex()
        .replacen(text, 1, |caps: &Captures<'_>| format!("\n{}\n{}", block, &caps[0]))
        .into_owned()
}
