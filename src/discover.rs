use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::settings::SiteConfig;

/// What a run may do to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    /// Never read, never written.
    Skip,
    /// Shared fragment (nav, footer): cleaned but never annotated.
    StripOnly,
    Process,
}

impl Class {
    pub fn label(self) -> &'static str {
        match self {
            Class::Skip => "skip",
            Class::StripOnly => "strip-only",
            Class::Process => "process",
        }
    }
}

/// Path predicates deciding which documents a run touches.
#[derive(Debug, Clone)]
pub struct ExclusionRules {
    excluded_dirs: Vec<String>,
    never_touch: Vec<String>,
    partials: Vec<String>,
}

impl ExclusionRules {
    pub fn from_config(cfg: &SiteConfig) -> Self {
        let lower = |v: &[String]| v.iter().map(|s| s.to_lowercase()).collect::<Vec<_>>();
        Self {
            excluded_dirs: lower(&cfg.exclude_dirs),
            never_touch: lower(&cfg.skip_paths),
            partials: lower(&cfg.partials),
        }
    }

    fn is_excluded_dir(&self, name: &str) -> bool {
        name.starts_with('.') || self.excluded_dirs.contains(&name.to_lowercase())
    }

    /// Classify a path relative to the site root (forward or back slashes).
    pub fn classify(&self, rel: &str) -> Class {
        let rel = normalize_rel(rel);
        let lower = rel.to_lowercase();
        let mut segments: Vec<&str> = rel.split('/').filter(|s| !s.is_empty()).collect();
        let Some(file_name) = segments.pop() else {
            return Class::Skip;
        };

        if !file_name.to_lowercase().ends_with(".html") {
            return Class::Skip;
        }
        if segments.iter().any(|dir| self.is_excluded_dir(dir)) {
            return Class::Skip;
        }
        if self.never_touch.contains(&lower) {
            return Class::Skip;
        }
        if file_name.starts_with('_') || self.partials.contains(&lower) {
            return Class::StripOnly;
        }
        Class::Process
    }
}

/// Collect every `.html` file under `root`, pruning excluded directories.
///
/// The list is sorted so repeated runs touch files in the same order.
pub fn discover_documents(root: &Path, rules: &ExclusionRules) -> Vec<PathBuf> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| keep_entry(entry, rules));

    let mut docs = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let is_html = entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.to_lowercase().ends_with(".html"));
        if is_html {
            docs.push(entry.into_path());
        }
    }

    docs.sort();
    debug!("Discovered {} HTML documents under {}", docs.len(), root.display());
    docs
}

fn keep_entry(entry: &DirEntry, rules: &ExclusionRules) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return true;
    }
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| !rules.is_excluded_dir(name))
}

/// Relative path from the root using forward slashes.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    normalize_rel(&rel.to_string_lossy())
}

fn normalize_rel(rel: &str) -> String {
    rel.replace('\\', "/")
        .trim_start_matches("./")
        .trim_start_matches('/')
        .to_string()
}
