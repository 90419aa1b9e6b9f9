pub mod derive;
pub mod html;
pub mod legacy;
pub mod markers;
pub mod render;

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::discover::{Class, ExclusionRules};
use crate::error::{AnnotateError, Result};
use crate::settings::SiteConfig;
use markers::Anchor;
use render::PageMeta;

/// Result of processing one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Skipped,
    Unchanged,
    Written,
    /// Would have been written, but the run is a dry run.
    WouldWrite,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Treat every document as a partial: clean, never annotate.
    pub strip_all: bool,
    pub dry_run: bool,
}

/// Read, transform and (when changed) write back one document.
pub fn process_document(
    path: &Path,
    rel: &str,
    cfg: &SiteConfig,
    rules: &ExclusionRules,
    opts: RunOptions,
) -> Result<Outcome> {
    let class = match rules.classify(rel) {
        Class::Process if opts.strip_all => Class::StripOnly,
        other => other,
    };
    if class == Class::Skip {
        return Ok(Outcome::Skipped);
    }

    let original = fs::read_to_string(path).map_err(|source| AnnotateError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let updated = annotate(&original, rel, class, cfg);

    if updated == original {
        return Ok(Outcome::Unchanged);
    }
    if opts.dry_run {
        return Ok(Outcome::WouldWrite);
    }
    fs::write(path, updated).map_err(|source| AnnotateError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Outcome::Written)
}

/// Pure text transformation for a document of the given class.
pub fn annotate(text: &str, rel: &str, class: Class, cfg: &SiteConfig) -> String {
    match class {
        Class::Skip => text.to_string(),
        Class::StripOnly => legacy::strip_legacy_and_marked_content(text),
        Class::Process => annotate_page(text, rel, cfg),
    }
}

fn annotate_page(text: &str, rel: &str, cfg: &SiteConfig) -> String {
    // Read before stripping: a description synthesized into the SEO block by
    // an earlier run must survive the next run.
    let previous_description = derive::find_meta_description(text);

    let mut doc = legacy::strip_legacy_and_marked_content(text);
    let has_head = Anchor::HeadClose.is_present(&doc);
    if has_head {
        doc = legacy::strip_owned_tags(&doc, cfg);
    } else {
        debug!("{}: no </head>, head blocks skipped", rel);
    }
    let authored_description = derive::find_meta_description(html::head_of(&doc));

    let title = derive::derive_title(&doc, &cfg.site_name);
    let page = PageMeta {
        canonical_url: derive::canonical_url(rel, &cfg.site_url),
        needs_title: !title.from_document,
        title: title.text,
        description: derive::derive_description(
            authored_description.or(previous_description).as_deref(),
            &doc,
            cfg,
        ),
        needs_description: !derive::has_meta_named(html::head_of(&doc), "description"),
        needs_robots: !derive::has_meta_named(&doc, "robots"),
    };

    for (kind, block) in render::blocks_for(&page, cfg) {
        if !kind.anchor().is_present(&doc) {
            debug!("{}: no anchor for {}", rel, kind.marker_name());
            continue;
        }
        doc = markers::insert_block(&doc, kind, &block);
    }
    doc
}
