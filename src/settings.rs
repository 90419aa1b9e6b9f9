//! Site configuration.
//!
//! Values come from the process environment (no prefix, so `SITE_URL` maps to
//! `site_url`), an optional TOML file and CLI overrides, in increasing
//! priority. The result is validated once and then passed by reference to
//! every transformation; nothing reads the environment after startup.

use std::path::PathBuf;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{AnnotateError, Result};

const LIST_KEYS: &[&str] = &["exclude_dirs", "skip_paths", "partials"];

/// Flags from the command line that win over every other source.
#[derive(Debug, Default)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub site_url: Option<String>,
    pub site_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub site_url: String,
    pub site_name: String,
    pub default_image: Option<String>,
    #[serde(alias = "site_desc")]
    pub site_description: Option<String>,
    /// External profile (Facebook page) linked from OG tags and JSON-LD.
    #[serde(alias = "facebook_url")]
    pub profile_url: Option<String>,
    pub site_language: Option<String>,
    /// GA4 measurement id.
    pub analytics_id: Option<String>,
    /// AdSense publisher id (`ca-pub-...`).
    #[serde(alias = "adsense_id")]
    pub adsense_client: Option<String>,
    pub direct_link_url: Option<String>,
    pub daily_cap: u32,
    #[serde(alias = "show_prob")]
    pub show_probability: f64,
    pub exclude_dirs: Vec<String>,
    pub skip_paths: Vec<String>,
    pub partials: Vec<String>,
    #[serde(alias = "desc_min_len")]
    pub description_min_len: usize,
    #[serde(alias = "desc_max_len")]
    pub description_max_len: usize,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_url: "https://example.com".into(),
            site_name: "My Site".into(),
            default_image: None,
            site_description: None,
            profile_url: None,
            site_language: None,
            analytics_id: None,
            adsense_client: None,
            direct_link_url: None,
            daily_cap: 2,
            show_probability: 0.05,
            exclude_dirs: [
                "node_modules",
                ".git",
                ".github",
                "beta",
                "backup",
                "backups",
                "dist",
                "build",
                "vendor",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            skip_paths: Vec::new(),
            partials: vec!["nav.html".into(), "footer.html".into(), "header.html".into()],
            description_min_len: 120,
            description_max_len: 160,
        }
    }
}

impl SiteConfig {
    /// Build the configuration from the real process environment.
    pub fn load(overrides: &Overrides) -> Result<Self> {
        Self::load_from(environment(), overrides)
    }

    fn load_from(env: Environment, overrides: &Overrides) -> Result<Self> {
        let mut builder = Config::builder().add_source(env);
        if let Some(path) = &overrides.config_file {
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }
        if let Some(url) = &overrides.site_url {
            builder = builder.set_override("site_url", url.as_str())?;
        }
        if let Some(name) = &overrides.site_name {
            builder = builder.set_override("site_name", name.as_str())?;
        }

        let raw: SiteConfig = builder.build()?.try_deserialize()?;
        raw.normalized()
    }

    /// Trim, drop empty values and validate.
    pub fn normalized(mut self) -> Result<Self> {
        self.site_url = self.site_url.trim().trim_end_matches('/').to_string();
        let host = self
            .site_url
            .strip_prefix("https://")
            .or_else(|| self.site_url.strip_prefix("http://"));
        if !host.is_some_and(|h| !h.is_empty()) {
            return Err(AnnotateError::InvalidConfig(format!(
                "site_url must be an absolute http(s) URL, got {:?}",
                self.site_url
            )));
        }

        self.site_name = self.site_name.trim().to_string();
        if self.site_name.is_empty() {
            self.site_name = Self::default().site_name;
        }

        for field in [
            &mut self.default_image,
            &mut self.site_description,
            &mut self.profile_url,
            &mut self.site_language,
            &mut self.analytics_id,
            &mut self.adsense_client,
            &mut self.direct_link_url,
        ] {
            *field = field
                .take()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }

        for list in [&mut self.exclude_dirs, &mut self.skip_paths, &mut self.partials] {
            list.retain(|s| !s.trim().is_empty());
            for item in list.iter_mut() {
                *item = item.trim().trim_start_matches('/').to_string();
            }
        }

        if self.description_max_len < 2 || self.description_min_len >= self.description_max_len {
            return Err(AnnotateError::InvalidConfig(format!(
                "description window {}..={} needs min below max",
                self.description_min_len, self.description_max_len
            )));
        }
        if !(0.0..=1.0).contains(&self.show_probability) {
            return Err(AnnotateError::InvalidConfig(format!(
                "show_probability must be within 0..=1, got {}",
                self.show_probability
            )));
        }

        Ok(self)
    }

    pub fn image_url(&self) -> String {
        self.default_image
            .clone()
            .unwrap_or_else(|| format!("{}/og.png", self.site_url))
    }

    pub fn default_description(&self) -> &str {
        self.site_description.as_deref().unwrap_or(&self.site_name)
    }
}

fn environment() -> Environment {
    LIST_KEYS
        .iter()
        .fold(
            Environment::default().try_parsing(true).list_separator(","),
            |env, key| env.with_list_parse_key(key),
        )
}
