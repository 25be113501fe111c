//! Mapping storage-relative asset paths onto servable URLs.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::RenderError;

fn absolute_url_patterns() -> &'static [Regex] {
  static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
  PATTERNS
    .get_or_init(|| {
      vec![
        Regex::new(r"(?i)^[a-z][a-z0-9+.\-]*://").expect("invalid scheme regex"),
        Regex::new(r"^//").expect("invalid protocol-relative regex"),
      ]
    })
    .as_slice()
}

/// Whether `path` is already an absolute URL: scheme-prefixed or protocol-relative.
pub fn path_is_url(path: &str) -> bool {
  absolute_url_patterns()
    .iter()
    .any(|pattern| pattern.is_match(path))
}

/// Storage service turning relative paths into URLs.
pub trait UrlResolver {
  /// URL under which `path` is served.
  fn url(&self, path: &str) -> Result<String, RenderError>;
}

/// Resolve `path`, passing absolute URLs through untouched.
pub fn resolve_url<R: UrlResolver + ?Sized>(resolver: &R, path: &str) -> Result<String, RenderError> {
  if path_is_url(path) {
    return Ok(path.to_string());
  }
  resolver.url(path)
}

/// Resolver serving everything below a fixed URL prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticUrlResolver {
  base_url: String,
}

impl StaticUrlResolver {
  /// Serve paths below `base_url`, e.g. `/static/` or `https://cdn.example.com/assets`.
  pub fn new(base_url: impl Into<String>) -> Self {
    Self {
      base_url: base_url.into(),
    }
  }
}

impl Default for StaticUrlResolver {
  fn default() -> Self {
    Self::new("/static/")
  }
}

impl UrlResolver for StaticUrlResolver {
  fn url(&self, path: &str) -> Result<String, RenderError> {
    let relative = path.replace('\\', "/");
    let relative = relative.trim_start_matches('/');
    if relative.is_empty() {
      return Err(RenderError::Url(path.to_string()));
    }

    Ok(format!("{}/{}", self.base_url.trim_end_matches('/'), relative))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn detects_absolute_urls() {
    assert!(path_is_url("https://cdn.example.com/app.js"));
    assert!(path_is_url("HTTP://example.com/a.css"));
    assert!(path_is_url("//cdn.example.com/app.js"));
    assert!(!path_is_url("js/app.js"));
    assert!(!path_is_url("/static/js/app.js"));
  }

  #[test]
  fn passes_absolute_urls_through() {
    let resolver = StaticUrlResolver::new("/static/");
    let url = resolve_url(&resolver, "//cdn.example.com/app.js").unwrap();
    assert_eq!(url, "//cdn.example.com/app.js");
  }

  #[test]
  fn joins_relative_paths_onto_the_base() {
    let resolver = StaticUrlResolver::new("/static/");
    assert_eq!(resolve_url(&resolver, "css/a.css").unwrap(), "/static/css/a.css");
    assert_eq!(resolve_url(&resolver, "/css/a.css").unwrap(), "/static/css/a.css");

    let cdn = StaticUrlResolver::new("https://cdn.example.com/assets");
    assert_eq!(cdn.url("js\\app.js").unwrap(), "https://cdn.example.com/assets/js/app.js");
  }

  #[test]
  fn rejects_empty_paths() {
    let resolver = StaticUrlResolver::default();
    assert!(matches!(resolver.url("/"), Err(RenderError::Url(_))));
  }
}
