//! Named markup templates used to render asset fragments.
//!
//! Templates support a small syntax: `{{ var }}` (HTML-escaped),
//! `{{ var|safe }}` (verbatim) and non-nested `{% if var %}...{% endif %}` blocks.
//! Variables may use dotted paths into JSON objects.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::error::RenderError;
use crate::models::Context;

/// Default stylesheet template name.
pub const CSS_TEMPLATE: &str = "pipeline/css.html";
/// Default script template name.
pub const JS_TEMPLATE: &str = "pipeline/js.html";
/// Template used for inline script source.
pub const INLINE_JS_TEMPLATE: &str = "pipeline/inline_js.html";

const CSS_SOURCE: &str = r#"<link href="{{ url }}" rel="stylesheet" type="{{ type }}"{% if media %} media="{{ media }}"{% endif %}{% if title %} title="{{ title }}"{% endif %}{% if charset %} charset="{{ charset }}"{% endif %} />"#;

const JS_SOURCE: &str = r#"<script {% if async %}async {% endif %}{% if defer %}defer {% endif %}type="{{ type }}" src="{{ url }}" charset="utf-8"></script>"#;

const INLINE_JS_SOURCE: &str = r#"<script {% if async %}async {% endif %}{% if defer %}defer {% endif %}type="text/javascript" charset="utf-8">
  {{ source|safe }}
</script>"#;

/// Template engine used to turn a context into markup.
pub trait TemplateRenderer {
  /// Render the template called `name` with `context`.
  fn render(&self, name: &str, context: &Context) -> Result<String, RenderError>;
}

/// In-memory templates plus optional override directories searched first.
#[derive(Debug, Clone)]
pub struct TemplateLibrary {
  search_dirs: Vec<PathBuf>,
  templates: BTreeMap<String, String>,
}

impl Default for TemplateLibrary {
  fn default() -> Self {
    let mut templates = BTreeMap::new();
    templates.insert(CSS_TEMPLATE.to_string(), CSS_SOURCE.to_string());
    templates.insert(JS_TEMPLATE.to_string(), JS_SOURCE.to_string());
    templates.insert(INLINE_JS_TEMPLATE.to_string(), INLINE_JS_SOURCE.to_string());

    Self {
      search_dirs: Vec::new(),
      templates,
    }
  }
}

impl TemplateLibrary {
  /// Library holding only the built-in asset templates.
  pub fn new() -> Self {
    Self::default()
  }

  /// Search `dir` for template files before falling back to registered templates.
  pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.search_dirs.push(dir.into());
    self
  }

  /// Register or replace an in-memory template.
  pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
    self.templates.insert(name.into(), source.into());
  }

  fn load(&self, name: &str) -> Result<String, RenderError> {
    for dir in &self.search_dirs {
      let candidate = dir.join(name);
      if candidate.is_file() {
        return read_template(&candidate);
      }
    }

    self
      .templates
      .get(name)
      .cloned()
      .ok_or_else(|| RenderError::Template {
        name: name.to_string(),
        message: "template does not exist".into(),
      })
  }
}

impl TemplateRenderer for TemplateLibrary {
  fn render(&self, name: &str, context: &Context) -> Result<String, RenderError> {
    let source = self.load(name)?;
    render_source(&source, context).map_err(|message| RenderError::Template {
      name: name.to_string(),
      message,
    })
  }
}

fn read_template(path: &Path) -> Result<String, RenderError> {
  fs::read_to_string(path).map_err(|source| RenderError::Io {
    path: path.to_path_buf(),
    source,
  })
}

fn if_block_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r"(?s)\{%\s*if\s+([A-Za-z_][\w.]*)\s*%\}(.*?)\{%\s*endif\s*%\}")
      .expect("invalid if-block regex")
  })
}

fn variable_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][\w.]*)\s*(?:\|\s*(\w+)\s*)?\}\}")
      .expect("invalid variable regex")
  })
}

/// Render template `source` against `context`.
pub fn render_source(source: &str, context: &Context) -> Result<String, String> {
  let expanded = if_block_pattern().replace_all(source, |caps: &Captures<'_>| {
    if is_truthy(lookup(context, &caps[1])) {
      caps[2].to_string()
    } else {
      String::new()
    }
  });

  if let Some(offset) = expanded.find("{%") {
    return Err(format!("unsupported block tag at byte {offset}"));
  }

  let mut output = String::with_capacity(expanded.len());
  let mut last = 0;
  for caps in variable_pattern().captures_iter(&expanded) {
    let Some(whole) = caps.get(0) else {
      continue;
    };
    output.push_str(&expanded[last..whole.start()]);

    let value = display_value(lookup(context, &caps[1]));
    match caps.get(2).map(|filter| filter.as_str()) {
      None => output.push_str(&escape_html(&value)),
      Some("safe") => output.push_str(&value),
      Some(other) => return Err(format!("unknown filter {other:?}")),
    }
    last = whole.end();
  }
  output.push_str(&expanded[last..]);

  Ok(output)
}

/// Resolve a dotted variable path against `context`.
pub fn lookup<'a>(context: &'a Context, path: &str) -> Option<&'a serde_json::Value> {
  let mut segments = path.split('.');
  let first = segments.next()?;
  let mut current = context.get(first)?;

  for segment in segments {
    current = match current {
      serde_json::Value::Object(map) => map.get(segment)?,
      serde_json::Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
      _ => return None,
    };
  }

  Some(current)
}

fn is_truthy(value: Option<&serde_json::Value>) -> bool {
  match value {
    None | Some(serde_json::Value::Null) => false,
    Some(serde_json::Value::Bool(flag)) => *flag,
    Some(serde_json::Value::String(text)) => !text.is_empty(),
    Some(serde_json::Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
    Some(serde_json::Value::Array(items)) => !items.is_empty(),
    Some(serde_json::Value::Object(map)) => !map.is_empty(),
  }
}

/// Plain-text form of a context value as it appears in markup.
pub fn display_value(value: Option<&serde_json::Value>) -> String {
  match value {
    None | Some(serde_json::Value::Null) => String::new(),
    Some(serde_json::Value::String(text)) => text.clone(),
    Some(other) => other.to_string(),
  }
}

fn escape_html(value: &str) -> String {
  let mut escaped = String::with_capacity(value.len());
  for ch in value.chars() {
    match ch {
      '&' => escaped.push_str("&amp;"),
      '<' => escaped.push_str("&lt;"),
      '>' => escaped.push_str("&gt;"),
      '"' => escaped.push_str("&quot;"),
      '\'' => escaped.push_str("&#x27;"),
      _ => escaped.push(ch),
    }
  }
  escaped
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use serde_json::json;
  use tempfile::tempdir;

  fn context(pairs: &[(&str, serde_json::Value)]) -> Context {
    pairs
      .iter()
      .map(|(key, value)| ((*key).to_string(), value.clone()))
      .collect()
  }

  #[test]
  fn renders_default_css_template() {
    let library = TemplateLibrary::new();
    let html = library
      .render(CSS_TEMPLATE, &context(&[
        ("url", json!("/static/a.css")),
        ("type", json!("text/css")),
        ("media", json!("print")),
      ]))
      .unwrap();

    assert_eq!(
      html,
      r#"<link href="/static/a.css" rel="stylesheet" type="text/css" media="print" />"#
    );
  }

  #[test]
  fn renders_js_template_with_flags() {
    let library = TemplateLibrary::new();
    let html = library
      .render(JS_TEMPLATE, &context(&[
        ("url", json!("/static/a.js")),
        ("type", json!("text/javascript")),
        ("defer", json!(true)),
        ("async", json!(false)),
      ]))
      .unwrap();

    assert_eq!(
      html,
      r#"<script defer type="text/javascript" src="/static/a.js" charset="utf-8"></script>"#
    );
  }

  #[test]
  fn inline_source_is_not_escaped() {
    let library = TemplateLibrary::new();
    let html = library
      .render(INLINE_JS_TEMPLATE, &context(&[("source", json!("if (a < b) {}"))]))
      .unwrap();

    assert_eq!(
      html,
      "<script type=\"text/javascript\" charset=\"utf-8\">\n  if (a < b) {}\n</script>"
    );
  }

  #[test]
  fn escapes_plain_variables() {
    let rendered = render_source("{{ v }}", &context(&[("v", json!("<\"x\">"))])).unwrap();
    assert_eq!(rendered, "&lt;&quot;x&quot;&gt;");
  }

  #[test]
  fn resolves_dotted_paths() {
    let ctx = context(&[("site", json!({"cdn": {"host": "cdn.example.com"}}))]);
    assert_eq!(render_source("{{ site.cdn.host }}", &ctx).unwrap(), "cdn.example.com");
    assert_eq!(render_source("[{{ site.missing }}]", &ctx).unwrap(), "[]");
  }

  #[test]
  fn rejects_unknown_filters_and_blocks() {
    assert!(render_source("{{ v|upper }}", &Context::new()).is_err());
    assert!(render_source("{% for x in y %}{% endfor %}", &Context::new()).is_err());
  }

  #[test]
  fn unknown_templates_are_errors() {
    let err = TemplateLibrary::new()
      .render("missing.html", &Context::new())
      .unwrap_err();
    assert!(matches!(err, RenderError::Template { .. }));
  }

  #[test]
  fn search_dirs_override_builtins() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("pipeline")).unwrap();
    fs::write(dir.path().join(CSS_TEMPLATE), "<css {{ url }}>").unwrap();

    let library = TemplateLibrary::new().with_search_dir(dir.path());
    let html = library
      .render(CSS_TEMPLATE, &context(&[("url", json!("a.css"))]))
      .unwrap();
    assert_eq!(html, "<css a.css>");
  }
}
