//! Client-side template files compiled into inline script source.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// How template sources inside script packages are recognised and wrapped.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct JstSettings {
  /// Extension marking a source as a template, including the dot.
  pub template_ext: String,
  /// Global object the compiled templates are attached to.
  pub template_namespace: String,
  /// Function each template string is passed through.
  pub template_func: String,
}

impl Default for JstSettings {
  fn default() -> Self {
    Self {
      template_ext: ".jst".into(),
      template_namespace: "window.JST".into(),
      template_func: "template".into(),
    }
  }
}

impl JstSettings {
  /// Whether `path` is a template rather than a script.
  pub fn is_template(&self, path: &str) -> bool {
    !self.template_ext.is_empty() && path.ends_with(&self.template_ext)
  }

  /// Name a template is registered under: its path below the common directory of all
  /// templates, without extension, with `/` replaced by `_`.
  pub fn template_name(&self, path: &str, base: &str) -> String {
    let relative = path
      .strip_prefix(base)
      .map_or(path, |rest| rest.trim_start_matches('/'));
    let relative = relative
      .strip_suffix(&self.template_ext)
      .unwrap_or(relative);
    relative.replace('/', "_")
  }

  /// Compile the template files at `paths` (relative to `root`) into one script.
  pub fn compile(&self, root: &Path, paths: &[String]) -> Result<Option<String>, RenderError> {
    if paths.is_empty() {
      return Ok(None);
    }

    let base = common_directory(paths);
    let namespace = &self.template_namespace;
    let mut lines = vec![format!("{namespace} = {namespace} || {{}};")];

    for path in paths {
      let file = root.join(path);
      let contents = fs::read_to_string(&file).map_err(|source| RenderError::Io {
        path: file.clone(),
        source,
      })?;
      let name = serde_json::to_string(&self.template_name(path, &base)).map_err(|err| {
        RenderError::Compile {
          path: path.clone(),
          message: err.to_string(),
        }
      })?;
      let body = serde_json::to_string(&contents).map_err(|err| RenderError::Compile {
        path: path.clone(),
        message: err.to_string(),
      })?;
      let body = body.replace("</", "<\\/");
      lines.push(format!("{namespace}[{name}] = {}({body});", self.template_func));
    }

    Ok(Some(lines.join("\n")))
  }
}

/// Longest directory prefix shared by every path, without a trailing slash.
fn common_directory(paths: &[String]) -> String {
  let mut directories = paths.iter().map(|path| {
    let mut segments: Vec<&str> = path.split('/').collect();
    segments.pop();
    segments
  });

  let Some(mut common) = directories.next() else {
    return String::new();
  };

  for segments in directories {
    let shared = common
      .iter()
      .zip(&segments)
      .take_while(|(left, right)| left == right)
      .count();
    common.truncate(shared);
  }

  common.join("/")
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use tempfile::tempdir;

  #[test]
  fn finds_common_directory() {
    let paths = vec![
      "templates/photo/detail.jst".to_string(),
      "templates/photo/edit.jst".to_string(),
      "templates/video.jst".to_string(),
    ];
    assert_eq!(common_directory(&paths), "templates");
    assert_eq!(common_directory(&["a.jst".to_string()]), "");
  }

  #[test]
  fn names_templates_relative_to_base() {
    let settings = JstSettings::default();
    assert_eq!(
      settings.template_name("templates/photo/detail.jst", "templates"),
      "photo_detail"
    );
    assert_eq!(settings.template_name("video.jst", ""), "video");
  }

  #[test]
  fn compiles_templates_into_namespace() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("templates/photo")).unwrap();
    fs::write(dir.path().join("templates/photo/detail.jst"), "<b>\"<%= title %>\"</b>\n").unwrap();
    fs::write(dir.path().join("templates/list.jst"), "<ul></ul>").unwrap();

    let settings = JstSettings::default();
    let source = settings
      .compile(dir.path(), &[
        "templates/photo/detail.jst".to_string(),
        "templates/list.jst".to_string(),
      ])
      .unwrap()
      .unwrap();

    assert_eq!(
      source,
      concat!(
        "window.JST = window.JST || {};\n",
        "window.JST[\"photo_detail\"] = template(\"<b>\\\"<%= title %>\\\"<\\\\/b>\\n\");\n",
        "window.JST[\"list\"] = template(\"<ul></ul>\");"
      )
    );
  }

  #[test]
  fn closing_tags_cannot_end_the_inline_script() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("snippet.jst"), "<script>x()</script>").unwrap();

    let source = JstSettings::default()
      .compile(dir.path(), &["snippet.jst".to_string()])
      .unwrap()
      .unwrap();

    assert!(!source.contains("</script>"));
    assert!(source.ends_with("template(\"<script>x()<\\/script>\");"));
  }

  #[test]
  fn empty_template_lists_compile_to_nothing() {
    let settings = JstSettings::default();
    assert!(settings.compile(Path::new("."), &[]).unwrap().is_none());
  }
}
