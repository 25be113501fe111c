//! Data structures shared between the registry, the packager and the renderers.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Render context handed to templates: arbitrary JSON values keyed by variable name.
pub type Context = BTreeMap<String, serde_json::Value>;

/// The two kinds of asset package a page can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetType {
  /// Stylesheets, registered under `css`.
  Style,
  /// Scripts, registered under `js`.
  Script,
}

impl AssetType {
  /// MIME type used when the path extension says nothing useful.
  pub fn default_mime(self) -> &'static str {
    match self {
      Self::Style => "text/css",
      Self::Script => "text/javascript",
    }
  }

  /// Template rendered for each path unless the package overrides it.
  pub fn default_template(self) -> &'static str {
    match self {
      Self::Style => crate::templates::CSS_TEMPLATE,
      Self::Script => crate::templates::JS_TEMPLATE,
    }
  }

  /// Whether packages of this type may carry inline source.
  pub fn supports_inline(self) -> bool {
    matches!(self, Self::Script)
  }

  /// Short registry name, also used in messages.
  pub fn setting(self) -> &'static str {
    match self {
      Self::Style => "css",
      Self::Script => "js",
    }
  }
}

impl fmt::Display for AssetType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.setting())
  }
}

/// Whether pages reference pre-built bundles or the individual compiled sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
  /// Reference the single pre-built artifact per package.
  Bundled,
  /// Compile sources on demand and reference each output.
  Unbundled,
}

impl RenderMode {
  /// Map the configuration's `pipeline` flag onto a mode.
  pub fn from_flag(bundled: bool) -> Self {
    if bundled { Self::Bundled } else { Self::Unbundled }
  }
}

/// A named package as written in configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PackageDefinition {
  /// Ordered source paths or glob patterns, relative to the source root.
  pub source_filenames: Vec<String>,
  /// Path of the pre-built bundle. Defaults to the package name.
  pub output_filename: Option<String>,
  /// Template used instead of the type's default.
  pub template_name: Option<String>,
  /// Extra variables merged into every fragment's render context.
  pub extra_context: Context,
  /// Literal script source rendered inline after the file references.
  pub inline_source: Option<String>,
  /// Set when the definition wraps a bare, unregistered name.
  #[serde(skip)]
  pub ad_hoc: bool,
}

impl PackageDefinition {
  /// Wrap a bare asset path as a one-element package.
  pub fn singleton(name: &str) -> Self {
    Self {
      source_filenames: vec![name.to_string()],
      output_filename: Some(name.to_string()),
      ad_hoc: true,
      ..Self::default()
    }
  }
}

/// A package resolved for a single render call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedPackage {
  /// Bundle path referenced in bundled mode.
  pub output_filename: String,
  /// Expanded source paths, in order.
  pub paths: Vec<String>,
  /// Template override, if any.
  pub template_name: Option<String>,
  /// Variables merged into every fragment context.
  pub extra_context: Context,
  /// Script source rendered verbatim as a trailing fragment.
  pub inline_source: Option<String>,
}

impl ResolvedPackage {
  /// Template for per-path fragments of the given type.
  pub fn template_for(&self, asset_type: AssetType) -> &str {
    self
      .template_name
      .as_deref()
      .unwrap_or_else(|| asset_type.default_template())
  }

  /// A fresh copy of the extra context, so fragments never see each other's variables.
  pub fn context(&self) -> Context {
    self.extra_context.clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn asset_type_defaults() {
    assert_eq!(AssetType::Style.default_mime(), "text/css");
    assert_eq!(AssetType::Script.default_mime(), "text/javascript");
    assert!(AssetType::Script.supports_inline());
    assert!(!AssetType::Style.supports_inline());
  }

  #[test]
  fn singleton_wraps_bare_name() {
    let definition = PackageDefinition::singleton("js/app.js");
    assert_eq!(definition.source_filenames, vec!["js/app.js".to_string()]);
    assert_eq!(definition.output_filename.as_deref(), Some("js/app.js"));
    assert!(definition.ad_hoc);
  }

  #[test]
  fn template_override_wins() {
    let package = ResolvedPackage {
      template_name: Some("custom.html".into()),
      ..ResolvedPackage::default()
    };
    assert_eq!(package.template_for(AssetType::Style), "custom.html");
    assert_eq!(
      ResolvedPackage::default().template_for(AssetType::Script),
      crate::templates::JS_TEMPLATE
    );
  }

  #[test]
  fn definitions_deserialize_with_defaults() {
    let definition: PackageDefinition =
      serde_json::from_str(r#"{"source_filenames": ["a.css"], "extra_context": {"media": "print"}}"#)
        .unwrap();
    assert_eq!(definition.source_filenames, vec!["a.css".to_string()]);
    assert_eq!(definition.extra_context["media"], "print");
    assert!(definition.output_filename.is_none());
    assert!(!definition.ad_hoc);
  }
}
