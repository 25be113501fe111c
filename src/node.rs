//! Package resolution and fragment rendering for asset tags.
//!
//! An [`AssetNode`] turns a logical package name into markup. The algorithm is shared by
//! both asset types; what differs per type (default MIME type, default template, inline
//! source support) lives behind the [`RenderFragment`] capability.

use serde_json::Value;

use crate::error::{RenderError, ResolveError};
use crate::mime::guess_type;
use crate::models::{AssetType, RenderMode, ResolvedPackage};
use crate::packager::{Packager, PackagerFactory};
use crate::registry::PackageRegistry;
use crate::templates::{INLINE_JS_TEMPLATE, TemplateRenderer};
use crate::urls::{UrlResolver, resolve_url};

/// Everything a render call reads. Nothing in here is mutated while rendering.
pub struct RenderEnv<'a, F> {
  /// Bundled or unbundled output.
  pub mode: RenderMode,
  /// Registered stylesheet packages.
  pub css: &'a PackageRegistry,
  /// Registered script packages.
  pub js: &'a PackageRegistry,
  /// Creates the packager used for each call.
  pub packagers: &'a F,
  /// Storage URL resolution.
  pub urls: &'a dyn UrlResolver,
  /// Markup templates.
  pub templates: &'a dyn TemplateRenderer,
}

impl<F> RenderEnv<'_, F> {
  fn registry(&self, asset_type: AssetType) -> &PackageRegistry {
    match asset_type {
      AssetType::Style => self.css,
      AssetType::Script => self.js,
    }
  }

  fn outputs(&self) -> Outputs<'_> {
    Outputs {
      urls: self.urls,
      templates: self.templates,
    }
  }
}

/// Collaborators needed to turn a path into markup.
#[derive(Clone, Copy)]
pub struct Outputs<'a> {
  /// Storage URL resolution.
  pub urls: &'a dyn UrlResolver,
  /// Markup templates.
  pub templates: &'a dyn TemplateRenderer,
}

/// Per-type rendering of individual fragments.
pub trait RenderFragment: Sync {
  /// Asset type rendered.
  fn asset_type(&self) -> AssetType;

  /// Markup referencing one output path.
  fn render_path(
    &self,
    package: &ResolvedPackage,
    path: &str,
    outputs: Outputs<'_>,
  ) -> Result<String, RenderError> {
    let asset_type = self.asset_type();
    let mut context = package.context();
    context.insert(
      "type".into(),
      Value::String(guess_type(path, asset_type.default_mime())),
    );
    context.insert("url".into(), Value::String(resolve_url(outputs.urls, path)?));
    outputs
      .templates
      .render(package.template_for(asset_type), &context)
  }

  /// Trailing fragment for inline source, if the type supports it and the package has any.
  fn render_inline(
    &self,
    _package: &ResolvedPackage,
    _outputs: Outputs<'_>,
  ) -> Result<Option<String>, RenderError> {
    Ok(None)
  }
}

/// Stylesheet fragments: `<link>` tags, no inline source.
#[derive(Debug, Clone, Copy)]
pub struct StyleFragment;

impl RenderFragment for StyleFragment {
  fn asset_type(&self) -> AssetType {
    AssetType::Style
  }
}

/// Script fragments: `<script src>` tags plus one inline `<script>` block.
#[derive(Debug, Clone, Copy)]
pub struct ScriptFragment;

impl RenderFragment for ScriptFragment {
  fn asset_type(&self) -> AssetType {
    AssetType::Script
  }

  fn render_inline(
    &self,
    package: &ResolvedPackage,
    outputs: Outputs<'_>,
  ) -> Result<Option<String>, RenderError> {
    let Some(source) = package.inline_source.as_deref() else {
      return Ok(None);
    };

    let mut context = package.context();
    context.insert("source".into(), Value::String(source.to_string()));
    outputs
      .templates
      .render(INLINE_JS_TEMPLATE, &context)
      .map(Some)
  }
}

impl AssetType {
  /// Fragment renderer for this type.
  pub fn fragments(self) -> &'static dyn RenderFragment {
    match self {
      Self::Style => &StyleFragment,
      Self::Script => &ScriptFragment,
    }
  }
}

/// Renders packages of one asset type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetNode {
  asset_type: AssetType,
}

impl AssetNode {
  /// Node rendering packages of `asset_type`.
  pub fn new(asset_type: AssetType) -> Self {
    Self { asset_type }
  }

  /// Asset type rendered by this node.
  pub fn asset_type(&self) -> AssetType {
    self.asset_type
  }

  /// Render the package `name` as newline-joined fragments.
  ///
  /// An unknown package renders as the empty string. Compilation, URL and template
  /// failures are returned as errors.
  pub fn render<F: PackagerFactory>(
    &self,
    name: &str,
    env: &RenderEnv<'_, F>,
  ) -> Result<String, RenderError> {
    match self.fragments(name, env) {
      Ok(fragments) => Ok(fragments.join("\n")),
      Err(ResolveError::NotFound(err)) => {
        tracing::debug!("{err}, rendering nothing");
        Ok(String::new())
      }
      Err(ResolveError::Render(err)) => Err(err),
    }
  }

  /// Render the package `name` into its ordered fragments.
  pub fn fragments<F: PackagerFactory>(
    &self,
    name: &str,
    env: &RenderEnv<'_, F>,
  ) -> Result<Vec<String>, ResolveError> {
    let scoped = env.registry(self.asset_type).scoped(name);
    let packager = env.packagers.packager(scoped.clone(), scoped);
    let package = packager.package_for(self.asset_type, name)?;

    let paths = match env.mode {
      RenderMode::Bundled => vec![package.output_filename.clone()],
      RenderMode::Unbundled => packager.compile(&package.paths)?,
    };

    let renderer = self.asset_type.fragments();
    let outputs = env.outputs();
    let mut fragments = paths
      .iter()
      .map(|path| renderer.render_path(&package, path, outputs))
      .collect::<Result<Vec<_>, _>>()?;

    if let Some(inline) = renderer.render_inline(&package, outputs)? {
      fragments.push(inline);
    }

    Ok(fragments)
  }
}
