//! Configured rendering front-end tying registries, packager, URLs and templates together.

use std::path::Path;

use crate::config::PipelineConfig;
use crate::error::{PageError, RenderError};
use crate::models::{AssetType, Context, RenderMode};
use crate::node::{AssetNode, RenderEnv};
use crate::packager::PackagerSettings;
use crate::registry::PackageRegistry;
use crate::tags::Page;
use crate::templates::TemplateLibrary;
use crate::urls::StaticUrlResolver;

/// Everything needed to render asset tags for one configured site.
#[derive(Debug, Clone)]
pub struct AssetPipeline {
  mode: RenderMode,
  css: PackageRegistry,
  js: PackageRegistry,
  packagers: PackagerSettings,
  urls: StaticUrlResolver,
  templates: TemplateLibrary,
}

impl AssetPipeline {
  /// Build a pipeline from `config`, resolving relative directories against `base_dir`.
  pub fn from_config(config: &PipelineConfig, base_dir: &Path) -> Self {
    let templates = config
      .template_dir_paths(base_dir)
      .into_iter()
      .fold(TemplateLibrary::new(), |library, dir| library.with_search_dir(dir));

    Self {
      mode: config.render_mode(),
      css: config.css.clone(),
      js: config.js.clone(),
      packagers: config.packager_settings(base_dir),
      urls: StaticUrlResolver::new(config.static_url.clone()),
      templates,
    }
  }

  /// Pipeline for the configuration discovered in `dir`, or defaults.
  pub fn discover(dir: &Path) -> Self {
    Self::from_config(&PipelineConfig::discover(dir), dir)
  }

  /// Override the configured render mode.
  pub fn with_mode(mut self, mode: RenderMode) -> Self {
    self.mode = mode;
    self
  }

  /// Active render mode.
  pub fn mode(&self) -> RenderMode {
    self.mode
  }

  /// Template library, for registering extra templates.
  pub fn templates_mut(&mut self) -> &mut TemplateLibrary {
    &mut self.templates
  }

  /// Read-only view handed to each render call.
  pub fn env(&self) -> RenderEnv<'_, PackagerSettings> {
    RenderEnv {
      mode: self.mode,
      css: &self.css,
      js: &self.js,
      packagers: &self.packagers,
      urls: &self.urls,
      templates: &self.templates,
    }
  }

  /// Render one package. Unknown packages render as the empty string.
  pub fn render(&self, asset_type: AssetType, name: &str) -> Result<String, RenderError> {
    AssetNode::new(asset_type).render(name, &self.env())
  }

  /// Replace every asset tag in `source`, resolving variable arguments from `context`.
  pub fn expand_page(&self, source: &str, context: &Context) -> Result<String, PageError> {
    let page = Page::parse(source)?;
    Ok(page.render(context, &self.env())?)
  }
}
