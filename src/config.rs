//! Pipeline configuration loader describing packages, compilers and output settings.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::models::RenderMode;
use crate::packager::{CommandCompiler, JstSettings, PackagerSettings};
use crate::registry::PackageRegistry;

/// File names searched for by [`PipelineConfig::discover`], in order.
pub const CONFIG_FILE_NAMES: &[&str] = &[
    "pipeline.config.json",
    "pipeline.config.yaml",
    "pipeline.config.yml",
];

/// Discoverable configuration describing packages and how they are rendered.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Reference pre-built bundles (`true`) or the individual compiled sources (`false`).
    pub pipeline: bool,
    /// URL prefix under which storage-relative paths are served.
    pub static_url: String,
    /// Directory, relative to the configuration file, holding sources and compiled outputs.
    pub source_root: String,
    /// Directories, relative to the configuration file, searched for template overrides.
    pub template_dirs: Vec<String>,
    /// Stylesheet packages.
    pub css: PackageRegistry,
    /// Script packages.
    pub js: PackageRegistry,
    /// Compilers applied to sources in unbundled mode, tried in order.
    pub compilers: Vec<CommandCompiler>,
    /// Client-side template handling for script packages.
    #[serde(flatten)]
    pub templates: JstSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pipeline: false,
            static_url: "/static/".into(),
            source_root: "static".into(),
            template_dirs: Vec::new(),
            css: PackageRegistry::default(),
            js: PackageRegistry::default(),
            compilers: Vec::new(),
            templates: JstSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Locate the first configuration file present in `dir`.
    pub fn find(dir: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    /// Attempt to load configuration from the provided directory.
    ///
    /// When no configuration file exists, or it fails to load, defaults are used so that
    /// pages still render; load failures are logged.
    pub fn discover(dir: &Path) -> Self {
        let Some(path) = Self::find(dir) else {
            return Self::default();
        };

        Self::load(&path).unwrap_or_else(|err| {
            tracing::warn!("{err}, falling back to default configuration");
            Self::default()
        })
    }

    /// Read configuration from a JSON or YAML file, chosen by extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        if is_yaml {
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })
        } else {
            serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    /// Render mode selected by the `pipeline` flag.
    pub fn render_mode(&self) -> RenderMode {
        RenderMode::from_flag(self.pipeline)
    }

    /// Source root resolved against the configuration directory.
    pub fn source_root_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.source_root)
    }

    /// Template override directories resolved against the configuration directory.
    pub fn template_dir_paths(&self, base_dir: &Path) -> Vec<PathBuf> {
        self.template_dirs
            .iter()
            .map(|dir| base_dir.join(dir))
            .collect()
    }

    /// Packager settings described by this configuration.
    pub fn packager_settings(&self, base_dir: &Path) -> PackagerSettings {
        let settings = PackagerSettings {
            templates: self.templates.clone(),
            ..PackagerSettings::new(self.source_root_path(base_dir))
        };

        self.compilers
            .iter()
            .cloned()
            .fold(settings, |settings, compiler| settings.with_compiler(compiler))
    }
}
