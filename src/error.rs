//! Error taxonomy shared by the packager, the renderers and the tag parser.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::AssetType;

/// Raised while parsing a page, before anything renders.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagSyntaxError {
  /// The tag was invoked with anything other than a single package argument.
  #[error("{tag:?} requires exactly one argument: the name of a group in the {setting} setting")]
  WrongArgumentCount {
    /// Tag name as written in the page.
    tag: String,
    /// Registry the argument is looked up in.
    setting: &'static str,
  },
  /// The tag name is not one of the asset tags.
  #[error("unknown asset tag {0:?}")]
  UnknownTag(String),
  /// A `{%` opener without a matching `%}`.
  #[error("unterminated tag starting at byte {0}")]
  Unterminated(usize),
  /// Quoting inside the tag could not be split into words.
  #[error("malformed tag arguments: {0}")]
  Malformed(String),
}

/// The package name resolved to nothing the packager knows about.
///
/// This is the one condition an [`crate::AssetNode`] absorbs instead of propagating.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("no {asset_type} package named {name:?}")]
pub struct PackageNotFound {
  /// Registry that was searched.
  pub asset_type: AssetType,
  /// Requested package name.
  pub name: String,
}

/// Fatal failures raised while rendering a tag.
#[derive(Debug, Error)]
pub enum RenderError {
  /// A compiler command could not run or exited unsuccessfully.
  #[error("failed to compile {path}: {message}")]
  Compile {
    /// Source path handed to the compiler.
    path: String,
    /// Failure description, including captured stderr where available.
    message: String,
  },
  /// The template is unknown or could not be rendered.
  #[error("template {name:?}: {message}")]
  Template {
    /// Template name being rendered.
    name: String,
    /// Failure description.
    message: String,
  },
  /// A storage path could not be turned into a URL.
  #[error("cannot build a URL for {0:?}")]
  Url(String),
  /// The tag argument names a variable missing from the page context.
  #[error("variable {0:?} does not exist in the page context")]
  UnresolvedVariable(String),
  /// Filesystem access failed while expanding or reading sources.
  #[error("failed to access {}: {source}", path.display())]
  Io {
    /// Path that caused the error.
    path: PathBuf,
    /// Source I/O error.
    source: std::io::Error,
  },
  /// A source pattern is not a valid glob.
  #[error("invalid source pattern {pattern:?}: {source}")]
  Pattern {
    /// Pattern as configured.
    pattern: String,
    /// Glob parse error.
    source: glob::PatternError,
  },
}

/// Errors that can occur while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// Failed to read the configuration file from disk.
  #[error("failed to read {}: {source}", path.display())]
  Io {
    /// Path that caused the error.
    path: PathBuf,
    /// Source I/O error.
    source: std::io::Error,
  },
  /// Failed to parse a JSON configuration file.
  #[error("failed to parse {}: {source}", path.display())]
  Json {
    /// Path that caused the error.
    path: PathBuf,
    /// Source parse error.
    source: serde_json::Error,
  },
  /// Failed to parse a YAML configuration file.
  #[error("failed to parse {}: {source}", path.display())]
  Yaml {
    /// Path that caused the error.
    path: PathBuf,
    /// Source parse error.
    source: serde_yaml::Error,
  },
}

/// Failure of a package resolution: either absorbed (not found) or fatal.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// See [`PackageNotFound`].
  #[error(transparent)]
  NotFound(#[from] PackageNotFound),
  /// Anything else, propagated to the caller.
  #[error(transparent)]
  Render(#[from] RenderError),
}

/// Failure while expanding the asset tags of a whole page.
#[derive(Debug, Error)]
pub enum PageError {
  /// The page could not be parsed; nothing was rendered.
  #[error(transparent)]
  Syntax(#[from] TagSyntaxError),
  /// A tag failed while rendering.
  #[error(transparent)]
  Render(#[from] RenderError),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wrong_argument_count_names_the_tag_and_setting() {
    let err = TagSyntaxError::WrongArgumentCount {
      tag: "compressed_css".into(),
      setting: "css",
    };
    assert_eq!(
      err.to_string(),
      "\"compressed_css\" requires exactly one argument: the name of a group in the css setting"
    );
  }

  #[test]
  fn not_found_mentions_asset_type() {
    let err = PackageNotFound {
      asset_type: AssetType::Script,
      name: "missing".into(),
    };
    assert_eq!(err.to_string(), "no js package named \"missing\"");
  }
}
