//! Resolving package definitions into concrete paths and compiling sources on demand.
//!
//! The [`Packager`] trait is the seam the rendering core talks to. [`RegistryPackager`] is the
//! filesystem-backed implementation: it expands source globs below a source root, turns
//! template files of script packages into inline source and runs configured compilers.

mod compiler;
mod jst;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use compiler::{CommandCompiler, Compiler, replace_extension};
pub use jst::JstSettings;

use crate::error::{PackageNotFound, RenderError, ResolveError};
use crate::models::{AssetType, PackageDefinition, ResolvedPackage};
use crate::registry::PackageRegistry;
use crate::urls::path_is_url;

/// Bundling engine as seen by the rendering core.
pub trait Packager {
  /// Resolve the package `name` of `asset_type`.
  fn package_for(&self, asset_type: AssetType, name: &str) -> Result<ResolvedPackage, ResolveError>;

  /// Compile `paths` in order, returning the output path for each.
  fn compile(&self, paths: &[String]) -> Result<Vec<String>, RenderError>;
}

/// Builds packagers scoped to a pair of registries.
pub trait PackagerFactory {
  /// Packager type produced.
  type Packager: Packager;

  /// A packager that knows only the given style and script packages.
  fn packager(&self, css: PackageRegistry, js: PackageRegistry) -> Self::Packager;
}

/// Settings shared by every [`RegistryPackager`].
#[derive(Debug, Clone, Default)]
pub struct PackagerSettings {
  /// Directory that source paths, globs and compiled outputs are relative to.
  pub source_root: PathBuf,
  /// Compilers tried in order for each source path.
  pub compilers: Vec<Arc<dyn Compiler>>,
  /// Client-side template handling for script packages.
  pub templates: JstSettings,
}

impl PackagerSettings {
  /// Settings rooted at `source_root` with no compilers.
  pub fn new(source_root: impl Into<PathBuf>) -> Self {
    Self {
      source_root: source_root.into(),
      ..Self::default()
    }
  }

  /// Append a compiler.
  pub fn with_compiler(mut self, compiler: impl Compiler + 'static) -> Self {
    self.compilers.push(Arc::new(compiler));
    self
  }
}

impl PackagerFactory for PackagerSettings {
  type Packager = RegistryPackager;

  fn packager(&self, css: PackageRegistry, js: PackageRegistry) -> RegistryPackager {
    RegistryPackager {
      settings: self.clone(),
      css,
      js,
    }
  }
}

/// Filesystem-backed packager over a pair of registries.
#[derive(Debug, Clone)]
pub struct RegistryPackager {
  settings: PackagerSettings,
  css: PackageRegistry,
  js: PackageRegistry,
}

impl RegistryPackager {
  fn registry(&self, asset_type: AssetType) -> &PackageRegistry {
    match asset_type {
      AssetType::Style => &self.css,
      AssetType::Script => &self.js,
    }
  }

  fn root(&self) -> &Path {
    &self.settings.source_root
  }

  /// Expand source patterns into existing files, keeping the first occurrence of each.
  fn expand_sources(&self, patterns: &[String]) -> Result<Vec<String>, RenderError> {
    let mut seen = BTreeSet::new();
    let mut paths = Vec::new();

    for pattern in patterns {
      if path_is_url(pattern) {
        if seen.insert(pattern.clone()) {
          paths.push(pattern.clone());
        }
        continue;
      }

      for path in self.glob(pattern)? {
        if seen.insert(path.clone()) {
          paths.push(path);
        }
      }
    }

    Ok(paths)
  }

  /// Sources of an ad-hoc package, taken as literal paths that must exist below the root.
  fn literal_sources(&self, sources: &[String]) -> Option<Vec<String>> {
    let paths: Vec<String> = sources
      .iter()
      .filter_map(|source| {
        if path_is_url(source) {
          return Some(source.clone());
        }
        let relative = source.replace('\\', "/");
        let relative = relative.trim_start_matches('/');
        (!relative.is_empty() && self.root().join(relative).is_file()).then(|| relative.to_string())
      })
      .collect();

    (!paths.is_empty()).then_some(paths)
  }

  fn glob(&self, pattern: &str) -> Result<Vec<String>, RenderError> {
    let root = self.root();
    let escaped_root = glob::Pattern::escape(&root.to_string_lossy());
    let full_pattern = format!(
      "{}/{}",
      escaped_root.trim_end_matches('/'),
      pattern.trim_start_matches('/')
    );

    let entries = glob::glob(&full_pattern).map_err(|source| RenderError::Pattern {
      pattern: pattern.to_string(),
      source,
    })?;

    let mut matches = Vec::new();
    for entry in entries {
      let path = entry.map_err(|err| RenderError::Io {
        path: err.path().to_path_buf(),
        source: err.into_error(),
      })?;
      if !path.is_file() {
        continue;
      }
      let relative = path.strip_prefix(root).unwrap_or(&path);
      matches.push(relative.to_string_lossy().replace('\\', "/"));
    }

    matches.sort();
    Ok(matches)
  }

  fn resolve(
    &self,
    asset_type: AssetType,
    name: &str,
    definition: &PackageDefinition,
  ) -> Result<ResolvedPackage, ResolveError> {
    let mut paths = if definition.ad_hoc {
      self
        .literal_sources(&definition.source_filenames)
        .ok_or_else(|| not_found(asset_type, name))?
    } else {
      self.expand_sources(&definition.source_filenames)?
    };

    let inline_source = if asset_type.supports_inline() {
      let jst = &self.settings.templates;
      let (templates, scripts): (Vec<String>, Vec<String>) =
        paths.into_iter().partition(|path| jst.is_template(path));
      paths = scripts;

      let compiled = jst.compile(self.root(), &templates)?;
      match (definition.inline_source.clone(), compiled) {
        (Some(literal), Some(compiled)) => Some(format!("{literal}\n{compiled}")),
        (literal, compiled) => literal.or(compiled),
      }
    } else {
      if definition.inline_source.is_some() {
        tracing::warn!("ignoring inline source on {asset_type} package {name:?}");
      }
      None
    };

    Ok(ResolvedPackage {
      output_filename: definition
        .output_filename
        .clone()
        .unwrap_or_else(|| name.to_string()),
      paths,
      template_name: definition.template_name.clone(),
      extra_context: definition.extra_context.clone(),
      inline_source: inline_source.filter(|source| !source.is_empty()),
    })
  }

  fn compile_one(&self, path: &str) -> Result<String, RenderError> {
    if path_is_url(path) {
      return Ok(path.to_string());
    }

    let Some(compiler) = self
      .settings
      .compilers
      .iter()
      .find(|compiler| compiler.match_file(path))
    else {
      return Ok(path.to_string());
    };

    let output = compiler.output_path(path);
    let infile = self.root().join(path);
    let outfile = self.root().join(&output);

    if outfile.exists() && same_file::is_same_file(&infile, &outfile).unwrap_or(false) {
      return Ok(output);
    }

    if is_outdated(&infile, &outfile) {
      compiler.compile_file(&infile, &outfile)?;
    } else {
      tracing::debug!("{output} is up to date, skipping compilation");
    }

    Ok(output)
  }
}

impl Packager for RegistryPackager {
  fn package_for(&self, asset_type: AssetType, name: &str) -> Result<ResolvedPackage, ResolveError> {
    let definition = self
      .registry(asset_type)
      .get(name)
      .ok_or_else(|| not_found(asset_type, name))?;
    self.resolve(asset_type, name, definition)
  }

  fn compile(&self, paths: &[String]) -> Result<Vec<String>, RenderError> {
    paths.iter().map(|path| self.compile_one(path)).collect()
  }
}

fn not_found(asset_type: AssetType, name: &str) -> ResolveError {
  ResolveError::NotFound(PackageNotFound {
    asset_type,
    name: name.to_string(),
  })
}

/// Whether `outfile` is missing or older than `infile`.
fn is_outdated(infile: &Path, outfile: &Path) -> bool {
  let modified = |path: &Path| path.metadata().and_then(|meta| meta.modified()).ok();
  match (modified(infile), modified(outfile)) {
    (Some(source), Some(output)) => source > output,
    _ => true,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use std::fs;
  use tempfile::{TempDir, tempdir};

  fn fixture(files: &[(&str, &str)]) -> TempDir {
    let dir = tempdir().unwrap();
    for (path, contents) in files {
      let file = dir.path().join(path);
      fs::create_dir_all(file.parent().unwrap()).unwrap();
      fs::write(file, contents).unwrap();
    }
    dir
  }

  fn packager(root: &Path, css: PackageRegistry, js: PackageRegistry) -> RegistryPackager {
    PackagerSettings::new(root).packager(css, js)
  }

  #[test]
  fn expands_globs_in_order_without_duplicates() {
    let dir = fixture(&[
      ("css/b.css", ""),
      ("css/a.css", ""),
      ("css/reset.css", ""),
    ]);
    let css = PackageRegistry::new().with("main", PackageDefinition {
      source_filenames: vec!["css/reset.css".into(), "css/*.css".into()],
      output_filename: Some("main.min.css".into()),
      ..PackageDefinition::default()
    });

    let package = packager(dir.path(), css, PackageRegistry::new())
      .package_for(AssetType::Style, "main")
      .unwrap();

    assert_eq!(package.paths, vec!["css/reset.css", "css/a.css", "css/b.css"]);
    assert_eq!(package.output_filename, "main.min.css");
    assert!(package.inline_source.is_none());
  }

  #[test]
  fn unknown_packages_are_not_found() {
    let dir = fixture(&[]);
    let err = packager(dir.path(), PackageRegistry::new(), PackageRegistry::new())
      .package_for(AssetType::Script, "missing")
      .unwrap_err();

    assert!(matches!(err, ResolveError::NotFound(PackageNotFound { name, .. }) if name == "missing"));
  }

  #[test]
  fn ad_hoc_packages_need_an_existing_source() {
    let dir = fixture(&[("js/app.js", "")]);
    let js = PackageRegistry::new().scoped("js/app.js");
    let found = packager(dir.path(), PackageRegistry::new(), js)
      .package_for(AssetType::Script, "js/app.js")
      .unwrap();
    assert_eq!(found.paths, vec!["js/app.js"]);
    assert_eq!(found.output_filename, "js/app.js");

    let js = PackageRegistry::new().scoped("js/gone.js");
    let missing = packager(dir.path(), PackageRegistry::new(), js)
      .package_for(AssetType::Script, "js/gone.js");
    assert!(matches!(missing, Err(ResolveError::NotFound(_))));
  }

  #[test]
  fn ad_hoc_names_are_not_glob_patterns() {
    let dir = fixture(&[("js/a.js", ""), ("js/b.js", "")]);
    for name in ["js/*.js", "js/a[", "js/?.js"] {
      let js = PackageRegistry::new().scoped(name);
      let result = packager(dir.path(), PackageRegistry::new(), js)
        .package_for(AssetType::Script, name);
      assert!(
        matches!(result, Err(ResolveError::NotFound(_))),
        "{name} should not resolve"
      );
    }
  }

  #[test]
  fn output_filename_defaults_to_package_name() {
    let dir = fixture(&[]);
    let css = PackageRegistry::new().with("print", PackageDefinition::default());
    let package = packager(dir.path(), css, PackageRegistry::new())
      .package_for(AssetType::Style, "print")
      .unwrap();
    assert_eq!(package.output_filename, "print");
    assert!(package.paths.is_empty());
  }

  #[test]
  fn script_templates_become_inline_source() {
    let dir = fixture(&[("js/app.js", ""), ("templates/item.jst", "<li></li>")]);
    let js = PackageRegistry::new().with("app", PackageDefinition {
      source_filenames: vec!["js/app.js".into(), "templates/*.jst".into()],
      inline_source: Some("var ready = true;".into()),
      ..PackageDefinition::default()
    });

    let package = packager(dir.path(), PackageRegistry::new(), js)
      .package_for(AssetType::Script, "app")
      .unwrap();

    assert_eq!(package.paths, vec!["js/app.js"]);
    assert_eq!(
      package.inline_source.as_deref(),
      Some(concat!(
        "var ready = true;\n",
        "window.JST = window.JST || {};\n",
        "window.JST[\"item\"] = template(\"<li><\\/li>\");"
      ))
    );
  }

  #[test]
  fn style_packages_drop_inline_source() {
    let dir = fixture(&[]);
    let css = PackageRegistry::new().with("main", PackageDefinition {
      inline_source: Some("body {}".into()),
      ..PackageDefinition::default()
    });
    let package = packager(dir.path(), css, PackageRegistry::new())
      .package_for(AssetType::Style, "main")
      .unwrap();
    assert!(package.inline_source.is_none());
  }

  #[test]
  fn absolute_urls_pass_through_expansion_and_compilation() {
    let dir = fixture(&[]);
    let js = PackageRegistry::new().with("cdn", PackageDefinition {
      source_filenames: vec!["https://cdn.example.com/lib.js".into()],
      ..PackageDefinition::default()
    });
    let packager = packager(dir.path(), PackageRegistry::new(), js);
    let package = packager.package_for(AssetType::Script, "cdn").unwrap();

    assert_eq!(package.paths, vec!["https://cdn.example.com/lib.js"]);
    assert_eq!(packager.compile(&package.paths).unwrap(), package.paths);
  }

  #[test]
  fn compile_passes_through_unmatched_paths() {
    let dir = fixture(&[]);
    let packager = packager(dir.path(), PackageRegistry::new(), PackageRegistry::new());
    let paths = vec!["a.css".to_string(), "b.css".to_string()];
    assert_eq!(packager.compile(&paths).unwrap(), paths);
  }

  #[cfg(unix)]
  #[test]
  fn compile_runs_matching_compilers() {
    let dir = fixture(&[("css/theme.less", "a {}"), ("css/base.css", "")]);
    let settings = PackagerSettings::new(dir.path()).with_compiler(CommandCompiler {
      input_extension: "less".into(),
      output_extension: "css".into(),
      command: "cp {infile} {outfile}".into(),
    });
    let packager = settings.packager(PackageRegistry::new(), PackageRegistry::new());

    let outputs = packager
      .compile(&["css/base.css".to_string(), "css/theme.less".to_string()])
      .unwrap();

    assert_eq!(outputs, vec!["css/base.css", "css/theme.css"]);
    assert_eq!(fs::read_to_string(dir.path().join("css/theme.css")).unwrap(), "a {}");
  }

  #[test]
  fn fresh_outputs_are_not_recompiled() {
    let dir = fixture(&[("theme.less", "a {}")]);
    let outfile = dir.path().join("theme.css");
    fs::write(&outfile, "compiled").unwrap();

    assert!(!is_outdated(&dir.path().join("theme.less"), &outfile));
    assert!(is_outdated(&dir.path().join("theme.less"), &dir.path().join("other.css")));
  }
}
