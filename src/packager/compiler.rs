//! Source compilers run while rendering unbundled packages.

use std::fmt;
use std::fs;
use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Transforms one source file into one output file.
pub trait Compiler: fmt::Debug + Send + Sync {
  /// Whether this compiler handles `path`.
  fn match_file(&self, path: &str) -> bool;

  /// Extension of produced files, without the leading dot.
  fn output_extension(&self) -> &str;

  /// Storage-relative path of the compiled output for `path`.
  fn output_path(&self, path: &str) -> String {
    replace_extension(path, self.output_extension())
  }

  /// Compile `infile` into `outfile`.
  fn compile_file(&self, infile: &Path, outfile: &Path) -> Result<(), RenderError>;
}

/// Replace the extension of the final path segment, appending one if none exists.
pub fn replace_extension(path: &str, extension: &str) -> String {
  let file_start = path.rfind('/').map_or(0, |index| index + 1);
  let stem_end = path[file_start..]
    .rfind('.')
    .filter(|index| *index > 0)
    .map_or(path.len(), |index| file_start + index);

  format!("{}.{}", &path[..stem_end], extension.trim_start_matches('.'))
}

/// Compiler delegating to an external command.
///
/// `{infile}` and `{outfile}` placeholders in the command are substituted with absolute
/// paths. When the command has no `{outfile}` placeholder its standard output is written to
/// the output file instead.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CommandCompiler {
  /// Extension of handled sources, e.g. `less`.
  pub input_extension: String,
  /// Extension of produced files, e.g. `css`.
  pub output_extension: String,
  /// Command line, split with shell quoting rules.
  pub command: String,
}

impl CommandCompiler {
  fn arguments(&self, infile: &Path, outfile: &Path) -> Result<Vec<String>, RenderError> {
    let words = shell_words::split(&self.command).map_err(|err| RenderError::Compile {
      path: infile.display().to_string(),
      message: format!("invalid compiler command {:?}: {err}", self.command),
    })?;

    Ok(
      words
        .into_iter()
        .map(|word| {
          word
            .replace("{infile}", &infile.to_string_lossy())
            .replace("{outfile}", &outfile.to_string_lossy())
        })
        .collect(),
    )
  }
}

impl Compiler for CommandCompiler {
  fn match_file(&self, path: &str) -> bool {
    let suffix = format!(".{}", self.input_extension.trim_start_matches('.'));
    path.len() > suffix.len() && path.to_ascii_lowercase().ends_with(&suffix.to_ascii_lowercase())
  }

  fn output_extension(&self) -> &str {
    &self.output_extension
  }

  fn compile_file(&self, infile: &Path, outfile: &Path) -> Result<(), RenderError> {
    let compile_error = |message: String| RenderError::Compile {
      path: infile.display().to_string(),
      message,
    };

    let arguments = self.arguments(infile, outfile)?;
    let Some((program, rest)) = arguments.split_first() else {
      return Err(compile_error("compiler command is empty".into()));
    };

    if let Some(parent) = outfile.parent() {
      fs::create_dir_all(parent).map_err(|source| RenderError::Io {
        path: parent.to_path_buf(),
        source,
      })?;
    }

    tracing::debug!("compiling {} with {program}", infile.display());
    let output = Command::new(program)
      .args(rest)
      .output()
      .map_err(|err| compile_error(format!("failed to run {program}: {err}")))?;

    if !output.status.success() {
      return Err(compile_error(format!(
        "{program} exited with {}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
      )));
    }

    if !self.command.contains("{outfile}") {
      fs::write(outfile, &output.stdout).map_err(|source| RenderError::Io {
        path: outfile.to_path_buf(),
        source,
      })?;
    }

    Ok(())
  }
}
