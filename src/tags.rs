//! Parsing `{% compressed_css ... %}` and `{% compressed_js ... %}` tags out of pages.
//!
//! Pages are parsed completely before anything renders, so a malformed asset tag fails the
//! whole page up front. Block tags that are not asset tags are kept verbatim.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{RenderError, TagSyntaxError};
use crate::models::{AssetType, Context};
use crate::node::{AssetNode, RenderEnv};
use crate::packager::PackagerFactory;
use crate::templates::{display_value, lookup};

/// Tag rendering stylesheet packages.
pub const CSS_TAG: &str = "compressed_css";
/// Tag rendering script packages.
pub const JS_TAG: &str = "compressed_js";

fn tag_asset_type(tag: &str) -> Option<AssetType> {
  match tag {
    CSS_TAG => Some(AssetType::Style),
    JS_TAG => Some(AssetType::Script),
    _ => None,
  }
}

fn word_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r#""[^"]*"|'[^']*'|\S+"#).expect("invalid tag word regex"))
}

/// Split tag contents into words, keeping quoted strings (and their quotes) intact.
fn split_contents(contents: &str) -> Result<Vec<&str>, TagSyntaxError> {
  let words: Vec<&str> = word_pattern()
    .find_iter(contents)
    .map(|found| found.as_str())
    .collect();

  if let Some(word) = words.iter().find(|word| {
    let quoted = word.starts_with('"') || word.starts_with('\'');
    quoted && (word.len() < 2 || !word.ends_with(&word[..1]))
  }) {
    return Err(TagSyntaxError::Malformed(format!("unbalanced quote in {word}")));
  }

  Ok(words)
}

/// The package argument of a tag: a quoted literal or a page variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageRef {
  /// Quoted package name.
  Literal(String),
  /// Dotted variable path looked up in the page context.
  Variable(String),
}

impl PackageRef {
  /// Interpret a single tag argument.
  pub fn parse(argument: &str) -> Self {
    let quoted = argument.len() >= 2
      && (argument.starts_with('"') || argument.starts_with('\''))
      && argument.ends_with(&argument[..1]);
    if quoted {
      Self::Literal(argument[1..argument.len() - 1].to_string())
    } else {
      Self::Variable(argument.to_string())
    }
  }

  /// The package name this argument refers to in `context`.
  pub fn resolve(&self, context: &Context) -> Result<String, RenderError> {
    match self {
      Self::Literal(name) => Ok(name.clone()),
      Self::Variable(path) => match lookup(context, path) {
        None | Some(serde_json::Value::Null) => Err(RenderError::UnresolvedVariable(path.clone())),
        value => Ok(display_value(value)),
      },
    }
  }
}

/// One parsed asset tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetTag {
  node: AssetNode,
  package: PackageRef,
}

impl AssetTag {
  /// Parse tag contents such as `compressed_css "main"`.
  pub fn parse(contents: &str) -> Result<Self, TagSyntaxError> {
    let words = split_contents(contents)?;
    let Some((tag, arguments)) = words.split_first() else {
      return Err(TagSyntaxError::UnknownTag(String::new()));
    };
    let asset_type =
      tag_asset_type(tag).ok_or_else(|| TagSyntaxError::UnknownTag((*tag).to_string()))?;

    let [argument] = arguments else {
      return Err(TagSyntaxError::WrongArgumentCount {
        tag: (*tag).to_string(),
        setting: asset_type.setting(),
      });
    };

    Ok(Self {
      node: AssetNode::new(asset_type),
      package: PackageRef::parse(argument),
    })
  }

  /// Asset type rendered by the tag.
  pub fn asset_type(&self) -> AssetType {
    self.node.asset_type()
  }

  /// Package argument as written.
  pub fn package(&self) -> &PackageRef {
    &self.package
  }

  /// Resolve the argument against `context` and render the package.
  pub fn render<F: PackagerFactory>(
    &self,
    context: &Context,
    env: &RenderEnv<'_, F>,
  ) -> Result<String, RenderError> {
    let name = self.package.resolve(context)?;
    self.node.render(&name, env)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
  Text(String),
  Tag(AssetTag),
}

/// A page split into literal text and asset tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
  segments: Vec<Segment>,
}

impl Page {
  /// Parse every asset tag in `source`.
  pub fn parse(source: &str) -> Result<Self, TagSyntaxError> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut rest = source;
    let mut offset = 0;

    while let Some(start) = rest.find("{%") {
      let Some(length) = rest[start + 2..].find("%}") else {
        return Err(TagSyntaxError::Unterminated(offset + start));
      };
      let end = start + 2 + length + 2;
      let contents = rest[start + 2..end - 2].trim();

      text.push_str(&rest[..start]);
      let is_asset_tag = contents
        .split_whitespace()
        .next()
        .is_some_and(|tag| tag_asset_type(tag).is_some());

      if is_asset_tag {
        if !text.is_empty() {
          segments.push(Segment::Text(std::mem::take(&mut text)));
        }
        segments.push(Segment::Tag(AssetTag::parse(contents)?));
      } else {
        text.push_str(&rest[start..end]);
      }

      offset += end;
      rest = &rest[end..];
    }

    text.push_str(rest);
    if !text.is_empty() {
      segments.push(Segment::Text(text));
    }

    Ok(Self { segments })
  }

  /// Asset tags in page order.
  pub fn tags(&self) -> impl Iterator<Item = &AssetTag> {
    self.segments.iter().filter_map(|segment| match segment {
      Segment::Tag(tag) => Some(tag),
      Segment::Text(_) => None,
    })
  }

  /// Render the page, replacing each asset tag with its markup.
  pub fn render<F: PackagerFactory>(
    &self,
    context: &Context,
    env: &RenderEnv<'_, F>,
  ) -> Result<String, RenderError> {
    let mut output = String::new();
    for segment in &self.segments {
      match segment {
        Segment::Text(text) => output.push_str(text),
        Segment::Tag(tag) => output.push_str(&tag.render(context, env)?),
      }
    }
    Ok(output)
  }
}
