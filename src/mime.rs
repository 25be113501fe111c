//! Extension based MIME type guessing for asset tags.

use std::path::Path;

const KNOWN_TYPES: &[(&str, &str)] = &[
  ("css", "text/css"),
  ("js", "text/javascript"),
  ("mjs", "text/javascript"),
  ("json", "application/json"),
  ("coffee", "text/coffeescript"),
  ("ts", "text/typescript"),
  ("less", "text/less"),
  ("scss", "text/x-scss"),
  ("sass", "text/x-sass"),
  ("styl", "text/x-stylus"),
  ("html", "text/html"),
  ("jst", "text/html"),
  ("svg", "image/svg+xml"),
];

/// Guess the MIME type of `path` from its extension, falling back to `default`.
///
/// Query strings and fragments are ignored so that cache-busting URLs keep their type.
pub fn guess_type(path: &str, default: &str) -> String {
  let clean = path
    .split(['?', '#'])
    .next()
    .unwrap_or(path);

  Path::new(clean)
    .extension()
    .and_then(|ext| ext.to_str())
    .and_then(|ext| {
      KNOWN_TYPES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(ext))
    })
    .map_or_else(|| default.to_string(), |(_, mime)| (*mime).to_string())
}
