//! # Paths Module
//!
//! Derives cache file names from image titles and source URLs.
//!
//! ## Rules
//! - The extension is taken from the last segment of the URL path
//!   (query string and fragment are ignored)
//! - The title is trimmed, then every run of characters that are not a
//!   letter, digit, or underscore collapses into a single `_`
//! - The result is always a single file name directly inside the base
//!   directory, whatever the title or URL contains
//!
//! ## Example
//! ```rust
//! use apod_cache::core::paths::derive_path;
//! use std::path::Path;
//!
//! let path = derive_path(
//!     Path::new("/cache"),
//!     "NGC #3521: Galaxy in a Bubble",
//!     "https://apod.nasa.gov/apod/image/2205/NGC3521LRGBHaAPOD-20.jpg",
//! );
//! assert_eq!(path, Path::new("/cache/NGC_3521_Galaxy_in_a_Bubble.jpg"));
//! ```

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use url::Url;

/// Stem used when a title normalizes to nothing
pub const FALLBACK_STEM: &str = "untitled";

/// Upper bound on the normalized stem, in UTF-8 bytes.
///
/// File systems limit names to 255 bytes; the rest is left for a
/// disambiguating suffix and the extension.
pub const MAX_STEM_BYTES: usize = 200;

/// Longer URL extensions are dropped rather than kept
pub const MAX_EXTENSION_LEN: usize = 16;

static NON_WORD_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}_]+").expect("pattern is valid"));

/// Full cache path for an image: `base / normalized_title[.ext]`
pub fn derive_path(base: &Path, title: &str, source_url: &str) -> PathBuf {
    base.join(file_name(&normalize_title(title), &extension_of(source_url)))
}

/// Like [`derive_path`] but with `_<suffix>` appended to the stem.
///
/// Used when two different images share a title and so would otherwise
/// share a file name.
pub fn derive_path_with_suffix(base: &Path, title: &str, source_url: &str, suffix: &str) -> PathBuf {
    let stem = format!("{}_{}", normalize_title(title), normalize_title(suffix));
    base.join(file_name(&stem, &extension_of(source_url)))
}

/// Normalize a title into a file stem.
///
/// Never returns an empty string and never contains a path separator or dot.
pub fn normalize_title(title: &str) -> String {
    let collapsed = NON_WORD_RUN.replace_all(title.trim(), "_");
    let stem = truncate_on_char_boundary(&collapsed, MAX_STEM_BYTES);

    if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem.to_string()
    }
}

fn truncate_on_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Extension of the file a URL points at, without the dot.
///
/// Returns an empty string when the last path segment has no extension or
/// when the candidate contains anything but ASCII letters and digits.
pub fn extension_of(source_url: &str) -> String {
    let path = match Url::parse(source_url) {
        Ok(url) => url.path().to_string(),
        // Relative references carry no scheme; strip query and fragment by hand
        Err(_) => source_url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let last_segment = path.rsplit('/').next().unwrap_or_default();
    match last_segment.rsplit_once('.') {
        Some((_, ext))
            if !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_string()
        }
        _ => String::new(),
    }
}

fn file_name(stem: &str, extension: &str) -> String {
    if extension.is_empty() {
        stem.to_string()
    } else {
        format!("{stem}.{extension}")
    }
}
