//! Extension allow-list
//!
//! Decides which file names may be listed, uploaded or downloaded, based on
//! `*.ext` patterns.

use std::collections::HashSet;

use crate::error::FilterError;

/// Patterns allowed when no allow-list is configured.
pub const DEFAULT_ALLOWED_EXTENSIONS: &str = "*.txt, *.md, *.csv, *.rtf, *.pdf, *.doc, *.docx, \
     *.xls, *.xlsx, *.ppt, *.pptx, *.odt, *.ods, *.odp, \
     *.png, *.jpg, *.jpeg, *.gif, *.bmp, *.svg, *.webp, *.ico, *.tif, *.tiff, \
     *.zip, *.rar, *.7z, *.gz, *.tar, *.bz2";

/// Immutable allow-list of file extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    patterns: Vec<String>,
    extensions: HashSet<String>,
    any_extension: bool,
}

impl ExtensionFilter {
    /// Parse a comma-separated pattern list such as `"*.png, *.jpg"`.
    ///
    /// `*.*` (or `*`) admits any name that carries an extension.
    pub fn parse(allow_list: &str) -> Result<Self, FilterError> {
        let patterns: Vec<&str> = allow_list
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        Self::from_patterns(&patterns)
    }

    /// Build a filter from individual patterns.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, FilterError> {
        if patterns.is_empty() {
            return Err(FilterError::Empty);
        }

        let mut filter = Self {
            patterns: Vec::with_capacity(patterns.len()),
            extensions: HashSet::new(),
            any_extension: false,
        };

        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            match pattern {
                "*" | "*.*" => filter.any_extension = true,
                _ => {
                    let extension = pattern
                        .strip_prefix("*.")
                        .filter(|ext| is_plain_extension(ext))
                        .ok_or_else(|| FilterError::MalformedPattern(pattern.to_string()))?;
                    filter.extensions.insert(extension.to_lowercase());
                }
            }
            filter.patterns.push(pattern.to_string());
        }

        Ok(filter)
    }

    /// Configured patterns, in their original order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether `file_name` carries an allowed extension.
    ///
    /// The extension is whatever follows the last `.`; names without one are
    /// never allowed.
    pub fn is_allowed(&self, file_name: &str) -> bool {
        match extension_of(file_name) {
            Some(extension) => {
                self.any_extension || self.extensions.contains(&extension.to_lowercase())
            }
            None => false,
        }
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        // The built-in list is well formed; fall back to allowing nothing if
        // it ever stops parsing.
        Self::parse(DEFAULT_ALLOWED_EXTENSIONS).unwrap_or_else(|_| Self {
            patterns: Vec::new(),
            extensions: HashSet::new(),
            any_extension: false,
        })
    }
}

fn extension_of(file_name: &str) -> Option<&str> {
    file_name
        .rsplit_once('.')
        .map(|(_, extension)| extension)
        .filter(|extension| !extension.is_empty())
}

fn is_plain_extension(extension: &str) -> bool {
    !extension.is_empty()
        && extension
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}
