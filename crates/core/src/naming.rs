//! Source → destination repository name translation.

use std::fmt;

use serde::Serialize;

use crate::errors::TranslationError;

/// A destination repository name. Only [`NameTranslator`] builds these, so
/// every value satisfies the destination naming rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DestinationName(String);

impl DestinationName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DestinationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DestinationName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Deterministic, pure mapping from source names to destination names.
///
/// `123_build_tool` becomes `bb_build_tool_123` and `Payments API` becomes
/// `bb_payments_api` with the default prefix.
#[derive(Debug, Clone)]
pub struct NameTranslator {
    prefix: String,
    separator: char,
}

impl Default for NameTranslator {
    fn default() -> Self {
        Self::new("bb")
    }
}

impl NameTranslator {
    pub const DEFAULT_SEPARATOR: char = '_';

    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            separator: Self::DEFAULT_SEPARATOR,
        }
    }

    pub fn translate(&self, source_name: &str) -> Result<DestinationName, TranslationError> {
        let sep = self.separator;
        let mut tokens: Vec<String> = source_name
            .split(|c: char| c == sep || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(normalize_token)
            .collect();

        if tokens.is_empty() {
            return Err(TranslationError::Degenerate(source_name.to_string()));
        }

        // A leading job number moves to the end.
        if tokens.len() > 1 && tokens[0].bytes().all(|b| b.is_ascii_digit()) {
            let number = tokens.remove(0);
            tokens.push(number);
        }

        let sep_str = sep.to_string();
        let body = tokens.join(&sep_str);
        let name = if self.prefix.is_empty() {
            body
        } else {
            format!("{}{}{}", normalize_token(&self.prefix), sep, body)
        };
        Ok(DestinationName(name))
    }
}

/// Lowercase and replace anything outside `[a-z0-9._-]` with `-`.
fn normalize_token(token: &str) -> String {
    token
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '.' | '_' | '-' => c,
            _ => '-',
        })
        .collect()
}
