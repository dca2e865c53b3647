use std::{fmt, str::FromStr, sync::OnceLock};

use regex::Regex;

use crate::{errors::Error, Result};

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#[0289PYLQGRJCUV]{3,14}$").expect("valid regex"))
}

/// A normalized player/clan/war tag, always `#`-prefixed and upper-case.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(String);

impl Tag {
    /// Normalize user input: trim, upper-case, add a missing `#`, and read the
    /// letter `O` as the digit `0` (the game never uses `O` in tags).
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().to_uppercase().replace('O', "0");
        let normalized = if trimmed.starts_with('#') {
            trimmed
        } else {
            format!("#{trimmed}")
        };

        if !tag_re().is_match(&normalized) {
            return Err(Error::InvalidTag(raw.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Tag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
