use std::fmt;

use crate::{errors::Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP verb plus a path pattern with `{name}` placeholders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteTemplate {
    pub method: Method,
    pub pattern: &'static str,
}

impl RouteTemplate {
    pub const fn new(method: Method, pattern: &'static str) -> Self {
        Self { method, pattern }
    }

    pub const fn get(pattern: &'static str) -> Self {
        Self::new(Method::Get, pattern)
    }

    pub const fn post(pattern: &'static str) -> Self {
        Self::new(Method::Post, pattern)
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        let mut rest = self.pattern;
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                break;
            };
            out.push(&after[..close]);
            rest = &after[close + 1..];
        }
        out
    }

    /// Fill every placeholder from `args`, percent-encoding the substituted values.
    ///
    /// A placeholder with no matching argument is an error; unused arguments are ignored.
    pub fn resolve(&self, args: &[(&str, &str)]) -> Result<String> {
        let mut out = String::with_capacity(self.pattern.len() + 16);
        let mut rest = self.pattern;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| {
                Error::Route(format!("unterminated placeholder in {:?}", self.pattern))
            })?;
            let name = &after[..close];
            let value = args
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| *v)
                .ok_or_else(|| {
                    Error::Route(format!("missing argument {name:?} for {}", self.pattern))
                })?;
            out.push_str(&encode_path_value(value));
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

impl fmt::Display for RouteTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.pattern)
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set, so tags
/// (`#2PP`) land in a single path segment (`%232PP`).
pub fn encode_path_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 8);
    for b in value.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}
