//! Shell-style glob patterns translated into anchored regular expressions.
//!
//! Supported syntax:
//! - `*` matches any run of characters within one path segment
//! - `**` matches across segments when it forms a whole segment
//!   (`**/x`, `x/**/y`, `x/**`), including zero segments
//! - `?` matches exactly one character other than `/`
//! - `[abc]`, `[a-z]`, `[!abc]` character classes; negated classes never match `/`
//!
//! Literal runs of the pattern are regex-escaped before the translated tokens
//! are spliced in, so `.`, `+`, `(` and friends in a path are matched verbatim.

use regex_lite::Regex;
use thiserror::Error;

/// Errors from compiling a glob pattern.
#[derive(Debug, Error)]
pub enum GlobError {
    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex_lite::Error,
    },
}

/// A compiled glob pattern that matches whole paths.
#[derive(Debug, Clone)]
pub struct Glob {
    pattern: String,
    regex: Regex,
}

impl Glob {
    /// Compile a glob pattern.
    pub fn new(pattern: &str) -> Result<Self, GlobError> {
        let regex = Regex::new(&translate(pattern)).map_err(|source| GlobError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// The source pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether `path` matches the pattern end to end.
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// One-shot match of `path` against `pattern`.
///
/// An invalid pattern matches nothing.
pub fn glob_match(path: &str, pattern: &str) -> bool {
    Glob::new(pattern)
        .map(|glob| glob.is_match(path))
        .unwrap_or(false)
}

/// Escape a literal string so every character in it matches itself when used
/// inside a glob pattern.
pub fn escape_literal(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        match c {
            '*' | '?' | '[' => {
                out.push('[');
                out.push(c);
                out.push(']');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Translate a glob pattern into an anchored regular expression.
pub fn translate(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    let mut literal = String::new();
    let mut i = 0;

    out.push('^');
    while i < chars.len() {
        let rest = &chars[i..];
        match chars[i] {
            '/' if rest == ['/', '*', '*'] => {
                flush_literal(&mut out, &mut literal);
                out.push_str("(?:/.*)?");
                i += 3;
            }
            '/' if rest.starts_with(&['/', '*', '*', '/']) => {
                flush_literal(&mut out, &mut literal);
                out.push_str("/(?:.*/)?");
                i += 4;
            }
            '*' if i == 0 && rest.starts_with(&['*', '*', '/']) => {
                out.push_str("(?:.*/)?");
                i += 3;
            }
            '*' if i == 0 && rest == ['*', '*'] => {
                out.push_str(".*");
                i += 2;
            }
            '*' => {
                flush_literal(&mut out, &mut literal);
                while i < chars.len() && chars[i] == '*' {
                    i += 1;
                }
                out.push_str("[^/]*");
            }
            '?' => {
                flush_literal(&mut out, &mut literal);
                out.push_str("[^/]");
                i += 1;
            }
            '[' => match translate_class(rest) {
                Some((class, consumed)) => {
                    flush_literal(&mut out, &mut literal);
                    out.push_str(&class);
                    i += consumed;
                }
                None => {
                    literal.push('[');
                    i += 1;
                }
            },
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }
    flush_literal(&mut out, &mut literal);
    out.push('$');
    out
}

fn flush_literal(out: &mut String, literal: &mut String) {
    if !literal.is_empty() {
        out.push_str(&regex_lite::escape(literal));
        literal.clear();
    }
}

/// Translate a bracket expression starting at `chars[0] == '['`.
///
/// Returns the regex class and the number of pattern characters consumed, or
/// `None` if the bracket is never closed (it is then a literal `[`).
fn translate_class(chars: &[char]) -> Option<(String, usize)> {
    let mut i = 1;
    let negated = matches!(chars.get(i), Some('!') | Some('^'));
    if negated {
        i += 1;
    }
    let start = i;
    // A `]` right after the opening bracket is a member, not the terminator.
    if chars.get(i) == Some(&']') {
        i += 1;
    }
    while i < chars.len() && chars[i] != ']' {
        i += 1;
    }
    if i >= chars.len() {
        return None;
    }

    let mut class = String::from(if negated { "[^/" } else { "[" });
    for &c in &chars[start..i] {
        if matches!(c, '\\' | '[' | ']' | '^' | '&' | '~') {
            class.push('\\');
        }
        class.push(c);
    }
    class.push(']');
    Some((class, i + 1))
}
