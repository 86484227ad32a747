//! Glob patterns for source sets and watch subscriptions.
//!
//! Supported syntax, matched against `/`-separated relative paths:
//! - `*` any run of characters within one path segment
//! - `**` any number of whole segments (including none)
//! - `?` one character within a segment
//! - `{a,b}` alternation (no nesting)
//!
//! Patterns are compiled to an anchored [`Regex`] once, at registration time.

use std::fmt;
use std::path::Path;

use regex::Regex;

use crate::util::slash_path;

#[derive(Clone)]
pub struct Glob {
    pattern: String,
    regex: Regex,
}

impl Glob {
    pub fn new(pattern: &str) -> anyhow::Result<Self> {
        let regex = Regex::new(&translate(pattern)?)
            .map_err(|e| anyhow::anyhow!("Invalid glob '{}': {}", pattern, e))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Match a `/`-separated relative path.
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match a filesystem path, normalizing separators first.
    pub fn matches_path(&self, path: &Path) -> bool {
        self.is_match(&slash_path(path))
    }
}

impl fmt::Debug for Glob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Glob").field(&self.pattern).finish()
    }
}

impl PartialEq for Glob {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

fn translate(pattern: &str) -> anyhow::Result<String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::from("^");
    let mut in_group = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' if chars.get(i + 1) == Some(&'*') => {
                let at_segment_start = i == 0 || chars[i - 1] == '/';
                match chars.get(i + 2) {
                    Some('/') if at_segment_start => {
                        // `**/` matches zero or more leading segments
                        out.push_str("(?:[^/]+/)*");
                        i += 3;
                    }
                    None if at_segment_start => {
                        out.push_str(".*");
                        i += 2;
                    }
                    _ => {
                        out.push_str("[^/]*");
                        i += 2;
                    }
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '{' => {
                if in_group {
                    anyhow::bail!("Nested braces are not supported in glob '{}'", pattern);
                }
                in_group = true;
                out.push_str("(?:");
            }
            '}' if in_group => {
                in_group = false;
                out.push(')');
            }
            ',' if in_group => out.push('|'),
            // tolerate stray spaces inside braces, e.g. `{png, svg}`
            ' ' if in_group => {}
            other => out.push_str(&regex::escape(&other.to_string())),
        }
        i += 1;
    }

    if in_group {
        anyhow::bail!("Unclosed brace in glob '{}'", pattern);
    }
    out.push('$');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g(p: &str) -> Glob {
        Glob::new(p).unwrap()
    }

    #[test]
    fn star_stays_within_segment() {
        let glob = g("*.css");
        assert!(glob.is_match("main.css"));
        assert!(!glob.is_match("vendors/reset.css"));
        assert!(!glob.is_match("main.css.map"));
    }

    #[test]
    fn double_star_spans_segments() {
        let glob = g("styles/**/*.css");
        assert!(glob.is_match("styles/main.css"));
        assert!(glob.is_match("styles/a/b/c.css"));
        assert!(!glob.is_match("scripts/main.css"));
    }

    #[test]
    fn trailing_double_star_matches_everything_below() {
        let glob = g("fonts/**");
        assert!(glob.is_match("fonts/a.woff"));
        assert!(glob.is_match("fonts/x/y.ttf"));
        assert!(!glob.is_match("images/a.png"));
    }

    #[test]
    fn braces_alternate() {
        let glob = g("**/*.{png,jpg, ico}");
        assert!(glob.is_match("logo.png"));
        assert!(glob.is_match("a/b/photo.jpg"));
        assert!(glob.is_match("favicon.ico"));
        assert!(!glob.is_match("a.gif"));
    }

    #[test]
    fn question_mark_matches_one_char() {
        let glob = g("a?.js");
        assert!(glob.is_match("ab.js"));
        assert!(!glob.is_match("abc.js"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let glob = g("a+b.(x).css");
        assert!(glob.is_match("a+b.(x).css"));
        assert!(!glob.is_match("aab.x.css"));
    }

    #[test]
    fn unbalanced_braces_are_rejected() {
        assert!(Glob::new("*.{png").is_err());
        assert!(Glob::new("{a,{b}}").is_err());
    }

    #[test]
    fn matches_path_normalizes_separators() {
        let glob = g("scripts/vendors/**/*.js");
        let path = Path::new("scripts").join("vendors").join("jquery.js");
        assert!(glob.matches_path(&path));
    }
}
