//! Path templates (`/pets/{id}`) compiled to anchored regular expressions

use std::collections::HashMap;

use percent_encoding::percent_decode_str;
use regex::Regex;

/// Capture used for a template variable without a usable pattern.
const DEFAULT_CAPTURE: &str = "[^/?#]+";

/// A compiled path template.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    template: String,
    names: Vec<String>,
    regex: Option<Regex>,
}

impl PathTemplate {
    /// Compile with the default capture for every variable.
    #[must_use]
    pub fn new(template: &str) -> Self {
        Self::with_patterns(template, &HashMap::new())
    }

    /// Compile, tightening the capture of each variable that has a schema
    /// `pattern`. An unusable pattern falls back to the default capture.
    #[must_use]
    pub fn with_patterns(template: &str, patterns: &HashMap<String, String>) -> Self {
        let mut names = Vec::new();
        let mut source = String::from("^");
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}').map(|i| open + i) else {
                break;
            };
            source.push_str(&regex::escape(&rest[..open]));
            let name = &rest[open + 1..close];
            let capture = patterns
                .get(name)
                .and_then(|pattern| tighten(name, pattern))
                .unwrap_or_else(|| DEFAULT_CAPTURE.to_string());
            source.push('(');
            source.push_str(&capture);
            source.push(')');
            names.push(name.to_string());
            rest = &rest[close + 1..];
        }
        source.push_str(&regex::escape(rest));
        source.push('$');

        let regex = match Regex::new(&source) {
            Ok(regex) => Some(regex),
            Err(e) => {
                tracing::warn!(template, error = %e, "path template does not compile, route disabled");
                None
            }
        };

        Self {
            template: template.to_string(),
            names,
            regex,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Variable names in template order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        !self.names.is_empty()
    }

    /// Match a request path, returning percent-decoded captures by name.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        let captures = self.regex.as_ref()?.captures(path)?;
        Some(
            self.names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let raw = captures.get(i + 1).map_or("", |m| m.as_str());
                    (name.clone(), percent_decode_str(raw).decode_utf8_lossy().into_owned())
                })
                .collect(),
        )
    }
}

/// Turn a schema `pattern` into a capture fragment: anchors stripped,
/// implicit wildcards made explicit, inner groups made non-capturing.
fn tighten(name: &str, pattern: &str) -> Option<String> {
    let mut body = pattern;
    let anchored_start = body.starts_with('^') || body.starts_with("\\A");
    if anchored_start {
        body = body.strip_prefix('^').or_else(|| body.strip_prefix("\\A")).unwrap_or(body);
    }
    let anchored_end = (body.ends_with('$') && !body.ends_with("\\$"))
        || body.ends_with("\\z")
        || body.ends_with("\\Z");
    if anchored_end {
        body = body
            .strip_suffix('$')
            .or_else(|| body.strip_suffix("\\z"))
            .or_else(|| body.strip_suffix("\\Z"))
            .unwrap_or(body);
    }

    let mut fragment = String::new();
    if !anchored_start {
        fragment.push_str("[^/?#]*?");
    }
    fragment.push_str("(?:");
    fragment.push_str(&non_capturing(body));
    fragment.push(')');
    if !anchored_end {
        fragment.push_str("[^/?#]*");
    }

    match Regex::new(&fragment) {
        Ok(_) => Some(fragment),
        Err(e) => {
            tracing::warn!(name, pattern, error = %e, "unusable path parameter pattern, using default capture");
            None
        }
    }
}

/// Rewrite capturing groups, named or not, as non-capturing ones.
fn non_capturing(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars().peekable();
    let mut in_class = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            '[' if !in_class => {
                in_class = true;
                out.push(c);
                // a leading `]` (or `^]`) is a literal member
                if chars.peek() == Some(&'^') {
                    out.push('^');
                    chars.next();
                }
                if chars.peek() == Some(&']') {
                    out.push(']');
                    chars.next();
                }
            }
            ']' if in_class => {
                in_class = false;
                out.push(c);
            }
            '(' if !in_class => {
                if chars.peek() != Some(&'?') {
                    out.push_str("(?:");
                    continue;
                }
                // `(?P<name>` and `(?<name>` are capturing too
                let lookahead: String = chars.clone().take(3).collect();
                let named = lookahead.starts_with("?P<")
                    || (lookahead.starts_with("?<")
                        && !lookahead.starts_with("?<=")
                        && !lookahead.starts_with("?<!"));
                if named {
                    for skipped in chars.by_ref() {
                        if skipped == '>' {
                            break;
                        }
                    }
                    out.push_str("(?:");
                } else {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}
