//! Route path templates (`/users/:id/posts/:post_id`)

use std::collections::HashSet;
use std::fmt;

use serde_json::{Map, Value};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
}

/// Parsed route path with `:name` parameter segments
///
/// Trailing slashes are not significant: `/hello/` and `/hello` match the same
/// template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse a template
    ///
    /// ```
    /// # use ferrule_contract::PathTemplate;
    /// let template = PathTemplate::parse("/users/:id").unwrap();
    /// assert_eq!(template.param_names(), vec!["id"]);
    /// assert!(PathTemplate::parse("users").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        if !raw.starts_with('/') {
            return Err(invalid("path must start with '/'"));
        }

        let mut segments = Vec::new();
        let mut seen = HashSet::new();
        for part in split_segments(raw) {
            if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err(invalid("parameter name must not be empty"));
                }
                if !seen.insert(name.to_string()) {
                    return Err(invalid(&format!("parameter ':{}' appears twice", name)));
                }
                segments.push(Segment::Param(name.to_string()));
            } else {
                segments.push(Segment::Static(part.to_string()));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// Template as declared
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Param(name) => Some(name.as_str()),
                Segment::Static(_) => None,
            })
            .collect()
    }

    /// Number of literal segments, used to prefer `/users/me` over `/users/:id`
    pub fn static_segments(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| matches!(segment, Segment::Static(_)))
            .count()
    }

    /// Match a request path, returning percent-decoded parameters on success
    pub fn matches(&self, path: &str) -> Option<Map<String, Value>> {
        let parts: Vec<&str> = split_segments(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = Map::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Static(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let decoded = urlencoding::decode(part).ok()?;
                    params.insert(name.clone(), Value::String(decoded.into_owned()));
                }
            }
        }

        Some(params)
    }

    /// Whether both templates could match the same request path
    ///
    /// Parameter segments act as wildcards, so `/users/:id` conflicts with
    /// `/users/:name` but not with `/users/:id/posts`.
    pub fn conflicts_with(&self, other: &PathTemplate) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| match (a, b) {
                    (Segment::Static(a), Segment::Static(b)) => a == b,
                    (Segment::Param(_), Segment::Param(_)) => true,
                    _ => false,
                })
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|part| !part.is_empty())
}
