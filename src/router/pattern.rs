use std::fmt::{self, Display};

use crate::error::{RouteError, UrlError};

/// Name a bare `*` binds under.
pub const DEFAULT_WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Static(String),
    Param(String),
    Wildcard(String),
}

/// A parsed route template such as `/users/:id/files/*path`.
///
/// `/` has no segments. A trailing slash yields a final empty static segment,
/// so `/users` and `/users/` are different patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    pub fn parse(raw: impl Into<String>) -> Result<Self, RouteError> {
        let raw = raw.into();
        let invalid = |reason| RouteError::InvalidPattern {
            pattern: raw.clone(),
            reason,
        };

        let Some(rest) = raw.strip_prefix('/') else {
            return Err(invalid("must start with '/'"));
        };

        let mut segments = vec![];
        if !rest.is_empty() {
            let parts: Vec<&str> = rest.split('/').collect();
            let last = parts.len() - 1;
            for (idx, part) in parts.into_iter().enumerate() {
                let segment = if let Some(name) = part.strip_prefix(':') {
                    if name.is_empty() {
                        return Err(invalid("empty parameter name"));
                    }
                    Segment::Param(name.to_owned())
                } else if let Some(name) = part.strip_prefix('*') {
                    if idx != last {
                        return Err(invalid("wildcard must be the last segment"));
                    }
                    let name = if name.is_empty() { DEFAULT_WILDCARD } else { name };
                    Segment::Wildcard(name.to_owned())
                } else {
                    Segment::Static(part.to_owned())
                };
                segments.push(segment);
            }
        }

        let mut names: Vec<&str> = vec![];
        for name in segments.iter().filter_map(Segment::binding) {
            if names.contains(&name) {
                return Err(invalid("parameter name used twice"));
            }
            names.push(name);
        }

        Ok(Self { raw, segments })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of values `build` expects.
    pub fn arity(&self) -> usize {
        self.segments.iter().filter_map(Segment::binding).count()
    }

    /// Substitutes `args` into the parameter and wildcard slots in order.
    pub fn build(&self, name: &str, args: &[&str]) -> Result<String, UrlError> {
        let expected = self.arity();
        if args.len() != expected {
            return Err(UrlError::ArgCount {
                name: name.to_owned(),
                expected,
                got: args.len(),
            });
        }

        let mut url = String::with_capacity(self.raw.len() + args.iter().map(|a| a.len()).sum::<usize>());
        let mut args = args.iter();
        for segment in &self.segments {
            url.push('/');
            match segment {
                Segment::Static(s) => url.push_str(s),
                Segment::Param(param) => {
                    let arg = args.next().copied().unwrap_or_default();
                    if arg.is_empty() {
                        return Err(UrlError::EmptyArg {
                            name: name.to_owned(),
                            param: param.clone(),
                        });
                    }
                    url.push_str(arg);
                }
                Segment::Wildcard(_) => url.push_str(args.next().copied().unwrap_or_default()),
            }
        }
        if url.is_empty() {
            url.push('/');
        }
        Ok(url)
    }
}

impl Segment {
    fn binding(&self) -> Option<&str> {
        match self {
            Segment::Static(_) => None,
            Segment::Param(name) | Segment::Wildcard(name) => Some(name),
        }
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
