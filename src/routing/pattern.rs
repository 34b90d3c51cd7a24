//! Glob patterns for hosts and paths.
//!
//! A pattern is a list of segments split on a separator (`.` for hosts, `/`
//! for paths). Each segment is one of:
//! - a literal (`png`)
//! - `*`, exactly one segment
//! - `**`, zero or more segments
//! - a literal with in-segment `*` wildcards (`*.png`, `api-*`)
//!
//! Matching uses the greedy star/backtrack walk at both levels, so the cost
//! is bounded by `pattern.len() * input.len()` and never depends on regex
//! state.

use std::fmt;

/// Which kind of string a pattern applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Host,
    Path,
}

impl PatternKind {
    fn separator(self) -> char {
        match self {
            PatternKind::Host => '.',
            PatternKind::Path => '/',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    AnyOne,
    AnyMany,
    Wildcard(String),
}

impl Segment {
    fn matches(&self, input: &str) -> bool {
        match self {
            Segment::Literal(lit) => lit == input,
            Segment::AnyOne => true,
            Segment::AnyMany => true,
            Segment::Wildcard(pattern) => wildcard_match(pattern.as_bytes(), input.as_bytes()),
        }
    }
}

/// A compiled host or path pattern.
#[derive(Clone, PartialEq, Eq)]
pub struct GlobPattern {
    source: String,
    kind: PatternKind,
    segments: Vec<Segment>,
}

impl GlobPattern {
    /// Compile a host pattern. Hosts are matched case-insensitively.
    pub fn host(pattern: &str) -> Result<Self, String> {
        let normalized = pattern.trim().trim_end_matches('.').to_ascii_lowercase();
        if normalized.is_empty() {
            return Err("pattern is empty".into());
        }
        let segments = normalized
            .split('.')
            .map(|label| {
                if label.is_empty() {
                    return Err("empty label".to_string());
                }
                if let Some(c) = label
                    .chars()
                    .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '*')))
                {
                    return Err(format!("unexpected character {c:?}"));
                }
                compile_segment(label)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: pattern.to_string(),
            kind: PatternKind::Host,
            segments,
        })
    }

    /// Compile a path pattern. Paths are matched case-sensitively.
    pub fn path(pattern: &str) -> Result<Self, String> {
        let Some(rest) = pattern.strip_prefix('/') else {
            return Err("must start with '/'".into());
        };
        if let Some(c) = pattern
            .chars()
            .find(|c| c.is_whitespace() || c.is_control() || matches!(c, '?' | '#'))
        {
            return Err(format!("unexpected character {c:?}"));
        }
        let segments = rest
            .split('/')
            .map(compile_segment)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: pattern.to_string(),
            kind: PatternKind::Path,
            segments,
        })
    }

    /// The pattern text as it was written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match an input. Hosts must already be lowercased and stripped of port.
    pub fn matches(&self, input: &str) -> bool {
        let input = match self.kind {
            PatternKind::Host => input,
            PatternKind::Path => match input.strip_prefix('/') {
                Some(rest) => rest,
                None => return false,
            },
        };
        let parts: Vec<&str> = input.split(self.kind.separator()).collect();
        match_segments(&self.segments, &parts)
    }
}

impl fmt::Debug for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:?})", self.kind, self.source)
    }
}

fn compile_segment(segment: &str) -> Result<Segment, String> {
    match segment {
        "*" => Ok(Segment::AnyOne),
        "**" => Ok(Segment::AnyMany),
        s if s.contains("**") => Err(format!("'**' must be a whole segment, got {s:?}")),
        s if s.contains('*') => Ok(Segment::Wildcard(s.to_string())),
        s => Ok(Segment::Literal(s.to_string())),
    }
}

fn match_segments(pattern: &[Segment], input: &[&str]) -> bool {
    let (mut p, mut i) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while i < input.len() {
        if p < pattern.len() {
            if pattern[p] == Segment::AnyMany {
                backtrack = Some((p, i));
                p += 1;
                continue;
            }
            if pattern[p].matches(input[i]) {
                p += 1;
                i += 1;
                continue;
            }
        }
        match backtrack {
            Some((star_p, star_i)) => {
                p = star_p + 1;
                i = star_i + 1;
                backtrack = Some((star_p, star_i + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|s| *s == Segment::AnyMany)
}

fn wildcard_match(pattern: &[u8], input: &[u8]) -> bool {
    let (mut p, mut i) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while i < input.len() {
        if p < pattern.len() {
            if pattern[p] == b'*' {
                backtrack = Some((p, i));
                p += 1;
                continue;
            }
            if pattern[p] == input[i] {
                p += 1;
                i += 1;
                continue;
            }
        }
        match backtrack {
            Some((star_p, star_i)) => {
                p = star_p + 1;
                i = star_i + 1;
                backtrack = Some((star_p, star_i + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|b| *b == b'*')
}
