// ============================
// crates/backend-lib/src/matcher.rs
// ============================
//! Ant-style URL path patterns.
//!
//! `?` matches one character, `*` zero or more characters within a path
//! segment, and `**` zero or more whole segments. Matching is case sensitive.

/// One `/`-separated piece of a pattern
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    AnyDepth,
    Literal(String),
    Glob(Vec<char>),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        if raw == "**" {
            Segment::AnyDepth
        } else if raw.contains(['*', '?']) {
            Segment::Glob(raw.chars().collect())
        } else {
            Segment::Literal(raw.to_string())
        }
    }

    fn matches(&self, segment: &str) -> bool {
        match self {
            Segment::AnyDepth => true,
            Segment::Literal(lit) => lit == segment,
            Segment::Glob(glob) => {
                let text: Vec<char> = segment.chars().collect();
                glob_match(glob, &text)
            },
        }
    }
}

/// A compiled ant-style pattern such as `/static/**` or `/admin/*.html`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AntPattern {
    source: String,
    segments: Vec<Segment>,
}

impl AntPattern {
    pub fn new(pattern: &str) -> Self {
        Self {
            source: pattern.to_string(),
            segments: split(pattern).map(Segment::parse).collect(),
        }
    }

    /// The pattern as written
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `path` (without query string) matches this pattern
    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = split(path).collect();
        match_segments(&self.segments, &parts)
    }
}

/// Whether any of `patterns` matches `path`
pub fn matches_any(patterns: &[AntPattern], path: &str) -> bool {
    patterns.iter().any(|p| p.matches(path))
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::AnyDepth, rest)) => {
            (0..=path.len()).any(|skip| match_segments(rest, &path[skip..]))
        },
        Some((segment, rest)) => match path.split_first() {
            Some((first, tail)) => segment.matches(first) && match_segments(rest, tail),
            None => false,
        },
    }
}

// Greedy wildcard match with single-star backtracking.
fn glob_match(pattern: &[char], text: &[char]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}
