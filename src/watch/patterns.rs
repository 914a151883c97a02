// src/watch/patterns.rs

use std::fmt;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::errors::{Result, WatchrunError};

/// An ordered list of compiled glob patterns.
///
/// Matching follows shell-like rules: `*` and `?` stay inside one path
/// component, `**` crosses directories and `{a,b}` selects alternatives.
/// A path starting with `./` is tried both as given and without the prefix,
/// so `*.go` matches `./main.go`.
#[derive(Clone)]
pub struct PatternSet {
    patterns: Vec<String>,
    set: GlobSet,
}

impl fmt::Debug for PatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.patterns).finish()
    }
}

impl PatternSet {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pat in patterns {
            let glob = GlobBuilder::new(pat)
                .literal_separator(true)
                .build()
                .map_err(|source| WatchrunError::Pattern {
                    pattern: pat.clone(),
                    source,
                })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|source| WatchrunError::Pattern {
            pattern: patterns.join(", "),
            source,
        })?;

        Ok(Self {
            patterns: patterns.to_vec(),
            set,
        })
    }

    /// The source patterns, in the order given.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether any pattern matches the forward-slash `path`.
    pub fn matches(&self, path: &str) -> bool {
        if self.set.is_match(path) {
            return true;
        }
        match path.strip_prefix("./") {
            Some(stripped) => self.set.is_match(stripped),
            None => false,
        }
    }
}

/// Trigger and ignore patterns, evaluated together.
///
/// Ignore patterns always take precedence: a path matching both lists is
/// ignored.
#[derive(Debug, Clone)]
pub struct MatchRules {
    patterns: PatternSet,
    ignores: PatternSet,
}

/// How a path relates to the configured rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// Matches an ignore pattern; never triggers and is never walked.
    Ignored,
    /// Matches a trigger pattern.
    Triggering,
    /// Neither.
    Unmatched,
}

impl MatchRules {
    pub fn new(patterns: &[String], ignores: &[String]) -> Result<Self> {
        Ok(Self {
            patterns: PatternSet::new(patterns)?,
            ignores: PatternSet::new(ignores)?,
        })
    }

    pub fn patterns(&self) -> &[String] {
        self.patterns.patterns()
    }

    pub fn ignores(&self) -> &[String] {
        self.ignores.patterns()
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignores.matches(path)
    }

    /// True if `path` matches a trigger pattern. Does not consult ignores.
    pub fn is_triggering(&self, path: &str) -> bool {
        self.patterns.matches(path)
    }

    pub fn classify(&self, path: &str) -> PathClass {
        if self.is_ignored(path) {
            PathClass::Ignored
        } else if self.is_triggering(path) {
            PathClass::Triggering
        } else {
            PathClass::Unmatched
        }
    }
}
