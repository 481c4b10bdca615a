use regex::RegexSet;
use thiserror::Error;

/// Patterns rejected before a snippet is transpiled
pub const DEFAULT_DENYLIST: &[&str] = &[r"eval\(", r"fetch\("];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("code contains disallowed commands (matched `{pattern}`)")]
pub struct PolicyViolation {
    pub pattern: String,
}

/// Textual denylist check.
///
/// This is a weak, purely lexical filter: it looks at the raw source before
/// transpilation, so a disallowed call spelled differently (`window["ev" +
/// "al"]`, whitespace before the parenthesis) is not caught. The runtime's
/// lack of any such bindings is what actually keeps snippets contained.
#[derive(Debug, Clone)]
pub struct CodeValidator {
    patterns: Vec<String>,
    set: RegexSet,
}

impl CodeValidator {
    /// Validator with the default denylist
    pub fn new() -> Self {
        let set = RegexSet::new(DEFAULT_DENYLIST).expect("default denylist patterns must compile");
        Self {
            patterns: DEFAULT_DENYLIST.iter().map(|p| p.to_string()).collect(),
            set,
        }
    }

    /// Default denylist plus extra patterns (e.g. from configuration)
    pub fn with_extra_patterns<I, S>(extra: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns: Vec<String> = DEFAULT_DENYLIST.iter().map(|p| p.to_string()).collect();
        for pattern in extra {
            let pattern = pattern.as_ref();
            if !patterns.iter().any(|p| p == pattern) {
                patterns.push(pattern.to_string());
            }
        }
        let set = RegexSet::new(&patterns)?;
        Ok(Self { patterns, set })
    }

    /// False when any denylisted pattern occurs in `source`
    pub fn is_valid(&self, source: &str) -> bool {
        !self.set.is_match(source)
    }

    /// Like [`is_valid`](Self::is_valid) but names the first matching pattern
    pub fn check(&self, source: &str) -> Result<(), PolicyViolation> {
        match self.set.matches(source).iter().next() {
            Some(index) => Err(PolicyViolation {
                pattern: self.patterns[index].clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for CodeValidator {
    fn default() -> Self {
        Self::new()
    }
}
