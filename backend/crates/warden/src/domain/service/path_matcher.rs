//! Path Matcher
//!
//! Ant-style matching of `/`-separated paths:
//! - `?` matches one character
//! - `*` matches zero or more characters within a segment
//! - `**` matches zero or more segments
//! - `{name}` / `{name:regex}` match a segment part and capture it
//!
//! Tokenized patterns and compiled segment matchers are cached until the
//! number of distinct entries reaches the configured threshold; from then on
//! the caches stay off for the lifetime of the matcher.

use dashmap::DashMap;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

/// Segment separator
pub const SEPARATOR: char = '/';

/// Default number of distinct cached patterns before caching switches off
pub const DEFAULT_CACHE_THRESHOLD: usize = 65536;

const DOUBLE_WILDCARD: &str = "**";
const WILDCARD_CHARS: [u8; 3] = [b'*', b'?', b'{'];

static GLOB_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\?|\*|\{((?:\{[^/]+?\}|[^/{}]|\\[{}])+?)\}").expect("glob pattern is valid")
});

/// Compiled form of one pattern segment
#[derive(Debug)]
enum SegmentMatcher {
    /// No wildcards or captures
    Exact(String),
    Pattern {
        regex: Regex,
        variable_names: Vec<String>,
    },
    /// Segment carried a capture regex that does not compile
    Invalid,
}

impl SegmentMatcher {
    fn compile(segment: &str, case_sensitive: bool) -> Self {
        let mut source = String::new();
        let mut variable_names = Vec::new();
        let mut end = 0;

        for caps in GLOB_PATTERN.captures_iter(segment) {
            let Some(whole) = caps.get(0) else { continue };
            source.push_str(&regex::escape(&segment[end..whole.start()]));

            match whole.as_str() {
                "?" => source.push('.'),
                "*" => source.push_str(".*"),
                var => {
                    let inner = &var[1..var.len() - 1];
                    match inner.split_once(':') {
                        None => {
                            source.push_str("((?s:.*))");
                            variable_names.push(inner.to_string());
                        }
                        Some((name, pattern)) => {
                            source.push('(');
                            source.push_str(pattern);
                            source.push(')');
                            variable_names.push(name.to_string());
                        }
                    }
                }
            }
            end = whole.end();
        }

        if end == 0 {
            return SegmentMatcher::Exact(segment.to_string());
        }
        source.push_str(&regex::escape(&segment[end..]));

        let flags = if case_sensitive { "" } else { "(?i)" };
        match Regex::new(&format!("{flags}^(?:{source})$")) {
            Ok(regex) => SegmentMatcher::Pattern {
                regex,
                variable_names,
            },
            Err(e) => {
                tracing::warn!(segment = %segment, error = %e, "Invalid path pattern segment, it will never match");
                SegmentMatcher::Invalid
            }
        }
    }

    fn matches(
        &self,
        candidate: &str,
        case_sensitive: bool,
        variables: Option<&mut HashMap<String, String>>,
    ) -> bool {
        match self {
            SegmentMatcher::Exact(raw) => {
                if case_sensitive {
                    raw == candidate
                } else {
                    raw.eq_ignore_ascii_case(candidate)
                }
            }
            SegmentMatcher::Pattern {
                regex,
                variable_names,
            } => {
                let Some(caps) = regex.captures(candidate) else {
                    return false;
                };
                if let Some(variables) = variables {
                    // Group 0 is the whole match
                    if caps.len() - 1 != variable_names.len() {
                        tracing::warn!(
                            pattern = %regex.as_str(),
                            "Capture groups do not line up with template variables, use non-capturing groups"
                        );
                    } else {
                        for (i, name) in variable_names.iter().enumerate() {
                            let value = caps.get(i + 1).map_or("", |m| m.as_str());
                            variables.insert(name.clone(), value.to_string());
                        }
                    }
                }
                true
            }
            SegmentMatcher::Invalid => false,
        }
    }
}

/// Ant-style path matcher with bounded caches
#[derive(Debug)]
pub struct PathMatcher {
    case_sensitive: bool,
    cache_threshold: usize,
    cache_disabled: AtomicBool,
    tokenized_cache: DashMap<String, Arc<[String]>>,
    matcher_cache: DashMap<String, Arc<SegmentMatcher>>,
}

impl Default for PathMatcher {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            cache_threshold: DEFAULT_CACHE_THRESHOLD,
            cache_disabled: AtomicBool::new(false),
            tokenized_cache: DashMap::with_capacity(256),
            matcher_cache: DashMap::with_capacity(256),
        }
    }
}

impl PathMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_cache_threshold(mut self, threshold: usize) -> Self {
        self.cache_threshold = threshold;
        self
    }

    /// Whether `path` contains wildcard or capture syntax
    pub fn is_pattern(path: &str) -> bool {
        let mut in_variable = false;
        for c in path.chars() {
            match c {
                '*' | '?' => return true,
                '{' => in_variable = true,
                '}' if in_variable => return true,
                _ => {}
            }
        }
        false
    }

    /// Full match of `path` against `pattern`
    pub fn matches(&self, pattern: &str, path: &str) -> bool {
        self.do_match(pattern, path, true, None)
    }

    /// Whether `pattern` could match some extension of `path`
    pub fn match_start(&self, pattern: &str, path: &str) -> bool {
        self.do_match(pattern, path, false, None)
    }

    /// Captured `{name}` values, or `None` when the path does not match
    pub fn extract_uri_template_variables(
        &self,
        pattern: &str,
        path: &str,
    ) -> Option<HashMap<String, String>> {
        let mut variables = HashMap::new();
        self.do_match(pattern, path, true, Some(&mut variables))
            .then_some(variables)
    }

    /// Whether the pattern caches have been switched off
    pub fn caching_disabled(&self) -> bool {
        self.cache_disabled.load(Ordering::Acquire)
    }

    fn do_match(
        &self,
        pattern: &str,
        path: &str,
        full_match: bool,
        mut variables: Option<&mut HashMap<String, String>>,
    ) -> bool {
        if path.starts_with(SEPARATOR) != pattern.starts_with(SEPARATOR) {
            return false;
        }

        let patt_dirs = self.tokenize_pattern(pattern);
        if full_match && self.case_sensitive && !is_potential_match(path, &patt_dirs) {
            return false;
        }
        let path_dirs = tokenize(path);

        let mut patt_start: isize = 0;
        let mut patt_end: isize = patt_dirs.len() as isize - 1;
        let mut path_start: isize = 0;
        let mut path_end: isize = path_dirs.len() as isize - 1;

        let patt = |i: isize| patt_dirs[i as usize].as_str();
        let seg = |i: isize| path_dirs[i as usize].as_str();

        // Front: everything up to the first `**`
        while patt_start <= patt_end && path_start <= path_end {
            let patt_dir = patt(patt_start);
            if patt_dir == DOUBLE_WILDCARD {
                break;
            }
            if !self.match_segment(patt_dir, seg(path_start), variables.as_deref_mut()) {
                return false;
            }
            patt_start += 1;
            path_start += 1;
        }

        if path_start > path_end {
            // Path exhausted: the rest of the pattern must be `**`s
            if patt_start > patt_end {
                return pattern.ends_with(SEPARATOR) == path.ends_with(SEPARATOR);
            }
            if !full_match {
                return true;
            }
            if patt_start == patt_end && patt(patt_start) == "*" && path.ends_with(SEPARATOR) {
                return true;
            }
            return (patt_start..=patt_end).all(|i| patt(i) == DOUBLE_WILDCARD);
        } else if patt_start > patt_end {
            // Pattern exhausted with path left over
            return false;
        } else if !full_match && patt(patt_start) == DOUBLE_WILDCARD {
            return true;
        }

        // Back: everything after the last `**`
        while patt_start <= patt_end && path_start <= path_end {
            let patt_dir = patt(patt_end);
            if patt_dir == DOUBLE_WILDCARD {
                break;
            }
            if !self.match_segment(patt_dir, seg(path_end), variables.as_deref_mut()) {
                return false;
            }
            patt_end -= 1;
            path_end -= 1;
        }

        if path_start > path_end {
            return (patt_start..=patt_end).all(|i| patt(i) == DOUBLE_WILDCARD);
        }

        // Middle: locate each run between consecutive `**`s
        while patt_start != patt_end && path_start <= path_end {
            let next_double = ((patt_start + 1)..=patt_end)
                .find(|&i| patt(i) == DOUBLE_WILDCARD)
                .unwrap_or(-1);

            if next_double == patt_start + 1 {
                // `**/**`, skip one
                patt_start += 1;
                continue;
            }

            let pat_len = next_double - patt_start - 1;
            let str_len = path_end - path_start + 1;
            let mut found: isize = -1;

            'window: for i in 0..=(str_len - pat_len) {
                for j in 0..pat_len {
                    let sub_pat = patt(patt_start + j + 1);
                    let sub_str = seg(path_start + i + j);
                    if !self.match_segment(sub_pat, sub_str, variables.as_deref_mut()) {
                        continue 'window;
                    }
                }
                found = path_start + i;
                break;
            }

            if found == -1 {
                return false;
            }

            patt_start = next_double;
            path_start = found + pat_len;
        }

        (patt_start..=patt_end).all(|i| patt(i) == DOUBLE_WILDCARD)
    }

    fn match_segment(
        &self,
        pattern: &str,
        candidate: &str,
        variables: Option<&mut HashMap<String, String>>,
    ) -> bool {
        self.segment_matcher(pattern)
            .matches(candidate, self.case_sensitive, variables)
    }

    fn tokenize_pattern(&self, pattern: &str) -> Arc<[String]> {
        if !self.caching_disabled() {
            if let Some(cached) = self.tokenized_cache.get(pattern) {
                return cached.clone();
            }
        }

        let tokenized: Arc<[String]> = tokenize(pattern).into();
        if !self.caching_disabled() {
            if self.tokenized_cache.len() >= self.cache_threshold {
                self.deactivate_cache();
            } else {
                self.tokenized_cache
                    .insert(pattern.to_string(), tokenized.clone());
            }
        }
        tokenized
    }

    fn segment_matcher(&self, segment: &str) -> Arc<SegmentMatcher> {
        if !self.caching_disabled() {
            if let Some(cached) = self.matcher_cache.get(segment) {
                return cached.clone();
            }
        }

        let compiled = Arc::new(SegmentMatcher::compile(segment, self.case_sensitive));
        if !self.caching_disabled() {
            if self.matcher_cache.len() >= self.cache_threshold {
                self.deactivate_cache();
            } else {
                self.matcher_cache
                    .insert(segment.to_string(), compiled.clone());
            }
        }
        compiled
    }

    fn deactivate_cache(&self) {
        if !self.cache_disabled.swap(true, Ordering::AcqRel) {
            tracing::warn!(
                threshold = self.cache_threshold,
                "Too many distinct path patterns, pattern cache disabled"
            );
        }
        self.tokenized_cache.clear();
        self.matcher_cache.clear();
    }
}

/// Split on the separator, dropping empty tokens
fn tokenize(path: &str) -> Vec<String> {
    path.split(SEPARATOR)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Cheap literal-prefix pre-check before the full match
fn is_potential_match(path: &str, patt_dirs: &[String]) -> bool {
    let path = path.as_bytes();
    let mut pos = 0;
    for patt_dir in patt_dirs {
        pos += skip_separator(path, pos);
        let skipped = skip_segment(path, pos, patt_dir.as_bytes());
        if skipped < patt_dir.len() {
            return skipped > 0
                || patt_dir
                    .as_bytes()
                    .first()
                    .is_some_and(|c| WILDCARD_CHARS.contains(c));
        }
        pos += skipped;
    }
    true
}

fn skip_segment(path: &[u8], pos: usize, prefix: &[u8]) -> usize {
    let mut skipped = 0;
    for &c in prefix {
        if WILDCARD_CHARS.contains(&c) {
            return skipped;
        }
        let curr = pos + skipped;
        if curr >= path.len() {
            return 0;
        }
        if c == path[curr] {
            skipped += 1;
        }
    }
    skipped
}

fn skip_separator(path: &[u8], pos: usize) -> usize {
    path.iter()
        .skip(pos)
        .take_while(|&&b| b == SEPARATOR as u8)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_wildcard_spans_segments() {
        let m = PathMatcher::new();
        assert!(m.matches("/a/**/b", "/a/x/y/b"));
        assert!(m.matches("/a/**/b", "/a/b"));
        assert!(m.matches("/pet/**", "/pet/cat/save"));
        assert!(m.matches("/pet/**", "/pet"));
        assert!(m.matches("/**", "/anything/at/all"));
        assert!(!m.matches("/a/**/b", "/a/x/y/c"));
    }

    #[test]
    fn test_single_wildcard_stays_in_segment() {
        let m = PathMatcher::new();
        assert!(!m.matches("/a/*/b", "/a/x/y/b"));
        assert!(m.matches("/a/*/b", "/a/x/b"));
        assert!(m.matches("/pet/cat/*", "/pet/cat/save"));
        assert!(m.matches("/*.html", "/index.html"));
        assert!(!m.matches("/*.html", "/index.htm"));
    }

    #[test]
    fn test_question_mark() {
        let m = PathMatcher::new();
        assert!(m.matches("/t?st", "/test"));
        assert!(!m.matches("/t?st", "/toast"));
    }

    #[test]
    fn test_middle_sliding_window() {
        let m = PathMatcher::new();
        assert!(m.matches("/**/x/y/**/end", "/a/b/x/y/c/end"));
        assert!(m.matches("/**/**/x", "/a/x"));
        assert!(!m.matches("/**/x/y/**/end", "/a/x/c/y/end"));
    }

    #[test]
    fn test_trailing_separator() {
        let m = PathMatcher::new();
        assert!(!m.matches("/a/", "/a"));
        assert!(!m.matches("/a", "/a/"));
        assert!(m.matches("/a/*", "/a/"));
        assert!(!m.matches("/a/*", "/a"));
        assert!(m.matches("/a/**", "/a/"));
    }

    #[test]
    fn test_leading_separator_must_agree() {
        let m = PathMatcher::new();
        assert!(!m.matches("a/b", "/a/b"));
        assert!(!m.matches("/a/b", "a/b"));
        assert!(m.matches("a/*", "a/b"));
    }

    #[test]
    fn test_capture_variables() {
        let m = PathMatcher::new();
        let vars = m.extract_uri_template_variables("/a/{id}", "/a/42").unwrap();
        assert_eq!(vars.get("id").map(String::as_str), Some("42"));

        let vars = m
            .extract_uri_template_variables("/kickout/{kind}/{id:[0-9a-f]+}", "/kickout/session/0af3")
            .unwrap();
        assert_eq!(vars["kind"], "session");
        assert_eq!(vars["id"], "0af3");

        assert!(m.extract_uri_template_variables("/a/{id:\\d+}", "/a/x1").is_none());
    }

    #[test]
    fn test_capture_with_suffix() {
        let m = PathMatcher::new();
        let vars = m
            .extract_uri_template_variables("/files/{name}.{ext}", "/files/report.pdf")
            .unwrap();
        assert_eq!(vars["name"], "report");
        assert_eq!(vars["ext"], "pdf");
    }

    #[test]
    fn test_case_insensitive() {
        let m = PathMatcher::new().case_sensitive(false);
        assert!(m.matches("/Pet/CAT", "/pet/cat"));
        assert!(m.matches("/pet/c*", "/PET/CAT"));
        assert!(!PathMatcher::new().matches("/Pet/CAT", "/pet/cat"));
    }

    #[test]
    fn test_invalid_capture_regex_never_matches() {
        let m = PathMatcher::new();
        assert!(!m.matches("/a/{id:[}", "/a/1"));
    }

    #[test]
    fn test_match_start() {
        let m = PathMatcher::new();
        assert!(m.match_start("/a/**/z", "/a/b"));
        assert!(m.match_start("/a/*/c", "/a/b"));
        assert!(!m.match_start("/a/b/c", "/x"));
    }

    #[test]
    fn test_is_pattern() {
        assert!(PathMatcher::is_pattern("/pet/**"));
        assert!(PathMatcher::is_pattern("/a/{id}"));
        assert!(!PathMatcher::is_pattern("/pet/cat"));
    }

    #[test]
    fn test_cache_turns_off_permanently() {
        let m = PathMatcher::new().with_cache_threshold(4);
        for i in 0..10 {
            assert!(m.matches(&format!("/p{i}/*"), &format!("/p{i}/x")));
        }
        assert!(m.caching_disabled());
        assert!(m.tokenized_cache.is_empty());
        assert!(m.matcher_cache.is_empty());

        // Still correct, still off
        assert!(m.matches("/p1/*", "/p1/y"));
        assert!(m.caching_disabled());
        assert!(m.tokenized_cache.is_empty());
    }

    #[test]
    fn test_inputs_are_not_mutated() {
        let m = PathMatcher::new();
        let pattern = String::from("/a/{id}");
        let path = String::from("/a/7");
        let _ = m.extract_uri_template_variables(&pattern, &path);
        assert_eq!(pattern, "/a/{id}");
        assert_eq!(path, "/a/7");
    }
}
