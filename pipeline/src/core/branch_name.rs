//! Branch-name rules: sanitizing, validation, collision avoidance, and the
//! similarity heuristics used by branch management.

use std::collections::HashSet;

use anyhow::{Result, bail};

/// Branches treated as unsafe to work on directly.
pub const DEFAULT_PROTECTED_BRANCHES: [&str; 4] = ["main", "master", "develop", "dev"];
/// Upper bound on the short description part of a branch name.
pub const DEFAULT_MAX_DESCRIPTION_LEN: usize = 40;
/// Upper bound on a whole branch name accepted for creation.
pub const MAX_BRANCH_NAME_LEN: usize = 100;
/// Longest `<prefix>/` any change type produces.
const LONGEST_PREFIX_LEN: usize = "refactor/".len();
/// Room for a collision suffix such as `-12`.
const SUFFIX_HEADROOM: usize = 8;
/// Largest description bound that still yields creatable branch names.
pub const MAX_DESCRIPTION_LEN: usize = MAX_BRANCH_NAME_LEN - LONGEST_PREFIX_LEN - SUFFIX_HEADROOM;

const FALLBACK_DESCRIPTION: &str = "update";
const MIN_KEYWORD_LEN: usize = 3;
const STOPWORDS: [&str; 12] = [
    "add", "the", "and", "for", "with", "from", "into", "update", "new", "use", "make", "fix",
];

/// Branch placement settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchPolicy {
    pub protected: Vec<String>,
    pub max_description_len: usize,
}

impl Default for BranchPolicy {
    fn default() -> Self {
        Self {
            protected: DEFAULT_PROTECTED_BRANCHES
                .iter()
                .map(|b| b.to_string())
                .collect(),
            max_description_len: DEFAULT_MAX_DESCRIPTION_LEN,
        }
    }
}

impl BranchPolicy {
    pub fn is_protected(&self, branch: &str) -> bool {
        self.protected.iter().any(|p| p == branch)
    }
}

/// Reduce free text to a lowercase `[a-z0-9-]` slug of at most `max_len`
/// bytes, cutting at a hyphen when possible. Never returns an empty string.
pub fn sanitize_description(text: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    let max_len = max_len.max(1);
    let truncated = if slug.len() > max_len {
        let head = &slug[..max_len];
        match head.rfind('-') {
            Some(cut) if cut > 0 => &head[..cut],
            _ => head,
        }
    } else {
        slug
    };
    let truncated = truncated.trim_end_matches('-');
    if truncated.is_empty() {
        FALLBACK_DESCRIPTION.to_string()
    } else {
        truncated.to_string()
    }
}

/// Reject names git would refuse or that could be read as options.
///
/// Only `[A-Za-z0-9._/-]` is allowed, the name must start with an
/// alphanumeric character, and git's structural rules (`..`, `//`, `.lock`,
/// trailing `/` or `.`) are enforced.
pub fn validate_branch_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("branch name must not be empty");
    }
    if name.len() > MAX_BRANCH_NAME_LEN {
        bail!("branch name longer than {MAX_BRANCH_NAME_LEN} characters: '{name}'");
    }
    if !name.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        bail!("branch name must start with a letter or digit: '{name}'");
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-')))
    {
        bail!("branch name contains disallowed character {bad:?}: '{name}'");
    }
    if name.contains("..") || name.contains("//") || name.contains("/.") {
        bail!("branch name has an invalid path sequence: '{name}'");
    }
    if name.ends_with('/') || name.ends_with('.') || name.ends_with(".lock") {
        bail!("branch name has an invalid ending: '{name}'");
    }
    Ok(())
}

/// Return `base` if it is free, else `base-2`, `base-3`, ... until free.
///
/// The suffix counter only grows and `existing` is finite, so this always
/// terminates after at most `existing.len() + 1` candidates.
pub fn unique_branch_name(base: &str, existing: &HashSet<String>) -> String {
    if !existing.contains(base) {
        return base.to_string();
    }
    let mut suffix = 2usize;
    loop {
        let candidate = format!("{base}-{suffix}");
        if !existing.contains(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

/// Strip a leading remote name (`origin/feature/x` → `feature/x`).
pub fn strip_remote(branch: &str, remotes: &[&str]) -> String {
    for remote in remotes {
        if let Some(rest) = branch.strip_prefix(remote).and_then(|r| r.strip_prefix('/')) {
            return rest.to_string();
        }
    }
    branch.to_string()
}

/// Branches whose name looks like it covers the same work as `keyword`.
///
/// A candidate matches when its last path segment contains the keyword, is
/// contained in it, or when the whole candidate ends with it. Comparison is
/// case-insensitive; tiny segments are ignored to avoid noise.
pub fn find_similar_branches(keyword: &str, candidates: &[String]) -> Vec<String> {
    let keyword = keyword.trim().to_ascii_lowercase();
    if keyword.len() < MIN_KEYWORD_LEN {
        return Vec::new();
    }
    candidates
        .iter()
        .filter(|candidate| {
            let lower = candidate.to_ascii_lowercase();
            let tail = lower.rsplit('/').next().unwrap_or(&lower);
            lower.ends_with(&keyword)
                || tail.contains(&keyword)
                || (tail.len() >= MIN_KEYWORD_LEN * 2 && keyword.contains(tail))
        })
        .cloned()
        .collect()
}

/// Meaningful words of a branch name (prefix excluded).
pub fn keywords(branch: &str) -> Vec<String> {
    let tail = branch.split_once('/').map_or(branch, |(_, rest)| rest);
    tail.split(|c: char| !c.is_ascii_alphanumeric())
        .map(str::to_ascii_lowercase)
        .filter(|w| w.len() >= MIN_KEYWORD_LEN && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// True when `current` shares a prefix or a keyword with `suggested`.
pub fn branch_matches(current: &str, suggested: &str) -> bool {
    let prefix = |name: &str| name.split_once('/').map(|(p, _)| p.to_ascii_lowercase());
    if let (Some(a), Some(b)) = (prefix(current), prefix(suggested))
        && a == b
    {
        return true;
    }
    let current_words: HashSet<String> = keywords(current).into_iter().collect();
    keywords(suggested)
        .iter()
        .any(|word| current_words.contains(word))
}
