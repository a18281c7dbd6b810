//! Branch-name derivation and validation (spec §4.1 `createBranch` /
//! §4.6 `launch`/`hotfix`): a closed set of workflow-prefixed, slug-bodied
//! names, the same "generate it, don't ask for it" posture the teacher uses
//! for its own branch helpers in `tools/branch_create.rs`.

use std::sync::OnceLock;

use regex::Regex;

/// Longest a branch name this crate will create or accept is allowed to be.
pub const MAX_BRANCH_NAME_LEN: usize = 80;

/// Matches the closed prefix catalogue plus a lowercase kebab slug body.
/// Lazily compiled on first use and shared across every caller, the same
/// `OnceLock`-backed static pattern the teacher's CLI argument parsing uses
/// for its own repeated regex checks.
pub struct BranchNameRegex(OnceLock<Regex>);

impl BranchNameRegex {
    const fn new() -> Self {
        Self(OnceLock::new())
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.0
            .get_or_init(|| {
                Regex::new(r"^(feature|bugfix|hotfix|release|chore|docs|test|refactor)/[a-z0-9]+(-[a-z0-9]+)*$")
                    .expect("static branch name pattern is valid")
            })
            .is_match(name)
    }
}

pub static BRANCH_NAME_RE: BranchNameRegex = BranchNameRegex::new();

pub fn is_valid_branch_name(name: &str) -> bool {
    name.len() <= MAX_BRANCH_NAME_LEN && BRANCH_NAME_RE.is_match(name)
}

/// Slugifies free text into the `[a-z0-9]+(-[a-z0-9]+)*` body a branch name
/// needs, truncating on a word boundary rather than mid-word.
pub fn slugify(text: &str) -> String {
    let mut words = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            current.push(ch.to_ascii_lowercase());
        } else if !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words.join("-")
}

/// Builds `<prefix>/<slug>`, truncated to [`MAX_BRANCH_NAME_LEN`] on a
/// hyphen boundary so the result never ends mid-word and never fails
/// [`is_valid_branch_name`] on length alone.
pub fn derive_branch_name(prefix: &str, description: &str) -> String {
    let slug = slugify(description);
    let budget = MAX_BRANCH_NAME_LEN.saturating_sub(prefix.len() + 1);
    let truncated = truncate_on_word_boundary(&slug, budget);
    format!("{prefix}/{truncated}")
}

fn truncate_on_word_boundary(slug: &str, budget: usize) -> String {
    if slug.len() <= budget {
        return slug.to_string();
    }
    let mut cut = budget;
    while cut > 0 && !slug.is_char_boundary(cut) {
        cut -= 1;
    }
    let candidate = &slug[..cut];
    match candidate.rfind('-') {
        Some(idx) if idx > 0 => candidate[..idx].to_string(),
        _ => candidate.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_prefixes() {
        assert!(is_valid_branch_name("feature/add-login"));
        assert!(is_valid_branch_name("hotfix/fix-crash-on-boot"));
        assert!(!is_valid_branch_name("wip/whatever"));
        assert!(!is_valid_branch_name("feature/Add-Login"));
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Fix the Login Bug!!"), "fix-the-login-bug");
    }

    #[test]
    fn derive_truncates_on_word_boundary() {
        let long = "a ".repeat(60) + "final-word-that-should-be-dropped-entirely-if-over-budget";
        let name = derive_branch_name("feature", &long);
        assert!(name.len() <= MAX_BRANCH_NAME_LEN);
        assert!(!name.ends_with('-'));
        assert!(is_valid_branch_name(&name));
    }

    #[test]
    fn derive_short_description_round_trips() {
        let name = derive_branch_name("feature", "Add login form");
        assert_eq!(name, "feature/add-login-form");
    }
}
