//! Detection of a "no issues found" review reply.
//!
//! A false positive ends the review loop early with problems left behind, so
//! natural-language phrases are only trusted in the closing paragraph and
//! only when nothing anywhere in the reply contradicts them. A missed clean
//! signal costs one extra iteration.

use std::sync::LazyLock;

use regex::Regex;

/// Marker the review prompt asks the agent to print on a clean review.
pub const NO_ISSUES_MARKER: &str = "NO_ISSUES_FOUND";

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[\s*_`>#-]*NO_ISSUES_FOUND[\s*_`.!]*$").expect("marker regex should compile")
});

static CLEAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(no (further |remaining |additional |other |new )?(issues|problems|changes)( were| are)? (found|detected|identified|needed|required|remain)|nothing (left |else )?to (fix|change|improve|address)|(code|implementation|changes) (look|looks) (good|clean|correct))\b",
    )
    .expect("clean regex should compile")
});

static CONTRADICTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(but|however|although|except|though|fixed|addressed|resolved|changed|updated|should|must|todo|remaining issues?)\b",
    )
    .expect("contradiction regex should compile")
});

/// True when the reply reports that the review found nothing to fix.
pub fn reports_no_issues(reply: &str) -> bool {
    if MARKER_RE.is_match(reply) {
        return true;
    }
    let Some(closing) = closing_paragraph(reply) else {
        return false;
    };
    CLEAN_RE.is_match(closing) && !CONTRADICTION_RE.is_match(reply)
}

fn closing_paragraph(reply: &str) -> Option<&str> {
    reply
        .trim_end()
        .rsplit("\n\n")
        .map(str::trim)
        .find(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_on_own_line_is_clean() {
        let reply = "Reviewed all modified files.\n\n**NO_ISSUES_FOUND**\n";
        assert!(reports_no_issues(reply));
    }

    #[test]
    fn marker_inside_sentence_is_not_trusted() {
        let reply = "I would print NO_ISSUES_FOUND but there is a bug in parse().";
        assert!(!reports_no_issues(reply));
    }

    #[test]
    fn plain_clean_phrase_is_clean() {
        assert!(reports_no_issues("I reviewed the diff.\n\nNo issues found."));
        assert!(reports_no_issues("No further changes are needed."));
        assert!(reports_no_issues("The implementation looks good."));
    }

    #[test]
    fn clean_phrase_with_contrast_is_not_clean() {
        assert!(!reports_no_issues(
            "No issues found in the parser, but the lexer leaks memory."
        ));
        assert!(!reports_no_issues(
            "The code looks good, however error handling should be tightened."
        ));
    }

    #[test]
    fn fixes_reported_are_not_clean() {
        assert!(!reports_no_issues(
            "I fixed 3 issues in src/lib.rs. No other problems found after that."
        ));
    }

    #[test]
    fn earlier_fix_report_overrides_clean_closing() {
        let reply = "I found and fixed a null dereference in parse().\n\nNo other issues found.";
        assert!(!reports_no_issues(reply));
        let reply = "Tightened the error path in load().\n\nUpdated the test.\n\nNo issues found.";
        assert!(!reports_no_issues(reply));
    }

    #[test]
    fn clean_phrase_only_counts_in_closing_paragraph() {
        let reply = "No issues found in module a.\n\nModule b has an off-by-one in the loop bound.";
        assert!(!reports_no_issues(reply));
    }

    #[test]
    fn issue_report_is_not_clean() {
        assert!(!reports_no_issues("Found 2 problems:\n- unused import\n- missing test"));
        assert!(!reports_no_issues(""));
    }
}
