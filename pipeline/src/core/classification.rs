//! Decoding of the branch classifier's reply into a [`BranchAnalysis`].

use crate::core::branch_name::{MAX_DESCRIPTION_LEN, sanitize_description};
use crate::core::reply::ReplyFields;
use crate::core::types::{BranchAnalysis, ChangeType};

impl BranchAnalysis {
    /// `max_len` is capped at [`MAX_DESCRIPTION_LEN`].
    pub fn new(change_type: ChangeType, is_trivial: bool, description: &str, max_len: usize) -> Self {
        let short_description = sanitize_description(description, max_len.min(MAX_DESCRIPTION_LEN));
        let prefix = change_type.branch_prefix().to_string();
        let suggested_name = format!("{prefix}/{short_description}");
        Self {
            change_type,
            is_trivial: is_trivial || change_type == ChangeType::Trivial,
            short_description,
            prefix,
            suggested_name,
        }
    }

    /// Analysis derived from the requirement text alone.
    pub fn from_requirement(requirement: &str, max_len: usize) -> Self {
        Self::new(ChangeType::default(), false, requirement, max_len)
    }
}

/// Decode the classifier reply.
///
/// Expected labels: `CHANGE_TYPE`, `TRIVIAL`, `SHORT_DESCRIPTION`. Missing
/// fields fall back to `feature`, non-trivial, and a slug of the requirement.
pub fn parse_branch_analysis(reply: &str, requirement: &str, max_len: usize) -> BranchAnalysis {
    let fields = ReplyFields::parse(reply);
    let change_type = fields
        .get("CHANGE_TYPE")
        .and_then(ChangeType::parse)
        .unwrap_or_default();
    let is_trivial = fields
        .bool("TRIVIAL")
        .or_else(|| fields.bool("IS_TRIVIAL"))
        .unwrap_or(false);
    let description = fields
        .get("SHORT_DESCRIPTION")
        .or_else(|| fields.get("DESCRIPTION"))
        .filter(|d| d.chars().any(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(requirement);
    BranchAnalysis::new(change_type, is_trivial, description, max_len)
}
