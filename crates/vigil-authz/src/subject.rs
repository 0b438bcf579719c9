//! Claim matching against authorization subject expressions.

use std::collections::HashSet;

/// True when the claim set satisfies the subject expression.
///
/// The expression is a disjunction of lines; a line matches when every one
/// of its tags is present in the claim set. Empty lines never match — an
/// all-empty expression is the administrative placeholder state and grants
/// nothing.
pub fn subject_matches(subject: &[Vec<String>], claims: &HashSet<&str>) -> bool {
    subject
        .iter()
        .filter(|line| !line.is_empty())
        .any(|line| line.iter().all(|tag| claims.contains(tag.as_str())))
}
