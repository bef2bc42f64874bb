//! Validation of reference names.
//!
//! Peers advertise arbitrary byte strings as reference names; anything that
//! does not satisfy these rules is skipped before it can reach local
//! storage. The rules are the usual ones for a loose reference file name:
//! names are slash-separated non-empty segments with a restricted character
//! set. Pattern names additionally permit a single `*`.

use std::result::Result;

/// Reasons why a given string can not be accepted as a reference name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RefnameError {
    EmptyName,
    EmptySegment,
    LeadingSlash,
    TrailingSlash,
    BadSegmentStart,
    BadSegmentEnd,
    DotDot,
    AtBrace,
    LockSuffix,
    InvalidChar(char),
    StrayWildcard,
}

/// Returns true if `name` is acceptable as a concrete reference name.
pub fn is_valid(name: &str) -> bool {
    check(name, false).is_ok()
}

/// Returns true if `name` is acceptable as a reference name pattern
/// (at most one `*` permitted).
pub fn is_valid_pattern(name: &str) -> bool {
    check(name, true).is_ok()
}

pub(crate) fn check(name: &str, allow_pattern: bool) -> Result<(), RefnameError> {
    if name.is_empty() {
        return Err(RefnameError::EmptyName);
    }
    if name.starts_with('/') {
        return Err(RefnameError::LeadingSlash);
    }
    if name.ends_with('/') {
        return Err(RefnameError::TrailingSlash);
    }
    if name.contains("..") {
        return Err(RefnameError::DotDot);
    }
    if name.contains("@{") {
        return Err(RefnameError::AtBrace);
    }

    let mut wildcards = 0;
    for segment in name.split('/') {
        check_segment(segment)?;
        wildcards += segment.matches('*').count();
    }

    match wildcards {
        0 => Ok(()),
        1 if allow_pattern => Ok(()),
        _ => Err(RefnameError::StrayWildcard),
    }
}

fn check_segment(segment: &str) -> Result<(), RefnameError> {
    if segment.is_empty() {
        return Err(RefnameError::EmptySegment);
    }
    if segment.starts_with('.') {
        return Err(RefnameError::BadSegmentStart);
    }
    if segment.ends_with('.') {
        return Err(RefnameError::BadSegmentEnd);
    }
    if segment.ends_with(".lock") {
        return Err(RefnameError::LockSuffix);
    }

    for c in segment.chars() {
        match c {
            '\0'..='\x1f' | '\x7f' => return Err(RefnameError::InvalidChar(c)),
            ' ' | '~' | '^' | ':' | '?' | '[' | '\\' => return Err(RefnameError::InvalidChar(c)),
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names() {
        assert!(is_valid("HEAD"));
        assert!(is_valid("refs/heads/master"));
        assert!(is_valid("refs/heads/topic/sub"));
        assert!(is_valid("refs/tags/v1.0"));
        assert!(is_valid("refs/remotes/origin/HEAD"));
    }

    #[test]
    fn rejects_structure() {
        assert_eq!(check("", false).unwrap_err(), RefnameError::EmptyName);
        assert_eq!(
            check("/refs/heads/a", false).unwrap_err(),
            RefnameError::LeadingSlash
        );
        assert_eq!(
            check("refs/heads/a/", false).unwrap_err(),
            RefnameError::TrailingSlash
        );
        assert_eq!(
            check("refs//heads", false).unwrap_err(),
            RefnameError::EmptySegment
        );
        assert_eq!(
            check("refs/heads/a..b", false).unwrap_err(),
            RefnameError::DotDot
        );
        assert_eq!(
            check("refs/heads/.hidden", false).unwrap_err(),
            RefnameError::BadSegmentStart
        );
        assert_eq!(
            check("refs/heads/a.", false).unwrap_err(),
            RefnameError::BadSegmentEnd
        );
        assert_eq!(
            check("refs/heads/a.lock", false).unwrap_err(),
            RefnameError::LockSuffix
        );
        assert_eq!(
            check("refs/heads/a@{1}", false).unwrap_err(),
            RefnameError::AtBrace
        );
    }

    #[test]
    fn rejects_characters() {
        assert_eq!(
            check("refs/heads/a b", false).unwrap_err(),
            RefnameError::InvalidChar(' ')
        );
        assert_eq!(
            check("refs/tags/v1.0^{}", false).unwrap_err(),
            RefnameError::InvalidChar('^')
        );
        assert_eq!(
            check("refs/heads/a:b", false).unwrap_err(),
            RefnameError::InvalidChar(':')
        );
        assert_eq!(
            check("refs/heads/a?b", false).unwrap_err(),
            RefnameError::InvalidChar('?')
        );
        assert_eq!(
            check("refs/heads/a\x01", false).unwrap_err(),
            RefnameError::InvalidChar('\x01')
        );
    }

    #[test]
    fn patterns() {
        assert!(!is_valid("refs/heads/*"));
        assert!(is_valid_pattern("refs/heads/*"));
        assert!(is_valid_pattern("refs/heads/master"));
        assert_eq!(
            check("refs/*/heads/*", true).unwrap_err(),
            RefnameError::StrayWildcard
        );
    }
}
