use std::fmt;

use thiserror::Error;

use crate::error::Error;
use crate::refname;
use crate::transport::RemoteHead;

/// The two transfer directions a refspec (or a connection) can apply to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    Fetch,
    Push,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Fetch => write!(f, "fetch"),
            Direction::Push => write!(f, "push"),
        }
    }
}

/// An error which can be returned when parsing a refspec.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ParseRefspecError {
    /// Value being parsed is empty.
    #[error("cannot parse refspec from empty string")]
    Empty,

    /// More than one `:` separator.
    #[error("refspec contains more than one `:`")]
    ExtraColon,

    /// One side is not a valid reference name pattern. A pattern may contain
    /// at most one `*`, and only as its final character.
    #[error("invalid reference name pattern `{0}`")]
    InvalidPattern(String),

    /// One side is a wildcard pattern and the other is not.
    #[error("wildcard mismatch between source and destination")]
    WildcardMismatch,
}

impl From<ParseRefspecError> for Error {
    fn from(err: ParseRefspecError) -> Error {
        Error::InvalidSpec(err.to_string())
    }
}

/// A refspec describes how reference names on a peer map to reference names
/// in the local repository (or the other way around, for pushes): a source
/// pattern, an optional destination pattern, a direction, and a force flag.
///
/// A pattern is a *wildcard* iff it ends in `*`; a wildcard source and
/// destination must appear together.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Refspec {
    force: bool,
    src: String,
    dst: Option<String>,
    direction: Direction,
    text: String,
}

impl Refspec {
    /// Parse a refspec from its string form.
    pub fn parse(input: &str, direction: Direction) -> Result<Refspec, ParseRefspecError> {
        if input.is_empty() {
            return Err(ParseRefspecError::Empty);
        }

        let (force, rest) = match input.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, input),
        };

        let mut parts = rest.splitn(2, ':');
        let src = parts.next().unwrap_or("");
        let dst = match parts.next() {
            Some(d) if d.contains(':') => return Err(ParseRefspecError::ExtraColon),
            Some("") => None,
            Some(d) => Some(d.to_string()),
            None => None,
        };

        if src.is_empty() {
            // An empty source is a deletion and only makes sense pushing.
            if direction != Direction::Push || dst.is_none() {
                return Err(ParseRefspecError::InvalidPattern(String::new()));
            }
        } else {
            check_pattern(src)?;
        }

        if let Some(d) = &dst {
            check_pattern(d)?;
        }

        let src_wild = src.ends_with('*');
        let dst_wild = dst.as_deref().map_or(false, |d| d.ends_with('*'));
        match &dst {
            Some(_) if src_wild != dst_wild => return Err(ParseRefspecError::WildcardMismatch),
            None if src_wild && direction == Direction::Push => {
                return Err(ParseRefspecError::WildcardMismatch)
            }
            _ => {}
        }

        Ok(Refspec {
            force,
            src: src.to_string(),
            dst,
            direction,
            text: input.to_string(),
        })
    }

    /// The direction this refspec was configured for.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns true if updates through this refspec may discard history.
    pub fn force(&self) -> bool {
        self.force
    }

    /// The source pattern.
    pub fn src(&self) -> &str {
        &self.src
    }

    /// The destination pattern, if one was given.
    pub fn dst(&self) -> Option<&str> {
        self.dst.as_deref()
    }

    /// The literal string this refspec was parsed from.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Returns true if the source pattern ends in `*`.
    pub fn is_wildcard(&self) -> bool {
        self.src.ends_with('*')
    }

    /// Returns true if `name` matches the source pattern.
    pub fn src_matches(&self, name: &str) -> bool {
        pattern_matches(&self.src, name)
    }

    /// Returns true if `name` matches the destination pattern.
    pub fn dst_matches(&self, name: &str) -> bool {
        self.dst
            .as_deref()
            .map_or(false, |dst| pattern_matches(dst, name))
    }

    /// Map a name matching the source pattern to the destination namespace.
    pub fn transform(&self, name: &str) -> crate::Result<String> {
        let dst = self.dst.as_deref().ok_or_else(|| {
            Error::invalid_spec(format!("refspec `{}` has no destination", self.text))
        })?;

        if !self.is_wildcard() {
            return Ok(dst.to_string());
        }

        let prefix = &self.src[..self.src.len() - 1];
        if !name.starts_with(prefix) {
            return Err(Error::invalid_spec(format!(
                "`{}` does not match the source of refspec `{}`",
                name, self.text
            )));
        }

        Ok(format!("{}{}", &dst[..dst.len() - 1], &name[prefix.len()..]))
    }

    /// Map a name matching the destination pattern back to the source
    /// namespace.
    pub fn rtransform(&self, name: &str) -> crate::Result<String> {
        let dst = self.dst.as_deref().ok_or_else(|| {
            Error::invalid_spec(format!("refspec `{}` has no destination", self.text))
        })?;

        if !self.is_wildcard() {
            return Ok(self.src.clone());
        }

        let prefix = &dst[..dst.len() - 1];
        if !name.starts_with(prefix) {
            return Err(Error::invalid_spec(format!(
                "`{}` does not match the destination of refspec `{}`",
                name, self.text
            )));
        }

        Ok(format!(
            "{}{}",
            &self.src[..self.src.len() - 1],
            &name[prefix.len()..]
        ))
    }

    /// Resolve a shorthand source (one not under `refs/`) against the peer's
    /// advertisement, trying `refs/<s>`, `refs/heads/<s>`, and
    /// `refs/tags/<s>` in that order. Wildcard and fully-qualified refspecs
    /// are returned unchanged, as is a shorthand nothing advertised matches.
    pub(crate) fn dwim(&self, refs: &[RemoteHead]) -> Refspec {
        if self.direction == Direction::Push
            || self.is_wildcard()
            || self.src.is_empty()
            || self.src.starts_with("refs/")
        {
            return self.clone();
        }

        for prefix in &["refs/", "refs/heads/", "refs/tags/"] {
            let candidate = format!("{}{}", prefix, self.src);
            if refs.iter().any(|head| head.name == candidate) {
                let mut resolved = self.clone();
                resolved.src = candidate;
                resolved.text = resolved.render();
                return resolved;
            }
        }

        self.clone()
    }

    fn render(&self) -> String {
        let mut out = String::new();
        if self.force {
            out.push('+');
        }
        out.push_str(&self.src);
        if let Some(dst) = &self.dst {
            out.push(':');
            out.push_str(dst);
        }
        out
    }
}

impl fmt::Display for Refspec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn check_pattern(pattern: &str) -> Result<(), ParseRefspecError> {
    if pattern.contains('*') && !pattern.ends_with('*') {
        return Err(ParseRefspecError::InvalidPattern(pattern.to_string()));
    }

    if refname::is_valid_pattern(pattern) {
        Ok(())
    } else {
        Err(ParseRefspecError::InvalidPattern(pattern.to_string()))
    }
}

fn pattern_matches(pattern: &str, name: &str) -> bool {
    if pattern.ends_with('*') {
        name.starts_with(&pattern[..pattern.len() - 1])
    } else {
        pattern == name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid::Oid;

    fn head(name: &str) -> RemoteHead {
        RemoteHead {
            name: name.to_string(),
            oid: Oid::from_hex("3cd9329ac53613a0bfa198ae28f3af957e49573c").unwrap(),
            symref_target: None,
        }
    }

    #[test]
    fn parse_default_fetchspec() {
        let spec = Refspec::parse("+refs/heads/*:refs/remotes/origin/*", Direction::Fetch).unwrap();
        assert!(spec.force());
        assert!(spec.is_wildcard());
        assert_eq!(spec.src(), "refs/heads/*");
        assert_eq!(spec.dst(), Some("refs/remotes/origin/*"));
        assert_eq!(spec.as_str(), "+refs/heads/*:refs/remotes/origin/*");
        assert_eq!(spec.direction(), Direction::Fetch);
    }

    #[test]
    fn parse_single_sided() {
        let spec = Refspec::parse("refs/heads/master", Direction::Fetch).unwrap();
        assert!(!spec.force());
        assert!(!spec.is_wildcard());
        assert_eq!(spec.src(), "refs/heads/master");
        assert_eq!(spec.dst(), None);

        let spec = Refspec::parse("refs/heads/master:", Direction::Fetch).unwrap();
        assert_eq!(spec.dst(), None);
    }

    #[test]
    fn parse_push_delete() {
        let spec = Refspec::parse(":refs/heads/topic", Direction::Push).unwrap();
        assert_eq!(spec.src(), "");
        assert_eq!(spec.dst(), Some("refs/heads/topic"));
    }

    #[test]
    fn parse_errors() {
        assert_eq!(
            Refspec::parse("", Direction::Fetch).unwrap_err(),
            ParseRefspecError::Empty
        );
        assert_eq!(
            Refspec::parse("a:b:c", Direction::Fetch).unwrap_err(),
            ParseRefspecError::ExtraColon
        );
        assert_eq!(
            Refspec::parse(":refs/heads/topic", Direction::Fetch).unwrap_err(),
            ParseRefspecError::InvalidPattern(String::new())
        );
        assert_eq!(
            Refspec::parse("refs/heads/*:refs/remotes/origin/master", Direction::Fetch)
                .unwrap_err(),
            ParseRefspecError::WildcardMismatch
        );
        assert_eq!(
            Refspec::parse("refs/heads/master:refs/remotes/origin/*", Direction::Fetch)
                .unwrap_err(),
            ParseRefspecError::WildcardMismatch
        );
        assert_eq!(
            Refspec::parse("refs/he*ds/a:refs/remotes/o/*", Direction::Fetch).unwrap_err(),
            ParseRefspecError::InvalidPattern("refs/he*ds/a".to_string())
        );
        assert_eq!(
            Refspec::parse("refs/heads/a b", Direction::Fetch).unwrap_err(),
            ParseRefspecError::InvalidPattern("refs/heads/a b".to_string())
        );
    }

    #[test]
    fn matching() {
        let spec = Refspec::parse("+refs/heads/*:refs/remotes/origin/*", Direction::Fetch).unwrap();
        assert!(spec.src_matches("refs/heads/master"));
        assert!(spec.src_matches("refs/heads/topic/sub"));
        assert!(!spec.src_matches("refs/tags/v1.0"));
        assert!(spec.dst_matches("refs/remotes/origin/master"));
        assert!(!spec.dst_matches("refs/remotes/other/master"));

        let spec = Refspec::parse("refs/heads/master", Direction::Fetch).unwrap();
        assert!(spec.src_matches("refs/heads/master"));
        assert!(!spec.src_matches("refs/heads/master2"));
        assert!(!spec.dst_matches("refs/heads/master"));
    }

    #[test]
    fn transform() {
        let spec = Refspec::parse("+refs/heads/*:refs/remotes/origin/*", Direction::Fetch).unwrap();
        assert_eq!(
            spec.transform("refs/heads/master").unwrap(),
            "refs/remotes/origin/master"
        );
        assert_eq!(
            spec.rtransform("refs/remotes/origin/master").unwrap(),
            "refs/heads/master"
        );

        let err = spec.transform("refs/tags/v1.0").unwrap_err();
        assert!(err.to_string().contains("does not match the source"));

        let spec = Refspec::parse("refs/heads/a:refs/remotes/origin/b", Direction::Fetch).unwrap();
        assert_eq!(spec.transform("refs/heads/a").unwrap(), "refs/remotes/origin/b");
        assert_eq!(
            spec.rtransform("refs/remotes/origin/b").unwrap(),
            "refs/heads/a"
        );

        let spec = Refspec::parse("refs/heads/a", Direction::Fetch).unwrap();
        assert!(spec.transform("refs/heads/a").is_err());
    }

    #[test]
    fn dwim_shorthand() {
        let refs = vec![head("HEAD"), head("refs/heads/master"), head("refs/tags/v1.0")];

        let spec = Refspec::parse("master", Direction::Fetch).unwrap();
        let resolved = spec.dwim(&refs);
        assert_eq!(resolved.src(), "refs/heads/master");
        assert_eq!(resolved.as_str(), "refs/heads/master");

        let spec = Refspec::parse("v1.0", Direction::Fetch).unwrap();
        let resolved = spec.dwim(&refs);
        assert_eq!(resolved.src(), "refs/tags/v1.0");

        // Nothing advertised matches; carried through unchanged.
        let spec = Refspec::parse("topic", Direction::Fetch).unwrap();
        assert_eq!(spec.dwim(&refs), spec);

        // Qualified and wildcard specs are never rewritten.
        let spec = Refspec::parse("refs/heads/master", Direction::Fetch).unwrap();
        assert_eq!(spec.dwim(&refs), spec);
        let spec = Refspec::parse("+refs/heads/*:refs/remotes/o/*", Direction::Fetch).unwrap();
        assert_eq!(spec.dwim(&refs), spec);
    }

    #[test]
    fn dwim_keeps_destination() {
        let refs = vec![head("refs/heads/master")];
        let spec = Refspec::parse("+master:refs/remotes/origin/master", Direction::Fetch).unwrap();
        let resolved = spec.dwim(&refs);
        assert_eq!(resolved.src(), "refs/heads/master");
        assert_eq!(resolved.dst(), Some("refs/remotes/origin/master"));
        assert_eq!(resolved.as_str(), "+refs/heads/master:refs/remotes/origin/master");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        const PROPTEST_CASES: u32 = 64;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(PROPTEST_CASES))]

            #[test]
            fn transform_rtransform_inverse(name in "[a-z][a-z0-9]{0,12}(/[a-z][a-z0-9]{0,12}){0,2}") {
                let spec =
                    Refspec::parse("+refs/heads/*:refs/remotes/origin/*", Direction::Fetch).unwrap();
                let peer = format!("refs/heads/{}", name);
                let local = spec.transform(&peer).unwrap();
                prop_assert!(local.starts_with("refs/remotes/origin/"));
                prop_assert_eq!(spec.rtransform(&local).unwrap(), peer);
            }
        }
    }
}
