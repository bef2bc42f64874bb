//! The URL pipeline: canonicalization, `insteadof` rewriting, and proxy
//! resolution.

use std::env;

use regex::Regex;

use crate::config::{optional, ConfigStore};
use crate::error::{Error, Result};
use crate::refspec::Direction;
use crate::remote::Remote;

/// Validate a URL and normalize UNC paths (`\\host\share` becomes
/// `//host/share`, for compatibility with core git). No other rewriting
/// happens here.
pub(crate) fn canonicalize(url: &str) -> Result<String> {
    if url.is_empty() {
        return Err(Error::invalid_spec("cannot set empty URL"));
    }

    let bytes = url.as_bytes();
    if bytes.len() > 2
        && bytes[0] == b'\\'
        && bytes[1] == b'\\'
        && (bytes[2].is_ascii_alphanumeric())
    {
        return Ok(url.replace('\\', "/"));
    }

    Ok(url.to_string())
}

/// The fetch refspec a named remote is created with.
pub(crate) fn default_fetchspec_for_name(name: &str) -> String {
    format!("+refs/heads/*:refs/remotes/{}/*", name)
}

/// Rewrite `url` through the `url.<prefix>.insteadof` configuration (or
/// `pushinsteadof`, for pushes). Of all entries whose value is a prefix of
/// the URL, the longest one wins and its `<prefix>` replaces the matched
/// part; an equally long later entry does not displace an earlier one. A
/// URL nothing matches is returned unchanged.
pub(crate) fn apply_insteadof(
    config: &dyn ConfigStore,
    url: &str,
    direction: Direction,
) -> Result<String> {
    let pattern = match direction {
        Direction::Fetch => r"^url\.(.*)\.insteadof$",
        Direction::Push => r"^url\.(.*)\.pushinsteadof$",
    };

    // The pattern is a literal above, so compilation cannot fail here.
    let re = Regex::new(pattern)
        .map_err(|err| Error::invalid(format!("invalid configuration pattern: {}", err)))?;

    let mut replacement: Option<String> = None;
    let mut match_length = 0;

    for entry in config.entries_matching(pattern)? {
        if !url.starts_with(&entry.value) || entry.value.len() <= match_length {
            continue;
        }

        if let Some(captures) = re.captures(&entry.name) {
            if let Some(prefix) = captures.get(1) {
                match_length = entry.value.len();
                replacement = Some(prefix.as_str().to_string());
            }
        }
    }

    match replacement {
        Some(prefix) => Ok(format!("{}{}", prefix, &url[match_length..])),
        None => Ok(url.to_string()),
    }
}

impl<'r> Remote<'r> {
    /// The proxy URL the next connection should use, resolved from the most
    /// specific source available: `remote.<name>.proxy`, then `http.proxy`,
    /// then the `https_proxy`/`http_proxy` environment variables (lowercase
    /// before uppercase). Returns `None` when nothing is configured, or for
    /// a detached remote.
    pub fn http_proxy(&self, use_ssl: bool) -> Result<Option<String>> {
        let repo = match self.repo {
            Some(repo) => repo,
            None => return Ok(None),
        };

        let config = repo.config();

        if let Some(name) = self.name() {
            if let Some(proxy) = optional(config.get_string(&format!("remote.{}.proxy", name)))? {
                return Ok(Some(proxy));
            }
        }

        if let Some(proxy) = optional(config.get_string("http.proxy"))? {
            return Ok(Some(proxy));
        }

        let vars: [&str; 2] = if use_ssl {
            ["https_proxy", "HTTPS_PROXY"]
        } else {
            ["http_proxy", "HTTP_PROXY"]
        };

        for var in &vars {
            if let Ok(value) = env::var(var) {
                if !value.is_empty() {
                    return Ok(Some(value));
                }
            }
        }

        Ok(None)
    }
}
