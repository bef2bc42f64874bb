//! Fetch negotiation support: option types and the computation of which
//! objects to request from (and admit to) the peer.

use crate::error::Result;
use crate::oid::Oid;
use crate::refname;
use crate::refspec::{Direction, Refspec};
use crate::repo::Repo;
use crate::transport::{ProxyOptions, RemoteHead};

/// How a fetch decides whether to prune afterwards.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FetchPrune {
    /// Defer to the remote's configuration (`remote.<name>.prune`, falling
    /// back to `fetch.prune`).
    Unspecified,
    On,
    Off,
}

/// Tag auto-following policy.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AutotagOption {
    /// Defer to the remote's configuration.
    Unspecified,

    /// Follow tags whose objects are downloaded anyway, without clobbering
    /// existing local tags.
    Auto,

    /// Don't fetch any tags.
    None,

    /// Fetch every advertised tag.
    All,
}

/// Options controlling a single fetch (or download) operation.
#[derive(Clone, Debug)]
pub struct FetchOptions {
    pub prune: FetchPrune,
    pub update_fetchhead: bool,
    pub download_tags: AutotagOption,
    pub proxy: ProxyOptions,
    pub custom_headers: Vec<String>,
}

impl Default for FetchOptions {
    fn default() -> FetchOptions {
        FetchOptions {
            prune: FetchPrune::Unspecified,
            update_fetchhead: true,
            download_tags: AutotagOption::Unspecified,
            proxy: ProxyOptions::default(),
            custom_headers: Vec::new(),
        }
    }
}

/// Compute the negotiation inputs: `wants` are advertised tips the local
/// object database is missing and the refspecs (or tag policy) ask for;
/// `haves` are the tips of every local reference.
pub(crate) fn wants_and_haves(
    repo: &dyn Repo,
    refs: &[RemoteHead],
    active: &[Refspec],
    passive: &[Refspec],
    tagopt: AutotagOption,
) -> Result<(Vec<Oid>, Vec<Oid>)> {
    let mut wants = Vec::new();

    for head in refs {
        if !refname::is_valid(&head.name) {
            continue;
        }

        let is_tag = head.name.starts_with("refs/tags/");
        let matched = active
            .iter()
            .chain(passive.iter())
            .filter(|spec| spec.direction() == Direction::Fetch)
            .any(|spec| spec.src_matches(&head.name));

        let wanted = match tagopt {
            AutotagOption::All => matched || is_tag,
            AutotagOption::None => matched && !is_tag,
            _ => matched,
        };

        if wanted && !head.oid.is_zero() && !repo.odb().exists(&head.oid) {
            wants.push(head.oid);
        }
    }

    wants.sort();
    wants.dedup();

    let mut haves = Vec::new();
    for name in repo.refs().names()? {
        if let Ok(id) = repo.refs().name_to_id(&name) {
            haves.push(id);
        }
    }

    haves.sort();
    haves.dedup();

    Ok((wants, haves))
}
