//! The principal entity: a named (or anonymous) peer repository and the
//! operations that talk to it.

use crate::callbacks::{Callbacks, DefaultCallbacks};
use crate::config::{optional, ConfigStore};
use crate::error::{Error, Result};
use crate::fetch::{AutotagOption, FetchOptions};
use crate::push::{Push, PushOptions};
use crate::refspec::{Direction, Refspec};
use crate::repo::Repo;
use crate::transport::{
    FdWait, ProxyOptions, RemoteHead, TransferProgress, Transport,
};

mod connect;
mod fetch;
mod frames;
mod persist;
mod push;
mod tips;
mod url;

pub use persist::{
    add_fetch, add_push, delete, list, rename, set_autotag, set_pushurl, set_url,
};

use frames::Frame;

/// Options accepted by [`Remote::create_with_opts`].
#[derive(Default)]
pub struct CreateOptions<'r> {
    /// The repository to bind the remote to; absent for a detached remote.
    pub repo: Option<&'r dyn Repo>,

    /// The name to create the remote under; absent for an anonymous remote.
    pub name: Option<String>,

    /// A fetch refspec to install instead of the default one.
    pub fetchspec: Option<String>,

    /// Do not rewrite the URL through `url.*.insteadof` configuration.
    pub skip_insteadof: bool,

    /// Do not install the default fetch refspec for a named remote.
    pub skip_default_fetchspec: bool,
}

/// A remote tracks a peer repository: its URLs, the refspecs describing
/// what to exchange, and, while an operation is running, the connection
/// state and pending continuations.
///
/// A remote is *idle* when no continuations are pending and *busy*
/// otherwise; starting a second operation on a busy remote fails. All
/// operations leave the remote idle again, whether they succeed or fail.
pub struct Remote<'r> {
    name: Option<String>,
    repo: Option<&'r dyn Repo>,
    url: Option<String>,
    pushurl: Option<String>,
    refspecs: Vec<Refspec>,
    active_refspecs: Vec<Refspec>,
    passive_refspecs: Vec<Refspec>,
    refs: Vec<RemoteHead>,
    download_tags: AutotagOption,
    prune_refs: bool,
    transport: Option<Box<dyn Transport + 'r>>,
    connect_transport: Option<Box<dyn Transport + 'r>>,
    callbacks: Box<dyn Callbacks + 'r>,
    proxy: ProxyOptions,
    custom_headers: Vec<String>,
    frames: Vec<Frame<'r>>,
    io_wait: Option<FdWait>,
    stats: TransferProgress,
    passed_refspecs: bool,
    direction: Direction,
    resolved_url: Option<String>,
    requested_refspecs: Vec<String>,
    reflog_message: Option<String>,
    fetch_opts: FetchOptions,
    push_opts: PushOptions,
    push: Option<Push>,
}

impl<'r> std::fmt::Debug for Remote<'r> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Remote")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("pushurl", &self.pushurl)
            .finish_non_exhaustive()
    }
}

impl<'r> Remote<'r> {
    fn empty(repo: Option<&'r dyn Repo>, name: Option<String>) -> Remote<'r> {
        Remote {
            name,
            repo,
            url: None,
            pushurl: None,
            refspecs: Vec::new(),
            active_refspecs: Vec::new(),
            passive_refspecs: Vec::new(),
            refs: Vec::new(),
            download_tags: AutotagOption::Unspecified,
            prune_refs: false,
            transport: None,
            connect_transport: None,
            callbacks: Box::new(DefaultCallbacks),
            proxy: ProxyOptions::default(),
            custom_headers: Vec::new(),
            frames: Vec::new(),
            io_wait: None,
            stats: TransferProgress::default(),
            passed_refspecs: false,
            direction: Direction::Fetch,
            resolved_url: None,
            requested_refspecs: Vec::new(),
            reflog_message: None,
            fetch_opts: FetchOptions::default(),
            push_opts: PushOptions::default(),
            push: None,
        }
    }

    /// Create a remote, with control over every aspect of the process.
    ///
    /// Fails with an invalid-spec error for an empty URL or a bad name,
    /// with an exists error when `opts.repo` already has a remote called
    /// `opts.name`, and with whatever the configuration store reports
    /// otherwise.
    pub fn create_with_opts(url: &str, opts: CreateOptions<'r>) -> Result<Remote<'r>> {
        if let Some(name) = &opts.name {
            ensure_valid_name(name)?;

            if let Some(repo) = opts.repo {
                ensure_does_not_exist(repo, name)?;
            }
        }

        let canonical = url::canonicalize(url)?;

        let snapshot = match opts.repo {
            Some(repo) => Some(repo.config().snapshot()?),
            None => None,
        };

        let mut remote = Remote::empty(opts.repo, opts.name.clone());

        remote.url = Some(match &snapshot {
            Some(config) if !opts.skip_insteadof => {
                url::apply_insteadof(config.as_ref(), &canonical, Direction::Fetch)?
            }
            _ => canonical.clone(),
        });

        if let (Some(repo), Some(name)) = (opts.repo, &opts.name) {
            repo.config()
                .set_string(&format!("remote.{}.url", name), &canonical)?;
        }

        let fetchspec = match (&opts.fetchspec, &opts.name) {
            (Some(spec), _) => Some(spec.clone()),
            (None, Some(name)) if !opts.skip_default_fetchspec => {
                Some(url::default_fetchspec_for_name(name))
            }
            _ => None,
        };

        if let Some(text) = fetchspec {
            remote
                .refspecs
                .push(Refspec::parse(&text, Direction::Fetch)?);

            if let (Some(repo), Some(name)) = (opts.repo, &opts.name) {
                persist::write_add_refspec(repo, name, &text, Direction::Fetch)?;

                if let Some(config) = &snapshot {
                    remote.prune_refs = lookup_prune_config(config.as_ref(), name)?;
                }
            }

            remote.active_refspecs = dwim_refspecs(&remote.refspecs, &remote.refs);
        }

        // A remote without a name doesn't download tags.
        remote.download_tags = if remote.name.is_some() {
            AutotagOption::Auto
        } else {
            AutotagOption::None
        };

        Ok(remote)
    }

    /// Create a named remote with the default fetch refspec and persist it
    /// in the repository's configuration.
    pub fn create(repo: &'r dyn Repo, name: &str, url: &str) -> Result<Remote<'r>> {
        ensure_valid_name(name)?;

        // The URL is validated and canonicalized once, inside
        // create_with_opts.
        Remote::create_with_opts(
            url,
            CreateOptions {
                repo: Some(repo),
                name: Some(name.to_string()),
                ..CreateOptions::default()
            },
        )
    }

    /// Create a named remote with a custom fetch refspec in place of the
    /// default one.
    pub fn create_with_fetchspec(
        repo: &'r dyn Repo,
        name: &str,
        url: &str,
        fetchspec: &str,
    ) -> Result<Remote<'r>> {
        ensure_valid_name(name)?;

        Remote::create_with_opts(
            url,
            CreateOptions {
                repo: Some(repo),
                name: Some(name.to_string()),
                fetchspec: Some(fetchspec.to_string()),
                skip_default_fetchspec: true,
                ..CreateOptions::default()
            },
        )
    }

    /// Create a remote bound to a repository but not persisted in its
    /// configuration.
    pub fn create_anonymous(repo: &'r dyn Repo, url: &str) -> Result<Remote<'r>> {
        Remote::create_with_opts(
            url,
            CreateOptions {
                repo: Some(repo),
                ..CreateOptions::default()
            },
        )
    }

    /// Create a remote from a raw URL with no repository binding. A
    /// detached remote can connect and list, but cannot persist anything:
    /// fetching, pushing, and updating tips all require a repository.
    pub fn create_detached(url: &str) -> Result<Remote<'static>> {
        Remote::create_with_opts(url, CreateOptions::default())
    }

    /// Load a remote from the repository's configuration.
    pub fn lookup(repo: &'r dyn Repo, name: &str) -> Result<Remote<'r>> {
        ensure_valid_name(name)?;

        let config = repo.config().snapshot()?;

        let mut remote = Remote::empty(Some(repo), Some(name.to_string()));
        remote.download_tags = AutotagOption::Auto;

        let url = optional(config.get_string(&format!("remote.{}.url", name)))?;
        let pushurl = optional(config.get_string(&format!("remote.{}.pushurl", name)))?;

        if url.is_none() && pushurl.is_none() {
            return Err(Error::not_found(format!(
                "remote '{}' does not exist",
                name
            )));
        }

        if let Some(url) = url.filter(|u| !u.is_empty()) {
            remote.url = Some(url::apply_insteadof(
                config.as_ref(),
                &url,
                Direction::Fetch,
            )?);
        }

        if let Some(pushurl) = pushurl.filter(|u| !u.is_empty()) {
            remote.pushurl = Some(url::apply_insteadof(
                config.as_ref(),
                &pushurl,
                Direction::Push,
            )?);
        }

        for text in config.get_all(&format!("remote.{}.fetch", name))? {
            remote
                .refspecs
                .push(Refspec::parse(&text, Direction::Fetch)?);
        }

        for text in config.get_all(&format!("remote.{}.push", name))? {
            remote
                .refspecs
                .push(Refspec::parse(&text, Direction::Push)?);
        }

        if let Some(tagopt) = optional(config.get_string(&format!("remote.{}.tagopt", name)))? {
            match tagopt.as_str() {
                "--no-tags" => remote.download_tags = AutotagOption::None,
                "--tags" => remote.download_tags = AutotagOption::All,
                _ => {}
            }
        }

        remote.prune_refs = lookup_prune_config(config.as_ref(), name)?;
        remote.active_refspecs = dwim_refspecs(&remote.refspecs, &remote.refs);

        Ok(remote)
    }

    /// Copy the configuration-derived parts of a remote. Connection state,
    /// pending continuations, and per-call scratch are not copied.
    pub fn dup(&self) -> Result<Remote<'r>> {
        let mut remote = Remote::empty(self.repo, self.name.clone());

        remote.url = self.url.clone();
        remote.pushurl = self.pushurl.clone();
        remote.download_tags = self.download_tags;
        remote.prune_refs = self.prune_refs;

        for spec in &self.refspecs {
            remote
                .refspecs
                .push(Refspec::parse(spec.as_str(), spec.direction())?);
        }

        Ok(remote)
    }

    /// The remote's name, if it has one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The remote's fetch URL, after insteadof rewriting.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// The remote's push URL, if one is configured. Pushing falls back to
    /// [`Remote::url`] when this is absent.
    pub fn pushurl(&self) -> Option<&str> {
        self.pushurl.as_deref()
    }

    /// The configured tag-following policy.
    pub fn autotag(&self) -> AutotagOption {
        self.download_tags
    }

    /// Whether a fetch prunes stale remote-tracking references by default.
    pub fn prune_refs(&self) -> bool {
        self.prune_refs
    }

    /// Cumulative transfer statistics for the most recent download.
    pub fn stats(&self) -> &TransferProgress {
        &self.stats
    }

    /// The configured refspecs, in configuration order.
    pub fn refspecs(&self) -> &[Refspec] {
        &self.refspecs
    }

    /// The string forms of the configured fetch refspecs.
    pub fn fetch_refspecs(&self) -> Vec<String> {
        self.refspec_strings(Direction::Fetch)
    }

    /// The string forms of the configured push refspecs.
    pub fn push_refspecs(&self) -> Vec<String> {
        self.refspec_strings(Direction::Push)
    }

    fn refspec_strings(&self, direction: Direction) -> Vec<String> {
        self.refspecs
            .iter()
            .filter(|spec| spec.direction() == direction)
            .map(|spec| spec.as_str().to_string())
            .collect()
    }

    pub(crate) fn repo_required(&self, action: &str) -> Result<&'r dyn Repo> {
        self.repo
            .ok_or_else(|| Error::invalid(format!("cannot {} detached remote", action)))
    }

    pub(crate) fn install_callbacks(&mut self, callbacks: Option<Box<dyn Callbacks + 'r>>) {
        self.callbacks = callbacks.unwrap_or_else(|| Box::new(DefaultCallbacks));
    }

    pub(crate) fn url_for_direction(&self, direction: Direction) -> Result<String> {
        let url = match direction {
            Direction::Fetch => self.url.as_ref(),
            Direction::Push => self.pushurl.as_ref().or_else(|| self.url.as_ref()),
        };

        url.cloned().ok_or_else(|| {
            Error::invalid(format!(
                "malformed remote '{}' - missing {} URL",
                self.name.as_deref().unwrap_or("(anonymous)"),
                direction
            ))
        })
    }

    /// Rebuild the active and passive refspec lists against the current
    /// advertisement. The passive list always reflects the configured fetch
    /// refspecs; the active list reflects `requested` when the caller
    /// passed any.
    pub(crate) fn activate_refspecs(&mut self) -> Result<()> {
        let fetch_specs: Vec<Refspec> = self
            .refspecs
            .iter()
            .filter(|spec| spec.direction() == Direction::Fetch)
            .cloned()
            .collect();
        self.passive_refspecs = dwim_refspecs(&fetch_specs, &self.refs);

        self.passed_refspecs = false;
        if self.requested_refspecs.is_empty() {
            self.active_refspecs = dwim_refspecs(&self.refspecs, &self.refs);
        } else {
            let mut requested = Vec::with_capacity(self.requested_refspecs.len());
            for text in &self.requested_refspecs {
                requested.push(Refspec::parse(text, Direction::Fetch)?);
            }

            self.active_refspecs = dwim_refspecs(&requested, &self.refs);
            self.passed_refspecs = true;
        }

        Ok(())
    }
}

impl Drop for Remote<'_> {
    fn drop(&mut self) {
        use crate::events::EventSet;
        use crate::transport::TransportContext;

        // Best effort; a close that wants to suspend is abandoned.
        if let Some(transport) = self.transport.as_mut() {
            if transport.is_connected() {
                let mut ctx =
                    TransportContext::new(EventSet::NONE, self.callbacks.as_mut(), &mut self.io_wait);
                let _ = transport.close(&mut ctx);
            }
        }
    }
}

/// Returns true if `name` is acceptable as a remote name, judged by
/// round-tripping it through the refspec grammar.
pub fn is_valid_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }

    let text = format!("refs/heads/test:refs/remotes/{}/test", name);
    Refspec::parse(&text, Direction::Fetch).is_ok()
}

pub(crate) fn ensure_valid_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(Error::invalid_spec(format!(
            "'{}' is not a valid remote name",
            name
        )))
    }
}

pub(crate) fn ensure_does_not_exist(repo: &dyn Repo, name: &str) -> Result<()> {
    match Remote::lookup(repo, name) {
        Err(err) if err.is_not_found() => Ok(()),
        Ok(_) => Err(Error::exists(format!(
            "remote '{}' already exists",
            name
        ))),
        Err(err) => Err(err),
    }
}

/// Resolve every refspec in `specs` against the advertisement.
pub(crate) fn dwim_refspecs(specs: &[Refspec], refs: &[RemoteHead]) -> Vec<Refspec> {
    specs.iter().map(|spec| spec.dwim(refs)).collect()
}

fn lookup_prune_config(config: &dyn ConfigStore, name: &str) -> Result<bool> {
    match optional(config.get_bool(&format!("remote.{}.prune", name)))? {
        Some(value) => Ok(value),
        None => Ok(optional(config.get_bool("fetch.prune"))?.unwrap_or(false)),
    }
}
