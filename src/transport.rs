//! The wire-transport contract and the process-wide scheme registry.
//!
//! A transport speaks one protocol (smart HTTP, SSH, local, ...) to a peer
//! repository. This crate contains no transport implementations; callers
//! either register factories per URI scheme with [`register`] or hand one
//! over through [`Callbacks::transport`].
//!
//! [`Callbacks::transport`]: ../trait.Callbacks.html#method.transport

use std::os::unix::io::RawFd;
use std::sync::Mutex;
use std::time::Duration;

use crate::callbacks::{
    Callbacks, Certificate, CertificateDecision, Credential, CredentialKinds,
};
use crate::error::{Error, Result};
use crate::events::EventSet;
use crate::oid::Oid;
use crate::refspec::Direction;

/// Whether a resumable step ran to completion or suspended waiting for I/O.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Progress {
    /// The step (and, from a public entry point, the operation) completed.
    Done,

    /// The step would block. Readiness interest has been recorded; re-enter
    /// with [`Remote::perform`] once it is satisfied.
    ///
    /// [`Remote::perform`]: ../struct.Remote.html#method.perform
    Again,
}

/// A reference advertised by the peer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteHead {
    pub name: String,
    pub oid: Oid,
    /// Where the reference points if the peer advertised it as symbolic
    /// (`HEAD` mostly).
    pub symref_target: Option<String>,
}

/// Cumulative pack-transfer statistics, updated as a download progresses.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TransferProgress {
    pub total_objects: usize,
    pub indexed_objects: usize,
    pub received_objects: usize,
    pub local_objects: usize,
    pub total_deltas: usize,
    pub indexed_deltas: usize,
    pub received_bytes: u64,
}

/// Proxy selection for a connection.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProxyOptions {
    /// Connect directly.
    None,

    /// Let the transport consult configuration and environment.
    Auto,

    /// Use this proxy URL.
    Specified(String),
}

impl Default for ProxyOptions {
    fn default() -> ProxyOptions {
        ProxyOptions::None
    }
}

/// One reference update to apply on the peer during a push.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PushUpdate {
    /// The local name the objects come from; empty for a deletion.
    pub src_refname: String,

    /// The peer-side name being updated.
    pub dst_refname: String,

    /// The id the peer currently advertises for `dst_refname` (zero if it
    /// does not exist there).
    pub old_id: Oid,

    /// The id `dst_refname` should point at afterwards (zero to delete).
    pub new_id: Oid,
}

/// The peer's verdict on one pushed reference.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PushStatus {
    pub refname: String,

    /// `None` on success; the rejection message otherwise.
    pub message: Option<String>,
}

/// The record of readiness interest left behind by a suspended step.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FdWait {
    pub(crate) fd: RawFd,
    pub(crate) interest: EventSet,
    pub(crate) timeout: Duration,
    /// True if the caller's `set_fd_events` took ownership of waiting.
    pub(crate) handled: bool,
}

/// The per-call environment handed to a transport: the readiness events
/// observed since the last suspension, the caller's hooks, and the sink
/// readiness interest is recorded into.
pub struct TransportContext<'a> {
    events: EventSet,
    callbacks: &'a mut dyn Callbacks,
    wait: &'a mut Option<FdWait>,
}

impl<'a> TransportContext<'a> {
    pub(crate) fn new(
        events: EventSet,
        callbacks: &'a mut dyn Callbacks,
        wait: &'a mut Option<FdWait>,
    ) -> TransportContext<'a> {
        TransportContext {
            events,
            callbacks,
            wait,
        }
    }

    /// The readiness observed since this step suspended; empty on the first
    /// entry. Never contains [`EventSet::TIMEOUT`]; a timed-out wait is
    /// turned into an error before the transport is re-entered.
    ///
    /// [`EventSet::TIMEOUT`]: enum.EventSet.html#associatedconstant.TIMEOUT
    pub fn events(&self) -> EventSet {
        self.events
    }

    /// Record interest in descriptor readiness before returning
    /// [`Progress::Again`].
    ///
    /// [`Progress::Again`]: enum.Progress.html
    pub fn set_fd_events(&mut self, fd: RawFd, interest: EventSet, timeout: Duration) {
        let handled = self.callbacks.set_fd_events(fd, interest, timeout);
        *self.wait = Some(FdWait {
            fd,
            interest,
            timeout,
            handled,
        });
    }

    /// Ask the caller for a credential.
    pub fn credentials(
        &mut self,
        url: &str,
        username_from_url: Option<&str>,
        allowed: CredentialKinds,
    ) -> Result<Option<Credential>> {
        self.callbacks.credentials(url, username_from_url, allowed)
    }

    /// Ask the caller to judge the peer's certificate.
    pub fn certificate_check(
        &mut self,
        certificate: &Certificate,
        valid: bool,
        host: &str,
    ) -> Option<CertificateDecision> {
        self.callbacks.certificate_check(certificate, valid, host)
    }

    /// Forward sideband progress text to the caller.
    pub fn sideband_progress(&mut self, text: &str) {
        self.callbacks.sideband_progress(text);
    }
}

/// A struct that implements the `Transport` trait speaks one wire protocol
/// to a peer repository.
///
/// Methods that perform network I/O return [`Progress::Again`] when they
/// would block. Such a method must record its readiness interest through
/// [`TransportContext::set_fd_events`] before suspending, and must tolerate
/// being called again with fresh events until it returns
/// [`Progress::Done`].
pub trait Transport {
    /// Open the connection and obtain the peer's advertisement.
    fn connect(
        &mut self,
        ctx: &mut TransportContext<'_>,
        url: &str,
        direction: Direction,
        proxy: &ProxyOptions,
        custom_headers: &[String],
    ) -> Result<Progress>;

    /// The peer's reference advertisement. Requires a completed `connect`;
    /// stays available after `close`, until the transport is dropped.
    fn ls(&self) -> Result<&[RemoteHead]>;

    fn is_connected(&self) -> bool;

    /// Agree with the peer on which objects must be transferred: `wants`
    /// are the tips the local side is missing, `haves` the tips it already
    /// has.
    fn negotiate_fetch(
        &mut self,
        ctx: &mut TransportContext<'_>,
        wants: &[Oid],
        haves: &[Oid],
    ) -> Result<Progress>;

    /// Transfer the negotiated pack. On `Done` the local object database
    /// contains every object the advertisement requires.
    fn download_pack(
        &mut self,
        ctx: &mut TransportContext<'_>,
        stats: &mut TransferProgress,
    ) -> Result<Progress>;

    /// Upload objects and apply reference updates on the peer.
    fn push(&mut self, ctx: &mut TransportContext<'_>, updates: &[PushUpdate])
        -> Result<Progress>;

    /// Per-reference results of the last completed `push`.
    fn push_report(&self) -> &[PushStatus];

    /// Ask the transport to abort at the next opportunity. Implementations
    /// set a flag observed on the next I/O call, so this is safe wherever
    /// storing the flag is.
    fn cancel(&mut self);

    /// Shut the conversation down. For some protocols this flushes pending
    /// confirmation and may suspend.
    fn close(&mut self, ctx: &mut TransportContext<'_>) -> Result<Progress>;
}

/// A factory producing a transport for a URL.
pub type TransportFactory = fn(url: &str) -> Result<Box<dyn Transport>>;

static REGISTRY: Mutex<Vec<(String, TransportFactory)>> = Mutex::new(Vec::new());

fn registry() -> std::sync::MutexGuard<'static, Vec<(String, TransportFactory)>> {
    match REGISTRY.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Register a factory for a URI scheme (`"https"`, `"ssh"`, ...),
/// replacing any previous registration for that scheme.
pub fn register(scheme: &str, factory: TransportFactory) {
    let mut schemes = registry();

    match schemes.iter().position(|(s, _)| s == scheme) {
        Some(pos) => schemes[pos].1 = factory,
        None => schemes.push((scheme.to_string(), factory)),
    }
}

/// Produce a transport for `url` from the registry.
pub(crate) fn create(url: &str) -> Result<Box<dyn Transport>> {
    let scheme = url
        .split("://")
        .next()
        .filter(|_| url.contains("://"))
        .ok_or_else(|| Error::net(format!("unsupported URL protocol in '{}'", url)))?;

    let factory = registry()
        .iter()
        .find(|(s, _)| s == scheme)
        .map(|(_, factory)| *factory)
        .ok_or_else(|| Error::net(format!("unsupported URL protocol `{}`", scheme)))?;

    factory(url)
}
