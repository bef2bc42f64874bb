//! The download and fetch pipelines.
//!
//! `download` connects, snapshots the advertisement, rebuilds the refspec
//! activation, negotiates, and transfers the pack. `fetch` wraps it with
//! reference reconciliation: disconnect, update tips, prune, release the
//! per-call scratch. Every network stage may suspend; the wrapper frames
//! re-arm themselves and guarantee the scratch is released on every
//! terminal path.

use tracing::debug;

use crate::callbacks::Callbacks;
use crate::error::{Error, Result};
use crate::events::EventSet;
use crate::fetch::{self, AutotagOption, FetchOptions, FetchPrune};
use crate::refspec::Direction;
use crate::remote::Remote;
use crate::transport::{Progress, TransportContext};

impl<'r> Remote<'r> {
    /// Connect (if necessary) and transfer the pack the refspecs call for,
    /// without touching any local reference. `refspecs` overrides the
    /// configured fetch refspecs for this call when non-empty.
    pub fn download(
        &mut self,
        refspecs: &[&str],
        opts: Option<FetchOptions>,
        callbacks: Option<Box<dyn Callbacks + 'r>>,
    ) -> Result<Progress> {
        self.check_busy()?;
        self.repo_required("download")?;

        self.fetch_opts = opts.unwrap_or_default();
        self.proxy = self.fetch_opts.proxy.clone();
        self.custom_headers = self.fetch_opts.custom_headers.clone();
        self.install_callbacks(callbacks);
        self.requested_refspecs = refspecs.iter().map(|s| s.to_string()).collect();

        let first = self.download_begin();
        self.drive(first)
    }

    /// Download from the peer and reconcile local references: the complete
    /// fetch pipeline. `reflog_message` defaults to `fetch <name-or-url>`.
    pub fn fetch(
        &mut self,
        refspecs: &[&str],
        opts: Option<FetchOptions>,
        callbacks: Option<Box<dyn Callbacks + 'r>>,
        reflog_message: Option<&str>,
    ) -> Result<Progress> {
        self.check_busy()?;
        self.repo_required("fetch")?;

        self.fetch_opts = opts.unwrap_or_default();
        self.proxy = self.fetch_opts.proxy.clone();
        self.custom_headers = self.fetch_opts.custom_headers.clone();
        self.install_callbacks(callbacks);
        self.requested_refspecs = refspecs.iter().map(|s| s.to_string()).collect();

        self.reflog_message = Some(match reflog_message {
            Some(message) => message.to_string(),
            None => format!(
                "fetch {}",
                self.name
                    .as_deref()
                    .or_else(|| self.url.as_deref())
                    .unwrap_or("")
            ),
        });

        let first = self.fetch_begin();
        self.drive(first)
    }

    fn download_begin(&mut self) -> Result<Progress> {
        // A fresh download invalidates any in-flight push bookkeeping.
        self.push = None;

        match self.connect_for(Direction::Fetch) {
            Ok(Progress::Done) => self.download_connected(),
            Ok(Progress::Again) => {
                self.push_frame(Self::download_after_connect)?;
                Ok(Progress::Again)
            }
            Err(err) => Err(err),
        }
    }

    fn download_after_connect(remote: &mut Remote<'r>, events: EventSet) -> Result<Progress> {
        match remote.rearm(events, Self::download_after_connect)? {
            Progress::Again => Ok(Progress::Again),
            Progress::Done => remote.download_connected(),
        }
    }

    fn download_connected(&mut self) -> Result<Progress> {
        self.refs = self.ls()?.to_vec();
        debug!(refs = self.refs.len(), "received advertisement");

        self.activate_refspecs()?;
        self.stats = Default::default();

        self.negotiate_step(EventSet::NONE)
    }

    fn negotiate_step(&mut self, events: EventSet) -> Result<Progress> {
        if events.contains(EventSet::TIMEOUT) {
            return Err(Error::net("timed out negotiating with the peer"));
        }

        let repo = self.repo_required("download")?;
        let tagopt = self.effective_tagopt();
        let (wants, haves) = fetch::wants_and_haves(
            repo,
            &self.refs,
            &self.active_refspecs,
            &self.passive_refspecs,
            tagopt,
        )?;

        let mut transport = match self.transport.take() {
            Some(transport) => transport,
            None => return Err(Error::net("this remote has never connected")),
        };

        let mut ctx = TransportContext::new(events, self.callbacks.as_mut(), &mut self.io_wait);
        let outcome = transport.negotiate_fetch(&mut ctx, &wants, &haves);
        self.transport = Some(transport);

        match outcome {
            Ok(Progress::Done) => {
                debug!(wants = wants.len(), haves = haves.len(), "negotiation complete");
                self.download_pack_step(EventSet::NONE)
            }
            Ok(Progress::Again) => {
                self.push_frame(Self::negotiate_resume)?;
                Ok(Progress::Again)
            }
            Err(err) => Err(err),
        }
    }

    fn negotiate_resume(remote: &mut Remote<'r>, events: EventSet) -> Result<Progress> {
        remote.negotiate_step(events)
    }

    fn download_pack_step(&mut self, events: EventSet) -> Result<Progress> {
        if events.contains(EventSet::TIMEOUT) {
            return Err(Error::net("timed out downloading the pack"));
        }

        let mut transport = match self.transport.take() {
            Some(transport) => transport,
            None => return Err(Error::net("this remote has never connected")),
        };

        let mut ctx = TransportContext::new(events, self.callbacks.as_mut(), &mut self.io_wait);
        let outcome = transport.download_pack(&mut ctx, &mut self.stats);
        self.transport = Some(transport);

        match outcome {
            Ok(Progress::Done) => {
                debug!(
                    received = self.stats.received_objects,
                    bytes = self.stats.received_bytes,
                    "pack transfer complete"
                );
                Ok(Progress::Done)
            }
            Ok(Progress::Again) => {
                self.push_frame(Self::download_pack_resume)?;
                Ok(Progress::Again)
            }
            Err(err) => Err(err),
        }
    }

    fn download_pack_resume(remote: &mut Remote<'r>, events: EventSet) -> Result<Progress> {
        remote.download_pack_step(events)
    }

    fn fetch_begin(&mut self) -> Result<Progress> {
        match self.connect_for(Direction::Fetch) {
            Ok(Progress::Done) => self.fetch_connected(),
            Ok(Progress::Again) => {
                match self.push_frame(Self::fetch_after_connect) {
                    Ok(()) => Ok(Progress::Again),
                    Err(err) => self.fetch_cleanup(Err(err)),
                }
            }
            Err(err) => self.fetch_cleanup(Err(err)),
        }
    }

    fn fetch_after_connect(remote: &mut Remote<'r>, events: EventSet) -> Result<Progress> {
        match remote.rearm(events, Self::fetch_after_connect) {
            Ok(Progress::Again) => Ok(Progress::Again),
            Ok(Progress::Done) => remote.fetch_connected(),
            Err(err) => remote.fetch_cleanup(Err(err)),
        }
    }

    fn fetch_connected(&mut self) -> Result<Progress> {
        match self.download_begin() {
            Ok(Progress::Done) => self.fetch_downloaded(),
            Ok(Progress::Again) => match self.push_frame(Self::fetch_after_download) {
                Ok(()) => Ok(Progress::Again),
                Err(err) => self.fetch_cleanup(Err(err)),
            },
            Err(err) => self.fetch_cleanup(Err(err)),
        }
    }

    fn fetch_after_download(remote: &mut Remote<'r>, events: EventSet) -> Result<Progress> {
        match remote.rearm(events, Self::fetch_after_download) {
            Ok(Progress::Again) => Ok(Progress::Again),
            Ok(Progress::Done) => remote.fetch_downloaded(),
            Err(err) => remote.fetch_cleanup(Err(err)),
        }
    }

    fn fetch_downloaded(&mut self) -> Result<Progress> {
        // We don't need to be connected anymore.
        match self.disconnect_step(EventSet::NONE) {
            Ok(Progress::Done) => self.fetch_disconnected(),
            Ok(Progress::Again) => match self.push_frame(Self::fetch_after_disconnect) {
                Ok(()) => Ok(Progress::Again),
                Err(err) => self.fetch_cleanup(Err(err)),
            },
            Err(err) => self.fetch_cleanup(Err(err)),
        }
    }

    fn fetch_after_disconnect(remote: &mut Remote<'r>, events: EventSet) -> Result<Progress> {
        match remote.rearm(events, Self::fetch_after_disconnect) {
            Ok(Progress::Again) => Ok(Progress::Again),
            Ok(Progress::Done) => remote.fetch_disconnected(),
            Err(err) => remote.fetch_cleanup(Err(err)),
        }
    }

    fn fetch_disconnected(&mut self) -> Result<Progress> {
        let update_fetchhead = self.fetch_opts.update_fetchhead;
        let download_tags = self.fetch_opts.download_tags;
        let message = self.reflog_message.clone().unwrap_or_default();

        if let Err(err) = self.update_tips_inner(update_fetchhead, download_tags, &message) {
            return self.fetch_cleanup(Err(err));
        }

        let prune = match self.fetch_opts.prune {
            FetchPrune::On => true,
            FetchPrune::Off => false,
            FetchPrune::Unspecified => self.prune_refs,
        };

        if prune {
            if let Err(err) = self.prune_inner() {
                return self.fetch_cleanup(Err(err));
            }
        }

        self.fetch_cleanup(Ok(Progress::Done))
    }

    /// Release per-call scratch; every terminal path of the fetch pipeline
    /// funnels through here.
    fn fetch_cleanup(&mut self, outcome: Result<Progress>) -> Result<Progress> {
        self.requested_refspecs.clear();
        self.reflog_message = None;
        outcome
    }

    pub(crate) fn effective_tagopt(&self) -> AutotagOption {
        match self.fetch_opts.download_tags {
            AutotagOption::Unspecified => self.download_tags,
            tagopt => tagopt,
        }
    }
}
