//! The upload and push pipelines.
//!
//! `upload` registers refspecs on a fresh push object, connects in the push
//! direction, and drives the wire conversation to its per-reference
//! verdicts. `push` wraps it with disconnection and remote-tracking
//! reconciliation.

use tracing::debug;

use crate::callbacks::Callbacks;
use crate::error::{Error, Result};
use crate::events::EventSet;
use crate::fetch::AutotagOption;
use crate::push::{Push, PushOptions};
use crate::refspec::Direction;
use crate::remote::{dwim_refspecs, Remote};
use crate::transport::{Progress, TransportContext};

impl<'r> Remote<'r> {
    /// Upload objects and reference updates to the peer without touching
    /// local references. `refspecs` overrides the configured push refspecs
    /// for this call when non-empty.
    pub fn upload(
        &mut self,
        refspecs: &[&str],
        opts: Option<PushOptions>,
        callbacks: Option<Box<dyn Callbacks + 'r>>,
    ) -> Result<Progress> {
        self.check_busy()?;
        self.repo_required("upload")?;

        self.push_opts = opts.unwrap_or_default();
        self.proxy = self.push_opts.proxy.clone();
        self.custom_headers = self.push_opts.custom_headers.clone();
        self.install_callbacks(callbacks);
        self.requested_refspecs = refspecs.iter().map(|s| s.to_string()).collect();

        let first = self.upload_begin();
        let outcome = self.drive(first);
        self.requested_refspecs.clear();
        outcome
    }

    /// The complete push pipeline: upload, disconnect, then update the
    /// remote-tracking branches for whatever the peer accepted.
    pub fn push(
        &mut self,
        refspecs: &[&str],
        opts: Option<PushOptions>,
        callbacks: Option<Box<dyn Callbacks + 'r>>,
    ) -> Result<Progress> {
        self.check_busy()?;
        self.repo_required("push")?;

        self.push_opts = opts.unwrap_or_default();
        self.proxy = self.push_opts.proxy.clone();
        self.custom_headers = self.push_opts.custom_headers.clone();
        self.install_callbacks(callbacks);
        self.requested_refspecs = refspecs.iter().map(|s| s.to_string()).collect();

        let first = self.push_begin();
        self.drive(first)
    }

    fn upload_begin(&mut self) -> Result<Progress> {
        self.active_refspecs = dwim_refspecs(&self.refspecs, &self.refs);

        let mut push = Push::new();

        if self.requested_refspecs.is_empty() {
            for spec in self.refspecs.clone() {
                if spec.direction() != Direction::Push {
                    continue;
                }
                push.add_refspec(spec.as_str())?;
            }
        } else {
            for text in self.requested_refspecs.clone() {
                push.add_refspec(&text)?;
            }
        }

        if !push.has_refspecs() {
            return Err(Error::invalid(
                "no refspecs to push; none given and none configured",
            ));
        }

        self.push = Some(push);

        match self.connect_for(Direction::Push) {
            Ok(Progress::Done) => self.upload_connected(),
            Ok(Progress::Again) => {
                self.push_frame(Self::upload_after_connect)?;
                Ok(Progress::Again)
            }
            Err(err) => Err(err),
        }
    }

    fn upload_after_connect(remote: &mut Remote<'r>, events: EventSet) -> Result<Progress> {
        match remote.rearm(events, Self::upload_after_connect)? {
            Progress::Again => Ok(Progress::Again),
            Progress::Done => remote.upload_connected(),
        }
    }

    fn upload_connected(&mut self) -> Result<Progress> {
        self.refs = self.ls()?.to_vec();
        self.push_finish_step(EventSet::NONE)
    }

    fn push_finish_step(&mut self, events: EventSet) -> Result<Progress> {
        if events.contains(EventSet::TIMEOUT) {
            return Err(Error::net("timed out pushing to the peer"));
        }

        let repo = self.repo_required("upload")?;

        let mut push = match self.push.take() {
            Some(push) => push,
            None => return Err(Error::net("no push in progress")),
        };

        let advertised = self.refs.clone();
        let updates = match push.build_updates(repo, &advertised) {
            Ok(updates) => updates.to_vec(),
            Err(err) => {
                self.push = Some(push);
                return Err(err);
            }
        };

        let mut transport = match self.transport.take() {
            Some(transport) => transport,
            None => {
                self.push = Some(push);
                return Err(Error::net("this remote has never connected"));
            }
        };

        let mut ctx = TransportContext::new(events, self.callbacks.as_mut(), &mut self.io_wait);
        let outcome = transport.push(&mut ctx, &updates);

        match outcome {
            Ok(Progress::Done) => {
                push.set_report(transport.push_report().to_vec());
                self.transport = Some(transport);
                self.push = Some(push);
                debug!(updates = updates.len(), "push conversation complete");
                self.upload_finished()
            }
            Ok(Progress::Again) => {
                self.transport = Some(transport);
                self.push = Some(push);
                self.push_frame(Self::push_finish_resume)?;
                Ok(Progress::Again)
            }
            Err(err) => {
                self.transport = Some(transport);
                self.push = Some(push);
                Err(err)
            }
        }
    }

    fn push_finish_resume(remote: &mut Remote<'r>, events: EventSet) -> Result<Progress> {
        remote.push_finish_step(events)
    }

    fn upload_finished(&mut self) -> Result<Progress> {
        let statuses = match &self.push {
            Some(push) => push.statuses().to_vec(),
            None => return Err(Error::net("no push in progress")),
        };

        for status in &statuses {
            self.callbacks
                .push_update_reference(&status.refname, status.message.as_deref())?;
        }

        Ok(Progress::Done)
    }

    fn push_begin(&mut self) -> Result<Progress> {
        match self.connect_for(Direction::Push) {
            Ok(Progress::Done) => self.push_connected(),
            Ok(Progress::Again) => match self.push_frame(Self::push_after_connect) {
                Ok(()) => Ok(Progress::Again),
                Err(err) => self.push_cleanup(Err(err)),
            },
            Err(err) => self.push_cleanup(Err(err)),
        }
    }

    fn push_after_connect(remote: &mut Remote<'r>, events: EventSet) -> Result<Progress> {
        match remote.rearm(events, Self::push_after_connect) {
            Ok(Progress::Again) => Ok(Progress::Again),
            Ok(Progress::Done) => remote.push_connected(),
            Err(err) => remote.push_cleanup(Err(err)),
        }
    }

    fn push_connected(&mut self) -> Result<Progress> {
        match self.upload_begin() {
            Ok(Progress::Done) => self.push_uploaded(),
            Ok(Progress::Again) => match self.push_frame(Self::push_after_upload) {
                Ok(()) => Ok(Progress::Again),
                Err(err) => self.push_cleanup(Err(err)),
            },
            Err(err) => self.push_cleanup(Err(err)),
        }
    }

    fn push_after_upload(remote: &mut Remote<'r>, events: EventSet) -> Result<Progress> {
        match remote.rearm(events, Self::push_after_upload) {
            Ok(Progress::Again) => Ok(Progress::Again),
            Ok(Progress::Done) => remote.push_uploaded(),
            Err(err) => remote.push_cleanup(Err(err)),
        }
    }

    fn push_uploaded(&mut self) -> Result<Progress> {
        // We don't need to be connected anymore.
        match self.disconnect_step(EventSet::NONE) {
            Ok(Progress::Done) => self.push_disconnected(),
            Ok(Progress::Again) => match self.push_frame(Self::push_after_disconnect) {
                Ok(()) => Ok(Progress::Again),
                Err(err) => self.push_cleanup(Err(err)),
            },
            Err(err) => self.push_cleanup(Err(err)),
        }
    }

    fn push_after_disconnect(remote: &mut Remote<'r>, events: EventSet) -> Result<Progress> {
        match remote.rearm(events, Self::push_after_disconnect) {
            Ok(Progress::Again) => Ok(Progress::Again),
            Ok(Progress::Done) => remote.push_disconnected(),
            Err(err) => remote.push_cleanup(Err(err)),
        }
    }

    fn push_disconnected(&mut self) -> Result<Progress> {
        let outcome = self
            .update_tips_inner(false, AutotagOption::Unspecified, "update by push")
            .map(|()| Progress::Done);

        self.push_cleanup(outcome)
    }

    fn push_cleanup(&mut self, outcome: Result<Progress>) -> Result<Progress> {
        self.requested_refspecs.clear();
        outcome
    }
}
