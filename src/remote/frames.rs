//! The resumable operation engine: a bounded stack of continuation frames
//! per remote, and the synchronous driver that drains suspensions for
//! callers who would rather block.
//!
//! Each pipeline stage that can suspend installs a frame. The top frame is
//! the outermost pending stage; dispatching it unwinds one level with the
//! fresh events (the re-arm pattern), and the innermost frame re-enters the
//! suspended transport call. A stage that suspends again re-installs
//! itself, so the stack is exactly the chain of pending stages.

use std::io;

use tracing::debug;

use crate::error::{Error, Result};
use crate::events::EventSet;
use crate::remote::Remote;
use crate::transport::{FdWait, Progress};

/// A single resumption function bound to the remote.
pub(crate) type Frame<'r> = fn(&mut Remote<'r>, EventSet) -> Result<Progress>;

/// The most deeply nested chain of pending stages any operation produces.
pub(crate) const MAX_FRAMES: usize = 4;

impl<'r> Remote<'r> {
    /// Returns true while an operation is in progress on this remote.
    pub fn is_busy(&self) -> bool {
        !self.frames.is_empty()
    }

    pub(crate) fn check_busy(&self) -> Result<()> {
        if self.is_busy() {
            Err(Error::Busy)
        } else {
            Ok(())
        }
    }

    pub(crate) fn push_frame(&mut self, frame: Frame<'r>) -> Result<()> {
        if self.frames.len() >= MAX_FRAMES {
            return Err(Error::net(
                "maximum number of pending continuations exceeded",
            ));
        }

        self.frames.push(frame);
        Ok(())
    }

    fn dispatch_frame(&mut self, events: EventSet) -> Option<Result<Progress>> {
        let frame = self.frames.pop()?;
        Some(frame(self, events))
    }

    /// Unwind the next pending frame with `events`; if it suspended again,
    /// reinstall `me` above it so the chain survives.
    pub(crate) fn rearm(&mut self, events: EventSet, me: Frame<'r>) -> Result<Progress> {
        match self.dispatch_frame(events) {
            Some(Ok(Progress::Again)) => {
                self.push_frame(me)?;
                Ok(Progress::Again)
            }
            Some(outcome) => outcome,
            None => Err(Error::net("no pending stage to resume")),
        }
    }

    /// Drive the next pending continuation with the readiness the caller
    /// observed. Fails with an invalid error when the remote is idle.
    pub fn perform(&mut self, events: EventSet) -> Result<Progress> {
        self.io_wait = None;

        match self.dispatch_frame(events) {
            Some(outcome) => outcome,
            None => Err(Error::invalid("remote is idle")),
        }
    }

    /// Ask the active transport to cancel at its next opportunity. The
    /// in-flight operation then surfaces whatever error the transport
    /// reports; the pending continuations resolve through that unwinding.
    pub fn stop(&mut self) {
        if let Some(transport) = self.transport.as_mut() {
            transport.cancel();
        }

        if let Some(transport) = self.connect_transport.as_mut() {
            transport.cancel();
        }
    }

    /// Discard pending continuations and per-call scratch, leaving the
    /// remote idle.
    pub(crate) fn abort_pending(&mut self) {
        self.frames.clear();
        self.connect_transport = None;
        self.resolved_url = None;
        self.io_wait = None;
        self.requested_refspecs.clear();
        self.reflog_message = None;
    }

    /// Run an operation to completion for blocking callers: while the
    /// outcome is `Again` and the most recent suspension was not taken over
    /// by the caller's `set_fd_events`, wait on the recorded descriptor and
    /// feed the observed readiness back through `perform`.
    pub(crate) fn drive(&mut self, first: Result<Progress>) -> Result<Progress> {
        let mut outcome = first;

        loop {
            match outcome {
                Ok(Progress::Again) => {
                    let wait = match self.io_wait {
                        Some(wait) if !wait.handled => wait,
                        Some(_) => return outcome,
                        None => {
                            self.abort_pending();
                            return Err(Error::net(
                                "operation suspended without requesting I/O readiness",
                            ));
                        }
                    };

                    let events = match wait_fd(&wait) {
                        Ok(events) => events,
                        Err(err) => {
                            self.stop();
                            self.abort_pending();
                            return Err(err);
                        }
                    };

                    debug!(events = ?events, "descriptor ready, resuming");
                    outcome = self.perform(events);
                }
                _ => return outcome,
            }
        }
    }
}

/// Wait for readiness on the recorded descriptor, translating the wake
/// reason into an event set. A wait that elapses with nothing ready reports
/// `TIMEOUT`.
fn wait_fd(wait: &FdWait) -> Result<EventSet> {
    let mut interest: libc::c_short = 0;
    if wait.interest.contains(EventSet::READ) {
        interest |= libc::POLLIN;
    }
    if wait.interest.contains(EventSet::WRITE) {
        interest |= libc::POLLOUT;
    }

    let mut pollfd = libc::pollfd {
        fd: wait.fd,
        events: interest,
        revents: 0,
    };

    let timeout_ms = wait.timeout.as_millis().min(i32::max_value() as u128) as libc::c_int;
    let ret = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };

    if ret < 0 {
        return Err(Error::net(format!(
            "failed to wait for events: {}",
            io::Error::last_os_error()
        )));
    }

    let mut observed = EventSet::NONE;

    if ret > 0 {
        if pollfd.revents & libc::POLLIN != 0 {
            observed |= EventSet::READ;
        }
        if pollfd.revents & libc::POLLOUT != 0 {
            observed |= EventSet::WRITE;
        }
        if pollfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
            observed |= EventSet::EXCEPT;
        }
    }

    if observed.is_empty() {
        observed = EventSet::TIMEOUT;
    }

    Ok(observed)
}
