//! The connect pipeline: URL resolution, transport selection, and the
//! (possibly suspended) wire handshake. Disconnection lives here too.

use tracing::debug;

use crate::callbacks::Callbacks;
use crate::error::{Error, Result};
use crate::events::EventSet;
use crate::refspec::Direction;
use crate::remote::Remote;
use crate::transport::{self, Progress, ProxyOptions, RemoteHead, TransportContext};

impl<'r> Remote<'r> {
    /// Open a connection to the peer in the given direction. `callbacks`,
    /// `proxy`, and `custom_headers` are installed on the remote for the
    /// duration of the connection. Connecting an already-connected, idle
    /// remote succeeds immediately.
    pub fn connect(
        &mut self,
        direction: Direction,
        callbacks: Option<Box<dyn Callbacks + 'r>>,
        proxy: Option<ProxyOptions>,
        custom_headers: Option<Vec<String>>,
    ) -> Result<Progress> {
        self.check_busy()?;

        self.install_callbacks(callbacks);
        self.proxy = proxy.unwrap_or_default();
        self.custom_headers = custom_headers.unwrap_or_default();

        let first = self.connect_for(direction);
        self.drive(first)
    }

    /// Returns true while the transport reports an open connection.
    pub fn is_connected(&self) -> bool {
        self.transport
            .as_ref()
            .map_or(false, |transport| transport.is_connected())
    }

    /// The peer's reference advertisement. Requires a completed connect.
    pub fn ls(&self) -> Result<&[RemoteHead]> {
        match &self.transport {
            Some(transport) => transport.ls(),
            None => Err(Error::net("this remote has never connected")),
        }
    }

    /// Close the connection. The transport object is retained, so a
    /// subsequent connect may reuse it.
    pub fn disconnect(&mut self) -> Result<Progress> {
        self.check_busy()?;

        let first = self.disconnect_step(EventSet::NONE);
        self.drive(first)
    }

    /// Start (or shortcut) the connect pipeline for `direction`, with
    /// callbacks and options already installed.
    pub(crate) fn connect_for(&mut self, direction: Direction) -> Result<Progress> {
        if self.is_connected() {
            return Ok(Progress::Done);
        }

        self.direction = direction;

        let url = self.url_for_direction(direction)?;
        let resolved = match self.callbacks.resolve_url(&url, direction)? {
            Some(rewritten) => rewritten,
            None => url,
        };

        debug!(url = %resolved, direction = %direction, "connecting to remote");
        self.resolved_url = Some(resolved);

        // Reuse a previously installed transport; otherwise ask the
        // caller's factory, then the scheme registry.
        let transport = match self.transport.take() {
            Some(transport) => transport,
            None => match self.callbacks.transport()? {
                Some(transport) => transport,
                None => match self.resolved_url.as_deref() {
                    Some(resolved) => transport::create(resolved)?,
                    None => return Err(Error::net("no URL resolved for connection")),
                },
            },
        };

        self.connect_transport = Some(transport);
        self.connect_step(EventSet::NONE)
    }

    /// (Re-)enter the transport's connect with fresh events. While the
    /// attempt is suspended the transport lives in `connect_transport`; it
    /// is promoted into `transport` on completion and dropped on failure.
    fn connect_step(&mut self, events: EventSet) -> Result<Progress> {
        if events.contains(EventSet::TIMEOUT) {
            self.connect_transport = None;
            self.resolved_url = None;
            return Err(Error::net("timed out waiting for the peer"));
        }

        let mut transport = match self.connect_transport.take() {
            Some(transport) => transport,
            None => return Err(Error::net("no connection attempt in progress")),
        };

        let mut ctx = TransportContext::new(events, self.callbacks.as_mut(), &mut self.io_wait);
        let outcome = transport.connect(
            &mut ctx,
            self.resolved_url.as_deref().unwrap_or(""),
            self.direction,
            &self.proxy,
            &self.custom_headers,
        );

        match outcome {
            Ok(Progress::Done) => {
                self.transport = Some(transport);
                self.resolved_url = None;
                Ok(Progress::Done)
            }
            Ok(Progress::Again) => {
                self.connect_transport = Some(transport);
                self.push_frame(Self::connect_resume)?;
                Ok(Progress::Again)
            }
            Err(err) => {
                self.resolved_url = None;
                Err(err)
            }
        }
    }

    fn connect_resume(remote: &mut Remote<'r>, events: EventSet) -> Result<Progress> {
        remote.connect_step(events)
    }

    /// Close the connection if one is open; may suspend for protocols that
    /// flush state on shutdown.
    pub(crate) fn disconnect_step(&mut self, events: EventSet) -> Result<Progress> {
        if events.contains(EventSet::TIMEOUT) {
            return Err(Error::net("timed out closing the connection"));
        }

        if !self.is_connected() {
            return Ok(Progress::Done);
        }

        let mut transport = match self.transport.take() {
            Some(transport) => transport,
            None => return Ok(Progress::Done),
        };

        let mut ctx = TransportContext::new(events, self.callbacks.as_mut(), &mut self.io_wait);
        let outcome = transport.close(&mut ctx);
        self.transport = Some(transport);

        match outcome {
            Ok(Progress::Done) => {
                debug!("disconnected from remote");
                Ok(Progress::Done)
            }
            Ok(Progress::Again) => {
                self.push_frame(Self::disconnect_resume)?;
                Ok(Progress::Again)
            }
            Err(err) => Err(err),
        }
    }

    fn disconnect_resume(remote: &mut Remote<'r>, events: EventSet) -> Result<Progress> {
        remote.disconnect_step(events)
    }
}
