//! Shared fixtures: a scripted in-process transport and recording
//! callbacks.

// Not every suite uses every helper.
#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::rc::Rc;
use std::time::Duration;

use rsgit_remote::transport::{
    Progress, ProxyOptions, PushStatus, PushUpdate, RemoteHead, TransferProgress, Transport,
    TransportContext,
};
use rsgit_remote::{Callbacks, Direction, EventSet, Oid, Result};

pub fn oid(n: u8) -> Oid {
    Oid::new(&[n; 20]).unwrap()
}

pub fn head(name: &str, id: Oid) -> RemoteHead {
    RemoteHead {
        name: name.to_string(),
        oid: id,
        symref_target: None,
    }
}

pub fn symref_head(name: &str, id: Oid, target: &str) -> RemoteHead {
    RemoteHead {
        name: name.to_string(),
        oid: id,
        symref_target: Some(target.to_string()),
    }
}

/// What the scripted transport observed, for assertions after the fact.
#[derive(Default)]
pub struct TransportProbe {
    pub connects: RefCell<u32>,
    pub pushed: RefCell<Vec<PushUpdate>>,
    pub wants: RefCell<Vec<Oid>>,
    pub haves: RefCell<Vec<Oid>>,
}

/// A transport that follows a fixed script: a canned advertisement, a
/// configurable number of suspensions per stage, and canned push verdicts.
///
/// When it suspends it writes one byte to its own socketpair, so the
/// blocking driver's poll finds the descriptor readable; `starve` skips
/// the byte to exercise the timeout path.
pub struct ScriptedTransport {
    refs: Vec<RemoteHead>,
    connected: bool,
    handshake_done: bool,
    cancelled: bool,
    connect_suspensions: u32,
    negotiate_suspensions: u32,
    pack_suspensions: u32,
    push_suspensions: u32,
    starve: bool,
    rejections: Vec<(String, String)>,
    report: Vec<PushStatus>,
    probe: Rc<TransportProbe>,
    wake_writer: UnixStream,
    wake_reader: UnixStream,
}

impl ScriptedTransport {
    pub fn new(refs: Vec<RemoteHead>) -> ScriptedTransport {
        let (wake_writer, wake_reader) = UnixStream::pair().unwrap();

        ScriptedTransport {
            refs,
            connected: false,
            handshake_done: false,
            cancelled: false,
            connect_suspensions: 0,
            negotiate_suspensions: 0,
            pack_suspensions: 0,
            push_suspensions: 0,
            starve: false,
            rejections: Vec::new(),
            report: Vec::new(),
            probe: Rc::new(TransportProbe::default()),
            wake_writer,
            wake_reader,
        }
    }

    /// How many times each stage reports `Again` before completing.
    pub fn with_suspensions(mut self, connect: u32, negotiate: u32, pack: u32) -> Self {
        self.connect_suspensions = connect;
        self.negotiate_suspensions = negotiate;
        self.pack_suspensions = pack;
        self
    }

    pub fn with_push_suspensions(mut self, push: u32) -> Self {
        self.push_suspensions = push;
        self
    }

    /// Suspend without ever becoming ready, so a blocking wait times out.
    pub fn starved(mut self) -> Self {
        self.starve = true;
        self
    }

    pub fn rejecting(mut self, refname: &str, message: &str) -> Self {
        self.rejections
            .push((refname.to_string(), message.to_string()));
        self
    }

    pub fn probe(&self) -> Rc<TransportProbe> {
        Rc::clone(&self.probe)
    }

    fn suspend(&mut self, ctx: &mut TransportContext<'_>) -> Result<Progress> {
        let timeout = if self.starve {
            Duration::from_millis(10)
        } else {
            self.wake_writer.write_all(b"x").unwrap();
            Duration::from_secs(5)
        };

        ctx.set_fd_events(
            self.wake_reader.as_raw_fd(),
            EventSet::READ | EventSet::WRITE,
            timeout,
        );
        Ok(Progress::Again)
    }

    fn drain_wake(&mut self) {
        if !self.starve {
            let mut buf = [0u8; 1];
            let _ = (&self.wake_reader).read(&mut buf);
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancelled {
            Err(rsgit_remote::Error::Net("operation cancelled".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Transport for ScriptedTransport {
    fn connect(
        &mut self,
        ctx: &mut TransportContext<'_>,
        _url: &str,
        _direction: Direction,
        _proxy: &ProxyOptions,
        _custom_headers: &[String],
    ) -> Result<Progress> {
        self.check_cancelled()?;

        if !ctx.events().is_empty() {
            self.drain_wake();
        }

        if self.connect_suspensions > 0 {
            self.connect_suspensions -= 1;
            return self.suspend(ctx);
        }

        self.connected = true;
        self.handshake_done = true;
        *self.probe.connects.borrow_mut() += 1;
        Ok(Progress::Done)
    }

    fn ls(&self) -> Result<&[RemoteHead]> {
        if self.handshake_done {
            Ok(&self.refs)
        } else {
            Err(rsgit_remote::Error::Net(
                "transport has never connected".to_string(),
            ))
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn negotiate_fetch(
        &mut self,
        ctx: &mut TransportContext<'_>,
        wants: &[Oid],
        haves: &[Oid],
    ) -> Result<Progress> {
        self.check_cancelled()?;

        if !ctx.events().is_empty() {
            self.drain_wake();
        }

        if self.negotiate_suspensions > 0 {
            self.negotiate_suspensions -= 1;
            return self.suspend(ctx);
        }

        *self.probe.wants.borrow_mut() = wants.to_vec();
        *self.probe.haves.borrow_mut() = haves.to_vec();
        Ok(Progress::Done)
    }

    fn download_pack(
        &mut self,
        ctx: &mut TransportContext<'_>,
        stats: &mut TransferProgress,
    ) -> Result<Progress> {
        self.check_cancelled()?;

        if !ctx.events().is_empty() {
            self.drain_wake();
        }

        if self.pack_suspensions > 0 {
            self.pack_suspensions -= 1;
            return self.suspend(ctx);
        }

        let wanted = self.probe.wants.borrow().len();
        stats.total_objects = wanted;
        stats.indexed_objects = wanted;
        stats.received_objects = wanted;
        stats.received_bytes = (wanted as u64) * 100;
        Ok(Progress::Done)
    }

    fn push(
        &mut self,
        ctx: &mut TransportContext<'_>,
        updates: &[PushUpdate],
    ) -> Result<Progress> {
        self.check_cancelled()?;

        if !ctx.events().is_empty() {
            self.drain_wake();
        }

        if self.push_suspensions > 0 {
            self.push_suspensions -= 1;
            return self.suspend(ctx);
        }

        *self.probe.pushed.borrow_mut() = updates.to_vec();

        self.report = updates
            .iter()
            .map(|update| PushStatus {
                refname: update.dst_refname.clone(),
                message: self
                    .rejections
                    .iter()
                    .find(|(name, _)| *name == update.dst_refname)
                    .map(|(_, message)| message.clone()),
            })
            .collect();

        Ok(Progress::Done)
    }

    fn push_report(&self) -> &[PushStatus] {
        &self.report
    }

    fn cancel(&mut self) {
        self.cancelled = true;
    }

    fn close(&mut self, _ctx: &mut TransportContext<'_>) -> Result<Progress> {
        self.connected = false;
        Ok(Progress::Done)
    }
}

/// Everything the callbacks observed during an operation.
#[derive(Default)]
pub struct CallbackLog {
    pub tip_updates: RefCell<Vec<(String, Oid, Oid)>>,
    pub push_statuses: RefCell<Vec<(String, Option<String>)>>,
    pub fd_requests: RefCell<Vec<(RawFd, EventSet)>>,
    pub sideband: RefCell<Vec<String>>,
}

/// Callbacks that hand out a scripted transport once and record every
/// notification. `cooperative` decides whether `set_fd_events` takes
/// ownership of waiting.
pub struct TestCallbacks {
    transport: Option<Box<dyn Transport>>,
    cooperative: bool,
    log: Rc<CallbackLog>,
}

impl TestCallbacks {
    pub fn new(transport: ScriptedTransport) -> TestCallbacks {
        TestCallbacks {
            transport: Some(Box::new(transport)),
            cooperative: false,
            log: Rc::new(CallbackLog::default()),
        }
    }

    /// Callbacks with no transport to hand out; the remote reuses the one
    /// it already has.
    pub fn reusing() -> TestCallbacks {
        TestCallbacks {
            transport: None,
            cooperative: false,
            log: Rc::new(CallbackLog::default()),
        }
    }

    pub fn cooperative(mut self) -> TestCallbacks {
        self.cooperative = true;
        self
    }

    pub fn log(&self) -> Rc<CallbackLog> {
        Rc::clone(&self.log)
    }
}

impl Callbacks for TestCallbacks {
    fn transport(&mut self) -> Result<Option<Box<dyn Transport>>> {
        Ok(self.transport.take())
    }

    fn sideband_progress(&mut self, text: &str) {
        self.log.sideband.borrow_mut().push(text.to_string());
    }

    fn update_tips(&mut self, refname: &str, old: &Oid, new: &Oid) -> Result<()> {
        self.log
            .tip_updates
            .borrow_mut()
            .push((refname.to_string(), *old, *new));
        Ok(())
    }

    fn push_update_reference(&mut self, refname: &str, status: Option<&str>) -> Result<()> {
        self.log
            .push_statuses
            .borrow_mut()
            .push((refname.to_string(), status.map(|s| s.to_string())));
        Ok(())
    }

    fn set_fd_events(&mut self, fd: RawFd, interest: EventSet, _timeout: Duration) -> bool {
        self.log.fd_requests.borrow_mut().push((fd, interest));
        self.cooperative
    }
}
