use std::os::unix::io::RawFd;
use std::time::Duration;

use crate::error::Result;
use crate::events::EventSet;
use crate::oid::Oid;
use crate::refspec::Direction;
use crate::transport::Transport;

/// Kinds of credentials a transport is willing to accept, as a set.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CredentialKinds(u32);

impl CredentialKinds {
    pub const USERPASS: CredentialKinds = CredentialKinds(1);
    pub const SSH_KEY: CredentialKinds = CredentialKinds(1 << 1);
    pub const DEFAULT: CredentialKinds = CredentialKinds(1 << 2);

    pub fn contains(self, other: CredentialKinds) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for CredentialKinds {
    type Output = CredentialKinds;

    fn bitor(self, rhs: CredentialKinds) -> CredentialKinds {
        CredentialKinds(self.0 | rhs.0)
    }
}

/// A credential produced by [`Callbacks::credentials`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Credential {
    UserPass {
        username: String,
        password: String,
    },
    SshKey {
        username: String,
        private_key: String,
        passphrase: Option<String>,
    },
    /// Whatever ambient mechanism the transport has (agent, negotiate, ...).
    Default,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CertificateKind {
    X509,
    SshHostKey,
}

/// A certificate (or host key) presented by the peer, opaque to the core.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Certificate {
    pub kind: CertificateKind,
    pub data: Vec<u8>,
}

/// The caller's verdict on a presented certificate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CertificateDecision {
    Accept,
    Reject,
}

/// Hooks a caller may supply to observe and steer a remote operation.
///
/// Every method has a pass-through default, so an implementation only
/// overrides what it cares about. Returning `None` (or `Ok(None)`) from the
/// hooks that produce a value leaves the default behavior unchanged.
///
/// A hook set is installed on the remote at the start of each operation and
/// stays installed until the next operation replaces it.
pub trait Callbacks {
    /// Produce a credential for the transport during authentication.
    fn credentials(
        &mut self,
        url: &str,
        username_from_url: Option<&str>,
        allowed: CredentialKinds,
    ) -> Result<Option<Credential>> {
        let _ = (url, username_from_url, allowed);
        Ok(None)
    }

    /// Pass judgment on the certificate the peer presented. `valid` carries
    /// the transport's own verdict, which a pass-through keeps.
    fn certificate_check(
        &mut self,
        certificate: &Certificate,
        valid: bool,
        host: &str,
    ) -> Option<CertificateDecision> {
        let _ = (certificate, valid, host);
        None
    }

    /// Textual progress sent by the peer on the sideband channel.
    fn sideband_progress(&mut self, text: &str) {
        let _ = text;
    }

    /// Supply a transport, overriding the registry lookup.
    fn transport(&mut self) -> Result<Option<Box<dyn Transport>>> {
        Ok(None)
    }

    /// One final chance to rewrite the URL before the transport sees it.
    fn resolve_url(&mut self, url: &str, direction: Direction) -> Result<Option<String>> {
        let _ = (url, direction);
        Ok(None)
    }

    /// A local reference changed: created (`old` is zero), updated, or
    /// deleted (`new` is zero). An error aborts the operation.
    fn update_tips(&mut self, refname: &str, old: &Oid, new: &Oid) -> Result<()> {
        let _ = (refname, old, new);
        Ok(())
    }

    /// The peer's verdict on one pushed reference; `status` is `None` on
    /// success and carries the rejection message otherwise.
    fn push_update_reference(&mut self, refname: &str, status: Option<&str>) -> Result<()> {
        let _ = (refname, status);
        Ok(())
    }

    /// Called when an operation would block: the transport is interested in
    /// `interest` on `fd` within `timeout`. Return `true` to take ownership
    /// of waiting: the operation then returns [`Progress::Again`] and the
    /// caller re-enters with [`Remote::perform`] once the descriptor is
    /// ready. The default returns `false`, which makes the remote wait
    /// internally and never surface `Again`.
    ///
    /// [`Progress::Again`]: enum.Progress.html
    /// [`Remote::perform`]: struct.Remote.html#method.perform
    fn set_fd_events(&mut self, fd: RawFd, interest: EventSet, timeout: Duration) -> bool {
        let _ = (fd, interest, timeout);
        false
    }
}

/// The hook set installed when the caller does not supply one.
pub struct DefaultCallbacks;

impl Callbacks for DefaultCallbacks {}
