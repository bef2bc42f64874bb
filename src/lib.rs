//! Remote coordination for rsgit repositories.
//!
//! ## Design Goals
//!
//! Rsgit intends to allow repositories to be stored in multiple different
//! mechanisms, and the same holds for how a repository talks to its peers.
//! This crate implements the part that orchestrates a conversation with a
//! named peer repository: resolving and rewriting URLs, selecting a wire
//! transport, negotiating and transferring packs, and reconciling the local
//! reference namespace afterwards (remote-tracking branches, FETCH_HEAD,
//! pruning).
//!
//! The wire protocols themselves, the configuration store, the reference
//! database, and the object database are abstract services (see [`Repo`],
//! [`Transport`], and friends). An in-memory reference implementation of the
//! repository services is provided in [`memory`], largely for testing
//! purposes.
//!
//! ## Driving I/O
//!
//! Operations that touch the network can be driven two ways. By default they
//! block: the remote waits on the transport's descriptor internally and the
//! call returns only once the operation has finished. A caller that would
//! rather wait itself implements [`Callbacks::set_fd_events`] returning
//! `true`; operations then return [`Progress::Again`] whenever they would
//! block, and the caller re-enters with [`Remote::perform`] once the
//! descriptor is ready.

mod callbacks;
pub use callbacks::{
    Callbacks, Certificate, CertificateDecision, CertificateKind, Credential, CredentialKinds,
    DefaultCallbacks,
};

mod config;
pub use config::{ConfigEntry, ConfigStore};

mod error;
pub use error::{Error, Result};

mod events;
pub use events::EventSet;

mod fetch;
pub use fetch::{AutotagOption, FetchOptions, FetchPrune};

pub mod memory;

mod oid;
pub use oid::{Oid, ParseOidError};

mod push;
pub use push::PushOptions;

mod refdb;
pub use refdb::{Ref, RefDb};

pub mod refname;

mod refspec;
pub use refspec::{Direction, ParseRefspecError, Refspec};

mod remote;
pub use remote::{
    add_fetch, add_push, delete, is_valid_name, list, rename, set_autotag, set_pushurl, set_url,
    CreateOptions, Remote,
};

mod repo;
pub use repo::{FetchHeadEntry, Odb, Repo};

pub mod transport;
pub use transport::{
    Progress, ProxyOptions, PushStatus, PushUpdate, RemoteHead, TransferProgress, Transport,
    TransportContext,
};
