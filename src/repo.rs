use crate::config::ConfigStore;
use crate::error::Result;
use crate::oid::Oid;
use crate::refdb::RefDb;

/// One line of the FETCH_HEAD file: an object, the peer-side name it was
/// advertised under, where it came from, and whether a subsequent merge
/// should consume it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FetchHeadEntry {
    pub oid: Oid,
    pub is_merge: bool,
    pub ref_name: String,
    pub remote_url: String,
}

/// Object-database access, as far as remote coordination needs it: presence
/// checks only. Object transfer itself is the transport's concern.
pub trait Odb {
    fn exists(&self, id: &Oid) -> bool;
}

/// A struct that implements the `Repo` trait aggregates the storage services
/// a remote operates against. Consider the information stored in a typical
/// `.git` directory: the configuration file, the reference namespace, the
/// object store, and the FETCH_HEAD scratch file. You will be providing an
/// alternative to that storage mechanism.
///
/// The built-in [`memory`] module provides an in-memory implementation,
/// largely for testing purposes.
///
/// [`memory`]: ../memory/index.html
pub trait Repo {
    /// The repository's configuration.
    fn config(&self) -> &dyn ConfigStore;

    /// The repository's reference namespace.
    fn refs(&self) -> &dyn RefDb;

    /// The repository's object database.
    fn odb(&self) -> &dyn Odb;

    /// Discard the current contents of FETCH_HEAD.
    fn truncate_fetch_head(&self) -> Result<()>;

    /// Append entries to FETCH_HEAD.
    fn append_fetch_head(&self, entries: &[FetchHeadEntry]) -> Result<()>;
}
