//! A repository that stores everything in memory.
//!
//! **IMPORTANT NOTE:** This is intended as a reference implementation of the
//! storage contracts largely for testing purposes and does not persist
//! anything. That said, it does intentionally follow the same observable
//! semantics as the traditional `.git` storage (multi-valued configuration
//! keys in storage order, symbolic references, an append-only FETCH_HEAD)
//! so that results may be compared for similar operations.

use std::cell::RefCell;

use crate::config::ConfigStore;
use crate::error::Result;
use crate::refdb::RefDb;
use crate::repo::{FetchHeadEntry, Odb, Repo};

mod config;
pub use config::MemoryConfig;

mod refdb;
pub use refdb::{MemoryOdb, MemoryRefDb};

/// An in-memory [`Repo`].
///
/// [`Repo`]: ../trait.Repo.html
pub struct InMemory {
    config: MemoryConfig,
    refs: MemoryRefDb,
    odb: MemoryOdb,
    fetch_head: RefCell<Vec<FetchHeadEntry>>,
}

impl InMemory {
    /// Create a new, empty repository.
    pub fn new() -> InMemory {
        InMemory {
            config: MemoryConfig::new(),
            refs: MemoryRefDb::new(),
            odb: MemoryOdb::new(),
            fetch_head: RefCell::new(Vec::new()),
        }
    }

    /// The concrete configuration store, for direct seeding in tests.
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// The concrete reference store.
    pub fn refs(&self) -> &MemoryRefDb {
        &self.refs
    }

    /// The concrete object store.
    pub fn odb(&self) -> &MemoryOdb {
        &self.odb
    }

    /// The current FETCH_HEAD contents, in file order.
    pub fn fetch_head(&self) -> Vec<FetchHeadEntry> {
        self.fetch_head.borrow().clone()
    }
}

impl Default for InMemory {
    fn default() -> InMemory {
        InMemory::new()
    }
}

impl Repo for InMemory {
    fn config(&self) -> &dyn ConfigStore {
        &self.config
    }

    fn refs(&self) -> &dyn RefDb {
        &self.refs
    }

    fn odb(&self) -> &dyn Odb {
        &self.odb
    }

    fn truncate_fetch_head(&self) -> Result<()> {
        self.fetch_head.borrow_mut().clear();
        Ok(())
    }

    fn append_fetch_head(&self, entries: &[FetchHeadEntry]) -> Result<()> {
        self.fetch_head.borrow_mut().extend(entries.iter().cloned());
        Ok(())
    }
}
