use std::cell::RefCell;
use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::refdb::{Ref, RefDb};
use crate::repo::Odb;

const MAX_SYMREF_DEPTH: usize = 5;

/// An in-memory [`RefDb`].
///
/// [`RefDb`]: ../trait.RefDb.html
pub struct MemoryRefDb {
    refs: RefCell<Vec<Ref>>,
}

impl MemoryRefDb {
    pub fn new() -> MemoryRefDb {
        MemoryRefDb {
            refs: RefCell::new(Vec::new()),
        }
    }

    /// Install a symbolic reference, creating or overwriting it.
    pub fn put_symbolic(&self, name: &str, target: &str) {
        let mut refs = self.refs.borrow_mut();
        let symbolic = Ref::Symbolic {
            name: name.to_string(),
            target: target.to_string(),
        };

        match refs.iter().position(|r| r.name() == name) {
            Some(pos) => refs[pos] = symbolic,
            None => refs.push(symbolic),
        }
    }

    fn not_found(name: &str) -> Error {
        Error::not_found(format!("reference '{}' not found", name))
    }
}

impl Default for MemoryRefDb {
    fn default() -> MemoryRefDb {
        MemoryRefDb::new()
    }
}

impl RefDb for MemoryRefDb {
    fn lookup(&self, name: &str) -> Result<Ref> {
        self.refs
            .borrow()
            .iter()
            .find(|r| r.name() == name)
            .cloned()
            .ok_or_else(|| MemoryRefDb::not_found(name))
    }

    fn resolve(&self, name: &str) -> Result<Ref> {
        let mut current = self.lookup(name)?;

        for _ in 0..MAX_SYMREF_DEPTH {
            if !current.is_symbolic() {
                return Ok(current);
            }

            let target = current.symbolic_target().unwrap_or_default().to_string();
            current = self.lookup(&target)?;
        }

        Err(Error::invalid(format!(
            "reference '{}' is nested too deeply",
            name
        )))
    }

    fn name_to_id(&self, name: &str) -> Result<Oid> {
        match self.resolve(name)? {
            Ref::Direct { target, .. } => Ok(target),
            Ref::Symbolic { .. } => Err(MemoryRefDb::not_found(name)),
        }
    }

    fn create(&self, name: &str, target: Oid, force: bool, _log_message: &str) -> Result<()> {
        let mut refs = self.refs.borrow_mut();
        let direct = Ref::Direct {
            name: name.to_string(),
            target,
        };

        match refs.iter().position(|r| r.name() == name) {
            Some(pos) => {
                if !force {
                    return Err(Error::exists(format!(
                        "reference '{}' already exists",
                        name
                    )));
                }
                refs[pos] = direct;
            }
            None => refs.push(direct),
        }

        Ok(())
    }

    fn create_matching(
        &self,
        name: &str,
        target: Oid,
        force: bool,
        expected: Oid,
        log_message: &str,
    ) -> Result<()> {
        let current = self
            .refs
            .borrow()
            .iter()
            .find(|r| r.name() == name)
            .cloned();

        let matches = match &current {
            None => expected.is_zero(),
            Some(Ref::Direct { target, .. }) => *target == expected,
            Some(Ref::Symbolic { .. }) => false,
        };

        if !matches {
            return Err(Error::exists(format!(
                "reference '{}' no longer points at the expected object",
                name
            )));
        }

        self.create(name, target, force, log_message)
    }

    fn set_symbolic_target(&self, name: &str, target: &str, _log_message: &str) -> Result<()> {
        let mut refs = self.refs.borrow_mut();

        match refs.iter().position(|r| r.name() == name) {
            Some(pos) => match &refs[pos] {
                Ref::Symbolic { .. } => {
                    refs[pos] = Ref::Symbolic {
                        name: name.to_string(),
                        target: target.to_string(),
                    };
                    Ok(())
                }
                Ref::Direct { .. } => Err(Error::invalid(format!(
                    "reference '{}' is not symbolic",
                    name
                ))),
            },
            None => Err(MemoryRefDb::not_found(name)),
        }
    }

    fn rename(&self, name: &str, new_name: &str, force: bool, _log_message: &str) -> Result<Ref> {
        if name == new_name {
            return self.lookup(name);
        }

        let mut refs = self.refs.borrow_mut();

        if !refs.iter().any(|r| r.name() == name) {
            return Err(MemoryRefDb::not_found(name));
        }

        if let Some(existing) = refs.iter().position(|r| r.name() == new_name) {
            if !force {
                return Err(Error::exists(format!(
                    "reference '{}' already exists",
                    new_name
                )));
            }
            refs.remove(existing);
        }

        let pos = refs
            .iter()
            .position(|r| r.name() == name)
            .ok_or_else(|| MemoryRefDb::not_found(name))?;

        let renamed = match &refs[pos] {
            Ref::Direct { target, .. } => Ref::Direct {
                name: new_name.to_string(),
                target: *target,
            },
            Ref::Symbolic { target, .. } => Ref::Symbolic {
                name: new_name.to_string(),
                target: target.clone(),
            },
        };

        refs[pos] = renamed.clone();
        Ok(renamed)
    }

    fn delete(&self, name: &str) -> Result<()> {
        let mut refs = self.refs.borrow_mut();
        let len_before = refs.len();
        refs.retain(|r| r.name() != name);

        if refs.len() == len_before {
            Err(MemoryRefDb::not_found(name))
        } else {
            Ok(())
        }
    }

    fn names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .refs
            .borrow()
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    fn names_glob(&self, pattern: &str) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .refs
            .borrow()
            .iter()
            .map(|r| r.name().to_string())
            .filter(|name| glob_match(pattern, name))
            .collect();
        names.sort();
        Ok(names)
    }
}

/// An in-memory [`Odb`] tracking which objects are present.
///
/// [`Odb`]: ../trait.Odb.html
pub struct MemoryOdb {
    ids: RefCell<HashSet<Oid>>,
}

impl MemoryOdb {
    pub fn new() -> MemoryOdb {
        MemoryOdb {
            ids: RefCell::new(HashSet::new()),
        }
    }

    /// Mark an object as present.
    pub fn insert(&self, id: Oid) {
        self.ids.borrow_mut().insert(id);
    }
}

impl Default for MemoryOdb {
    fn default() -> MemoryOdb {
        MemoryOdb::new()
    }
}

impl Odb for MemoryOdb {
    fn exists(&self, id: &Oid) -> bool {
        self.ids.borrow().contains(id)
    }
}

fn glob_match(pattern: &str, name: &str) -> bool {
    match pattern.find('*') {
        None => pattern == name,
        Some(pos) => {
            let prefix = &pattern[..pos];
            let suffix = &pattern[pos + 1..];

            name.len() >= prefix.len() + suffix.len()
                && name.starts_with(prefix)
                && name.ends_with(suffix)
        }
    }
}
