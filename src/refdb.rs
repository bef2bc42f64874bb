use crate::error::Result;
use crate::oid::Oid;

/// A reference: a named pointer to either an object or another reference.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Ref {
    /// Points directly at an object.
    Direct { name: String, target: Oid },

    /// Points at another reference by name, like `HEAD` or `origin/HEAD`.
    Symbolic { name: String, target: String },
}

impl Ref {
    /// The name of this reference.
    pub fn name(&self) -> &str {
        match self {
            Ref::Direct { name, .. } => name,
            Ref::Symbolic { name, .. } => name,
        }
    }

    /// Returns true for a symbolic reference.
    pub fn is_symbolic(&self) -> bool {
        matches!(self, Ref::Symbolic { .. })
    }

    /// The object this reference points at, if it is direct.
    pub fn target_id(&self) -> Option<Oid> {
        match self {
            Ref::Direct { target, .. } => Some(*target),
            Ref::Symbolic { .. } => None,
        }
    }

    /// The reference this reference points at, if it is symbolic.
    pub fn symbolic_target(&self) -> Option<&str> {
        match self {
            Ref::Symbolic { target, .. } => Some(target),
            Ref::Direct { .. } => None,
        }
    }
}

/// A struct that implements the `RefDb` trait represents a particular
/// mechanism for storing the reference namespace of a repository.
///
/// Implementations are expected to use interior mutability; every method
/// takes `&self`.
pub trait RefDb {
    /// Look up a reference by exact name without following symbolic
    /// references.
    fn lookup(&self, name: &str) -> Result<Ref>;

    /// Follow symbolic references starting at `name` until a direct
    /// reference is reached. Fails with a not-found error for a dangling
    /// chain.
    fn resolve(&self, name: &str) -> Result<Ref>;

    /// The object ID `name` resolves to.
    fn name_to_id(&self, name: &str) -> Result<Oid>;

    /// Create (or, with `force`, overwrite) a direct reference. Fails with
    /// an exists error when the name is taken and `force` is false.
    fn create(&self, name: &str, target: Oid, force: bool, log_message: &str) -> Result<()>;

    /// Like [`RefDb::create`], but only succeeds if the reference currently
    /// points at `expected` (or does not exist, when `expected` is the zero
    /// ID). A mismatch fails with an exists error.
    fn create_matching(
        &self,
        name: &str,
        target: Oid,
        force: bool,
        expected: Oid,
        log_message: &str,
    ) -> Result<()>;

    /// Repoint an existing symbolic reference.
    fn set_symbolic_target(&self, name: &str, target: &str, log_message: &str) -> Result<()>;

    /// Rename a reference, preserving its kind and target. Returns the
    /// renamed reference.
    fn rename(&self, name: &str, new_name: &str, force: bool, log_message: &str) -> Result<Ref>;

    /// Remove a reference. Fails with a not-found error if it is absent.
    fn delete(&self, name: &str) -> Result<()>;

    /// The names of all references, sorted.
    fn names(&self) -> Result<Vec<String>>;

    /// The names of all references matching a glob pattern (where `*`
    /// matches any run of characters), sorted.
    fn names_glob(&self, pattern: &str) -> Result<Vec<String>>;
}
