use crate::error::Result;

/// A single key/value pair held by a configuration store.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigEntry {
    /// The full key name, e.g. `remote.origin.url`.
    pub name: String,
    pub value: String,
}

/// A struct that implements the `ConfigStore` trait provides the persisted
/// key/value configuration of a repository.
///
/// Keys are multi-valued: a key may be stored several times and the order of
/// storage is observable. `get_string` and `get_bool` resolve to the most
/// recently stored value, matching how a configuration file is read front to
/// back.
///
/// Implementations are expected to use interior mutability; every method
/// takes `&self`.
pub trait ConfigStore {
    /// Look up a single-valued key. Fails with a not-found error if the key
    /// is absent.
    fn get_string(&self, key: &str) -> Result<String>;

    /// Look up a boolean key (`true`/`false`, `yes`/`no`, `on`/`off`,
    /// `1`/`0`). Fails with a not-found error if the key is absent.
    fn get_bool(&self, key: &str) -> Result<bool>;

    /// All values stored under exactly `key`, in storage order. An absent
    /// key yields an empty list.
    fn get_all(&self, key: &str) -> Result<Vec<String>>;

    /// All entries whose full key name matches the regular expression
    /// `pattern`, in storage order.
    fn entries_matching(&self, pattern: &str) -> Result<Vec<ConfigEntry>>;

    /// Store `value` under `key`, replacing any existing values.
    fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Store `value` under the multi-valued `key`: existing values matching
    /// the regular expression `value_pattern` are replaced in place; if none
    /// match, the value is appended. The unmatchable pattern `$^` therefore
    /// always appends.
    fn set_multivar(&self, key: &str, value_pattern: &str, value: &str) -> Result<()>;

    /// Remove every value stored under `key`. Fails with a not-found error
    /// if the key is absent.
    fn delete_entry(&self, key: &str) -> Result<()>;

    /// Rename every key under `section.` to live under `new_name.`, or
    /// remove the whole section when `new_name` is `None`. A section with no
    /// entries is not an error.
    fn rename_section(&self, section: &str, new_name: Option<&str>) -> Result<()>;

    /// An independent copy of the current state, for reads that must not
    /// observe concurrent writes.
    fn snapshot(&self) -> Result<Box<dyn ConfigStore>>;
}

/// Treat a not-found error as an absent value; any other error propagates.
pub(crate) fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn optional_swallows_not_found() {
        let found: Result<i32> = Ok(7);
        assert_eq!(optional(found).unwrap(), Some(7));

        let absent: Result<i32> = Err(Error::not_found("no such key"));
        assert_eq!(optional(absent).unwrap(), None);

        let other: Result<i32> = Err(Error::invalid("bad"));
        assert!(optional(other).is_err());
    }
}
