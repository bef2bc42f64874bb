use std::cell::RefCell;

use regex::Regex;

use crate::config::{ConfigEntry, ConfigStore};
use crate::error::{Error, Result};

/// An in-memory [`ConfigStore`] holding entries in storage order.
///
/// [`ConfigStore`]: ../trait.ConfigStore.html
pub struct MemoryConfig {
    entries: RefCell<Vec<(String, String)>>,
}

impl MemoryConfig {
    pub fn new() -> MemoryConfig {
        MemoryConfig {
            entries: RefCell::new(Vec::new()),
        }
    }

    /// All entries in storage order, mostly useful for assertions.
    pub fn entries(&self) -> Vec<ConfigEntry> {
        self.entries
            .borrow()
            .iter()
            .map(|(name, value)| ConfigEntry {
                name: name.clone(),
                value: value.clone(),
            })
            .collect()
    }
}

impl Default for MemoryConfig {
    fn default() -> MemoryConfig {
        MemoryConfig::new()
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|err| Error::invalid(format!("invalid configuration pattern: {}", err)))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" | "" => Some(false),
        _ => None,
    }
}

impl ConfigStore for MemoryConfig {
    fn get_string(&self, key: &str) -> Result<String> {
        self.entries
            .borrow()
            .iter()
            .rev()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| Error::not_found(format!("config value '{}' was not found", key)))
    }

    fn get_bool(&self, key: &str) -> Result<bool> {
        let value = self.get_string(key)?;
        parse_bool(&value).ok_or_else(|| {
            Error::invalid(format!("failed to parse '{}' as a boolean value", value))
        })
    }

    fn get_all(&self, key: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .borrow()
            .iter()
            .filter(|(name, _)| name == key)
            .map(|(_, value)| value.clone())
            .collect())
    }

    fn entries_matching(&self, pattern: &str) -> Result<Vec<ConfigEntry>> {
        let re = compile(pattern)?;

        Ok(self
            .entries
            .borrow()
            .iter()
            .filter(|(name, _)| re.is_match(name))
            .map(|(name, value)| ConfigEntry {
                name: name.clone(),
                value: value.clone(),
            })
            .collect())
    }

    fn set_string(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.borrow_mut();

        match entries.iter().position(|(name, _)| name == key) {
            Some(pos) => {
                entries[pos].1 = value.to_string();

                let mut i = pos + 1;
                while i < entries.len() {
                    if entries[i].0 == key {
                        entries.remove(i);
                    } else {
                        i += 1;
                    }
                }
            }
            None => entries.push((key.to_string(), value.to_string())),
        }

        Ok(())
    }

    fn set_multivar(&self, key: &str, value_pattern: &str, value: &str) -> Result<()> {
        let re = compile(value_pattern)?;
        let mut entries = self.entries.borrow_mut();
        let mut replaced = false;

        for entry in entries.iter_mut().filter(|(name, _)| name == key) {
            if re.is_match(&entry.1) {
                entry.1 = value.to_string();
                replaced = true;
            }
        }

        if !replaced {
            entries.push((key.to_string(), value.to_string()));
        }

        Ok(())
    }

    fn delete_entry(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.borrow_mut();
        let len_before = entries.len();
        entries.retain(|(name, _)| name != key);

        if entries.len() == len_before {
            Err(Error::not_found(format!(
                "could not delete config value '{}': not found",
                key
            )))
        } else {
            Ok(())
        }
    }

    fn rename_section(&self, section: &str, new_name: Option<&str>) -> Result<()> {
        let prefix = format!("{}.", section);
        let mut entries = self.entries.borrow_mut();

        match new_name {
            Some(new_name) => {
                for entry in entries.iter_mut() {
                    if let Some(rest) = entry.0.strip_prefix(&prefix) {
                        entry.0 = format!("{}.{}", new_name, rest);
                    }
                }
            }
            None => entries.retain(|(name, _)| !name.starts_with(&prefix)),
        }

        Ok(())
    }

    fn snapshot(&self) -> Result<Box<dyn ConfigStore>> {
        Ok(Box::new(MemoryConfig {
            entries: RefCell::new(self.entries.borrow().clone()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_string() {
        let config = MemoryConfig::new();
        assert!(config.get_string("core.bare").unwrap_err().is_not_found());

        config.set_string("core.bare", "false").unwrap();
        assert_eq!(config.get_string("core.bare").unwrap(), "false");

        config.set_string("core.bare", "true").unwrap();
        assert_eq!(config.get_string("core.bare").unwrap(), "true");
        assert_eq!(config.entries().len(), 1);
    }

    #[test]
    fn get_bool() {
        let config = MemoryConfig::new();
        config.set_string("a.b", "true").unwrap();
        config.set_string("a.c", "off").unwrap();
        config.set_string("a.d", "1").unwrap();
        config.set_string("a.e", "maybe").unwrap();

        assert!(config.get_bool("a.b").unwrap());
        assert!(!config.get_bool("a.c").unwrap());
        assert!(config.get_bool("a.d").unwrap());
        assert!(config.get_bool("a.e").is_err());
        assert!(config.get_bool("a.f").unwrap_err().is_not_found());
    }

    #[test]
    fn multivar_append_and_replace() {
        let config = MemoryConfig::new();

        // "$^" never matches, so each set appends.
        config
            .set_multivar("remote.origin.fetch", "$^", "+refs/heads/*:refs/remotes/origin/*")
            .unwrap();
        config
            .set_multivar("remote.origin.fetch", "$^", "+refs/tags/*:refs/tags/*")
            .unwrap();

        assert_eq!(
            config.get_all("remote.origin.fetch").unwrap(),
            vec![
                "+refs/heads/*:refs/remotes/origin/*".to_string(),
                "+refs/tags/*:refs/tags/*".to_string(),
            ]
        );

        // The newest value wins single-valued reads.
        assert_eq!(
            config.get_string("remote.origin.fetch").unwrap(),
            "+refs/tags/*:refs/tags/*"
        );

        // A matching pattern replaces in place.
        config
            .set_multivar("remote.origin.fetch", "tags", "+refs/notes/*:refs/notes/*")
            .unwrap();
        assert_eq!(
            config.get_all("remote.origin.fetch").unwrap(),
            vec![
                "+refs/heads/*:refs/remotes/origin/*".to_string(),
                "+refs/notes/*:refs/notes/*".to_string(),
            ]
        );
    }

    #[test]
    fn entries_matching() {
        let config = MemoryConfig::new();
        config.set_string("remote.origin.url", "u1").unwrap();
        config.set_string("remote.origin.pushurl", "u2").unwrap();
        config.set_string("remote.other.url", "u3").unwrap();
        config.set_string("branch.master.remote", "origin").unwrap();

        let urls = config
            .entries_matching(r"^remote\..*\.(push)?url$")
            .unwrap();
        assert_eq!(urls.len(), 3);

        let branches = config.entries_matching(r"branch\..+\.remote").unwrap();
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].value, "origin");

        assert!(config.entries_matching(r"remote\.[").is_err());
    }

    #[test]
    fn delete_entry() {
        let config = MemoryConfig::new();
        config.set_string("a.b", "1").unwrap();
        config.delete_entry("a.b").unwrap();
        assert!(config.delete_entry("a.b").unwrap_err().is_not_found());
    }

    #[test]
    fn rename_section() {
        let config = MemoryConfig::new();
        config.set_string("remote.origin.url", "u1").unwrap();
        config
            .set_multivar("remote.origin.fetch", "$^", "spec")
            .unwrap();
        config.set_string("remote.other.url", "u2").unwrap();

        config
            .rename_section("remote.origin", Some("remote.upstream"))
            .unwrap();
        assert_eq!(config.get_string("remote.upstream.url").unwrap(), "u1");
        assert_eq!(config.get_string("remote.upstream.fetch").unwrap(), "spec");
        assert!(config
            .get_string("remote.origin.url")
            .unwrap_err()
            .is_not_found());
        assert_eq!(config.get_string("remote.other.url").unwrap(), "u2");

        config.rename_section("remote.upstream", None).unwrap();
        assert!(config
            .get_string("remote.upstream.url")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn snapshot_is_independent() {
        let config = MemoryConfig::new();
        config.set_string("a.b", "1").unwrap();

        let snap = config.snapshot().unwrap();
        config.set_string("a.b", "2").unwrap();

        assert_eq!(snap.get_string("a.b").unwrap(), "1");
        assert_eq!(config.get_string("a.b").unwrap(), "2");
    }
}
