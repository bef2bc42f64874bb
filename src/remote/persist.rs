//! Operations on a remote's persisted state: URL and refspec configuration
//! writes, tag policy, enumeration, rename, and deletion.

use tracing::debug;

use crate::error::{Error, Result};
use crate::fetch::AutotagOption;
use crate::refspec::{Direction, Refspec};
use crate::remote::{ensure_does_not_exist, ensure_valid_name, url, Remote};
use crate::repo::Repo;

/// Set (or, with `None`, delete) the fetch URL of a named remote.
pub fn set_url(repo: &dyn Repo, name: &str, new_url: Option<&str>) -> Result<()> {
    set_url_key(repo, name, "url", new_url)
}

/// Set (or, with `None`, delete) the push URL of a named remote.
pub fn set_pushurl(repo: &dyn Repo, name: &str, new_url: Option<&str>) -> Result<()> {
    set_url_key(repo, name, "pushurl", new_url)
}

fn set_url_key(repo: &dyn Repo, name: &str, key: &str, new_url: Option<&str>) -> Result<()> {
    ensure_valid_name(name)?;

    let full_key = format!("remote.{}.{}", name, key);

    match new_url {
        Some(new_url) => {
            // Validation only; the raw URL is what gets persisted.
            url::canonicalize(new_url)?;
            repo.config().set_string(&full_key, new_url)
        }
        None => repo.config().delete_entry(&full_key),
    }
}

/// Append a fetch refspec to a named remote's configuration.
pub fn add_fetch(repo: &dyn Repo, name: &str, refspec: &str) -> Result<()> {
    write_add_refspec(repo, name, refspec, Direction::Fetch)
}

/// Append a push refspec to a named remote's configuration.
pub fn add_push(repo: &dyn Repo, name: &str, refspec: &str) -> Result<()> {
    write_add_refspec(repo, name, refspec, Direction::Push)
}

pub(crate) fn write_add_refspec(
    repo: &dyn Repo,
    name: &str,
    refspec: &str,
    direction: Direction,
) -> Result<()> {
    ensure_valid_name(name)?;

    // Parsed only to validate the grammar.
    Refspec::parse(refspec, direction)?;

    let key = match direction {
        Direction::Fetch => format!("remote.{}.fetch", name),
        Direction::Push => format!("remote.{}.push", name),
    };

    // "$^" is an unmatchable regexp: it will not match anything at all, so
    // all values are considered new and no present value is replaced.
    repo.config().set_multivar(&key, "$^", refspec)
}

/// Persist the tag-following policy of a named remote. `Auto` removes the
/// key; `Unspecified` is not a persistable value.
pub fn set_autotag(repo: &dyn Repo, name: &str, value: AutotagOption) -> Result<()> {
    ensure_valid_name(name)?;

    let key = format!("remote.{}.tagopt", name);

    match value {
        AutotagOption::None => repo.config().set_string(&key, "--no-tags"),
        AutotagOption::All => repo.config().set_string(&key, "--tags"),
        AutotagOption::Auto => match repo.config().delete_entry(&key) {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        },
        AutotagOption::Unspecified => {
            Err(Error::invalid("invalid value for the tagopt setting"))
        }
    }
}

/// The names of all configured remotes, sorted and deduplicated.
pub fn list(repo: &dyn Repo) -> Result<Vec<String>> {
    let entries = repo
        .config()
        .entries_matching(r"^remote\..*\.(push)?url$")?;

    let mut names: Vec<String> = entries
        .iter()
        .filter_map(|entry| {
            let name = entry.name.strip_prefix("remote.")?;

            name.strip_suffix(".url")
                .or_else(|| name.strip_suffix(".pushurl"))
                .map(|name| name.to_string())
        })
        .collect();

    names.sort();
    names.dedup();
    Ok(names)
}

/// Rename a remote: its configuration section, every `branch.*.remote`
/// entry naming it, and every reference under its `refs/remotes/`
/// namespace (rewriting symref targets that fall inside it). Fetch
/// refspecs equal to the default for the old name migrate to the default
/// for the new name; any other fetch refspec is left as configured and
/// returned for the caller to reconcile manually.
pub fn rename(repo: &dyn Repo, name: &str, new_name: &str) -> Result<Vec<String>> {
    let remote = Remote::lookup(repo, name)?;

    ensure_valid_name(new_name)?;
    ensure_does_not_exist(repo, new_name)?;

    repo.config().rename_section(
        &format!("remote.{}", name),
        Some(&format!("remote.{}", new_name)),
    )?;

    update_branch_remote_entries(repo, name, new_name)?;
    rename_remote_references(repo, name, new_name)?;

    let problems = rename_fetch_refspecs(repo, &remote, new_name)?;

    debug!(old = %name, new = %new_name, "renamed remote");
    Ok(problems)
}

fn update_branch_remote_entries(repo: &dyn Repo, name: &str, new_name: &str) -> Result<()> {
    let config = repo.config();

    for entry in config.entries_matching(r"^branch\..+\.remote$")? {
        if entry.value == name {
            config.set_string(&entry.name, new_name)?;
        }
    }

    Ok(())
}

fn rename_remote_references(repo: &dyn Repo, name: &str, new_name: &str) -> Result<()> {
    let old_namespace = format!("refs/remotes/{}/", name);
    let new_namespace = format!("refs/remotes/{}/", new_name);
    let log_message = format!("renamed remote {} to {}", name, new_name);

    for refname in repo.refs().names_glob(&format!("{}*", old_namespace))? {
        let suffix = match refname.strip_prefix(&old_namespace) {
            Some(suffix) => suffix,
            None => continue,
        };

        let new_refname = format!("{}{}", new_namespace, suffix);
        let renamed = repo.refs().rename(&refname, &new_refname, true, &log_message)?;

        // Handle refs like origin/HEAD -> origin/master.
        if let Some(target) = renamed.symbolic_target() {
            if let Some(target_suffix) = target.strip_prefix(&old_namespace) {
                let new_target = format!("{}{}", new_namespace, target_suffix);
                repo.refs()
                    .set_symbolic_target(&new_refname, &new_target, &log_message)?;
            }
        }
    }

    Ok(())
}

fn rename_fetch_refspecs(
    repo: &dyn Repo,
    remote: &Remote<'_>,
    new_name: &str,
) -> Result<Vec<String>> {
    let old_default = match remote.name() {
        Some(name) => url::default_fetchspec_for_name(name),
        None => return Ok(Vec::new()),
    };

    let mut problems = Vec::new();

    for spec in remote
        .refspecs()
        .iter()
        .filter(|spec| spec.direction() == Direction::Fetch)
    {
        // Anything that doesn't look like the default refspec is the
        // caller's to sort out.
        if spec.as_str() != old_default {
            problems.push(spec.as_str().to_string());
            continue;
        }

        // The section rename already moved the entry; rewrite just that
        // value so other configured refspecs survive.
        repo.config().set_multivar(
            &format!("remote.{}.fetch", new_name),
            &format!("^{}$", regex::escape(&old_default)),
            &url::default_fetchspec_for_name(new_name),
        )?;
    }

    Ok(problems)
}

/// Delete a named remote: the `branch.*.remote` (and paired
/// `branch.*.merge`) entries naming it, every local reference matching a
/// destination of its configured refspecs, and its configuration section.
pub fn delete(repo: &dyn Repo, name: &str) -> Result<()> {
    remove_branch_related_entries(repo, name)?;
    remove_remote_tracking(repo, name)?;
    repo.config()
        .rename_section(&format!("remote.{}", name), None)?;

    debug!(name = %name, "deleted remote");
    Ok(())
}

fn remove_branch_related_entries(repo: &dyn Repo, name: &str) -> Result<()> {
    let config = repo.config();

    for entry in config.entries_matching(r"^branch\..+\.remote$")? {
        if entry.value != name {
            continue;
        }

        let branch = match entry
            .name
            .strip_prefix("branch.")
            .and_then(|rest| rest.strip_suffix(".remote"))
        {
            Some(branch) => branch,
            None => continue,
        };

        for key in &[
            format!("branch.{}.merge", branch),
            format!("branch.{}.remote", branch),
        ] {
            match config.delete_entry(key) {
                Ok(()) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
    }

    Ok(())
}

fn remove_remote_tracking(repo: &dyn Repo, name: &str) -> Result<()> {
    // Use what's in the configuration, regardless of any instance in
    // memory.
    let remote = Remote::lookup(repo, name)?;

    for spec in remote.refspecs() {
        let to_remove: Vec<String> = repo
            .refs()
            .names()?
            .into_iter()
            .filter(|refname| spec.dst_matches(refname))
            .collect();

        for refname in to_remove {
            repo.refs().delete(&refname)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemory;
    use crate::oid::Oid;
    use crate::refdb::RefDb;

    fn oid(n: u8) -> Oid {
        Oid::new(&[n; 20]).unwrap()
    }

    fn repo_with_origin() -> InMemory {
        let repo = InMemory::new();
        Remote::create(&repo, "origin", "https://example.org/r.git").unwrap();
        repo
    }

    #[test]
    fn set_url_and_delete() {
        let repo = repo_with_origin();

        set_url(&repo, "origin", Some("https://example.org/other.git")).unwrap();
        assert_eq!(
            Repo::config(&repo).get_string("remote.origin.url").unwrap(),
            "https://example.org/other.git"
        );

        set_pushurl(&repo, "origin", Some("ssh://example.org/r.git")).unwrap();
        assert_eq!(
            Repo::config(&repo)
                .get_string("remote.origin.pushurl")
                .unwrap(),
            "ssh://example.org/r.git"
        );

        set_pushurl(&repo, "origin", None).unwrap();
        assert!(Repo::config(&repo)
            .get_string("remote.origin.pushurl")
            .unwrap_err()
            .is_not_found());

        let err = set_url(&repo, "origin", Some("")).unwrap_err();
        assert!(matches!(err, Error::InvalidSpec(_)));
    }

    #[test]
    fn add_refspecs_append() {
        let repo = repo_with_origin();

        add_fetch(&repo, "origin", "+refs/notes/*:refs/notes/*").unwrap();
        add_push(&repo, "origin", "refs/heads/master").unwrap();

        let fetches = Repo::config(&repo).get_all("remote.origin.fetch").unwrap();
        assert_eq!(fetches.len(), 2);
        assert_eq!(fetches[1], "+refs/notes/*:refs/notes/*");

        assert_eq!(
            Repo::config(&repo).get_all("remote.origin.push").unwrap(),
            vec!["refs/heads/master".to_string()]
        );

        let err = add_fetch(&repo, "origin", "not a refspec").unwrap_err();
        assert!(matches!(err, Error::InvalidSpec(_)));
    }

    #[test]
    fn autotag_roundtrip() {
        let repo = repo_with_origin();

        set_autotag(&repo, "origin", AutotagOption::None).unwrap();
        assert_eq!(
            Remote::lookup(&repo, "origin").unwrap().autotag(),
            AutotagOption::None
        );

        set_autotag(&repo, "origin", AutotagOption::All).unwrap();
        assert_eq!(
            Remote::lookup(&repo, "origin").unwrap().autotag(),
            AutotagOption::All
        );

        set_autotag(&repo, "origin", AutotagOption::Auto).unwrap();
        assert_eq!(
            Remote::lookup(&repo, "origin").unwrap().autotag(),
            AutotagOption::Auto
        );

        assert!(set_autotag(&repo, "origin", AutotagOption::Unspecified).is_err());
    }

    #[test]
    fn list_names() {
        let repo = InMemory::new();
        assert!(list(&repo).unwrap().is_empty());

        Remote::create(&repo, "origin", "https://example.org/r.git").unwrap();
        Remote::create(&repo, "upstream", "https://example.org/u.git").unwrap();
        Repo::config(&repo)
            .set_string("remote.pushonly.pushurl", "ssh://example.org/p.git")
            .unwrap();

        assert_eq!(
            list(&repo).unwrap(),
            vec![
                "origin".to_string(),
                "pushonly".to_string(),
                "upstream".to_string(),
            ]
        );
    }

    #[test]
    fn rename_migrates_default_refspec() {
        let repo = repo_with_origin();

        let problems = rename(&repo, "origin", "upstream").unwrap();
        assert!(problems.is_empty());

        let config = Repo::config(&repo);
        assert_eq!(
            config.get_string("remote.upstream.url").unwrap(),
            "https://example.org/r.git"
        );
        assert_eq!(
            config.get_string("remote.upstream.fetch").unwrap(),
            "+refs/heads/*:refs/remotes/upstream/*"
        );
        assert!(config
            .get_string("remote.origin.url")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn rename_reports_problem_refspecs() {
        let repo = InMemory::new();
        Remote::create_with_fetchspec(
            &repo,
            "upstream",
            "https://example.org/r.git",
            "+refs/heads/release/*:refs/remotes/upstream/release/*",
        )
        .unwrap();

        let problems = rename(&repo, "upstream", "up").unwrap();
        assert_eq!(
            problems,
            vec!["+refs/heads/release/*:refs/remotes/upstream/release/*".to_string()]
        );

        // The section moved, the odd refspec stayed as configured.
        let config = Repo::config(&repo);
        assert_eq!(
            config.get_string("remote.up.fetch").unwrap(),
            "+refs/heads/release/*:refs/remotes/upstream/release/*"
        );
    }

    #[test]
    fn rename_moves_references_and_symrefs() {
        let repo = repo_with_origin();
        repo.refs()
            .create("refs/remotes/origin/master", oid(1), false, "m")
            .unwrap();
        repo.refs()
            .put_symbolic("refs/remotes/origin/HEAD", "refs/remotes/origin/master");

        rename(&repo, "origin", "upstream").unwrap();

        assert!(repo
            .refs()
            .names_glob("refs/remotes/origin/*")
            .unwrap()
            .is_empty());
        assert_eq!(
            repo.refs()
                .name_to_id("refs/remotes/upstream/master")
                .unwrap(),
            oid(1)
        );
        assert_eq!(
            repo.refs()
                .lookup("refs/remotes/upstream/HEAD")
                .unwrap()
                .symbolic_target(),
            Some("refs/remotes/upstream/master")
        );
    }

    #[test]
    fn rename_updates_branch_entries() {
        let repo = repo_with_origin();
        let config = Repo::config(&repo);
        config.set_string("branch.master.remote", "origin").unwrap();
        config
            .set_string("branch.master.merge", "refs/heads/master")
            .unwrap();
        config.set_string("branch.other.remote", "elsewhere").unwrap();

        rename(&repo, "origin", "upstream").unwrap();

        assert_eq!(
            config.get_string("branch.master.remote").unwrap(),
            "upstream"
        );
        assert_eq!(
            config.get_string("branch.other.remote").unwrap(),
            "elsewhere"
        );
    }

    #[test]
    fn rename_validates_names() {
        let repo = repo_with_origin();

        assert!(rename(&repo, "missing", "other").unwrap_err().is_not_found());
        assert!(matches!(
            rename(&repo, "origin", "in valid").unwrap_err(),
            Error::InvalidSpec(_)
        ));

        Remote::create(&repo, "upstream", "https://example.org/u.git").unwrap();
        assert!(rename(&repo, "origin", "upstream").unwrap_err().is_exists());
    }

    #[test]
    fn delete_removes_everything() {
        let repo = repo_with_origin();
        let config = Repo::config(&repo);
        config.set_string("branch.master.remote", "origin").unwrap();
        config
            .set_string("branch.master.merge", "refs/heads/master")
            .unwrap();
        repo.refs()
            .create("refs/remotes/origin/master", oid(1), false, "m")
            .unwrap();
        repo.refs()
            .create("refs/heads/master", oid(1), false, "m")
            .unwrap();

        delete(&repo, "origin").unwrap();

        assert!(Remote::lookup(&repo, "origin").unwrap_err().is_not_found());
        assert!(config
            .get_string("branch.master.remote")
            .unwrap_err()
            .is_not_found());
        assert!(config
            .get_string("branch.master.merge")
            .unwrap_err()
            .is_not_found());
        assert!(repo
            .refs()
            .names_glob("refs/remotes/origin/*")
            .unwrap()
            .is_empty());
        // Local branches are untouched.
        assert_eq!(repo.refs().name_to_id("refs/heads/master").unwrap(), oid(1));
    }
}
