//! Reference reconciliation after a transfer: remote-tracking updates,
//! FETCH_HEAD, opportunistic updates, pruning, and default-branch
//! discovery.

use tracing::debug;

use crate::callbacks::Callbacks;
use crate::error::{Error, Result};
use crate::fetch::AutotagOption;
use crate::oid::Oid;
use crate::refname;
use crate::refspec::{Direction, Refspec};
use crate::remote::Remote;
use crate::repo::FetchHeadEntry;
use crate::transport::RemoteHead;

const TAGS_REFSPEC: &str = "+refs/tags/*:refs/tags/*";

impl<'r> Remote<'r> {
    /// Bring the local reference namespace up to date with the peer's
    /// advertisement: remote-tracking branches, tags per `download_tags`,
    /// FETCH_HEAD (when `update_fetchhead` is set), and opportunistic
    /// updates when the driving fetch used caller-supplied refspecs.
    ///
    /// After a push this instead reconciles the remote-tracking branches of
    /// the references the peer accepted.
    pub fn update_tips(
        &mut self,
        callbacks: Option<Box<dyn Callbacks + 'r>>,
        update_fetchhead: bool,
        download_tags: AutotagOption,
        reflog_message: Option<&str>,
    ) -> Result<()> {
        self.check_busy()?;

        if let Some(callbacks) = callbacks {
            self.install_callbacks(Some(callbacks));
        }

        self.update_tips_inner(
            update_fetchhead,
            download_tags,
            reflog_message.unwrap_or("update tips"),
        )
    }

    pub(crate) fn update_tips_inner(
        &mut self,
        update_fetchhead: bool,
        download_tags: AutotagOption,
        message: &str,
    ) -> Result<()> {
        let repo = self.repo_required("update tips on")?;

        // Push has its own logic hidden away in the push object.
        if let Some(push) = self.push.take() {
            let outcome = push.update_tips(repo, &self.refspecs, self.callbacks.as_mut(), message);
            self.push = Some(push);
            return outcome;
        }
        let refs = self.ls()?.to_vec();

        let tagopt = match download_tags {
            AutotagOption::Unspecified => self.download_tags,
            tagopt => tagopt,
        };

        repo.truncate_fetch_head()?;

        if tagopt == AutotagOption::All {
            let tagspec = Refspec::parse(TAGS_REFSPEC, Direction::Fetch)?;
            self.update_tips_for_spec(&tagspec, &refs, update_fetchhead, tagopt, message)?;
        }

        let active = self.active_refspecs.clone();
        for spec in active.iter().filter(|s| s.direction() == Direction::Fetch) {
            self.update_tips_for_spec(spec, &refs, update_fetchhead, tagopt, message)?;
        }

        // Only try opportunistic updates if the refspec lists differ.
        if self.passed_refspecs {
            self.opportunistic_updates(&refs, message)?;
        }

        Ok(())
    }

    /// Apply one refspec against the advertisement, creating or updating
    /// local references and collecting the FETCH_HEAD candidates it is
    /// responsible for.
    fn update_tips_for_spec(
        &mut self,
        spec: &Refspec,
        refs: &[RemoteHead],
        update_fetchhead: bool,
        tagopt: AutotagOption,
        message: &str,
    ) -> Result<()> {
        let repo = self.repo_required("update tips on")?;
        let tagspec = Refspec::parse(TAGS_REFSPEC, Direction::Fetch)?;

        let mut update_heads: Vec<RemoteHead> = Vec::new();

        for head in refs {
            // Ignore malformed ref names (which also saves us from tag^{}).
            if !refname::is_valid(&head.name) {
                continue;
            }

            let mut autotag = false;
            let mut refname: Option<String> = None;

            // If we have a tag, see if the auto-follow rules say to update it.
            if tagspec.src_matches(&head.name) && tagopt != AutotagOption::None {
                if tagopt == AutotagOption::Auto {
                    autotag = true;
                }

                refname = Some(head.name.clone());
            }

            // If we didn't auto-follow a tag, check if the refspec matches.
            if !autotag && spec.src_matches(&head.name) {
                if spec.dst().is_some() {
                    refname = Some(spec.transform(&head.name)?);
                } else {
                    // No destination means "record in FETCH_HEAD only".
                    update_heads.push(head.clone());
                    continue;
                }
            }

            let refname = match refname {
                Some(refname) => refname,
                None => continue,
            };

            // An auto-followed tag whose object never arrived still shows
            // up in FETCH_HEAD, but no local reference is created for it.
            if autotag && !repo.odb().exists(&head.oid) {
                update_heads.push(head.clone());
                continue;
            }

            if !autotag {
                update_heads.push(head.clone());
            }

            let old = match repo.refs().name_to_id(&refname) {
                Ok(old) => old,
                Err(err) if err.is_not_found() => {
                    if autotag {
                        update_heads.push(head.clone());
                    }
                    Oid::ZERO
                }
                Err(err) => return Err(err),
            };

            if old == head.oid {
                continue;
            }

            // In autotag mode, don't overwrite any locally-existing tag.
            match repo.refs().create(&refname, head.oid, !autotag, message) {
                Ok(()) => {}
                Err(err) if err.is_exists() => continue,
                Err(err) => return Err(err),
            }

            debug!(refname = %refname, old = %old, new = %head.oid, "updated tip");
            self.callbacks.update_tips(&refname, &old, &head.oid)?;
        }

        if update_fetchhead {
            self.write_fetch_head(spec, &update_heads)?;
        }

        Ok(())
    }

    /// Emit the FETCH_HEAD entries this refspec is responsible for. The
    /// merge entry is the ref `HEAD`'s upstream maps to for a wildcard
    /// spec, and the single identified ref otherwise.
    fn write_fetch_head(&self, spec: &Refspec, update_heads: &[RemoteHead]) -> Result<()> {
        // No heads, nothing to do.
        if update_heads.is_empty() {
            return Ok(());
        }

        let repo = self.repo_required("write FETCH_HEAD for")?;
        let url = self.url.clone().unwrap_or_default();

        // Iff the refspec is refs/heads/* (but not a subdir slash star),
        // tag candidates ride along too.
        let include_all = spec.src() == "refs/heads/*";

        let merge_name: Option<String> = if spec.is_wildcard() {
            self.head_upstream_merge(spec, update_heads)?
        } else {
            update_heads
                .iter()
                .find(|head| head.name == spec.src())
                .map(|head| head.name.clone())
        };

        let mut entries = Vec::new();
        for head in update_heads {
            let merge_this = merge_name.as_deref() == Some(head.name.as_str());

            if !include_all && !spec.src_matches(&head.name) && !merge_this {
                continue;
            }

            entries.push(FetchHeadEntry {
                oid: head.oid,
                is_merge: merge_this,
                ref_name: head.name.clone(),
                remote_url: url.clone(),
            });
        }

        // Merge entries come first; peer order is kept otherwise.
        entries.sort_by_key(|entry| !entry.is_merge);

        repo.append_fetch_head(&entries)
    }

    /// The advertised ref that `HEAD`'s configured upstream names, if the
    /// upstream belongs to this remote and the driving spec covers it.
    fn head_upstream_merge(
        &self,
        spec: &Refspec,
        update_heads: &[RemoteHead],
    ) -> Result<Option<String>> {
        let repo = self.repo_required("write FETCH_HEAD for")?;

        let name = match self.name() {
            Some(name) => name,
            None => return Ok(None),
        };

        let head = match repo.refs().lookup("HEAD") {
            Ok(head) => head,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };

        // An unborn branch still names its upstream through the symref
        // target; a detached HEAD has no upstream at all.
        let branch = match &head {
            crate::refdb::Ref::Symbolic { target, .. } => match repo.refs().resolve("HEAD") {
                Ok(resolved) => resolved.name().to_string(),
                Err(err) if err.is_not_found() => target.clone(),
                Err(err) => return Err(err),
            },
            crate::refdb::Ref::Direct { .. } => return Ok(None),
        };

        let short = match branch.strip_prefix("refs/heads/") {
            Some(short) => short,
            None => return Ok(None),
        };

        let config = repo.config();
        let upstream_remote =
            crate::config::optional(config.get_string(&format!("branch.{}.remote", short)))?;
        if upstream_remote.as_deref() != Some(name) {
            return Ok(None);
        }

        let merge = match crate::config::optional(
            config.get_string(&format!("branch.{}.merge", short)),
        )? {
            Some(merge) => merge,
            None => return Ok(None),
        };

        if !spec.src_matches(&merge) {
            return Ok(None);
        }

        Ok(update_heads
            .iter()
            .find(|head| head.name == merge)
            .map(|head| head.name.clone()))
    }

    /// Update remote-tracking branches the caller's narrowed refspecs did
    /// not ask for, wherever a configured fetch refspec also matches the
    /// advertised source. These never appear in FETCH_HEAD.
    fn opportunistic_updates(&mut self, refs: &[RemoteHead], message: &str) -> Result<()> {
        let repo = self.repo_required("update tips on")?;
        let active = self.active_refspecs.clone();
        let passive = self.passive_refspecs.clone();

        for head in refs {
            if !refname::is_valid(&head.name) {
                continue;
            }

            for spec in active.iter().filter(|s| s.direction() == Direction::Fetch) {
                if !spec.src_matches(&head.name) {
                    continue;
                }

                for passive_spec in passive
                    .iter()
                    .filter(|s| s.direction() == Direction::Fetch)
                {
                    if !passive_spec.src_matches(&head.name) {
                        continue;
                    }

                    let refname = passive_spec.transform(&head.name)?;

                    let old = match repo.refs().name_to_id(&refname) {
                        Ok(old) => old,
                        Err(err) if err.is_not_found() => Oid::ZERO,
                        Err(err) => return Err(err),
                    };

                    if old == head.oid {
                        continue;
                    }

                    // Make sure we haven't lost a race with another update.
                    let created = if old.is_zero() {
                        repo.refs().create(&refname, head.oid, true, message)
                    } else {
                        repo.refs()
                            .create_matching(&refname, head.oid, true, old, message)
                    };

                    match created {
                        Ok(()) => {}
                        Err(err) if err.is_exists() => continue,
                        Err(err) => return Err(err),
                    }

                    self.callbacks.update_tips(&refname, &old, &head.oid)?;
                }
            }
        }

        Ok(())
    }

    /// Delete local references that match the destination of a configured
    /// fetch refspec but whose source the peer no longer advertises.
    /// Symbolic references are never touched.
    pub fn prune(&mut self, callbacks: Option<Box<dyn Callbacks + 'r>>) -> Result<()> {
        self.check_busy()?;

        if let Some(callbacks) = callbacks {
            self.install_callbacks(Some(callbacks));
        }

        self.prune_inner()
    }

    pub(crate) fn prune_inner(&mut self) -> Result<()> {
        let repo = self.repo_required("prune")?;
        let remote_refs = self.ls()?.to_vec();
        let active = self.active_refspecs.clone();

        let fetch_specs: Vec<&Refspec> = active
            .iter()
            .filter(|spec| spec.direction() == Direction::Fetch)
            .collect();

        let mut candidates: Vec<String> = Vec::new();
        for name in repo.refs().names()? {
            if fetch_specs.iter().any(|spec| spec.dst_matches(&name)) {
                candidates.push(name);
            }
        }

        for refname in candidates {
            // Keep the candidate if any refspec maps it back to a name the
            // peer still advertises.
            let mut advertised = false;
            for spec in fetch_specs.iter().filter(|s| s.dst_matches(&refname)) {
                let src = spec.rtransform(&refname)?;
                if remote_refs.iter().any(|head| head.name == src) {
                    advertised = true;
                    break;
                }
            }

            if advertised {
                continue;
            }

            let reference = match repo.refs().lookup(&refname) {
                Ok(reference) => reference,
                // As we want it gone anyway, this is not an error.
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            };

            let old = match reference {
                crate::refdb::Ref::Direct { target, .. } => target,
                crate::refdb::Ref::Symbolic { .. } => continue,
            };

            repo.refs().delete(&refname)?;
            debug!(refname = %refname, "pruned stale remote-tracking reference");
            self.callbacks.update_tips(&refname, &old, &Oid::ZERO)?;
        }

        Ok(())
    }

    /// The branch the peer considers its default: the target of the
    /// advertised `HEAD` symref, or failing that a `refs/heads/` ref with
    /// `HEAD`'s object id, preferring `refs/heads/master`.
    pub fn default_branch(&self) -> Result<String> {
        let heads = self.ls()?;

        if heads.is_empty() || heads[0].name != "HEAD" {
            return Err(Error::not_found(
                "the remote did not advertise its default branch",
            ));
        }

        if let Some(symref) = &heads[0].symref_target {
            return Ok(symref.clone());
        }

        // No symref information; guess. The first match wins unless the
        // master branch is also a candidate.
        let head_id = heads[0].oid;
        let mut guess: Option<&RemoteHead> = None;

        for head in &heads[1..] {
            if head.oid != head_id || !head.name.starts_with("refs/heads/") {
                continue;
            }

            if guess.is_none() {
                guess = Some(head);
                continue;
            }

            if head.name == "refs/heads/master" {
                guess = Some(head);
                break;
            }
        }

        match guess {
            Some(head) => Ok(head.name.clone()),
            None => Err(Error::not_found(
                "the remote did not advertise its default branch",
            )),
        }
    }
}
