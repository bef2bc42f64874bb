//! The push engine: refspec registration, building the per-reference
//! updates to send, and reconciling remote-tracking branches afterwards.

use crate::callbacks::Callbacks;
use crate::config::optional;
use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::refspec::{Direction, Refspec};
use crate::repo::Repo;
use crate::transport::{ProxyOptions, PushStatus, PushUpdate, RemoteHead};

/// Options controlling a single push operation.
#[derive(Clone, Debug)]
pub struct PushOptions {
    /// How many packbuilder threads the transport may use (0 lets it pick).
    pub pb_parallelism: u32,
    pub proxy: ProxyOptions,
    pub custom_headers: Vec<String>,
}

impl Default for PushOptions {
    fn default() -> PushOptions {
        PushOptions {
            pb_parallelism: 1,
            proxy: ProxyOptions::default(),
            custom_headers: Vec::new(),
        }
    }
}

/// An in-flight push: the refspecs to act on, the updates computed from
/// them, and the peer's verdicts once the wire conversation finished.
pub(crate) struct Push {
    specs: Vec<Refspec>,
    updates: Vec<PushUpdate>,
    report: Vec<PushStatus>,
}

impl Push {
    pub(crate) fn new() -> Push {
        Push {
            specs: Vec::new(),
            updates: Vec::new(),
            report: Vec::new(),
        }
    }

    /// Register one refspec. Wildcards are not supported when pushing.
    pub(crate) fn add_refspec(&mut self, text: &str) -> Result<()> {
        let spec = Refspec::parse(text, Direction::Push)?;

        if spec.is_wildcard() || spec.dst().map_or(false, |d| d.ends_with('*')) {
            return Err(Error::invalid_spec(format!(
                "wildcard refspec `{}` is not supported when pushing",
                text
            )));
        }

        self.specs.push(spec);
        Ok(())
    }

    pub(crate) fn has_refspecs(&self) -> bool {
        !self.specs.is_empty()
    }

    /// Build the updates to send: resolve each source locally and pair it
    /// with the id the peer currently advertises for the destination.
    pub(crate) fn build_updates(
        &mut self,
        repo: &dyn Repo,
        advertised: &[RemoteHead],
    ) -> Result<&[PushUpdate]> {
        let mut updates = Vec::with_capacity(self.specs.len());

        for spec in &self.specs {
            let dst_refname = match spec.dst() {
                Some(dst) => dst.to_string(),
                None => spec.src().to_string(),
            };

            let new_id = if spec.src().is_empty() {
                Oid::ZERO
            } else {
                repo.refs().name_to_id(spec.src()).map_err(|err| {
                    if err.is_not_found() {
                        Error::invalid_spec(format!(
                            "src refspec '{}' does not match any existing object",
                            spec.src()
                        ))
                    } else {
                        err
                    }
                })?
            };

            let old_id = advertised
                .iter()
                .find(|head| head.name == dst_refname)
                .map(|head| head.oid)
                .unwrap_or(Oid::ZERO);

            updates.push(PushUpdate {
                src_refname: spec.src().to_string(),
                dst_refname,
                old_id,
                new_id,
            });
        }

        self.updates = updates;
        Ok(&self.updates)
    }

    pub(crate) fn set_report(&mut self, report: Vec<PushStatus>) {
        self.report = report;
    }

    /// The peer's verdicts, one per update sent.
    pub(crate) fn statuses(&self) -> &[PushStatus] {
        &self.report
    }

    /// Update remote-tracking branches for the references the peer
    /// accepted; a deletion on the peer drops the tracking branch here.
    pub(crate) fn update_tips(
        &self,
        repo: &dyn Repo,
        fetch_specs: &[Refspec],
        callbacks: &mut dyn Callbacks,
        log_message: &str,
    ) -> Result<()> {
        for update in &self.updates {
            let rejected = self
                .report
                .iter()
                .any(|s| s.refname == update.dst_refname && s.message.is_some());
            if rejected {
                continue;
            }

            let spec = fetch_specs
                .iter()
                .filter(|s| s.direction() == Direction::Fetch)
                .find(|s| s.src_matches(&update.dst_refname) && s.dst().is_some());
            let spec = match spec {
                Some(spec) => spec,
                None => continue,
            };

            let local = spec.transform(&update.dst_refname)?;

            if update.new_id.is_zero() {
                let old = match optional(repo.refs().name_to_id(&local))? {
                    Some(old) => old,
                    None => continue,
                };

                repo.refs().delete(&local)?;
                callbacks.update_tips(&local, &old, &Oid::ZERO)?;
            } else {
                let old = optional(repo.refs().name_to_id(&local))?.unwrap_or(Oid::ZERO);
                if old == update.new_id {
                    continue;
                }

                repo.refs().create(&local, update.new_id, true, log_message)?;
                callbacks.update_tips(&local, &old, &update.new_id)?;
            }
        }

        Ok(())
    }
}
