// ── Network change store ──
//
// Holds every network change in creation order and owns the phase state
// machine, including rollback.

use std::sync::Arc;

use tracing::{debug, info};

use super::log::ChangeLog;
use crate::error::{CoreError, RollbackRejection};
use crate::model::{NetworkChange, NetworkChangeId, Phase};
use crate::stream::{WatchOptions, WatchSession, WildcardMatcher};

const ENTITY: &str = "network change";

pub struct NetworkChangeStore {
    log: ChangeLog<NetworkChange>,
}

impl Default for NetworkChangeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkChangeStore {
    pub fn new() -> Self {
        Self {
            log: ChangeLog::new(ENTITY),
        }
    }

    /// Store a new change. It must still be [`Phase::Pending`].
    pub async fn create(&self, change: NetworkChange) -> Result<Arc<NetworkChange>, CoreError> {
        if change.phase != Phase::Pending {
            return Err(CoreError::validation(format!(
                "network change {} must be created PENDING, not {}",
                change.id, change.phase
            )));
        }
        let event = self.log.append(change).await?;
        Ok(event.change)
    }

    pub async fn get(&self, id: &NetworkChangeId) -> Result<Arc<NetworkChange>, CoreError> {
        self.log
            .get(id.as_str())
            .await
            .ok_or_else(|| CoreError::not_found(ENTITY, id.as_str()))
    }

    /// All changes in creation order, optionally filtered by a wildcard on the id.
    pub async fn list(&self, pattern: Option<&str>) -> Vec<Arc<NetworkChange>> {
        let matcher = pattern.map(WildcardMatcher::new);
        self.log.list(matcher.as_ref()).await
    }

    pub async fn watch(&self, options: WatchOptions) -> Result<WatchSession<NetworkChange>, CoreError> {
        self.log.watch(options).await
    }

    /// Move a change to `phase`.
    ///
    /// `ROLLING_BACK` is only reachable through [`rollback`](Self::rollback).
    pub async fn set_phase(
        &self,
        id: &NetworkChangeId,
        phase: Phase,
    ) -> Result<Arc<NetworkChange>, CoreError> {
        let updated = self
            .log
            .update(|txn| {
                let current = txn
                    .get(id.as_str())
                    .ok_or_else(|| CoreError::not_found(ENTITY, id.as_str()))?;
                if phase == Phase::RollingBack || !current.phase.can_transition_to(phase) {
                    return Err(CoreError::InvalidPhaseTransition {
                        id: id.to_string(),
                        from: current.phase,
                        to: phase,
                    });
                }
                let next = current.with_phase(phase);
                txn.replace(next.clone())?;
                Ok(next)
            })
            .await?;

        debug!(id = %id, phase = %phase, "network change phase updated");
        Ok(Arc::new(updated))
    }

    /// Roll back the most recent applied change.
    ///
    /// On success the change passes through `ROLLING_BACK` to `ROLLED_BACK`
    /// under one lock, emitting an update for each step.
    pub async fn rollback(&self, name: &str) -> Result<Arc<NetworkChange>, CoreError> {
        if name.is_empty() {
            return Err(RollbackRejection::EmptyName.into());
        }

        let rolled_back = self
            .log
            .update(|txn| {
                let change = txn.get(name).ok_or_else(|| RollbackRejection::NotFound {
                    name: name.to_owned(),
                })?;
                match change.phase {
                    Phase::Applied => {}
                    Phase::RollingBack => {
                        return Err(RollbackRejection::InProgress {
                            name: name.to_owned(),
                        }
                        .into());
                    }
                    phase => {
                        return Err(RollbackRejection::NotApplied {
                            name: name.to_owned(),
                            phase,
                        }
                        .into());
                    }
                }

                let latest = txn
                    .records()
                    .into_iter()
                    .rev()
                    .find(|c| matches!(c.phase, Phase::Applied | Phase::RollingBack));
                if let Some(latest) = latest.filter(|c| c.id != change.id) {
                    return Err(RollbackRejection::NotMostRecent {
                        name: name.to_owned(),
                        latest: latest.id.to_string(),
                    }
                    .into());
                }

                let rolling_back = change.with_phase(Phase::RollingBack);
                let rolled_back = rolling_back.with_phase(Phase::RolledBack);
                txn.replace(rolling_back)?;
                txn.replace(rolled_back.clone())?;
                Ok(rolled_back)
            })
            .await?;

        info!(name, "network change rolled back");
        Ok(Arc::new(rolled_back))
    }

    pub fn watchers(&self) -> Vec<String> {
        self.log.watchers()
    }

    pub(crate) fn close(&self) {
        self.log.close();
    }
}
