//! Phase changes with an audit trail

use super::model::{AutonomyPhase, AutonomyState, OwnerApproval, ReauthorizationRequest, StateTransition};
use super::persistence::StatePersistence;
use crate::error::{ForemanError, PersistenceError};
use parking_lot::RwLock;

/// Owns the autonomy state and keeps it persisted
#[derive(Debug)]
pub struct AutonomyController {
    persistence: StatePersistence,
    state: RwLock<AutonomyState>,
    // serializes read-modify-persist sequences
    writes: tokio::sync::Mutex<()>,
}

impl AutonomyController {
    /// Load saved state, or start supervised if none exists
    ///
    /// # Errors
    /// [`PersistenceError`] if saved state exists but cannot be read
    pub async fn open(persistence: StatePersistence) -> Result<Self, PersistenceError> {
        let state = match persistence.load_state().await? {
            Some(state) => state,
            None => {
                let state = AutonomyState::supervised();
                persistence.save_state(&state).await?;
                tracing::info!(dir = %persistence.dir().display(), "autonomy state initialized");
                state
            }
        };
        Ok(Self {
            persistence,
            state: RwLock::new(state),
            writes: tokio::sync::Mutex::new(()),
        })
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> AutonomyPhase {
        self.state.read().phase
    }

    /// Copy of the current state
    #[must_use]
    pub fn state(&self) -> AutonomyState {
        self.state.read().clone()
    }

    /// Persistence backing this controller
    #[inline]
    #[must_use]
    pub fn persistence(&self) -> &StatePersistence {
        &self.persistence
    }

    /// Fail unless builds may start
    ///
    /// # Errors
    /// [`ForemanError::AutonomyBlocked`] while paused, revoked or awaiting reauthorization
    pub fn ensure_build_allowed(&self) -> Result<(), ForemanError> {
        let phase = self.phase();
        if phase.allows_builds() {
            Ok(())
        } else {
            Err(ForemanError::AutonomyBlocked {
                phase: phase.to_string(),
            })
        }
    }

    /// Move to `to`, saving the transition and then the state
    ///
    /// An owner approval attached to the previous phase is dropped.
    ///
    /// # Errors
    /// - [`PersistenceError::InvalidTransition`] if the table forbids the move
    /// - [`PersistenceError`] on write failure; in-memory state is unchanged
    pub async fn transition(
        &self,
        to: AutonomyPhase,
        reason: impl Into<String>,
        triggered_by: impl Into<String>,
    ) -> Result<StateTransition, PersistenceError> {
        let _guard = self.writes.lock().await;
        let current = self.state();
        if !current.phase.can_transition_to(to) {
            return Err(PersistenceError::InvalidTransition {
                from: current.phase.to_string(),
                to: to.to_string(),
            });
        }

        let transition = StateTransition::new(current.phase, to, reason, triggered_by);
        let mut next = current;
        next.phase = to;
        next.last_transition = transition.timestamp;
        next.transition_history.push(transition.clone());
        next.owner_approval = None;

        self.persistence.save_transition(&transition).await?;
        self.persistence.save_state(&next).await?;
        *self.state.write() = next;

        tracing::info!(
            from = %transition.from,
            to = %transition.to,
            reason = %transition.reason,
            by = %transition.triggered_by,
            "autonomy phase changed"
        );
        Ok(transition)
    }

    /// Attach an owner approval to the current phase
    ///
    /// # Errors
    /// [`PersistenceError`] on write failure
    pub async fn record_owner_approval(&self, approval: OwnerApproval) -> Result<(), PersistenceError> {
        let _guard = self.writes.lock().await;
        let mut next = self.state();
        next.owner_approval = Some(approval);
        self.persistence.save_state(&next).await?;
        *self.state.write() = next;
        Ok(())
    }

    /// File a reauthorization request and, when autonomous, halt until it is granted
    ///
    /// # Errors
    /// [`PersistenceError`] on write failure
    pub async fn request_reauthorization(
        &self,
        request: ReauthorizationRequest,
    ) -> Result<ReauthorizationRequest, PersistenceError> {
        self.persistence.save_reauthorization_request(&request).await?;
        let phase = self.phase();
        if phase.can_transition_to(AutonomyPhase::AwaitingReauthorization) {
            self.transition(
                AutonomyPhase::AwaitingReauthorization,
                request.reason.clone(),
                request.requester.clone(),
            )
            .await?;
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    async fn controller(dir: &std::path::Path) -> AutonomyController {
        AutonomyController::open(StatePersistence::new(dir)).await.unwrap()
    }

    #[tokio::test]
    async fn starts_supervised_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(dir.path()).await;
        assert_eq!(controller.phase(), AutonomyPhase::Supervised);
        assert!(controller.ensure_build_allowed().is_ok());
        assert!(dir.path().join("state.json").exists());
    }

    #[tokio::test]
    async fn pause_blocks_builds() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(dir.path()).await;
        controller
            .transition(AutonomyPhase::Paused, "incident", "owner")
            .await
            .unwrap();
        assert!(matches!(
            controller.ensure_build_allowed(),
            Err(ForemanError::AutonomyBlocked { phase }) if phase == "paused"
        ));
    }

    #[tokio::test]
    async fn invalid_transition_leaves_state() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(dir.path()).await;
        controller
            .transition(AutonomyPhase::Revoked, "breach", "owner")
            .await
            .unwrap();
        let err = controller
            .transition(AutonomyPhase::Autonomous, "retry", "builder")
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidTransition { .. }));
        assert_eq!(controller.phase(), AutonomyPhase::Revoked);
        assert_eq!(controller.state().transition_history.len(), 1);
    }

    #[tokio::test]
    async fn approval_cleared_on_transition() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(dir.path()).await;
        controller
            .record_owner_approval(OwnerApproval {
                approved_by: "owner".into(),
                timestamp: Utc::now(),
                system_state: crate::state::SystemState {
                    timestamp: Utc::now(),
                    qa_green: true,
                    open_incidents: 0,
                },
            })
            .await
            .unwrap();
        assert!(controller.state().owner_approval.is_some());
        controller
            .transition(AutonomyPhase::Autonomous, "approved", "owner")
            .await
            .unwrap();
        assert!(controller.state().owner_approval.is_none());
    }

    #[tokio::test]
    async fn reauthorization_halts_autonomous_mode() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(dir.path()).await;
        controller
            .transition(AutonomyPhase::Autonomous, "approved", "owner")
            .await
            .unwrap();
        controller
            .request_reauthorization(ReauthorizationRequest::new(
                "foreman",
                "drift detected",
                AutonomyPhase::Autonomous,
            ))
            .await
            .unwrap();
        assert_eq!(controller.phase(), AutonomyPhase::AwaitingReauthorization);
        assert_eq!(
            controller
                .persistence()
                .load_reauthorization_requests()
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
