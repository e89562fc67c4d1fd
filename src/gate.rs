use crate::actions::{ActionEffect, ActionReport};
use crate::backend::{BackendResult, SecretBackend};
use crate::error::ClientError;
use crate::notify::NotificationQueue;

/// Local advisory threshold for challenge answers; backend verification is
/// still the only authority.
pub const MIN_ANSWER_CHARS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    Confirm,
    Challenge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    Idle,
    AwaitingConfirmation,
    AwaitingChallenge,
    Verifying,
    Executing,
}

/// The action deferred behind a guard: all feature arguments are already
/// bound, only the verified answer (when the mode is Challenge) arrives at
/// invocation time.
pub type CapturedAction =
    Box<dyn FnOnce(&mut dyn SecretBackend, Option<&str>) -> BackendResult<ActionReport>>;

pub struct GuardRequest {
    pub mode: GateMode,
    pub title: String,
    pub prompt: String,
    action: Option<CapturedAction>,
}

impl std::fmt::Debug for GuardRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardRequest")
            .field("mode", &self.mode)
            .field("title", &self.title)
            .field("prompt", &self.prompt)
            .field("action", &self.action.as_ref().map(|_| "<action>"))
            .finish()
    }
}

impl GuardRequest {
    pub fn new(
        mode: GateMode,
        title: impl Into<String>,
        prompt: impl Into<String>,
        action: CapturedAction,
    ) -> Self {
        Self {
            mode,
            title: title.into(),
            prompt: prompt.into(),
            action: Some(action),
        }
    }
}

/// What a challenge submission did, so the caller can clear or keep its
/// answer input.
#[derive(Debug)]
pub enum AnswerOutcome {
    Executed(Vec<ActionEffect>),
    Rejected { clear_input: bool },
    Ignored,
}

/// Interposes a confirmation or challenge step before a sensitive action and
/// runs the captured action at most once, on success only.
///
/// One request may be pending per gate; independent features own independent
/// gates. Every resolution path, including action failure, releases `busy`.
pub struct AuthGate {
    phase: GatePhase,
    pending: Option<GuardRequest>,
    busy: bool,
    answer_error: Option<String>,
}

impl AuthGate {
    pub fn new() -> Self {
        Self {
            phase: GatePhase::Idle,
            pending: None,
            busy: false,
            answer_error: None,
        }
    }

    pub fn phase(&self) -> GatePhase {
        self.phase
    }

    pub fn busy(&self) -> bool {
        self.busy
    }

    pub fn answer_error(&self) -> Option<&str> {
        self.answer_error.as_deref()
    }

    pub fn pending(&self) -> Option<&GuardRequest> {
        self.pending.as_ref()
    }

    /// Open the dialog for a request. Rejected while another request is
    /// pending; callers check `busy` first.
    pub fn guard(&mut self, request: GuardRequest) -> Result<(), ClientError> {
        if self.busy {
            return Err(ClientError::GateBusy);
        }
        self.busy = true;
        self.answer_error = None;
        self.phase = match request.mode {
            GateMode::Confirm => GatePhase::AwaitingConfirmation,
            GateMode::Challenge => GatePhase::AwaitingChallenge,
        };
        self.pending = Some(request);
        Ok(())
    }

    /// Resolve a Confirm guard: run the captured action with no answer.
    pub fn confirm(
        &mut self,
        backend: &mut dyn SecretBackend,
        notifications: &mut NotificationQueue,
    ) -> Vec<ActionEffect> {
        if self.phase != GatePhase::AwaitingConfirmation {
            return Vec::new();
        }
        self.execute(None, backend, notifications)
    }

    /// Discard the pending request without invoking anything and without a
    /// notification.
    pub fn cancel(&mut self) {
        self.pending = None;
        self.phase = GatePhase::Idle;
        self.busy = false;
        self.answer_error = None;
    }

    /// Submit a challenge answer. Too-short answers are rejected locally with
    /// no collaborator call; wrong answers may be retried without limit; a
    /// verifier breakdown keeps the typed answer and shows a transient
    /// message instead.
    pub fn submit_answer(
        &mut self,
        answer: &str,
        backend: &mut dyn SecretBackend,
        notifications: &mut NotificationQueue,
    ) -> AnswerOutcome {
        if self.phase != GatePhase::AwaitingChallenge {
            return AnswerOutcome::Ignored;
        }
        if answer.chars().count() < MIN_ANSWER_CHARS {
            self.answer_error = Some("Answer requires at least 6 characters".into());
            return AnswerOutcome::Rejected { clear_input: false };
        }
        self.phase = GatePhase::Verifying;
        self.answer_error = None;
        match backend.verify_challenge(answer) {
            Ok(true) => AnswerOutcome::Executed(self.execute(Some(answer), backend, notifications)),
            Ok(false) => {
                self.phase = GatePhase::AwaitingChallenge;
                self.answer_error = Some(ClientError::ChallengeRejected.to_string());
                notifications.error(ClientError::ChallengeRejected.to_string());
                AnswerOutcome::Rejected { clear_input: true }
            }
            Err(_) => {
                self.phase = GatePhase::AwaitingChallenge;
                self.answer_error = Some("Failed to verify, please try again".into());
                AnswerOutcome::Rejected { clear_input: false }
            }
        }
    }

    fn execute(
        &mut self,
        answer: Option<&str>,
        backend: &mut dyn SecretBackend,
        notifications: &mut NotificationQueue,
    ) -> Vec<ActionEffect> {
        self.phase = GatePhase::Executing;
        let action = self.pending.take().and_then(|mut request| request.action.take());
        let mut effects = Vec::new();
        if let Some(action) = action {
            match action(backend, answer) {
                Ok(report) => {
                    notifications.success(report.message);
                    effects = report.effects;
                }
                Err(err) => {
                    notifications.error(err.to_string());
                }
            }
        }
        // Cleared on every path so the feature's disabled state releases.
        self.pending = None;
        self.phase = GatePhase::Idle;
        self.busy = false;
        self.answer_error = None;
        effects
    }
}

impl Default for AuthGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionReport;
    use crate::backend::BackendError;
    use crate::backend::testing::MockBackend;

    fn delete_request(mode: GateMode, id: &str) -> GuardRequest {
        let id = id.to_string();
        GuardRequest::new(
            mode,
            "Delete Secrets",
            format!("Are you sure to delete the secrets {id} ?"),
            Box::new(move |backend, _answer| {
                backend.delete_record(&id)?;
                Ok(ActionReport {
                    message: format!("Delete secrets {id} successfully"),
                    effects: vec![ActionEffect::RecordDeleted(id.clone())],
                })
            }),
        )
    }

    #[test]
    fn confirm_invokes_action_exactly_once() {
        let mut gate = AuthGate::new();
        let mut backend = MockBackend::new();
        let mut notifications = NotificationQueue::new();

        gate.guard(delete_request(GateMode::Confirm, "7")).expect("idle gate");
        assert_eq!(gate.phase(), GatePhase::AwaitingConfirmation);

        let effects = gate.confirm(&mut backend, &mut notifications);
        assert_eq!(backend.deleted, vec!["7".to_string()]);
        assert_eq!(effects.len(), 1);
        assert_eq!(notifications.items().len(), 1);
        assert!(!gate.busy());
        assert_eq!(gate.phase(), GatePhase::Idle);
    }

    #[test]
    fn cancel_never_invokes_and_emits_nothing() {
        let mut gate = AuthGate::new();
        let backend = MockBackend::new();
        let notifications = NotificationQueue::new();

        gate.guard(delete_request(GateMode::Confirm, "7")).expect("idle gate");
        gate.cancel();

        assert!(backend.deleted.is_empty());
        assert!(notifications.is_empty());
        assert!(!gate.busy());
        assert_eq!(gate.phase(), GatePhase::Idle);
    }

    #[test]
    fn second_guard_while_pending_is_rejected() {
        let mut gate = AuthGate::new();
        gate.guard(delete_request(GateMode::Confirm, "7")).expect("idle gate");
        let err = gate
            .guard(delete_request(GateMode::Confirm, "8"))
            .expect_err("gate is busy");
        assert!(matches!(err, ClientError::GateBusy));
        // The original request is untouched.
        assert_eq!(gate.pending().map(|r| r.prompt.as_str()),
            Some("Are you sure to delete the secrets 7 ?"));
    }

    #[test]
    fn wrong_answers_retry_until_verified_then_execute_once() {
        let mut gate = AuthGate::new();
        let mut backend = MockBackend::new();
        let mut notifications = NotificationQueue::new();
        backend.verify_script.extend([Ok(false), Ok(false), Ok(true)]);

        gate.guard(delete_request(GateMode::Challenge, "7")).expect("idle gate");

        for _ in 0..2 {
            let outcome = gate.submit_answer("rexrex", &mut backend, &mut notifications);
            assert!(matches!(outcome, AnswerOutcome::Rejected { clear_input: true }));
            assert_eq!(gate.phase(), GatePhase::AwaitingChallenge);
            assert_eq!(gate.answer_error(), Some("Invalid answer, please try again"));
            assert!(backend.deleted.is_empty());
        }

        let outcome = gate.submit_answer("rexrex", &mut backend, &mut notifications);
        assert!(matches!(outcome, AnswerOutcome::Executed(_)));
        assert_eq!(backend.verify_calls, 3);
        assert_eq!(backend.deleted, vec!["7".to_string()]);
        assert!(!gate.busy());
    }

    #[test]
    fn short_answer_never_reaches_the_verifier() {
        let mut gate = AuthGate::new();
        let mut backend = MockBackend::new();
        let mut notifications = NotificationQueue::new();

        gate.guard(delete_request(GateMode::Challenge, "7")).expect("idle gate");
        let outcome = gate.submit_answer("rex", &mut backend, &mut notifications);
        assert!(matches!(outcome, AnswerOutcome::Rejected { clear_input: false }));
        assert_eq!(backend.verify_calls, 0);
        assert_eq!(
            gate.answer_error(),
            Some("Answer requires at least 6 characters")
        );
        // Still pending; the user may fix the answer.
        assert!(gate.busy());
    }

    #[test]
    fn verifier_breakdown_keeps_input_and_allows_retry() {
        let mut gate = AuthGate::new();
        let mut backend = MockBackend::new();
        let mut notifications = NotificationQueue::new();
        backend
            .verify_script
            .extend([Err(BackendError::Operation("gpg exploded".into())), Ok(true)]);

        gate.guard(delete_request(GateMode::Challenge, "7")).expect("idle gate");
        let outcome = gate.submit_answer("rexrex", &mut backend, &mut notifications);
        assert!(matches!(outcome, AnswerOutcome::Rejected { clear_input: false }));
        assert_eq!(gate.answer_error(), Some("Failed to verify, please try again"));
        assert!(backend.deleted.is_empty());

        let outcome = gate.submit_answer("rexrex", &mut backend, &mut notifications);
        assert!(matches!(outcome, AnswerOutcome::Executed(_)));
        assert_eq!(backend.deleted, vec!["7".to_string()]);
    }

    #[test]
    fn action_failure_still_releases_busy_and_notifies_once() {
        let mut gate = AuthGate::new();
        let mut backend = MockBackend::new();
        let mut notifications = NotificationQueue::new();
        backend.fail_next_operation = Some("disk on fire".into());

        gate.guard(delete_request(GateMode::Confirm, "7")).expect("idle gate");
        let effects = gate.confirm(&mut backend, &mut notifications);

        assert!(effects.is_empty());
        assert_eq!(notifications.items().len(), 1);
        assert_eq!(notifications.items()[0].message, "disk on fire");
        assert!(!gate.busy());
        assert_eq!(gate.phase(), GatePhase::Idle);
    }

    #[test]
    fn confirm_on_challenge_phase_is_a_no_op() {
        let mut gate = AuthGate::new();
        let mut backend = MockBackend::new();
        let mut notifications = NotificationQueue::new();

        gate.guard(delete_request(GateMode::Challenge, "7")).expect("idle gate");
        let effects = gate.confirm(&mut backend, &mut notifications);
        assert!(effects.is_empty());
        assert!(backend.deleted.is_empty());
        assert_eq!(gate.phase(), GatePhase::AwaitingChallenge);
    }
}
