//! Bounded self-correction after validation failures.
//!
//! Per original model turn the pipeline moves through a small state
//! machine: AwaitingValidation -> Dispatched on a pass, or
//! AwaitingValidation -> Correcting -> AwaitingValidation in a loop, until
//! the retry budget runs out and the turn is Abandoned. Abandoned is
//! terminal and must be reported as a delivery failure, never swallowed.

use crate::error::PhaseError;
use crate::types::{ActionRequest, CorrectionMessage, TurnPhase, Violation};

/// Validate that a turn-phase transition is allowed.
///
/// Valid transitions:
/// - AwaitingValidation -> Dispatched (validation passed)
/// - AwaitingValidation -> Correcting (violations, budget remains)
/// - AwaitingValidation -> Abandoned (violations, budget exhausted)
/// - Correcting -> AwaitingValidation (corrected reply arrived)
/// - Correcting -> Abandoned (reasoning backend unavailable)
pub fn validate_transition(from: TurnPhase, to: TurnPhase) -> Result<(), PhaseError> {
    let valid = matches!(
        (from, to),
        (TurnPhase::AwaitingValidation, TurnPhase::Dispatched)
            | (TurnPhase::AwaitingValidation, TurnPhase::Correcting)
            | (TurnPhase::AwaitingValidation, TurnPhase::Abandoned)
            | (TurnPhase::Correcting, TurnPhase::AwaitingValidation)
            | (TurnPhase::Correcting, TurnPhase::Abandoned)
    );

    if valid {
        Ok(())
    } else {
        Err(PhaseError { from, to })
    }
}

/// What to do after a validation failure.
#[derive(Debug, Clone, PartialEq)]
pub enum CorrectionDecision {
    /// Send this correction message to the reasoning backend and await a
    /// corrected reply.
    Retry(CorrectionMessage),
    /// The budget is spent; abandon the turn.
    Abandon { attempts: u32 },
}

/// Factory for per-turn correction state, carrying the configured budget.
#[derive(Debug, Clone, Copy)]
pub struct CorrectionProtocol {
    budget: u32,
}

impl CorrectionProtocol {
    pub fn new(budget: u32) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// Open the state machine for one model turn.
    pub fn begin(&self) -> CorrectionState {
        CorrectionState {
            phase: TurnPhase::AwaitingValidation,
            attempts: 0,
            budget: self.budget,
        }
    }
}

/// The correction state machine for one model turn.
#[derive(Debug, Clone)]
pub struct CorrectionState {
    phase: TurnPhase,
    attempts: u32,
    budget: u32,
}

impl CorrectionState {
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// React to a failed validation: either open a correction round with
    /// one message enumerating every violation, or abandon the turn once
    /// the counter would exceed the budget.
    pub fn on_violations(
        &mut self,
        request: &ActionRequest,
        violations: Vec<Violation>,
    ) -> Result<CorrectionDecision, PhaseError> {
        if self.attempts >= self.budget {
            validate_transition(self.phase, TurnPhase::Abandoned)?;
            self.phase = TurnPhase::Abandoned;
            return Ok(CorrectionDecision::Abandon {
                attempts: self.attempts,
            });
        }

        validate_transition(self.phase, TurnPhase::Correcting)?;
        self.phase = TurnPhase::Correcting;
        self.attempts += 1;
        Ok(CorrectionDecision::Retry(CorrectionMessage::new(
            request,
            violations,
            self.attempts,
            self.budget,
        )))
    }

    /// A corrected reply arrived; validation runs again.
    pub fn on_reply(&mut self) -> Result<(), PhaseError> {
        validate_transition(self.phase, TurnPhase::AwaitingValidation)?;
        self.phase = TurnPhase::AwaitingValidation;
        Ok(())
    }

    /// Validation passed; the request moves on to dispatch.
    pub fn on_pass(&mut self) -> Result<(), PhaseError> {
        validate_transition(self.phase, TurnPhase::Dispatched)?;
        self.phase = TurnPhase::Dispatched;
        Ok(())
    }

    /// Abandon mid-correction (the backend could not produce a reply).
    pub fn abandon(&mut self) -> Result<(), PhaseError> {
        validate_transition(self.phase, TurnPhase::Abandoned)?;
        self.phase = TurnPhase::Abandoned;
        Ok(())
    }
}
