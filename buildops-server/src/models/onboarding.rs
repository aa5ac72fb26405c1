//! Onboarding wizard step ordering
//!
//! `company → team → branding → integrations → billing → complete`.
//! Saving a step moves the tenant to the step after it, never backwards.

use serde::Serialize;

use super::enums::OnboardingStep;
use super::ValidationError;

/// Company size buckets offered by the company step
pub const COMPANY_SIZES: &[&str] = &["1-10", "11-50", "51-200", "201-500", "500+"];

/// Maximum invitations accepted by the team step
pub const MAX_TEAM_INVITES: usize = 10;

impl OnboardingStep {
    /// Position in the wizard, 0-based.
    pub fn index(&self) -> usize {
        Self::ALL
            .iter()
            .position(|s| s == self)
            .unwrap_or(Self::ALL.len() - 1)
    }

    /// Step following this one; `Complete` is terminal.
    pub fn next(&self) -> Self {
        Self::ALL
            .get(self.index() + 1)
            .copied()
            .unwrap_or(Self::Complete)
    }

    /// Step the tenant lands on after saving `saved` while at `self`.
    pub fn advance_after(&self, saved: OnboardingStep) -> Self {
        let target = saved.next();
        if target.index() > self.index() {
            target
        } else {
            *self
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Key under which a step's answers live in the onboarding data object.
    pub fn data_key(&self) -> &'static str {
        self.as_str()
    }
}

/// Validate a company size bucket.
pub fn company_size(value: &str) -> Result<String, ValidationError> {
    if COMPANY_SIZES.contains(&value) {
        Ok(value.to_owned())
    } else {
        Err(ValidationError::InvalidVariant {
            field: "company size",
            value: value.to_owned(),
        })
    }
}

/// Snapshot returned by `onboarding.get_state`
#[derive(Debug, Clone, Serialize)]
pub struct OnboardingState {
    pub current_step: OnboardingStep,
    pub steps: Vec<OnboardingStep>,
    pub data: serde_json::Value,
    pub is_complete: bool,
}

impl OnboardingState {
    /// Overlay the cached draft on top of the persisted data; draft keys win.
    pub fn new(
        current_step: OnboardingStep,
        persisted: serde_json::Value,
        draft: Option<serde_json::Value>,
    ) -> Self {
        let mut data = match persisted {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        if let Some(serde_json::Value::Object(draft)) = draft {
            data.extend(draft);
        }
        Self {
            current_step,
            steps: OnboardingStep::ALL.to_vec(),
            data: serde_json::Value::Object(data),
            is_complete: current_step.is_complete(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn steps_are_linear() {
        assert_eq!(OnboardingStep::Company.next(), OnboardingStep::Team);
        assert_eq!(OnboardingStep::Billing.next(), OnboardingStep::Complete);
        assert_eq!(OnboardingStep::Complete.next(), OnboardingStep::Complete);
    }

    #[test]
    fn advance_moves_forward() {
        let at = OnboardingStep::Company;
        assert_eq!(at.advance_after(OnboardingStep::Company), OnboardingStep::Team);
        assert_eq!(at.advance_after(OnboardingStep::Branding), OnboardingStep::Integrations);
    }

    #[test]
    fn advance_never_regresses() {
        let at = OnboardingStep::Billing;
        assert_eq!(at.advance_after(OnboardingStep::Company), OnboardingStep::Billing);
        let done = OnboardingStep::Complete;
        assert_eq!(done.advance_after(OnboardingStep::Team), OnboardingStep::Complete);
    }

    #[test]
    fn company_sizes() {
        assert_eq!(company_size("11-50").unwrap(), "11-50");
        assert!(company_size("12").is_err());
    }

    #[test]
    fn draft_overrides_persisted() {
        let state = OnboardingState::new(
            OnboardingStep::Team,
            json!({"company": {"name": "Old"}, "team": {"invite_count": 2}}),
            Some(json!({"company": {"name": "New"}})),
        );
        assert_eq!(state.data["company"]["name"], "New");
        assert_eq!(state.data["team"]["invite_count"], 2);
        assert!(!state.is_complete);
        assert_eq!(state.steps.len(), 6);
    }

    #[test]
    fn non_object_data_is_ignored() {
        let state = OnboardingState::new(OnboardingStep::Complete, json!(null), Some(json!([1])));
        assert_eq!(state.data, json!({}));
        assert!(state.is_complete);
    }
}
