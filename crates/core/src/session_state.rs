use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metadata::SessionContext;

/// Which of the two session flows this voice session runs. Fixed at
/// session start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Interview setup: collect parameters and trigger generation.
    #[default]
    Create,
    /// Walk the candidate through a previously generated question list.
    Conduct,
}

/// Fatal configuration problems detected at session entry. These abort
/// setup before any tool becomes callable.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("conduct mode requires an interview id in session context")]
    MissingInterviewId,
}

/// Mutable state scoped to a single voice session. Owned exclusively by
/// the agent for the session's lifetime and discarded at session end;
/// only the derived interview and answer records are persisted.
#[derive(Debug, Default)]
pub struct SessionState {
    pub mode: SessionMode,
    pub interview_id: Option<String>,
    pub user_id: Option<String>,
    pub metadata_complete: bool,
    pub questions_generated: bool,
    /// Conduct-mode progress cursor.
    pub current_question_index: usize,
    pub question_list: Vec<String>,
}

impl SessionState {
    /// Builds the session state from resolved metadata.
    ///
    /// A conduct session without an interview id cannot identify the
    /// interview it is supposed to run, so setup fails outright.
    pub fn from_context(context: SessionContext) -> Result<Self, SetupError> {
        if context.mode == SessionMode::Conduct && context.interview_id.is_none() {
            return Err(SetupError::MissingInterviewId);
        }

        Ok(Self {
            mode: context.mode,
            interview_id: context.interview_id,
            user_id: context.user_id,
            ..Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conduct_without_interview_id_is_fatal() {
        let context = SessionContext {
            user_id: Some("u1".to_owned()),
            interview_id: None,
            mode: SessionMode::Conduct,
        };

        assert!(matches!(
            SessionState::from_context(context),
            Err(SetupError::MissingInterviewId)
        ));
    }

    #[test]
    fn conduct_with_interview_id_starts_clean() {
        let context = SessionContext {
            user_id: Some("u1".to_owned()),
            interview_id: Some("i1".to_owned()),
            mode: SessionMode::Conduct,
        };

        let state = SessionState::from_context(context).expect("setup should succeed");
        assert_eq!(state.interview_id.as_deref(), Some("i1"));
        assert!(!state.metadata_complete);
        assert!(!state.questions_generated);
        assert_eq!(state.current_question_index, 0);
        assert!(state.question_list.is_empty());
    }

    #[test]
    fn create_mode_needs_no_interview_id() {
        let context = SessionContext {
            user_id: Some("u1".to_owned()),
            interview_id: None,
            mode: SessionMode::Create,
        };

        let state = SessionState::from_context(context).expect("setup should succeed");
        assert_eq!(state.mode, SessionMode::Create);
        assert_eq!(state.interview_id, None);
    }
}
