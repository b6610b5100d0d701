use std::sync::Arc;

use serde_json::from_value;
use tokio::sync::mpsc;

use crate::{
    Command,
    error::AgentError,
    generation::{GenerationRequest, QuestionGenerator},
    metrics::UsageCollector,
    session_state::{SessionMode, SessionState},
    store::{AnswerRecord, DocumentStore, InterviewPatch},
    tools::{
        self, RequestQuestionGenerationArgs, SaveAnswerArgs, StoreUserDetailsArgs, ToolCall,
        ToolName, ToolOutcome,
    },
};

/// Spoken to the candidate once the generation request has been accepted.
pub const CLOSING_ANNOUNCEMENT: &str =
    "Great! I have generated your interview. You will now be redirected to begin.";

/// Behavioral guidance handed to the reasoning driver when the session
/// opens.
pub fn driver_instructions(mode: SessionMode) -> String {
    let common = "You are an AI mock interviewer. Speak with brevity, warmth, and clarity. \
                  Use the available tools to persist information, and never expose raw tool \
                  output to the candidate.";
    match mode {
        SessionMode::Create => format!(
            "{common} Collect the role, seniority level, tech stack, interview type, and \
             question count, confirming what you captured before moving on. Persist the \
             setup with store_user_details, then immediately call \
             request_question_generation with the same details. Once the request is \
             submitted the session ends."
        ),
        SessionMode::Conduct => format!(
            "{common} Ask the stored questions one at a time, wait for each answer, \
             summarize the key takeaways, and record them with save_answer. Conclude with \
             actionable next steps and thank the candidate."
        ),
    }
}

/// Voice interviewer orchestration core: binds the session state and the
/// two gateways behind the tool surface the reasoning driver invokes.
pub struct InterviewAgent {
    state: SessionState,
    store: Arc<dyn DocumentStore>,
    generator: Arc<dyn QuestionGenerator>,
    commands: mpsc::Sender<Command>,
    usage: UsageCollector,
    closed: bool,
}

impl InterviewAgent {
    pub fn new(
        state: SessionState,
        store: Arc<dyn DocumentStore>,
        generator: Arc<dyn QuestionGenerator>,
        commands: mpsc::Sender<Command>,
    ) -> Self {
        Self {
            state,
            store,
            generator,
            commands,
            usage: UsageCollector::new(),
            closed: false,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn usage(&self) -> &UsageCollector {
        &self.usage
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Runs one driver-issued tool call to completion. Calls are strictly
    /// sequential within a session; a terminated session rejects
    /// everything.
    pub async fn dispatch(&mut self, call: ToolCall) -> Result<ToolOutcome, AgentError> {
        if self.closed {
            return Err(AgentError::SessionClosed);
        }
        let result = self.run(call).await;
        if result.is_err() {
            self.usage.record_failure();
        }
        result
    }

    async fn run(&mut self, call: ToolCall) -> Result<ToolOutcome, AgentError> {
        let tool =
            ToolName::parse(&call.name).ok_or_else(|| AgentError::UnknownTool(call.name.clone()))?;
        self.usage.record_call(tool);

        match tool {
            ToolName::StoreUserDetails => {
                let args = parse_args(tool, call.arguments)?;
                self.store_user_details(args).await
            }
            ToolName::RequestQuestionGeneration => {
                let args = parse_args(tool, call.arguments)?;
                self.request_question_generation(args).await
            }
            ToolName::SaveAnswer => {
                let args = parse_args(tool, call.arguments)?;
                self.save_answer(args).await
            }
        }
    }

    async fn store_user_details(
        &mut self,
        args: StoreUserDetailsArgs,
    ) -> Result<ToolOutcome, AgentError> {
        let Some(user_id) = self.state.user_id.clone() else {
            return Err(AgentError::IdentityMissing);
        };

        let interview_id = self
            .state
            .interview_id
            .clone()
            .unwrap_or_else(|| self.store.allocate_interview_id());

        let patch = InterviewPatch {
            role: Some(args.role),
            level: Some(args.level),
            interview_type: Some(args.interview_type),
            techstack: Some(tools::parse_tech_stack(&args.tech_stack)),
            question_count: Some(args.question_count),
            user_id: Some(user_id),
            finalized: Some(false),
        };
        self.store.merge_interview(&interview_id, &patch).await?;

        // The id is immutable once adopted; repeated calls merge into the
        // same document.
        if self.state.interview_id.is_none() {
            self.state.interview_id = Some(interview_id.clone());
        }
        self.state.metadata_complete = true;

        tracing::info!(interview_id = %interview_id, "stored interview metadata");
        Ok(ToolOutcome::InterviewStored { interview_id })
    }

    async fn request_question_generation(
        &mut self,
        args: RequestQuestionGenerationArgs,
    ) -> Result<ToolOutcome, AgentError> {
        let userid = if args.userid.trim().is_empty() {
            self.state.user_id.clone().unwrap_or_default()
        } else {
            args.userid
        };
        let request = GenerationRequest {
            interview_type: args.interview_type,
            role: args.role,
            level: args.level,
            techstack: args.techstack,
            amount: args.amount,
            userid,
        };

        let response = self.generator.request_generation(&request).await?;

        // State moves only after the endpoint confirmed acceptance, and
        // the session seals before anything else can run. Generation
        // happens out-of-band; the question list stays empty here.
        self.state.questions_generated = true;
        self.state.question_list.clear();
        self.closed = true;

        self.commands
            .send(Command::Say(CLOSING_ANNOUNCEMENT.to_owned()))
            .await
            .map_err(|_| AgentError::RuntimeClosed)?;
        self.commands
            .send(Command::Close)
            .await
            .map_err(|_| AgentError::RuntimeClosed)?;

        tracing::info!(userid = %request.userid, "interview generation triggered");
        Ok(ToolOutcome::GenerationTriggered {
            status: "triggered",
            response: response.payload,
        })
    }

    async fn save_answer(&mut self, args: SaveAnswerArgs) -> Result<ToolOutcome, AgentError> {
        let Some(interview_id) = self.state.interview_id.clone() else {
            return Err(AgentError::NoActiveInterview);
        };

        let record = AnswerRecord {
            question: args.question,
            answer: args.answer,
            sequence: args.sequence,
        };
        self.store.put_answer(&interview_id, &record).await?;

        tracing::info!(
            interview_id = %interview_id,
            sequence = record.sequence,
            "saved answer"
        );
        Ok(ToolOutcome::AnswerStored { status: "stored" })
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(
    tool: ToolName,
    arguments: serde_json::Value,
) -> Result<T, AgentError> {
    from_value(arguments).map_err(|source| AgentError::InvalidArguments {
        tool: tool.as_str(),
        source,
    })
}
