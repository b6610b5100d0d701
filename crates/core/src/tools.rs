use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// The operations the reasoning driver may invoke against a session. The
/// enumeration is the whole mutation surface; there is no other way to
/// change session state from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    StoreUserDetails,
    RequestQuestionGeneration,
    SaveAnswer,
}

impl ToolName {
    pub const ALL: [ToolName; 3] = [
        ToolName::StoreUserDetails,
        ToolName::RequestQuestionGeneration,
        ToolName::SaveAnswer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::StoreUserDetails => "store_user_details",
            ToolName::RequestQuestionGeneration => "request_question_generation",
            ToolName::SaveAnswer => "save_answer",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }
}

/// One driver-issued invocation, as it arrives off the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// A tool's declared contract: name, purpose, and input schema in JSON
/// Schema form. The driver receives the full list at session start.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// The enumerated command registry handed to the driver.
pub fn tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: ToolName::StoreUserDetails.as_str(),
            description: "Persist the interview setup provided by the candidate.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "role": { "type": "string", "description": "Role the candidate is preparing for" },
                    "level": { "type": "string", "description": "Seniority level" },
                    "tech_stack": { "type": "string", "description": "Comma-separated technologies" },
                    "interview_type": { "type": "string", "description": "Interview style, e.g. technical or behavioral" },
                    "question_count": { "type": "integer", "description": "How many questions to generate" }
                },
                "required": ["role", "level", "tech_stack", "interview_type", "question_count"]
            }),
        },
        ToolSpec {
            name: ToolName::RequestQuestionGeneration.as_str(),
            description: "Hand the captured setup to the external service that builds the \
                          interview. Ends the session once the request is accepted.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "type": { "type": "string", "description": "Interview style" },
                    "role": { "type": "string", "description": "Role the candidate is preparing for" },
                    "level": { "type": "string", "description": "Seniority level" },
                    "techstack": { "type": "string", "description": "Comma-separated technologies" },
                    "amount": { "type": "integer", "description": "How many questions to generate" },
                    "userid": { "type": "string", "description": "Candidate id; blank falls back to the session user" }
                },
                "required": ["type", "role", "level", "techstack", "amount"]
            }),
        },
        ToolSpec {
            name: ToolName::SaveAnswer.as_str(),
            description: "Save the candidate's answer transcript for later feedback.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "question": { "type": "string", "description": "The question that was asked" },
                    "answer": { "type": "string", "description": "The candidate's answer transcript" },
                    "sequence": { "type": "integer", "description": "Position of the question in the interview" }
                },
                "required": ["question", "answer", "sequence"]
            }),
        },
    ]
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreUserDetailsArgs {
    pub role: String,
    pub level: String,
    pub tech_stack: String,
    pub interview_type: String,
    pub question_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestQuestionGenerationArgs {
    #[serde(rename = "type")]
    pub interview_type: String,
    pub role: String,
    pub level: String,
    pub techstack: String,
    pub amount: u32,
    #[serde(default)]
    pub userid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveAnswerArgs {
    pub question: String,
    pub answer: String,
    pub sequence: u32,
}

/// What a successful dispatch reports back to the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ToolOutcome {
    InterviewStored {
        #[serde(rename = "interviewId")]
        interview_id: String,
    },
    GenerationTriggered {
        status: &'static str,
        response: Value,
    },
    AnswerStored {
        status: &'static str,
    },
}

/// Splits a comma-delimited tech-stack string into ordered, trimmed,
/// de-duplicated tags. Empty entries are dropped.
pub fn parse_tech_stack(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for item in raw.split(',') {
        let tag = item.trim();
        if tag.is_empty() || tags.iter().any(|seen| seen == tag) {
            continue;
        }
        tags.push(tag.to_owned());
    }
    tags
}
