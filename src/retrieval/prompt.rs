use std::str::FromStr;

use serde::Serialize;

use super::vector::QueryMatch;

/// Placeholder replaced by the retrieved context when a template is rendered
pub const CONTEXT_PLACEHOLDER: &str = "{{CONTEXT}}";

/// Neutral question-answering persona
pub const QA_TEMPLATE: &str = r#"You are a helpful assistant. Answer questions based on this context:

{{CONTEXT}}

If the context doesn't contain relevant information, say so."#;

/// Directive persona for analysing a person from their message history.
/// Context lines prefixed with "Me:" are the user's own words.
pub const PERSONALITY_ANALYST_TEMPLATE: &str = r#"You are a direct, perceptive personality analyst. Answer the user's question using only the messages below.

### Attribution:
- Lines starting with "Me:" were written by the user themselves. Treat them as first-party evidence about the user.
- Lines attributed to any other name were written by third parties. They show how other people talk to or about the user; never present them as the user's own words.

### Guidelines:
- Be specific and decisive. Quote short fragments of the messages as evidence.
- Separate what the user says about themselves from what others say about them.
- If the messages don't contain enough information to answer, say so plainly instead of guessing.

### Messages:
{{CONTEXT}}"#;

/// System prompt used by the query pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptTemplate {
    Qa,
    PersonalityAnalyst,
    Custom(String),
}

impl PromptTemplate {
    pub fn name(&self) -> &str {
        match self {
            PromptTemplate::Qa => "qa",
            PromptTemplate::PersonalityAnalyst => "personality",
            PromptTemplate::Custom(_) => "custom",
        }
    }

    fn template(&self) -> &str {
        match self {
            PromptTemplate::Qa => QA_TEMPLATE,
            PromptTemplate::PersonalityAnalyst => PERSONALITY_ANALYST_TEMPLATE,
            PromptTemplate::Custom(template) => template,
        }
    }

    /// Render the system instruction with `context` substituted in
    pub fn render(&self, context: &str) -> String {
        self.template().replace(CONTEXT_PLACEHOLDER, context)
    }
}

impl FromStr for PromptTemplate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "qa" | "default" => Ok(PromptTemplate::Qa),
            "personality" | "personality_analyst" => Ok(PromptTemplate::PersonalityAnalyst),
            other => Err(format!(
                "Unsupported prompt template: {}. Supported: qa, personality",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A single role-tagged message sent to the generation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Join the text of every match, in index order, separated by a blank line
pub fn build_context(matches: &[QueryMatch]) -> String {
    matches
        .iter()
        .map(|m| m.text())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// System instruction carrying the context, followed by the literal question
pub fn build_messages(
    template: &PromptTemplate,
    context: &str,
    question: &str,
) -> Vec<PromptMessage> {
    vec![
        PromptMessage::system(template.render(context)),
        PromptMessage::user(question),
    ]
}
