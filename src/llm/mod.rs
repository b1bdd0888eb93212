pub mod openai;

use anyhow::Result;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs,
};

/// JSON schema the model's answer has to conform to.
#[derive(Debug, Clone)]
pub struct OutputSchema {
    pub name: String,
    pub description: String,
    pub schema: serde_json::Value,
}

/// Language-model completion capability. Returns the raw text of the answer;
/// with a schema the provider is asked to produce conforming JSON.
#[async_trait::async_trait]
pub trait Llm: Send + Sync {
    async fn complete(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        schema: Option<&OutputSchema>,
    ) -> Result<String>;
}

pub fn system_user(system: &str, user: String) -> Result<Vec<ChatCompletionRequestMessage>> {
    let sys = ChatCompletionRequestSystemMessageArgs::default()
        .content(system)
        .build()?
        .into();
    let usr = ChatCompletionRequestUserMessageArgs::default()
        .content(user)
        .build()?
        .into();
    Ok(vec![sys, usr])
}

/// Drops markdown code fences models like to wrap JSON in.
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}
