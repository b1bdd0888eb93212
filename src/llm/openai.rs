use anyhow::{Context, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, CreateChatCompletionRequestArgs, ResponseFormat,
        ResponseFormatJsonSchema,
    },
    Client,
};
use tracing::debug;

use super::{Llm, OutputSchema};

/// OpenAI-compatible chat client bound to one model.
#[derive(Clone)]
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl LlmClient {
    pub fn new(model: String, base_url: Option<String>, api_key: Option<String>) -> Self {
        let mut cfg = OpenAIConfig::default();
        if let Some(url) = base_url { cfg = cfg.with_api_base(url); }
        if let Some(key) = api_key { cfg = cfg.with_api_key(key); }
        let client = Client::with_config(cfg);
        Self { client, model }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl Llm for LlmClient {
    async fn complete(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        schema: Option<&OutputSchema>,
    ) -> Result<String> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.clone()).messages(messages);
        if let Some(s) = schema {
            args.response_format(ResponseFormat::JsonSchema {
                json_schema: ResponseFormatJsonSchema {
                    name: s.name.clone(),
                    description: Some(s.description.clone()),
                    schema: Some(s.schema.clone()),
                    strict: Some(true),
                },
            });
        }
        let req = args.build()?;

        debug!(model = %self.model, structured = schema.is_some(), "chat completion");
        let resp = self.client.chat().create(req).await?;
        resp.choices
            .first()
            .and_then(|c| c.message.content.clone())
            .context("LLM response missing content")
    }
}
