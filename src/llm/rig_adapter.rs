//! Bridges a rig-core `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::agent::AgentBuilder;
use rig::completion::{CompletionModel, Prompt};

use crate::error::LlmError;
use crate::llm::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role,
};

/// Adapter wrapping any rig completion model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

/// Fold the request's messages into a (preamble, prompt) pair. rig agents
/// take the system text as a preamble and the user text as the prompt.
fn split_messages(messages: &[ChatMessage]) -> (String, String) {
    let mut preamble = Vec::new();
    let mut prompt = Vec::new();
    for message in messages {
        match message.role {
            Role::System => preamble.push(message.content.as_str()),
            Role::User => prompt.push(message.content.as_str()),
        }
    }
    (preamble.join("\n\n"), prompt.join("\n\n"))
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Clone,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let (preamble, prompt) = split_messages(&request.messages);

        let mut builder = AgentBuilder::new(self.model.clone());
        if !preamble.is_empty() {
            builder = builder.preamble(&preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }
        let agent = builder.build();

        let content = agent
            .prompt(prompt)
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: self.model_name.clone(),
                reason: e.to_string(),
            })?;

        if content.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.model_name.clone(),
                reason: "empty completion".to_string(),
            });
        }

        Ok(CompletionResponse { content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_messages_separates_roles() {
        let messages = vec![
            ChatMessage::system("you are a historian"),
            ChatMessage::user("what happened"),
            ChatMessage::user("on this day"),
        ];
        let (preamble, prompt) = split_messages(&messages);
        assert_eq!(preamble, "you are a historian");
        assert_eq!(prompt, "what happened\n\non this day");
    }
}
