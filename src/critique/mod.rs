//! Resume critique: text extraction, prompt building and a single model call.

mod extract;
mod prompt;

pub use extract::{
    DocumentKind, UploadedDocument, decode_plain_text, ensure_readable, extract_pdf_text,
    extract_text,
};
pub use prompt::{
    CritiquePrompt, DEFAULT_TARGET_ROLE, SYSTEM_PROMPT, build_prompt, resolve_target_role,
};

use crate::{
    Error, Result,
    config::CritiqueConfig,
    llm::{ChatCompletionRequest, ChatMessage, LlmClient},
};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CritiqueRequest {
    pub document: UploadedDocument,
    pub target_role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CritiqueResponse {
    pub target_role: String,
    pub feedback: String,
}

/// Validates the upload and builds the prompt. CPU bound, no network.
pub fn prepare(request: &CritiqueRequest) -> Result<CritiquePrompt> {
    let text = extract_text(&request.document)?;
    Ok(build_prompt(&text, request.target_role.as_deref()))
}

/// Sends one non-streaming completion for `prompt`.
pub async fn critique(
    prompt: CritiquePrompt,
    llm: &dyn LlmClient,
    config: &CritiqueConfig,
) -> Result<CritiqueResponse> {
    info!(target_role = %prompt.target_role, "Requesting resume critique");

    let request = ChatCompletionRequest {
        model: config.model.clone(),
        messages: vec![
            ChatMessage::system(prompt.system),
            ChatMessage::user(prompt.user),
        ],
        tools: Vec::new(),
        max_tokens: Some(config.max_tokens),
        temperature: Some(config.temperature),
    };

    let response = llm.create_chat_completion(request).await?;
    let Some(feedback) = response.first_content() else {
        warn!("Model returned no critique text");
        return Err(Error::llm("the model returned an empty critique"));
    };

    Ok(CritiqueResponse {
        target_role: prompt.target_role,
        feedback: feedback.to_string(),
    })
}

/// [`prepare`] then [`critique`].
pub async fn critique_document(
    request: &CritiqueRequest,
    llm: &dyn LlmClient,
    config: &CritiqueConfig,
) -> Result<CritiqueResponse> {
    let prompt = prepare(request)?;
    critique(prompt, llm, config).await
}
