use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification used to decide how a failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    InputValidation,
    ExternalCall,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::InputValidation => "input_validation",
            Self::ExternalCall => "external_call",
            Self::Internal => "internal",
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("The uploaded file is empty or could not be read. Please upload a valid CV.")]
    EmptyDocument,

    #[error("Unsupported file type: {0}")]
    UnsupportedMediaType(String),

    #[error("Upload too large: the limit is {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Could not read document: {0}")]
    Extraction(String),

    #[error("Could not decode image: {0}")]
    ImageDecode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("FSM error: {0}")]
    Fsm(String),

    #[error("Max interaction turns exceeded: {max_turns}")]
    MaxTurnsExceeded { max_turns: usize },

    #[error("Tool not found: {tool_name}")]
    ToolNotFound { tool_name: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    #[error("OpenAI error: {0}")]
    OpenAi(#[from] async_openai::error::OpenAIError),

    #[error("Model API rejected the request with HTTP {status}: {detail}")]
    UpstreamStatus { status: u16, detail: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    pub fn fsm(msg: impl Into<String>) -> Self {
        Self::Fsm(msg.into())
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Maps an error raised while a response streams. The SDK reports HTTP
    /// failures there as text, so the status is recovered from the message.
    pub fn from_stream_failure(error: async_openai::error::OpenAIError) -> Self {
        if let async_openai::error::OpenAIError::StreamError(message) = &error {
            if let Some(status) = status_in_message(message) {
                return Self::UpstreamStatus {
                    status,
                    detail: message.clone(),
                };
            }
        }
        Self::OpenAi(error)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::Yaml(_) | Self::AddrParse(_) => ErrorKind::Configuration,
            Self::EmptyDocument
            | Self::UnsupportedMediaType(_)
            | Self::PayloadTooLarge { .. }
            | Self::Extraction(_)
            | Self::ImageDecode(_)
            | Self::InvalidRequest(_) => ErrorKind::InputValidation,
            Self::OpenAi(e) if is_rejected_credential(e) => ErrorKind::Configuration,
            Self::UpstreamStatus { status: 401 | 403, .. } => ErrorKind::Configuration,
            Self::Llm(_) | Self::Timeout(_) | Self::OpenAi(_) | Self::UpstreamStatus { .. } => {
                ErrorKind::ExternalCall
            }
            Self::Inference(_)
            | Self::Fsm(_)
            | Self::MaxTurnsExceeded { .. }
            | Self::ToolNotFound { .. }
            | Self::Serialization(_)
            | Self::Io(_)
            | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::OpenAi(e) => is_transient_openai(e),
            Self::UpstreamStatus { status, .. } => is_transient_status(*status),
            _ => false,
        }
    }
}

fn is_transient_status(status: u16) -> bool {
    status >= 500 || status == 429 || status == 408
}

fn is_transient_reqwest(e: &reqwest::Error) -> bool {
    if e.is_timeout() || e.is_connect() {
        return true;
    }
    e.status().is_some_and(|s| is_transient_status(s.as_u16()))
}

/// Reads `401` out of "Invalid status code: 401 Unauthorized".
fn status_in_message(message: &str) -> Option<u16> {
    const MARKER: &str = "status code: ";
    let start = message.find(MARKER)? + MARKER.len();
    let digits: String = message[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok().filter(|code| (100..600).contains(code))
}

fn is_transient_openai(e: &async_openai::error::OpenAIError) -> bool {
    use async_openai::error::OpenAIError;

    match e {
        OpenAIError::Reqwest(inner) => is_transient_reqwest(inner),
        OpenAIError::StreamError(_) => true,
        OpenAIError::ApiError(api) => {
            // The SDK does not parse 5xx bodies, so those arrive untyped.
            if api.r#type.is_none() && api.code.is_none() {
                return true;
            }
            let markers = [api.r#type.as_deref(), api.code.as_deref()];
            if markers.contains(&Some("insufficient_quota")) {
                return false;
            }
            markers.iter().flatten().any(|m| {
                m.contains("rate_limit") || m.contains("server_error") || m.contains("overloaded")
            })
        }
        _ => false,
    }
}

fn is_rejected_credential(e: &async_openai::error::OpenAIError) -> bool {
    match e {
        async_openai::error::OpenAIError::ApiError(api) => {
            api.code.as_deref() == Some("invalid_api_key")
        }
        _ => false,
    }
}
