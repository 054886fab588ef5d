pub const SYSTEM_PROMPT: &str =
    "You are an expert resume reviewer with years of experience in HR and recruitment.";

pub const DEFAULT_TARGET_ROLE: &str = "general job applications";

/// Fully built request text for one critique.
#[derive(Debug, Clone, PartialEq)]
pub struct CritiquePrompt {
    pub system: String,
    pub user: String,
    pub target_role: String,
}

/// Blank or missing roles fall back to [`DEFAULT_TARGET_ROLE`].
pub fn resolve_target_role(target_role: Option<&str>) -> &str {
    target_role
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_TARGET_ROLE)
}

pub fn build_prompt(resume_text: &str, target_role: Option<&str>) -> CritiquePrompt {
    let role = resolve_target_role(target_role);
    let user = format!(
        "Please analyze this resume and provide constructive feedback.
Focus on the following aspects:
1. Content clarity and impact and conciseness
2. Skills presentation
3. Experience descriptions
4. Specific improvements for {role}

Resume content:
{resume_text}

Please provide your analysis in a clear, structured format with specific recommendations."
    );

    CritiquePrompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
        target_role: role.to_string(),
    }
}
