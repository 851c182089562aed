//! Prompt templates: `code-review` and `explain-code`.

use rust_mcp_sdk::schema::{ContentBlock, TextContent};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::utils::{optional_string_arg, required_string_arg};
use crate::errors::AppError;

const DEFAULT_FOCUS_AREAS: &str = "general code quality, best practices, and potential improvements";
const DEFAULT_LANGUAGE: &str = "the programming language used";

#[derive(Debug, Serialize)]
pub struct PromptArgument {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

#[derive(Debug, Serialize)]
pub struct Prompt {
    pub name: &'static str,
    pub description: &'static str,
    pub arguments: Vec<PromptArgument>,
}

#[derive(Debug, Serialize)]
pub struct ListPromptsResult {
    pub prompts: Vec<Prompt>,
}

#[derive(Debug, Serialize)]
pub struct PromptMessage {
    pub role: &'static str,
    pub content: ContentBlock,
}

#[derive(Debug, Serialize)]
pub struct GetPromptResult {
    pub description: String,
    pub messages: Vec<PromptMessage>,
}

#[derive(Debug, Deserialize)]
struct GetPromptParams {
    name: String,
    #[serde(default)]
    arguments: Option<Map<String, Value>>,
}

pub fn build_prompts_list() -> ListPromptsResult {
    ListPromptsResult {
        prompts: vec![
            Prompt {
                name: "code-review",
                description: "Get code review suggestions for a file",
                arguments: vec![
                    PromptArgument {
                        name: "file_path",
                        description: "Path to the file to review",
                        required: true,
                    },
                    PromptArgument {
                        name: "focus_areas",
                        description: "Specific areas to focus on (e.g., 'security', 'performance', 'readability')",
                        required: false,
                    },
                ],
            },
            Prompt {
                name: "explain-code",
                description: "Get an explanation of how code works",
                arguments: vec![
                    PromptArgument {
                        name: "code_snippet",
                        description: "The code snippet to explain",
                        required: true,
                    },
                    PromptArgument {
                        name: "language",
                        description: "Programming language of the code",
                        required: false,
                    },
                ],
            },
        ],
    }
}

pub fn handle_prompts_get(params: Option<Value>) -> Result<Value, AppError> {
    let Some(raw_params) = params else {
        return Err(AppError::bad_request(
            "missing_params",
            "prompts/get requires params",
        ));
    };

    let request: GetPromptParams = serde_json::from_value(raw_params)
        .map_err(|err| AppError::bad_request("invalid_params", err.to_string()))?;
    let arguments = request.arguments.unwrap_or_default();

    let result = match request.name.as_str() {
        "code-review" => code_review(&arguments)?,
        "explain-code" => explain_code(&arguments)?,
        _ => return Err(AppError::not_found("prompt", request.name)),
    };

    serde_json::to_value(result)
        .map_err(|err| AppError::internal(format!("prompt serialization failed: {err}")))
}

fn code_review(arguments: &Map<String, Value>) -> Result<GetPromptResult, AppError> {
    let file_path = required_string_arg(arguments, "file_path")?;
    let focus_areas = optional_string_arg(arguments, "focus_areas").unwrap_or(DEFAULT_FOCUS_AREAS);

    let text = format!(
        "Please review the code in the file \"{file_path}\" and provide feedback focusing on: {focus_areas}.

Please analyze the code for:
- Code quality and readability
- Potential bugs or issues
- Performance considerations
- Security concerns
- Best practices adherence
- Suggestions for improvement

Provide specific, actionable feedback with examples where possible."
    );

    Ok(GetPromptResult {
        description: format!("Code review for {file_path}"),
        messages: vec![user_message(text)],
    })
}

fn explain_code(arguments: &Map<String, Value>) -> Result<GetPromptResult, AppError> {
    let code_snippet = required_string_arg(arguments, "code_snippet")?;
    let fence_language = optional_string_arg(arguments, "language").unwrap_or_default();
    let language = optional_string_arg(arguments, "language").unwrap_or(DEFAULT_LANGUAGE);

    let text = format!(
        "Please explain how this {language} code works:

```{fence_language}
{code_snippet}
```

Please provide:
1. A high-level overview of what the code does
2. Step-by-step explanation of the logic
3. Key concepts or patterns used
4. Any potential edge cases or considerations
5. Suggestions for improvement if applicable

Make the explanation clear and accessible."
    );

    Ok(GetPromptResult {
        description: format!("Explain code snippet in {language}"),
        messages: vec![user_message(text)],
    })
}

fn user_message(text: String) -> PromptMessage {
    PromptMessage {
        role: "user",
        content: ContentBlock::from(TextContent::new(text, None, None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lists_both_prompts_with_arguments() {
        let listed = serde_json::to_value(build_prompts_list()).expect("serialize");
        assert_eq!(listed["prompts"][0]["name"], json!("code-review"));
        assert_eq!(listed["prompts"][0]["arguments"][0]["required"], json!(true));
        assert_eq!(listed["prompts"][1]["name"], json!("explain-code"));
        assert_eq!(listed["prompts"][1]["arguments"][1]["name"], json!("language"));
    }

    #[test]
    fn code_review_uses_default_focus() {
        let result = handle_prompts_get(Some(json!({
            "name": "code-review",
            "arguments": {"file_path": "src/lib.rs"}
        })))
        .expect("prompt");

        assert_eq!(result["description"], json!("Code review for src/lib.rs"));
        assert_eq!(result["messages"][0]["role"], json!("user"));
        assert_eq!(result["messages"][0]["content"]["type"], json!("text"));
        let text = result["messages"][0]["content"]["text"].as_str().expect("text");
        assert!(text.starts_with("Please review the code in the file \"src/lib.rs\""));
        assert!(text.contains(DEFAULT_FOCUS_AREAS));
    }

    #[test]
    fn explain_code_fences_snippet_with_language() {
        let result = handle_prompts_get(Some(json!({
            "name": "explain-code",
            "arguments": {"code_snippet": "fn main() {}", "language": "rust"}
        })))
        .expect("prompt");

        assert_eq!(result["description"], json!("Explain code snippet in rust"));
        let text = result["messages"][0]["content"]["text"].as_str().expect("text");
        assert!(text.starts_with("Please explain how this rust code works:"));
        assert!(text.contains("```rust\nfn main() {}\n```"));
    }

    #[test]
    fn explain_code_without_language_uses_plain_fence() {
        let result = handle_prompts_get(Some(json!({
            "name": "explain-code",
            "arguments": {"code_snippet": "x = 1"}
        })))
        .expect("prompt");

        assert_eq!(
            result["description"],
            json!("Explain code snippet in the programming language used")
        );
        let text = result["messages"][0]["content"]["text"].as_str().expect("text");
        assert!(text.contains("```\nx = 1\n```"));
    }

    #[test]
    fn unknown_prompt_and_missing_argument_fail() {
        let unknown = handle_prompts_get(Some(json!({"name": "haiku"}))).expect_err("unknown");
        assert_eq!(unknown.to_string(), "Unknown prompt: haiku");

        let missing = handle_prompts_get(Some(json!({"name": "code-review", "arguments": {}})))
            .expect_err("missing file_path");
        assert_eq!(
            missing.to_string(),
            "Invalid params: missing required argument file_path"
        );
    }
}
