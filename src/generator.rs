//! Reference-solution generation via a text-generation inference API.
//!
//! The detector needs a "model" solution for the problem statement to
//! compare the candidate against. Generation tries a fixed ordered list of
//! models; any failure (request error, empty output, no extractable code)
//! advances to the next model, and exhausting the list is reported as
//! unavailable rather than an error the caller must handle.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::DetectError;
use crate::extract;

/// Generation client configuration.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Inference API base URL.
    pub api_base: String,
    /// Bearer token; generation is unavailable without one.
    pub api_token: String,
    /// Models tried in order of preference.
    pub models: Vec<String>,
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_base: std::env::var("HF_API_BASE")
                .unwrap_or_else(|_| "https://api-inference.huggingface.co".to_string()),
            api_token: std::env::var("HF_TOKEN").unwrap_or_default(),
            models: vec![
                "deepseek-ai/DeepSeek-V3-0324".to_string(),
                "microsoft/CodeGPT-small-py-adaptedGPT2".to_string(),
                "openai-community/gpt2".to_string(),
            ],
            max_new_tokens: 500,
            temperature: 0.1,
            top_p: 0.95,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Serialize)]
struct TextGenRequest<'a> {
    inputs: &'a str,
    parameters: TextGenParameters,
}

#[derive(Debug, Serialize)]
struct TextGenParameters {
    max_new_tokens: u32,
    temperature: f32,
    top_p: f32,
    do_sample: bool,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct TextGenChoice {
    generated_text: String,
}

/// Source of reference solutions for the detection pipeline.
#[async_trait]
pub trait ReferenceGenerator: Send + Sync {
    /// Produce a best-effort reference solution for the problem statement.
    async fn generate_reference(
        &self,
        problem_statement: &str,
        language: &str,
    ) -> Result<String, DetectError>;
}

/// Text-generation client with sequential model fallback.
pub struct HfTextGenClient {
    client: Client,
    config: GeneratorConfig,
}

impl HfTextGenClient {
    pub fn new(config: GeneratorConfig) -> Result<Self, DetectError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        info!(
            "text-generation client: {} models configured",
            config.models.len()
        );
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self, DetectError> {
        Self::new(GeneratorConfig::default())
    }

    fn build_prompt(&self, problem_statement: &str) -> String {
        format!(
            "class Solution:\n    def longestCommonPrefix(self, strs: List[str]) -> str:\n\n\
             Complete the following Solution class. This function should solve the following problem:\n\
             {}\n\n\
             Return ONLY the completed function code. Do not include examples, constraints, or explanations.\n\
             The code should be complete, properly indented, and ready to run.",
            problem_statement
        )
    }

    async fn try_model(&self, model: &str, prompt: &str) -> Result<String, DetectError> {
        let url = format!("{}/models/{}", self.config.api_base, model);
        let request = TextGenRequest {
            inputs: prompt,
            parameters: TextGenParameters {
                max_new_tokens: self.config.max_new_tokens,
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                do_sample: true,
                return_full_text: false,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_token))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DetectError::GenerationUnavailable(format!(
                "model returned {}: {}",
                status, body
            )));
        }

        let choices: Vec<TextGenChoice> = response.json().await?;
        let text = choices
            .into_iter()
            .next()
            .map(|c| c.generated_text)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(DetectError::GenerationUnavailable(
                "empty generation".to_string(),
            ));
        }

        extract::extract_code(&text).ok_or(DetectError::ExtractionFailure)
    }
}

#[async_trait]
impl ReferenceGenerator for HfTextGenClient {
    async fn generate_reference(
        &self,
        problem_statement: &str,
        _language: &str,
    ) -> Result<String, DetectError> {
        if self.config.api_token.is_empty() {
            return Err(DetectError::GenerationUnavailable(
                "no API token configured".to_string(),
            ));
        }

        let prompt = self.build_prompt(problem_statement);

        for model in &self.config.models {
            debug!("trying model {}", model);
            match self.try_model(model, &prompt).await {
                Ok(code) => {
                    info!("model {} produced {} bytes of code", model, code.len());
                    return Ok(code);
                }
                Err(e) => warn!("model {} failed: {}", model, e),
            }
        }

        Err(DetectError::GenerationUnavailable(
            "all configured models failed".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn offline_config() -> GeneratorConfig {
        GeneratorConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            api_token: String::new(),
            models: vec!["test-model".to_string()],
            max_new_tokens: 500,
            temperature: 0.1,
            top_p: 0.95,
            timeout_secs: 5,
        }
    }

    #[test]
    fn missing_token_is_unavailable_without_any_request() {
        let client = HfTextGenClient::new(offline_config()).unwrap();
        let result = tokio_test::block_on(client.generate_reference("sum a list", "python"));
        assert!(matches!(
            result,
            Err(DetectError::GenerationUnavailable(_))
        ));
    }

    #[test]
    #[serial]
    fn default_config_reads_environment() {
        std::env::set_var("HF_API_BASE", "http://localhost:8080");
        std::env::set_var("HF_TOKEN", "secret");
        let config = GeneratorConfig::default();
        assert_eq!(config.api_base, "http://localhost:8080");
        assert_eq!(config.api_token, "secret");
        std::env::remove_var("HF_API_BASE");
        std::env::remove_var("HF_TOKEN");
    }

    #[test]
    fn default_model_list_is_ordered() {
        let config = GeneratorConfig::default();
        assert_eq!(config.models.len(), 3);
        assert!(config.models[0].starts_with("deepseek-ai/"));
    }

    #[test]
    fn prompt_contains_problem_statement() {
        let client = HfTextGenClient::new(offline_config()).unwrap();
        let prompt = client.build_prompt("find max subarray sum");
        assert!(prompt.contains("find max subarray sum"));
        assert!(prompt.contains("Return ONLY the completed function code"));
    }
}
