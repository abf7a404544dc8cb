use serde::{Deserialize, Serialize};

pub const NO_MESSAGES_EXPLANATION: &str = "No messages available for analysis.";
pub const NO_TEXT_EXPLANATION: &str = "No text in recent messages.";
pub const UNPARSEABLE_EXPLANATION: &str = "Could not determine relevance.";
pub const FAILED_EXPLANATION: &str = "An unexpected error occurred during classification.";
pub const MISSING_EXPLANATION: &str = "No explanation provided.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub is_relevant: Option<bool>,
    pub explanation: String,
}

impl Verdict {
    pub fn new(is_relevant: Option<bool>, explanation: &str) -> Self {
        Verdict {
            is_relevant,
            explanation: explanation.to_string(),
        }
    }

    /// Verdict for a group whose history could not be sampled at all.
    pub fn no_messages() -> Self {
        Verdict::new(Some(false), NO_MESSAGES_EXPLANATION)
    }
}

/// Result of asking the model about one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Verdict(Verdict),
    /// Every sampled message was empty, the model was not called.
    EmptyInput,
    /// The model answered with something that is not a verdict.
    Unparseable { raw: String },
    /// The model call itself failed.
    Failed { reason: String },
}

impl Classification {
    pub fn into_verdict(self) -> Verdict {
        match self {
            Classification::Verdict(verdict) => verdict,
            Classification::EmptyInput => Verdict::new(None, NO_TEXT_EXPLANATION),
            Classification::Unparseable { .. } => Verdict::new(None, UNPARSEABLE_EXPLANATION),
            Classification::Failed { .. } => Verdict::new(None, FAILED_EXPLANATION),
        }
    }
}

#[derive(Deserialize)]
struct RawVerdict {
    is_relevant: bool,
    explanation: Option<String>,
}

/// Removes code fences and a leading `json` tag the model sometimes wraps
/// its answer in.
pub fn clean_model_response(response: &str) -> &str {
    let trimmed = response.trim().trim_matches('`').trim();
    trimmed
        .strip_prefix("json")
        .or_else(|| trimmed.strip_prefix("JSON"))
        .unwrap_or(trimmed)
        .trim()
}

pub fn parse_verdict(response: &str) -> Classification {
    let cleaned = clean_model_response(response);

    match serde_json::from_str::<RawVerdict>(cleaned) {
        Ok(raw) => Classification::Verdict(Verdict {
            is_relevant: Some(raw.is_relevant),
            explanation: raw
                .explanation
                .unwrap_or_else(|| MISSING_EXPLANATION.to_string()),
        }),
        Err(e) => {
            log::error!("Error parsing classifier response: {:?}", e);
            Classification::Unparseable {
                raw: response.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{clean_model_response, parse_verdict, Classification, Verdict};

    #[test]
    fn clean_model_response_strips_fences() {
        let response = "```json\n{\"is_relevant\": true, \"explanation\": \"ok\"}\n```";
        assert_eq!(
            clean_model_response(response),
            "{\"is_relevant\": true, \"explanation\": \"ok\"}"
        );
    }

    #[test]
    fn clean_model_response_keeps_json_word_inside_explanation() {
        let response = "{\"is_relevant\": false, \"explanation\": \"talks about json\"}";
        assert_eq!(clean_model_response(response), response);
    }

    #[test]
    fn parse_verdict_valid() {
        let result = parse_verdict("```json\n{\"is_relevant\": true, \"explanation\": \"on-topic\"}\n```");
        assert_eq!(
            result,
            Classification::Verdict(Verdict::new(Some(true), "on-topic"))
        );
    }

    #[test]
    fn parse_verdict_missing_explanation() {
        let result = parse_verdict("{\"is_relevant\": false}");
        assert_eq!(
            result.into_verdict(),
            Verdict::new(Some(false), "No explanation provided.")
        );
    }

    #[test]
    fn parse_verdict_malformed() {
        let result = parse_verdict("I think it is relevant!");
        assert!(matches!(result, Classification::Unparseable { .. }));
        assert_eq!(
            result.into_verdict(),
            Verdict::new(None, "Could not determine relevance.")
        );
    }

    #[test]
    fn parse_verdict_wrong_type() {
        let result = parse_verdict("{\"is_relevant\": \"yes\", \"explanation\": \"x\"}");
        assert!(matches!(result, Classification::Unparseable { .. }));
    }

    #[test]
    fn empty_input_has_no_verdict() {
        assert_eq!(
            Classification::EmptyInput.into_verdict(),
            Verdict::new(None, "No text in recent messages.")
        );
    }
}
