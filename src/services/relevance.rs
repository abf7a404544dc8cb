use crate::domain::{
    message::GroupMessage,
    verdict::{parse_verdict, Classification},
};

use super::TextGenerator;

pub fn build_relevance_prompt(keyword: &str, message_texts: &[&str]) -> String {
    format!(
        r#"Based on the following messages from a Telegram group, is the group relevant to the keyword '{}'?
Please provide your answer in JSON format with two keys: "is_relevant" (boolean) and "explanation" (a brief string).

Messages:
- {}"#,
        keyword,
        message_texts.join("\n- ")
    )
}

/// Asks the model whether the sampled messages make the group relevant to
/// `keyword`. Never fails: model and parsing errors come back as
/// [`Classification::Failed`] and [`Classification::Unparseable`].
pub async fn classify_group_relevance(
    generator: &dyn TextGenerator,
    keyword: &str,
    messages: &[GroupMessage],
) -> Classification {
    let message_texts: Vec<&str> = messages
        .iter()
        .filter(|m| m.has_text())
        .map(|m| m.text.as_str())
        .collect();

    if message_texts.is_empty() {
        return Classification::EmptyInput;
    }

    let prompt = build_relevance_prompt(keyword, &message_texts);

    match generator.generate(&prompt).await {
        Ok(response) => parse_verdict(&response),
        Err(e) => {
            log::error!("Error classifying group for '{}': {:?}", keyword, e);
            Classification::Failed {
                reason: e.to_string(),
            }
        }
    }
}
