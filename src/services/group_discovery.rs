use crate::domain::{
    group::{ClassifiedGroup, DiscoveredGroup},
    verdict::{Classification, Verdict},
};

use super::{classify_group_relevance, MessagingPlatform, TextGenerator};

#[derive(Debug, Clone, Copy)]
pub struct DiscoveryOptions {
    pub search_limit: usize,
    pub message_limit: usize,
    pub include_group_link: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        DiscoveryOptions {
            search_limit: 10,
            message_limit: 10,
            include_group_link: true,
        }
    }
}

/// Searches public groups for `keyword` and classifies each one from its
/// recent messages. A group that fails to sample is logged and left out, a
/// failed search yields no groups.
pub async fn get_and_classify_groups(
    platform: &dyn MessagingPlatform,
    generator: &dyn TextGenerator,
    keyword: &str,
    options: DiscoveryOptions,
) -> Vec<ClassifiedGroup> {
    let groups = match platform.search_groups(keyword, options.search_limit).await {
        Ok(groups) => groups,
        Err(e) => {
            log::error!("Search for keyword '{}' failed: {:?}", keyword, e);
            return vec![];
        }
    };
    log::info!("Found {} groups for keyword '{}'", groups.len(), keyword);

    let mut classified_groups = vec![];

    for group in groups {
        log::info!(
            "--- Processing Group: {} (@{}) ---",
            group.title,
            group.username.as_deref().unwrap_or("N/A")
        );

        let Some(verdict) = sample_and_classify(platform, generator, keyword, &group, options).await
        else {
            continue;
        };

        log::info!("Relevant to '{}': {:?}", keyword, verdict.is_relevant);
        log::info!("Explanation: {}", verdict.explanation);

        classified_groups.push(ClassifiedGroup::new(
            &group,
            verdict,
            options.include_group_link,
        ));
    }

    classified_groups
}

async fn sample_and_classify(
    platform: &dyn MessagingPlatform,
    generator: &dyn TextGenerator,
    keyword: &str,
    group: &DiscoveredGroup,
    options: DiscoveryOptions,
) -> Option<Verdict> {
    let messages = match platform.recent_messages(group, options.message_limit).await {
        Ok(messages) => messages,
        Err(e) => {
            log::error!(
                "Could not process group {} (ID: {}) for '{}'. Reason: {:?}",
                group.title,
                group.id,
                keyword,
                e
            );
            return None;
        }
    };

    if messages.is_empty() {
        log::info!("No recent messages found or history is hidden.");
        return Some(Verdict::no_messages());
    }

    let classification = classify_group_relevance(generator, keyword, &messages).await;
    if let Classification::Unparseable { ref raw } = classification {
        log::warn!("Unparseable verdict for group {}: {}", group.title, raw);
    }

    Some(classification.into_verdict())
}
