use std::time::Duration;

use crate::{
    dal::Warehouse,
    domain::group::{build_group_link, DiscoveredGroup, UnlinkedGroup},
};

use super::MessagingPlatform;

const BACKFILL_SEARCH_LIMIT: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub candidates: usize,
    pub updated: usize,
    pub unmatched: usize,
    pub failed: usize,
}

/// Fills `group_link` for stored groups that predate the link column by
/// searching each one by name and matching the platform id.
pub async fn backfill_group_links(
    platform: &dyn MessagingPlatform,
    warehouse: &dyn Warehouse,
    pause: Duration,
) -> anyhow::Result<BackfillReport> {
    log::info!("Fetching groups without group_link...");
    let groups = warehouse.fetch_unlinked_groups().await?;
    log::info!("Found {} groups to update.", groups.len());

    let mut report = BackfillReport {
        candidates: groups.len(),
        ..Default::default()
    };

    for group in groups.iter() {
        match backfill_one(platform, warehouse, group).await {
            Ok(Some(link)) => {
                log::info!("Updated '{}' -> {}", group.group_name, link);
                report.updated += 1;
            }
            Ok(None) => {
                log::info!(
                    "No username found for '{}' (ID: {})",
                    group.group_name,
                    group.group_id
                );
                report.unmatched += 1;
            }
            Err(e) => {
                log::error!(
                    "Error processing '{}' (ID: {}): {:?}",
                    group.group_name,
                    group.group_id,
                    e
                );
                report.failed += 1;
            }
        }

        tokio::time::sleep(pause).await;
    }

    Ok(report)
}

async fn backfill_one(
    platform: &dyn MessagingPlatform,
    warehouse: &dyn Warehouse,
    group: &UnlinkedGroup,
) -> anyhow::Result<Option<String>> {
    let results = platform
        .search_groups(&group.group_name, BACKFILL_SEARCH_LIMIT)
        .await?;

    let Some(link) = find_link(&results, &group.group_id) else {
        return Ok(None);
    };

    warehouse.update_group_link(&group.group_id, &link).await?;
    Ok(Some(link))
}

fn find_link(results: &[DiscoveredGroup], group_id: &str) -> Option<String> {
    results
        .iter()
        .find(|candidate| candidate.group_id() == group_id)
        .and_then(|candidate| candidate.username.as_deref())
        .and_then(build_group_link)
}
