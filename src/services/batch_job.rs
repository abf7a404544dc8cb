use std::{collections::HashSet, time::Duration};

use chrono::{DateTime, Utc};

use crate::{
    dal::Warehouse,
    domain::group::{ClassifiedGroup, GroupRecord},
};

use super::{get_and_classify_groups, DiscoveryOptions, MessagingPlatform, TextGenerator};

#[derive(Debug, Clone, Copy)]
pub struct JobOptions {
    pub discovery: DiscoveryOptions,
    pub insert_only_relevant: bool,
    pub keyword_pause: Duration,
}

/// How a run ended when nothing fatal happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    NoKeywords,
    Completed(JobReport),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobReport {
    pub keywords: usize,
    pub classified: usize,
    pub queued: usize,
    pub skipped_existing: usize,
    pub skipped_irrelevant: usize,
    pub failed_rows: usize,
}

/// Everything one run queues up before the final write.
pub struct Accumulator {
    known_ids: HashSet<String>,
    pending: Vec<GroupRecord>,
    insert_only_relevant: bool,
    report: JobReport,
}

impl Accumulator {
    pub fn new(known_ids: HashSet<String>, insert_only_relevant: bool) -> Self {
        Accumulator {
            known_ids,
            pending: vec![],
            insert_only_relevant,
            report: JobReport::default(),
        }
    }

    /// Queues the groups that are neither known nor filtered out. Ids are
    /// remembered right away so a later keyword cannot queue them again.
    pub fn accumulate(&mut self, groups: Vec<ClassifiedGroup>, fetched_at: DateTime<Utc>) {
        for group in groups {
            self.report.classified += 1;

            if self.known_ids.contains(&group.group_id) {
                log::info!("Group '{}' already exists. Skipping.", group.group_name);
                self.report.skipped_existing += 1;
                continue;
            }

            if self.insert_only_relevant && group.is_relevant != Some(true) {
                log::info!("Group '{}' is not relevant. Skipping.", group.group_name);
                self.report.skipped_irrelevant += 1;
                continue;
            }

            log::info!(
                "New group found: {}. Queued for insertion.",
                group.group_name
            );
            self.known_ids.insert(group.group_id.clone());
            self.pending.push(group.stamp(fetched_at));
            self.report.queued += 1;
        }
    }

    pub fn pending(&self) -> &[GroupRecord] {
        &self.pending
    }
}

/// One full run: index, keywords, per-keyword discovery, single final write.
///
/// Only the two initial warehouse reads are fatal. Everything after them is
/// logged and the run carries on.
pub async fn run_batch_job(
    platform: &dyn MessagingPlatform,
    generator: &dyn TextGenerator,
    warehouse: &dyn Warehouse,
    options: JobOptions,
) -> anyhow::Result<JobOutcome> {
    let known_ids = warehouse.fetch_known_group_ids().await?;
    log::info!(
        "Found {} existing groups in the target table.",
        known_ids.len()
    );

    log::info!("Fetching keywords...");
    let keywords = warehouse.fetch_keywords().await?;
    log::info!("Found {} keywords to process.", keywords.len());

    if keywords.is_empty() {
        log::info!("No keywords found. Exiting.");
        return Ok(JobOutcome::NoKeywords);
    }

    let mut accumulator = Accumulator::new(known_ids, options.insert_only_relevant);

    for (i, keyword) in keywords.iter().enumerate() {
        log::info!("{} Processing keyword: {} {}", "=".repeat(20), keyword, "=".repeat(20));

        let groups = get_and_classify_groups(platform, generator, keyword, options.discovery).await;
        accumulator.accumulate(groups, Utc::now());

        if i + 1 < keywords.len() {
            tokio::time::sleep(options.keyword_pause).await;
        }
    }

    let mut report = accumulator.report.clone();
    report.keywords = keywords.len();
    report.failed_rows = write_pending(warehouse, accumulator.pending()).await;

    log::info!("Job report: {:?}", report);
    Ok(JobOutcome::Completed(report))
}

/// Appends the queued rows in one call and returns how many were refused.
async fn write_pending(warehouse: &dyn Warehouse, pending: &[GroupRecord]) -> usize {
    if pending.is_empty() {
        log::info!("No new groups to add to the warehouse.");
        return 0;
    }

    log::info!(
        "Attempting to insert {} new groups into the warehouse...",
        pending.len()
    );

    match warehouse.insert_groups(pending).await {
        Ok(errors) if errors.is_empty() => {
            log::info!("Successfully inserted all new groups.");
            0
        }
        Ok(errors) => {
            for error in errors.iter() {
                log::error!(
                    "Row {} (group {}) was not inserted: {}",
                    error.index,
                    error.group_id,
                    error.reason
                );
            }
            errors.len()
        }
        Err(e) => {
            log::error!("An error occurred during warehouse insertion: {:?}", e);
            pending.len()
        }
    }
}
