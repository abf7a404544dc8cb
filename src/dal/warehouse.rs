use std::collections::HashSet;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    configuration::WarehouseSettings,
    domain::group::{GroupRecord, UnlinkedGroup},
};

use super::{group_db, keyword_db};

/// A row the store refused during an append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowInsertError {
    pub index: usize,
    pub group_id: String,
    pub reason: String,
}

/// The analytical store holding keywords and discovered groups.
#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn fetch_known_group_ids(&self) -> anyhow::Result<HashSet<String>>;

    async fn fetch_keywords(&self) -> anyhow::Result<Vec<String>>;

    /// Appends `groups` in one call. Rows the store rejects are returned,
    /// the others stay written.
    async fn insert_groups(&self, groups: &[GroupRecord]) -> anyhow::Result<Vec<RowInsertError>>;

    async fn fetch_unlinked_groups(&self) -> anyhow::Result<Vec<UnlinkedGroup>>;

    async fn update_group_link(&self, group_id: &str, group_link: &str) -> anyhow::Result<()>;
}

pub struct PgWarehouse {
    pool: PgPool,
    keywords_table: String,
    keyword_column: String,
    groups_table: String,
}

impl PgWarehouse {
    pub fn new(pool: PgPool, settings: &WarehouseSettings) -> Self {
        PgWarehouse {
            pool,
            keywords_table: settings.keywords_table.clone(),
            keyword_column: settings.keyword_column.clone(),
            groups_table: settings.groups_table.clone(),
        }
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn fetch_known_group_ids(&self) -> anyhow::Result<HashSet<String>> {
        let ids = group_db::get_group_ids(&self.pool, &self.groups_table)
            .await
            .context("Could not fetch existing group IDs")?;

        Ok(HashSet::from_iter(ids))
    }

    async fn fetch_keywords(&self) -> anyhow::Result<Vec<String>> {
        keyword_db::get_distinct_keywords(&self.pool, &self.keywords_table, &self.keyword_column)
            .await
            .context("Failed to fetch keywords")
    }

    async fn insert_groups(&self, groups: &[GroupRecord]) -> anyhow::Result<Vec<RowInsertError>> {
        // One statement per row so a refused row is reported on its own
        // instead of failing the whole batch.
        let mut errors = vec![];

        for (index, group) in groups.iter().enumerate() {
            if let Err(e) = group_db::insert_group(&self.pool, &self.groups_table, group).await {
                errors.push(RowInsertError {
                    index,
                    group_id: group.group_id.clone(),
                    reason: e.to_string(),
                });
            }
        }

        Ok(errors)
    }

    async fn fetch_unlinked_groups(&self) -> anyhow::Result<Vec<UnlinkedGroup>> {
        group_db::get_unlinked_groups(&self.pool, &self.groups_table)
            .await
            .context("Failed to fetch groups without a link")
    }

    async fn update_group_link(&self, group_id: &str, group_link: &str) -> anyhow::Result<()> {
        group_db::update_group_link(&self.pool, &self.groups_table, group_id, group_link).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::{collections::HashSet, sync::Mutex};

    use anyhow::bail;
    use async_trait::async_trait;

    use super::{RowInsertError, Warehouse};
    use crate::domain::group::{GroupRecord, UnlinkedGroup};

    /// In-memory store that records every write.
    #[derive(Default)]
    pub struct FakeWarehouse {
        pub known_ids: Vec<String>,
        pub keywords: Vec<String>,
        pub unlinked: Vec<UnlinkedGroup>,
        pub fail_reads: bool,
        pub rejected_ids: Vec<String>,
        pub insert_calls: Mutex<Vec<Vec<GroupRecord>>>,
        pub link_updates: Mutex<Vec<(String, String)>>,
    }

    impl FakeWarehouse {
        pub fn with_keywords(keywords: &[&str]) -> Self {
            FakeWarehouse {
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
                ..Default::default()
            }
        }

        pub fn inserted(&self) -> Vec<GroupRecord> {
            self.insert_calls
                .lock()
                .unwrap()
                .iter()
                .flatten()
                .cloned()
                .collect()
        }

        pub fn insert_call_count(&self) -> usize {
            self.insert_calls.lock().unwrap().len()
        }

        pub fn write_count(&self) -> usize {
            self.insert_call_count() + self.link_updates.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Warehouse for FakeWarehouse {
        async fn fetch_known_group_ids(&self) -> anyhow::Result<HashSet<String>> {
            if self.fail_reads {
                bail!("permission denied on table groups");
            }
            Ok(self.known_ids.iter().cloned().collect())
        }

        async fn fetch_keywords(&self) -> anyhow::Result<Vec<String>> {
            if self.fail_reads {
                bail!("permission denied on table keys");
            }
            Ok(self.keywords.clone())
        }

        async fn insert_groups(
            &self,
            groups: &[GroupRecord],
        ) -> anyhow::Result<Vec<RowInsertError>> {
            self.insert_calls.lock().unwrap().push(groups.to_vec());

            Ok(groups
                .iter()
                .enumerate()
                .filter(|(_, g)| self.rejected_ids.contains(&g.group_id))
                .map(|(index, g)| RowInsertError {
                    index,
                    group_id: g.group_id.clone(),
                    reason: "invalid".to_string(),
                })
                .collect())
        }

        async fn fetch_unlinked_groups(&self) -> anyhow::Result<Vec<UnlinkedGroup>> {
            Ok(self.unlinked.clone())
        }

        async fn update_group_link(&self, group_id: &str, group_link: &str) -> anyhow::Result<()> {
            self.link_updates
                .lock()
                .unwrap()
                .push((group_id.to_string(), group_link.to_string()));
            Ok(())
        }
    }
}
