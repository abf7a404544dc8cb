use std::{collections::HashSet, sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    configuration::WarehouseSettings,
    domain::group::{GroupRecord, UnlinkedGroup},
    services::GcpTokenProvider,
};

use super::{RowInsertError, Warehouse};

const BIGQUERY_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";
const QUERY_TIMEOUT_MS: u64 = 30_000;
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// `project.dataset.table`, with the project defaulting to the job's own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn parse(name: &str, default_project: &str) -> anyhow::Result<Self> {
        let parts: Vec<&str> = name.split('.').collect();
        match parts.as_slice() {
            [project, dataset, table] => Ok(TableRef {
                project: project.to_string(),
                dataset: dataset.to_string(),
                table: table.to_string(),
            }),
            [dataset, table] => Ok(TableRef {
                project: default_project.to_string(),
                dataset: dataset.to_string(),
                table: table.to_string(),
            }),
            _ => Err(anyhow!(
                "Table name {:?} must be dataset.table or project.dataset.table",
                name
            )),
        }
    }

    pub fn sql_name(&self) -> String {
        format!("`{}.{}.{}`", self.project, self.dataset, self.table)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    query: String,
    use_legacy_sql: bool,
    timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameter_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    query_parameters: Vec<Value>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    job_reference: Option<JobReference>,
    #[serde(default)]
    rows: Vec<TableRow>,
    page_token: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

#[derive(Deserialize, Debug)]
struct TableRow {
    f: Vec<TableCell>,
}

#[derive(Deserialize, Debug)]
struct TableCell {
    v: Value,
}

impl TableRow {
    fn string_at(&self, index: usize) -> Option<String> {
        self.f.get(index).and_then(|cell| match &cell.v {
            Value::String(s) => Some(s.clone()),
            _ => None,
        })
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<InsertErrorEntry>,
}

#[derive(Deserialize, Debug)]
struct InsertErrorEntry {
    index: usize,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Deserialize, Debug)]
struct ErrorProto {
    reason: Option<String>,
    message: Option<String>,
}

pub struct BigQueryWarehouse {
    client: Client,
    tokens: Arc<GcpTokenProvider>,
    project_id: String,
    keywords_table: TableRef,
    keyword_column: String,
    groups_table: TableRef,
}

impl BigQueryWarehouse {
    pub fn new(
        client: Client,
        tokens: Arc<GcpTokenProvider>,
        project_id: &str,
        settings: &WarehouseSettings,
    ) -> anyhow::Result<Self> {
        Ok(BigQueryWarehouse {
            client,
            tokens,
            project_id: project_id.to_string(),
            keywords_table: TableRef::parse(&settings.keywords_table, project_id)?,
            keyword_column: settings.keyword_column.clone(),
            groups_table: TableRef::parse(&settings.groups_table, project_id)?,
        })
    }

    async fn run_query(&self, request: QueryRequest) -> anyhow::Result<Vec<TableRow>> {
        let token = self.tokens.access_token().await?;
        let url = format!("{}/projects/{}/queries", BIGQUERY_URL, self.project_id);

        let response = self
            .client
            .post(url)
            .bearer_auth(&token)
            .json(&request)
            .send()
            .await?;
        let mut page: QueryResponse = read_json(response).await?;
        let mut rows = vec![];

        loop {
            let (job, page_token) = match next_step(page, &mut rows)? {
                QueryStep::Done => return Ok(rows),
                QueryStep::Poll(job) => {
                    tokio::time::sleep(POLL_INTERVAL).await;
                    (job, None)
                }
                QueryStep::NextPage(job, page_token) => (job, Some(page_token)),
            };

            page = self
                .get_query_results(&token, &job, page_token.as_deref())
                .await?;
        }
    }

    async fn get_query_results(
        &self,
        token: &str,
        job: &JobReference,
        page_token: Option<&str>,
    ) -> anyhow::Result<QueryResponse> {
        let url = format!(
            "{}/projects/{}/queries/{}",
            BIGQUERY_URL, self.project_id, job.job_id
        );

        let mut params = vec![("timeoutMs", QUERY_TIMEOUT_MS.to_string())];
        if let Some(location) = &job.location {
            params.push(("location", location.clone()));
        }
        if let Some(page_token) = page_token {
            params.push(("pageToken", page_token.to_string()));
        }

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(&params)
            .send()
            .await?;

        read_json(response).await
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn fetch_known_group_ids(&self) -> anyhow::Result<HashSet<String>> {
        let sql = format!("SELECT group_id FROM {}", self.groups_table.sql_name());
        let rows = self
            .run_query(plain_query(sql))
            .await
            .context("Could not fetch existing group IDs")?;

        Ok(rows.iter().filter_map(|row| row.string_at(0)).collect())
    }

    async fn fetch_keywords(&self) -> anyhow::Result<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT {col} FROM {table} WHERE {col} IS NOT NULL",
            col = self.keyword_column,
            table = self.keywords_table.sql_name()
        );
        let rows = self
            .run_query(plain_query(sql))
            .await
            .context("Failed to fetch keywords")?;

        Ok(rows.iter().filter_map(|row| row.string_at(0)).collect())
    }

    async fn insert_groups(&self, groups: &[GroupRecord]) -> anyhow::Result<Vec<RowInsertError>> {
        let token = self.tokens.access_token().await?;
        let url = format!(
            "{}/projects/{}/datasets/{}/tables/{}/insertAll",
            BIGQUERY_URL,
            self.groups_table.project,
            self.groups_table.dataset,
            self.groups_table.table
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&insert_all_body(groups))
            .send()
            .await?;
        let result: InsertAllResponse = read_json(response).await?;

        Ok(row_errors(groups, result))
    }

    async fn fetch_unlinked_groups(&self) -> anyhow::Result<Vec<UnlinkedGroup>> {
        let sql = format!(
            "SELECT group_id, group_name FROM {} WHERE group_link IS NULL",
            self.groups_table.sql_name()
        );
        let rows = self
            .run_query(plain_query(sql))
            .await
            .context("Failed to fetch groups without a link")?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(UnlinkedGroup {
                    group_id: row.string_at(0)?,
                    group_name: row.string_at(1).unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn update_group_link(&self, group_id: &str, group_link: &str) -> anyhow::Result<()> {
        let sql = format!(
            "UPDATE {} SET group_link = @group_link WHERE group_id = @group_id",
            self.groups_table.sql_name()
        );
        let request = QueryRequest {
            query: sql,
            use_legacy_sql: false,
            timeout_ms: QUERY_TIMEOUT_MS,
            parameter_mode: Some("NAMED"),
            query_parameters: vec![
                string_parameter("group_link", group_link),
                string_parameter("group_id", group_id),
            ],
        };

        self.run_query(request).await?;
        Ok(())
    }
}

#[derive(Debug)]
enum QueryStep {
    Done,
    Poll(JobReference),
    NextPage(JobReference, String),
}

/// Collects the rows of a finished page and decides what to fetch next.
fn next_step(page: QueryResponse, rows: &mut Vec<TableRow>) -> anyhow::Result<QueryStep> {
    if page.job_complete {
        rows.extend(page.rows);
        let Some(page_token) = page.page_token else {
            return Ok(QueryStep::Done);
        };
        return Ok(QueryStep::NextPage(job_reference(page.job_reference)?, page_token));
    }

    Ok(QueryStep::Poll(job_reference(page.job_reference)?))
}

fn job_reference(job: Option<JobReference>) -> anyhow::Result<JobReference> {
    job.ok_or_else(|| anyhow!("Query response has no job reference"))
}

fn plain_query(query: String) -> QueryRequest {
    QueryRequest {
        query,
        use_legacy_sql: false,
        timeout_ms: QUERY_TIMEOUT_MS,
        parameter_mode: None,
        query_parameters: vec![],
    }
}

fn string_parameter(name: &str, value: &str) -> Value {
    json!({
        "name": name,
        "parameterType": { "type": "STRING" },
        "parameterValue": { "value": value },
    })
}

fn insert_all_body(groups: &[GroupRecord]) -> Value {
    let rows: Vec<Value> = groups
        .iter()
        .map(|group| {
            json!({
                "insertId": group.group_id,
                "json": {
                    "group_id": group.group_id,
                    "group_name": group.group_name,
                    "group_link": group.group_link,
                    "is_relevant": group.is_relevant,
                    "why_relevant": group.why_relevant,
                    "last_fetch_time": group
                        .last_fetch_time
                        .to_rfc3339_opts(SecondsFormat::Micros, true),
                },
            })
        })
        .collect();

    json!({ "kind": "bigquery#tableDataInsertAllRequest", "rows": rows })
}

fn row_errors(groups: &[GroupRecord], response: InsertAllResponse) -> Vec<RowInsertError> {
    response
        .insert_errors
        .into_iter()
        .map(|entry| RowInsertError {
            index: entry.index,
            group_id: groups
                .get(entry.index)
                .map(|g| g.group_id.clone())
                .unwrap_or_default(),
            reason: entry
                .errors
                .iter()
                .map(|e| {
                    format!(
                        "{}: {}",
                        e.reason.as_deref().unwrap_or("unknown"),
                        e.message.as_deref().unwrap_or("")
                    )
                })
                .collect::<Vec<_>>()
                .join("; "),
        })
        .collect()
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> anyhow::Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        bail!("BigQuery returned {}: {}", status, body);
    }

    Ok(response.json::<T>().await?)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::{
        insert_all_body, next_step, row_errors, InsertAllResponse, QueryResponse, QueryStep,
        TableRef, TableRow,
    };
    use crate::domain::group::GroupRecord;

    fn record(id: &str) -> GroupRecord {
        GroupRecord {
            group_id: id.to_string(),
            group_name: "Foo Chat".to_string(),
            group_link: None,
            is_relevant: Some(true),
            why_relevant: "on-topic".to_string(),
            last_fetch_time: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    #[test]
    fn table_ref_defaults_project() {
        let table = TableRef::parse("telegram_data.groups", "my-project").unwrap();

        assert_eq!(table.project, "my-project");
        assert_eq!(table.sql_name(), "`my-project.telegram_data.groups`");
    }

    #[test]
    fn table_ref_full_name() {
        let table = TableRef::parse("other.telegram_data.keys", "my-project").unwrap();
        assert_eq!(table.project, "other");
        assert_eq!(table.table, "keys");
    }

    #[test]
    fn table_ref_invalid() {
        assert!(TableRef::parse("groups", "my-project").is_err());
    }

    #[test]
    fn insert_all_body_uses_group_id_as_insert_id() {
        let body = insert_all_body(&[record("1")]);

        assert_eq!(body["rows"][0]["insertId"], "1");
        assert_eq!(body["rows"][0]["json"]["group_link"], json!(null));
        assert_eq!(
            body["rows"][0]["json"]["last_fetch_time"],
            "2025-01-02T03:04:05.000000Z"
        );
    }

    #[test]
    fn row_errors_map_indexes_to_group_ids() {
        let response: InsertAllResponse = serde_json::from_value(json!({
            "kind": "bigquery#tableDataInsertAllResponse",
            "insertErrors": [
                { "index": 1, "errors": [{ "reason": "invalid", "message": "no such field" }] }
            ]
        }))
        .unwrap();

        let errors = row_errors(&[record("1"), record("2")], response);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].group_id, "2");
        assert_eq!(errors[0].reason, "invalid: no such field");
    }

    #[test]
    fn query_response_reads_rows() {
        let response: QueryResponse = serde_json::from_value(json!({
            "jobComplete": true,
            "jobReference": { "projectId": "p", "jobId": "job_1", "location": "US" },
            "rows": [ { "f": [ { "v": "123" } ] }, { "f": [ { "v": null } ] } ]
        }))
        .unwrap();

        assert!(response.job_complete);
        assert_eq!(response.rows[0].string_at(0).as_deref(), Some("123"));
        assert_eq!(response.rows[1].string_at(0), None);
    }

    fn page(value: serde_json::Value) -> QueryResponse {
        serde_json::from_value(value).unwrap()
    }

    /// Feeds pages through `next_step` the way `run_query` does.
    fn drain(pages: Vec<QueryResponse>) -> anyhow::Result<(Vec<Option<String>>, Vec<String>)> {
        let mut rows: Vec<TableRow> = vec![];
        let mut requested = vec![];

        for page in pages {
            match next_step(page, &mut rows)? {
                QueryStep::Done => break,
                QueryStep::Poll(_) => requested.push("poll".to_string()),
                QueryStep::NextPage(_, token) => requested.push(token),
            }
        }

        Ok((rows.iter().map(|row| row.string_at(0)).collect(), requested))
    }

    #[test]
    fn incomplete_job_is_polled_until_complete() {
        let (ids, requested) = drain(vec![
            page(json!({ "jobComplete": false, "jobReference": { "jobId": "job_1" } })),
            page(json!({
                "jobComplete": true,
                "jobReference": { "jobId": "job_1" },
                "rows": [ { "f": [ { "v": "1" } ] } ]
            })),
        ])
        .unwrap();

        assert_eq!(requested, vec!["poll"]);
        assert_eq!(ids, vec![Some("1".to_string())]);
    }

    #[test]
    fn every_page_is_collected() {
        let (ids, requested) = drain(vec![
            page(json!({
                "jobComplete": true,
                "jobReference": { "jobId": "job_1" },
                "rows": [ { "f": [ { "v": "1" } ] }, { "f": [ { "v": "2" } ] } ],
                "pageToken": "page-2"
            })),
            page(json!({
                "jobComplete": true,
                "jobReference": { "jobId": "job_1" },
                "rows": [ { "f": [ { "v": "3" } ] } ]
            })),
        ])
        .unwrap();

        assert_eq!(requested, vec!["page-2"]);
        assert_eq!(
            ids,
            vec![
                Some("1".to_string()),
                Some("2".to_string()),
                Some("3".to_string())
            ]
        );
    }

    #[test]
    fn single_complete_page_needs_no_job_reference() {
        let mut rows = vec![];
        let step = next_step(
            page(json!({ "jobComplete": true, "rows": [ { "f": [ { "v": "1" } ] } ] })),
            &mut rows,
        )
        .unwrap();

        assert!(matches!(step, QueryStep::Done));
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn missing_job_reference_is_an_error() {
        let mut rows = vec![];

        assert!(next_step(page(json!({ "jobComplete": false })), &mut rows).is_err());
        assert!(next_step(
            page(json!({ "jobComplete": true, "pageToken": "page-2" })),
            &mut rows
        )
        .is_err());
    }
}
