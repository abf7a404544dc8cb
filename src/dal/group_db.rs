use sqlx::{postgres::PgQueryResult, PgPool};

use crate::domain::group::{GroupRecord, UnlinkedGroup};

pub async fn get_group_ids(pool: &PgPool, table: &str) -> Result<Vec<String>, sqlx::Error> {
    let query = format!("select group_id from {}", table);

    sqlx::query_scalar::<_, String>(&query)
        .fetch_all(pool)
        .await
}

pub async fn insert_group(
    pool: &PgPool,
    table: &str,
    group: &GroupRecord,
) -> Result<PgQueryResult, sqlx::Error> {
    let query = format!(
        r"
        insert into {}
            (group_id, group_name, group_link, is_relevant, why_relevant, last_fetch_time)
        values
            ($1, $2, $3, $4, $5, $6)
        ",
        table
    );

    sqlx::query(&query)
        .bind(&group.group_id)
        .bind(&group.group_name)
        .bind(&group.group_link)
        .bind(group.is_relevant)
        .bind(&group.why_relevant)
        .bind(group.last_fetch_time)
        .execute(pool)
        .await
}

pub async fn get_unlinked_groups(
    pool: &PgPool,
    table: &str,
) -> Result<Vec<UnlinkedGroup>, sqlx::Error> {
    let query = format!(
        r"
        select
            group_id,
            group_name
        from
            {}
        where
            group_link is null
        ",
        table
    );

    let rows = sqlx::query_as::<_, (String, String)>(&query)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(group_id, group_name)| UnlinkedGroup {
            group_id,
            group_name,
        })
        .collect())
}

pub async fn update_group_link(
    pool: &PgPool,
    table: &str,
    group_id: &str,
    group_link: &str,
) -> Result<PgQueryResult, sqlx::Error> {
    let query = format!(
        r"
        update {} set
            group_link = $1
        where
            group_id = $2
        ",
        table
    );

    sqlx::query(&query)
        .bind(group_link)
        .bind(group_id)
        .execute(pool)
        .await
}
