use sqlx::PgPool;

pub async fn get_distinct_keywords(
    pool: &PgPool,
    table: &str,
    column: &str,
) -> Result<Vec<String>, sqlx::Error> {
    let query = format!(
        r"
        select distinct
            {column}
        from
            {table}
        where
            {column} is not null
        ",
    );

    sqlx::query_scalar::<_, String>(&query)
        .fetch_all(pool)
        .await
}
