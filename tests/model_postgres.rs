#![cfg(feature = "postgres")]
//! Runs only when `SQL_MODEL_TEST_POSTGRES_URL` points at a scratch database.

use std::sync::atomic::{AtomicUsize, Ordering};

use sql_model::prelude::*;

static NEXT_TABLE: AtomicUsize = AtomicUsize::new(0);

async fn pool() -> Result<Option<ConnectionPool>, ModelError> {
    let Ok(url) = std::env::var("SQL_MODEL_TEST_POSTGRES_URL") else {
        eprintln!("SQL_MODEL_TEST_POSTGRES_URL not set; skipping");
        return Ok(None);
    };
    let (pool, _supervisor) = ConnectionPool::connect(&DatabaseConfig::new(url)).await?;
    Ok(Some(pool))
}

/// A fresh `questions`-shaped table private to one test.
async fn scratch_table(pool: &ConnectionPool) -> Result<String, ModelError> {
    let table = format!(
        "questions_t{}_{}",
        std::process::id(),
        NEXT_TABLE.fetch_add(1, Ordering::SeqCst)
    );
    pool.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table};
         CREATE TABLE {table} (
             id SERIAL PRIMARY KEY,
             headline VARCHAR(255) NOT NULL,
             votes INTEGER NOT NULL DEFAULT 0,
             score DOUBLE PRECISION,
             accepted BOOLEAN NOT NULL DEFAULT FALSE,
             created_at TIMESTAMP NOT NULL DEFAULT NOW(),
             bounty NUMERIC(10, 2),
             ref_id UUID,
             opens_at TIME
         );"
    ))
    .await?;
    Ok(table)
}

async fn drop_table(pool: &ConnectionPool, table: &str) -> Result<(), ModelError> {
    pool.execute_batch(&format!("DROP TABLE IF EXISTS {table}")).await
}

#[tokio::test]
async fn crud_round_trip_with_both_strategies() -> Result<(), Box<dyn std::error::Error>> {
    let Some(pool) = pool().await? else {
        return Ok(());
    };

    for strategy in [WriteStrategy::Returning, WriteStrategy::ReadBack] {
        let table = scratch_table(&pool).await?;
        let model = Model::new(pool.clone(), table.clone())?.with_write_strategy(strategy);

        let row = model
            .insert(
                &Constraints::from([("headline", "Q1"), ("votes", "0")]),
                &["id", "headline"],
            )
            .await?
            .expect("inserted row");
        assert_eq!(row.get("headline").and_then(RowValues::as_text), Some("Q1"));
        let id = *row.get("id").and_then(RowValues::as_int).expect("generated id");

        model
            .insert(&Constraints::from([("headline", "Q2")]), &["id"])
            .await?;

        let updated = model
            .update(
                &Constraints::from([("votes", "5")]),
                &Constraints::from([("id", id.to_string())]),
                &["votes"],
            )
            .await?
            .expect("updated row");
        assert_eq!(updated.get("votes").and_then(RowValues::as_int), Some(&5));

        assert_eq!(model.count_all_with_constraints(&Constraints::new()).await?, 2);
        assert_eq!(
            model
                .count_all_with_constraints(&Constraints::from([("votes", 0_i64)]))
                .await?,
            1
        );

        let one = model
            .select_one(&["headline", "votes"], &Constraints::from([("id", id)]))
            .await?
            .expect("row by id");
        assert_eq!(one.get("votes").and_then(RowValues::as_int), Some(&5));

        assert_eq!(model.delete(&Constraints::from([("headline", "Q2")])).await?, 1);
        assert_eq!(model.select_all(&["id"]).await?.len(), 1);

        drop_table(&pool, &table).await?;
    }
    Ok(())
}

#[tokio::test]
async fn text_values_coerce_to_column_types() -> Result<(), Box<dyn std::error::Error>> {
    let Some(pool) = pool().await? else {
        return Ok(());
    };
    let table = scratch_table(&pool).await?;
    let model = Model::new(pool.clone(), table.clone())?;

    let row = model
        .insert(
            &Constraints::from([
                ("headline", "typed"),
                ("votes", "7"),
                ("score", "2.5"),
                ("accepted", "true"),
                ("created_at", "2024-01-02 03:04:05"),
                ("bounty", "2.5"),
                ("ref_id", "67e55044-10b1-426f-9247-bb680e5fe0c8"),
                ("opens_at", "09:30:00"),
            ]),
            &["votes", "score", "accepted", "created_at", "bounty", "ref_id", "opens_at"],
        )
        .await?
        .expect("inserted row");

    assert_eq!(row.get("votes").and_then(RowValues::as_int), Some(&7));
    assert_eq!(row.get("score").and_then(RowValues::as_float), Some(2.5));
    assert_eq!(row.get("accepted").and_then(RowValues::as_bool), Some(&true));
    assert_eq!(
        row.get("created_at")
            .and_then(RowValues::as_timestamp)
            .map(|ts| ts.to_string()),
        Some("2024-01-02 03:04:05".to_string())
    );
    assert_eq!(row.get("bounty").and_then(RowValues::as_text), Some("2.50"));
    assert_eq!(
        row.get("ref_id").and_then(RowValues::as_text),
        Some("67e55044-10b1-426f-9247-bb680e5fe0c8")
    );
    assert_eq!(row.get("opens_at").and_then(RowValues::as_text), Some("09:30:00"));

    let found = model
        .select_one(&["id"], &Constraints::from([("bounty", "2.50"), ("opens_at", "09:30")]))
        .await?;
    assert!(found.is_some());

    drop_table(&pool, &table).await?;
    Ok(())
}

#[tokio::test]
async fn failures_are_wrapped_with_the_operation() -> Result<(), Box<dyn std::error::Error>> {
    let Some(pool) = pool().await? else {
        return Ok(());
    };
    let table = scratch_table(&pool).await?;
    let model = Model::new(pool.clone(), table.clone())?;

    let err = model
        .insert(&Constraints::from([("votes", "not a number")]), &["id"])
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::ExecutionError { operation: "insert", .. }));

    let err = model.select_all(&["no_such_column"]).await.unwrap_err();
    assert!(matches!(err, ModelError::ExecutionError { operation: "select_all", .. }));

    drop_table(&pool, &table).await?;
    Ok(())
}
