// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Loader tests against a live server.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -- --ignored`.

use std::path::{Path, PathBuf};

use sqlx::PgPool;
use supaload::config::Settings;
use supaload::pipeline::{LoadMethod, LoadOutcome, PgLoader, TableLoader, TextEncoding};
use tempfile::TempDir;

fn database_url() -> Option<String> {
    std::env::var("DATABASE_URL")
        .ok()
        .filter(|url| !url.trim().is_empty())
}

fn settings(url: &str, table: &str, use_copy: bool) -> Settings {
    let mut settings = Settings::default();
    settings.database.connection_string = Some(url.to_string());
    settings.database.schema = "public".to_string();
    settings.database.table_name = table.to_string();
    settings.import.use_copy = use_copy;
    settings
}

fn write_csv(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

async fn exec(pool: &PgPool, sql: &str) {
    sqlx::raw_sql(sql).execute(pool).await.unwrap();
}

async fn load(
    url: &str,
    table: &str,
    use_copy: bool,
    path: &Path,
    encoding: TextEncoding,
) -> (PgLoader, LoadOutcome) {
    let loader = PgLoader::connect(&settings(url, table, use_copy), false)
        .await
        .unwrap();
    let outcome = loader.load_file(path, 100, encoding).await.unwrap();
    (loader, outcome)
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn test_copy_loads_quoted_and_empty_fields() {
    let Some(url) = database_url() else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let pool = PgPool::connect(&url).await.unwrap();
    let table = format!("supaload_copy_{}", std::process::id());
    exec(
        &pool,
        &format!(
            "DROP TABLE IF EXISTS public.{table}; \
             CREATE TABLE public.{table} (id integer, name text, note text)"
        ),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let path = write_csv(
        &dir,
        "people.csv",
        b"\xEF\xBB\xBFid,name,note\r\n1,Ada,\"first\r\nline\"\r\n2,,plain\r\n3,\"Lovelace, A\",\r\n",
    );

    let (loader, outcome) = load(&url, &table, true, &path, TextEncoding::utf8()).await;
    assert_eq!(outcome.method, LoadMethod::Copy);
    assert_eq!(outcome.rows, 3);
    assert_eq!(loader.row_count().await.unwrap(), 3);
    loader.close().await;

    let nulls: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM public.{table} WHERE name IS NULL OR note IS NULL"
    ))
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(nulls, 2);

    exec(&pool, &format!("DROP TABLE public.{table}")).await;
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn test_copy_rejected_falls_back_to_insert() {
    let Some(url) = database_url() else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let pool = PgPool::connect(&url).await.unwrap();
    let base = format!("supaload_base_{}", std::process::id());
    let view = format!("supaload_view_{}", std::process::id());
    // COPY refuses plain views; INSERT goes through because the view is updatable
    exec(
        &pool,
        &format!(
            "DROP VIEW IF EXISTS public.{view}; DROP TABLE IF EXISTS public.{base}; \
             CREATE TABLE public.{base} (id integer, amount numeric); \
             CREATE VIEW public.{view} AS SELECT id, amount FROM public.{base}"
        ),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let mut body = String::from("id,amount\n");
    for i in 0..250 {
        body.push_str(&format!("{},{}.5\n", i, i));
    }
    let path = write_csv(&dir, "amounts.csv", body.as_bytes());

    let (loader, outcome) = load(&url, &view, true, &path, TextEncoding::utf8()).await;
    assert_eq!(outcome.method, LoadMethod::Insert);
    assert_eq!(outcome.rows, 250);
    assert_eq!(loader.row_count().await.unwrap(), 250);
    loader.close().await;

    let total: f64 = sqlx::query_scalar(&format!("SELECT SUM(amount)::float8 FROM public.{base}"))
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(total, (0..250).map(|i| i as f64 + 0.5).sum::<f64>());

    exec(&pool, &format!("DROP VIEW public.{view}; DROP TABLE public.{base}")).await;
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn test_insert_path_transcodes_windows_1252() {
    let Some(url) = database_url() else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let pool = PgPool::connect(&url).await.unwrap();
    let table = format!("supaload_cp1252_{}", std::process::id());
    exec(
        &pool,
        &format!(
            "DROP TABLE IF EXISTS public.{table}; \
             CREATE TABLE public.{table} (id integer, note text)"
        ),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "prices.csv", b"id,note\n1,\x8010 \x93best\x94\n2,\n");
    let cp1252: TextEncoding = "windows-1252".parse().unwrap();

    let (loader, outcome) = load(&url, &table, false, &path, cp1252).await;
    assert_eq!(outcome.method, LoadMethod::Insert);
    assert_eq!(outcome.rows, 2);
    loader.close().await;

    let notes: Vec<Option<String>> =
        sqlx::query_scalar(&format!("SELECT note FROM public.{table} ORDER BY id"))
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(notes, vec![Some("€10 “best”".to_string()), None]);

    exec(&pool, &format!("DROP TABLE public.{table}")).await;
}
