//! End-to-end pool tests against file-backed SQLite databases
//!
//! Every pooled SQLite connection runs in manual-commit mode, so each test
//! commits or rolls back before another connection touches the same rows.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Context;
use chrono::{FixedOffset, TimeZone};
use rstest::rstest;
use sqlpool_connection::ConnectionPool;
use sqlpool_core::{Param, PoolSettings, SqlPoolError, SqlType, Value};
use sqlpool_drivers::DriverRegistry;
use tempfile::TempDir;

fn initialize_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("sqlpool=debug".parse().unwrap()),
            )
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

fn sqlite_settings(dir: &TempDir, pool_size: usize) -> PoolSettings {
    PoolSettings::new("sqlite")
        .with_database(dir.path().join("pool.db").to_string_lossy())
        .with_pool_size(pool_size)
        .with_sweep_interval(Duration::from_secs(24 * 60 * 60))
}

async fn sqlite_pool(pool_size: usize) -> anyhow::Result<(TempDir, ConnectionPool)> {
    initialize_logging();
    let dir = tempfile::tempdir().context("Failed to create temp dir")?;
    let pool = ConnectionPool::create(
        sqlite_settings(&dir, pool_size),
        &DriverRegistry::with_defaults(),
    )
    .await
    .context("Failed to create pool")?;
    Ok((dir, pool))
}

#[tokio::test]
async fn test_update_then_select_returns_single_value() -> anyhow::Result<()> {
    let (_dir, pool) = sqlite_pool(2).await?;
    let conn = pool.acquire().await?;

    conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, x INTEGER)", &[])
        .await?;
    conn.execute(
        "INSERT INTO t (id, x) VALUES (?, ?)",
        &[Param::int(1), Param::int(0)],
    )
    .await?;
    conn.execute(
        "UPDATE t SET x=? WHERE id=?",
        &[Param::int(5), Param::int(1)],
    )
    .await?;

    let table = conn
        .query("SELECT x FROM t WHERE id=?", &[Param::int(1)])
        .await?;
    assert_eq!(table.len(), 1);
    assert_eq!(table.columns().len(), 1);
    assert_eq!(table.first_value(), Some(&Value::Int(5)));

    conn.commit().await?;
    pool.release(&conn);
    pool.destroy().await;
    Ok(())
}

#[rstest]
#[case::string("VARCHAR(64)", Param::string("hello"), Value::String("hello".into()))]
#[case::text("TEXT", Param::text("a longer body"), Value::String("a longer body".into()))]
#[case::int("INTEGER", Param::int(-42), Value::Int(-42))]
#[case::long("BIGINT", Param::long(1 << 40), Value::Long(1 << 40))]
#[case::double("DOUBLE", Param::double(3.25), Value::Double(3.25))]
#[case::bool("BOOLEAN", Param::bool(true), Value::Bool(true))]
#[case::binary("BLOB", Param::binary(vec![0, 1, 254, 255]), Value::Binary(vec![0, 1, 254, 255]))]
#[case::null("BIGINT", Param::null(SqlType::Long), Value::Null)]
#[tokio::test]
async fn test_value_round_trip(
    #[case] column_type: &str,
    #[case] param: Param,
    #[case] expected: Value,
) -> anyhow::Result<()> {
    let (_dir, pool) = sqlite_pool(1).await?;
    let conn = pool.acquire().await?;

    conn.execute(
        &format!("CREATE TABLE samples (id INTEGER PRIMARY KEY, v {})", column_type),
        &[],
    )
    .await?;
    let id = conn
        .execute_returning_key("INSERT INTO samples (v) VALUES (?)", &[param])
        .await?;

    let table = conn
        .query("SELECT v FROM samples WHERE id = ?", &[Param::long(id)])
        .await?;
    assert_eq!(table.first_value(), Some(&expected));

    conn.commit().await?;
    pool.destroy().await;
    Ok(())
}

#[rstest]
#[case::timestamp("TIMESTAMP", SqlType::Timestamp)]
#[case::date("DATE", SqlType::Date)]
#[tokio::test]
async fn test_temporal_round_trip_keeps_milliseconds(
    #[case] column_type: &str,
    #[case] sql_type: SqlType,
) -> anyhow::Result<()> {
    let (_dir, pool) = sqlite_pool(1).await?;
    let conn = pool.acquire().await?;

    let tz = FixedOffset::east_opt(2 * 3600).context("offset")?;
    let written = tz
        .with_ymd_and_hms(2024, 3, 1, 12, 30, 15)
        .single()
        .context("date-time")?
        + chrono::Duration::milliseconds(123);

    conn.execute(
        &format!("CREATE TABLE events (id INTEGER PRIMARY KEY, at {})", column_type),
        &[],
    )
    .await?;
    let id = conn
        .execute_returning_key(
            "INSERT INTO events (at) VALUES (?)",
            &[Param::new(sql_type, written)],
        )
        .await?;

    let table = conn
        .query("SELECT at FROM events WHERE id = ?", &[Param::long(id)])
        .await?;
    let read = table
        .first_value()
        .and_then(Value::as_timestamp)
        .context("expected a timestamp")?;
    assert_eq!(read.timestamp_millis(), written.timestamp_millis());
    assert_eq!(*read, written);

    conn.commit().await?;
    pool.destroy().await;
    Ok(())
}

#[tokio::test]
async fn test_three_acquires_on_pool_of_two_grow_once() -> anyhow::Result<()> {
    let (_dir, pool) = sqlite_pool(2).await?;

    let a = pool.acquire().await?;
    let b = pool.acquire().await?;
    let c = pool.acquire().await?;

    let ids: HashSet<u64> = [a.id(), b.id(), c.id()].into_iter().collect();
    assert_eq!(ids.len(), 3);

    let stats = pool.stats().await;
    assert_eq!(stats.opened(), 3);
    assert_eq!(stats.active(), 3);
    for conn in [&a, &b, &c] {
        assert!(conn.is_valid(Duration::from_secs(5)).await);
    }

    pool.destroy().await;
    Ok(())
}

#[tokio::test]
async fn test_committed_rows_visible_to_other_connections() -> anyhow::Result<()> {
    let (_dir, pool) = sqlite_pool(2).await?;
    let writer = pool.acquire().await?;
    let reader = pool.acquire().await?;

    writer
        .execute("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)", &[])
        .await?;
    writer
        .execute("INSERT INTO notes (body) VALUES (?)", &[Param::text("kept")])
        .await?;
    writer
        .execute("INSERT INTO notes (body) VALUES (?)", &[Param::text("dropped")])
        .await?;
    writer.commit().await?;
    writer
        .execute("DELETE FROM notes WHERE body = ?", &[Param::text("kept")])
        .await?;
    writer.rollback().await?;

    let table = reader.query("SELECT body FROM notes ORDER BY id", &[]).await?;
    reader.commit().await?;
    assert_eq!(table.to_string(), "kept\ndropped\n");

    pool.release(&writer);
    pool.release(&reader);
    pool.destroy().await;
    Ok(())
}

#[tokio::test]
async fn test_released_reader_does_not_block_writers() -> anyhow::Result<()> {
    let (_dir, pool) = sqlite_pool(2).await?;
    let reader = pool.acquire().await?;
    let writer = pool.acquire().await?;

    reader
        .execute("CREATE TABLE t (id INTEGER PRIMARY KEY, x INTEGER)", &[])
        .await?;
    reader.commit().await?;
    let table = reader.query("SELECT x FROM t", &[]).await?;
    assert!(table.is_empty());
    // Released with its read transaction still open.
    pool.release(&reader);

    writer
        .execute("INSERT INTO t (x) VALUES (?)", &[Param::int(7)])
        .await?;
    writer.commit().await?;

    let table = writer.query("SELECT COUNT(*) FROM t", &[]).await?;
    writer.commit().await?;
    assert_eq!(table.first_value(), Some(&Value::Long(1)));

    pool.release(&writer);
    pool.destroy().await;
    Ok(())
}

#[tokio::test]
async fn test_pool_without_database_path_is_rejected() {
    initialize_logging();
    for settings in [
        PoolSettings::new("sqlite").with_pool_size(2),
        PoolSettings::new("sqlite").with_database(":memory:").with_pool_size(2),
    ] {
        let err = ConnectionPool::create(settings, &DriverRegistry::with_defaults())
            .await
            .unwrap_err();
        assert!(matches!(err, SqlPoolError::Configuration(_)), "got {err:?}");
    }
}

#[tokio::test]
async fn test_shared_memory_database_visible_across_connections() -> anyhow::Result<()> {
    initialize_logging();
    let settings = PoolSettings::new("sqlite")
        .with_database("file:sqlpool_shared_visibility?mode=memory&cache=shared")
        .with_pool_size(2)
        .with_sweep_interval(Duration::from_secs(24 * 60 * 60));
    let pool = ConnectionPool::create(settings, &DriverRegistry::with_defaults()).await?;

    let a = pool.acquire().await?;
    let b = pool.acquire().await?;
    a.execute("CREATE TABLE t (x INTEGER)", &[]).await?;
    a.execute("INSERT INTO t (x) VALUES (?)", &[Param::int(3)]).await?;
    a.commit().await?;

    let table = b.query("SELECT x FROM t", &[]).await?;
    b.commit().await?;
    assert_eq!(table.first_value(), Some(&Value::Int(3)));

    pool.release(&a);
    pool.release(&b);
    pool.destroy().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_connection_work_is_rolled_back() -> anyhow::Result<()> {
    let (_dir, pool) = sqlite_pool(2).await?;

    let setup = pool.acquire().await?;
    setup
        .execute("CREATE TABLE jobs (id INTEGER PRIMARY KEY, name TEXT)", &[])
        .await?;
    setup.commit().await?;
    pool.release(&setup);

    let abandoned = pool.acquire().await?;
    abandoned
        .execute("INSERT INTO jobs (name) VALUES (?)", &[Param::text("half done")])
        .await?;

    tokio::time::advance(pool.settings().stale_timeout() + Duration::from_secs(1)).await;
    assert_eq!(pool.reclaim().await, 1);
    assert!(abandoned.is_closed());

    let conn = pool.acquire().await?;
    let table = conn.query("SELECT COUNT(*) FROM jobs", &[]).await?;
    conn.commit().await?;
    assert_eq!(table.first_value(), Some(&Value::Long(0)));

    pool.destroy().await;
    Ok(())
}

#[tokio::test]
async fn test_destroy_then_create_yields_configured_size() -> anyhow::Result<()> {
    let (dir, pool) = sqlite_pool(3).await?;
    let _held = pool.acquire().await?;
    pool.destroy().await;
    assert!(pool.acquire().await.is_err());

    let pool = ConnectionPool::create(sqlite_settings(&dir, 3), &DriverRegistry::with_defaults())
        .await?;
    let stats = pool.stats().await;
    assert_eq!(stats.total(), 3);
    assert_eq!(stats.idle(), 3);

    for _ in 0..3 {
        let conn = pool.acquire().await?;
        assert!(conn.is_valid(Duration::from_secs(5)).await);
    }
    assert_eq!(pool.stats().await.opened(), 3);

    pool.destroy().await;
    Ok(())
}
