//! Pool acquisition metrics

use prometheus::{register_histogram_vec, register_int_gauge_vec, HistogramVec, IntGaugeVec};
use sqlx::{pool::PoolConnection, Sqlite, SqlitePool};
use std::time::Instant;

lazy_static::lazy_static! {
    /// Acquire latency by outcome (ok/timeout/closed/error)
    static ref DB_POOL_ACQUIRE_SECONDS: HistogramVec = register_histogram_vec!(
        "db_pool_acquire_seconds",
        "Time spent waiting for a pooled SQLite connection",
        &["service", "outcome"],
        vec![0.0005, 0.001, 0.005, 0.025, 0.1, 0.5, 2.5]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// Idle connections seen at the last acquire
    static ref DB_POOL_IDLE: IntGaugeVec = register_int_gauge_vec!(
        "db_pool_idle_connections",
        "Idle pooled connections at the last acquire",
        &["service"]
    ).expect("Prometheus metrics registration should succeed at startup");
}

fn outcome(result: &Result<PoolConnection<Sqlite>, sqlx::Error>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(sqlx::Error::PoolTimedOut) => "timeout",
        Err(sqlx::Error::PoolClosed) => "closed",
        Err(_) => "error",
    }
}

/// `pool.acquire()` that records how long the wait took and how it ended.
pub async fn acquire_with_metrics(
    pool: &SqlitePool,
    service: &str,
) -> Result<PoolConnection<Sqlite>, sqlx::Error> {
    DB_POOL_IDLE
        .with_label_values(&[service])
        .set(pool.num_idle() as i64);

    let start = Instant::now();
    let result = pool.acquire().await;

    DB_POOL_ACQUIRE_SECONDS
        .with_label_values(&[service, outcome(&result)])
        .observe(start.elapsed().as_secs_f64());

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, DbConfig};

    #[tokio::test]
    async fn acquire_records_outcome() {
        let pool = create_pool(DbConfig::in_memory("metrics-test")).await.unwrap();
        let conn = acquire_with_metrics(&pool, "metrics-test").await;
        assert!(conn.is_ok());
        assert!(
            DB_POOL_ACQUIRE_SECONDS
                .with_label_values(&["metrics-test", "ok"])
                .get_sample_count()
                >= 1
        );

        drop(conn);
        pool.close().await;
        let closed = acquire_with_metrics(&pool, "metrics-test").await;
        assert!(matches!(closed, Err(sqlx::Error::PoolClosed)));
    }
}
