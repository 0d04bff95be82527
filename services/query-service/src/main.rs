use anyhow::{anyhow, bail, Context, Result};
use common::config::AppConfig;
use common::metrics::gather_metrics;
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use domain::{OrderStatus, SearchCriteria};
use read_model::{
    OrderQueryService, OrderView, PageRequest, PostgresOrderStore, QueryOutcome, StrategyKind,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

/// Which strategies one run exercises
#[derive(Debug, Clone, Copy)]
enum Mode {
    Single(StrategyKind),
    Compare,
}

#[derive(Debug)]
struct Request {
    criteria: SearchCriteria,
    mode: Mode,
    page: Option<PageRequest>,
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_i64(key: &str, default: i64) -> Result<i64> {
    match env_var(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} must be an integer, got {:?}", key, value)),
        None => Ok(default),
    }
}

fn request_from_env() -> Result<Request> {
    let mut criteria = SearchCriteria::all();
    if let Some(status) = env_var("ORDER_STATUS") {
        criteria = criteria.with_status(status.parse::<OrderStatus>()?);
    }
    if let Some(name) = env_var("CUSTOMER_NAME") {
        criteria = criteria.with_customer_name(name);
    }

    let mode = match env_var("FETCH_STRATEGY") {
        Some(s) if s.trim().eq_ignore_ascii_case("compare") => Mode::Compare,
        Some(s) => Mode::Single(s.parse()?),
        None => Mode::Single(StrategyKind::ProjectionDto),
    };

    let page = if env_var("PAGE_OFFSET").is_some() || env_var("PAGE_LIMIT").is_some() {
        Some(PageRequest::new(
            parse_i64("PAGE_OFFSET", 0)?,
            parse_i64("PAGE_LIMIT", 100)?,
        ))
    } else {
        None
    };

    Ok(Request {
        criteria,
        mode,
        page,
    })
}

/// Run every applicable strategy and fail unless all of them agree
async fn compare(service: &OrderQueryService, request: &Request) -> Result<QueryOutcome<OrderView>> {
    let kinds: Vec<StrategyKind> = StrategyKind::ALL
        .into_iter()
        .filter(|kind| request.page.is_none() || kind.is_pagination_safe())
        .collect();

    let mut baseline: Option<QueryOutcome<OrderView>> = None;
    for kind in kinds {
        let outcome = service
            .list_orders_with_stats(&request.criteria, kind, request.page)
            .await?;
        tracing::info!(
            "{}: {} orders, {} round trips",
            kind,
            outcome.views.len(),
            outcome.round_trips
        );

        if let Some(expected) = &baseline {
            if expected.views != outcome.views {
                bail!("{} returned different views than {}", kind, expected.strategy);
            }
        }
        if baseline.is_none() {
            baseline = Some(outcome);
        }
    }

    baseline.ok_or_else(|| anyhow!("no strategy applies to this request"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;

    let telemetry_config = TelemetryConfig::from_env("query-service", &config.log_level);
    let enable_jaeger = telemetry_config.enable_jaeger;
    init_telemetry(telemetry_config).map_err(|e| anyhow!("telemetry init failed: {}", e))?;

    tracing::info!("Starting order query runner");
    tracing::info!("Distributed tracing: {}", if enable_jaeger { "enabled" } else { "disabled" });

    tracing::info!("Configuration:");
    tracing::info!("  Database: {}:{}/{}", config.database.host, config.database.port, config.database.database);
    tracing::info!("  Max results: {}", config.query.max_results);
    tracing::info!("  Max page size: {}", config.query.max_page_size);
    tracing::info!("  Batch size: {}", config.query.batch_size);

    let request = request_from_env()?;
    tracing::info!("Request: {:?}", request);

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database_url())
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    let store = Arc::new(PostgresOrderStore::new(pool.clone()));
    let service = OrderQueryService::new(store, config.query.clone());

    let result = match request.mode {
        Mode::Single(kind) => {
            service
                .list_orders_with_stats(&request.criteria, kind, request.page)
                .await
                .map_err(anyhow::Error::from)
        }
        Mode::Compare => compare(&service, &request).await,
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Query failed: {}", e);
            pool.close().await;
            shutdown_telemetry();
            return Err(e);
        }
    };

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if let Ok(metrics) = gather_metrics() {
        tracing::debug!("Metrics:\n{}", metrics);
    }

    pool.close().await;

    // Shutdown telemetry gracefully
    shutdown_telemetry();

    Ok(())
}
