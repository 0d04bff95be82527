use opentelemetry::global;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_JAEGER_AGENT: &str = "localhost:6831";

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_level: String,
    /// JSON lines when true, human-readable output otherwise
    pub json: bool,
    pub jaeger_endpoint: Option<String>,
    pub enable_jaeger: bool,
}

impl TelemetryConfig {
    /// Read `LOG_FORMAT`, `ENABLE_JAEGER` and `JAEGER_ENDPOINT` on top of
    /// the given service name and level
    pub fn from_env(service_name: &str, log_level: &str) -> Self {
        let enable_jaeger = std::env::var("ENABLE_JAEGER")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let json = std::env::var("LOG_FORMAT")
            .map(|v| !v.eq_ignore_ascii_case("pretty"))
            .unwrap_or(true);

        Self {
            service_name: service_name.to_string(),
            log_level: log_level.to_string(),
            json,
            jaeger_endpoint: std::env::var("JAEGER_ENDPOINT").ok(),
            enable_jaeger,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "order-query".to_string(),
            log_level: "info".to_string(),
            json: true,
            jaeger_endpoint: Some(DEFAULT_JAEGER_AGENT.to_string()),
            enable_jaeger: false,
        }
    }
}

/// `RUST_LOG` wins over the configured level when it parses
fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

fn fmt_layer<S>(json: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + 'static,
{
    let layer = tracing_subscriber::fmt::layer().with_target(true);
    if json {
        layer.with_thread_ids(true).json().boxed()
    } else {
        layer.boxed()
    }
}

/// Install the global subscriber: env filter, fmt output, and a Jaeger
/// exporter when enabled. Fails if a subscriber is already installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<(), Box<dyn std::error::Error>> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let jaeger_layer = if config.enable_jaeger {
        let endpoint = config
            .jaeger_endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_JAEGER_AGENT.to_string());
        let tracer = opentelemetry_jaeger::new_agent_pipeline()
            .with_service_name(&config.service_name)
            .with_endpoint(endpoint)
            .install_batch(opentelemetry_sdk::runtime::Tokio)?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };
    let exporting = jaeger_layer.is_some();

    tracing_subscriber::registry()
        .with(env_filter(&config.log_level))
        .with(fmt_layer(config.json))
        .with(jaeger_layer)
        .try_init()?;

    tracing::info!(
        service = %config.service_name,
        jaeger = exporting,
        json = config.json,
        "Telemetry initialized"
    );

    Ok(())
}

/// Initialize JSON logging only, ignoring an already installed subscriber
pub fn init_basic_telemetry(log_level: &str) {
    let config = TelemetryConfig {
        log_level: log_level.to_string(),
        jaeger_endpoint: None,
        ..TelemetryConfig::default()
    };

    let _ = init_telemetry(config);
}

/// Flush pending spans
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
