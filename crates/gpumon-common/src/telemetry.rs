use std::str::FromStr;

use opentelemetry::trace::TracerProvider as TracerProviderTrait;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}' (expected text or json)")),
        }
    }
}

fn fmt_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Text => tracing_subscriber::fmt::layer().boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
    }
}

/// Initialize tracing with optional OTLP span export.
///
/// - `service_name`: identifies this binary (e.g. "gpumon-dashboard")
/// - `otlp_endpoint`: if `Some`, spans are exported via OTLP/HTTP to this URL
/// - `otlp_token`: bearer token sent with every export
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Returns the
/// tracer provider when export is enabled; keep it alive and call
/// `shutdown()` on it before exit.
pub fn init_tracing(
    service_name: &str,
    format: LogFormat,
    otlp_endpoint: Option<&str>,
    otlp_token: Option<&str>,
) -> Option<TracerProvider> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(endpoint) = otlp_endpoint else {
        tracing_subscriber::registry()
            .with(fmt_layer(format))
            .with(env_filter)
            .init();
        return None;
    };

    let mut headers = std::collections::HashMap::new();
    if let Some(token) = otlp_token.filter(|t| !t.is_empty()) {
        headers.insert("Authorization".to_string(), format!("Bearer {token}"));
    }

    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .with_headers(headers)
        .build()
    {
        Ok(e) => e,
        Err(err) => {
            eprintln!("failed to create OTLP exporter: {err}, falling back to stdout only");
            tracing_subscriber::registry()
                .with(fmt_layer(format))
                .with(env_filter)
                .init();
            return None;
        }
    };

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_resource(Resource::new([KeyValue::new(
            "service.name",
            service_name.to_string(),
        )]))
        .build();

    let otel_layer =
        tracing_opentelemetry::layer().with_tracer(provider.tracer(service_name.to_string()));

    tracing_subscriber::registry()
        .with(fmt_layer(format))
        .with(env_filter)
        .with(otel_layer)
        .init();

    tracing::info!(endpoint, service_name, "OTLP tracing enabled");
    Some(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_format() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("TEXT".parse::<LogFormat>(), Ok(LogFormat::Text));
        assert!("yaml".parse::<LogFormat>().is_err());
    }
}
