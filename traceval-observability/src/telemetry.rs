// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Logging subscriber bootstrap

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::TracerProvider;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::ObservabilityError;

/// Install the global `tracing` subscriber
///
/// `RUST_LOG` wins over `config.log_filter`. Logs go to stderr so stdout
/// stays free for run output. When a provider is given, `tracing` spans are
/// also bridged into OpenTelemetry through `tracing-opentelemetry`.
pub fn init_telemetry(
    config: &ObservabilityConfig,
    tracer_provider: Option<&TracerProvider>,
) -> Result<(), ObservabilityError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .map_err(|e| ObservabilityError::Config(format!("invalid log filter: {e}")))?;

    let json_layer = config.json_logs.then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!config.json_logs).then(|| {
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
    });

    let otel_layer = tracer_provider.map(|provider| {
        tracing_opentelemetry::layer()
            .with_tracer(provider.tracer(config.otel_service_name.clone()))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| ObservabilityError::Subscriber(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error() {
        let config = ObservabilityConfig::default();
        // The first call may race with other tests; only the second is asserted
        let _ = init_telemetry(&config, None);
        let err = init_telemetry(&config, None).unwrap_err();
        assert!(matches!(err, ObservabilityError::Subscriber(_)));
    }

    #[test]
    fn test_invalid_filter_is_rejected() {
        std::env::remove_var("RUST_LOG");
        let config = ObservabilityConfig {
            log_filter: "[not a filter".to_string(),
            ..Default::default()
        };
        let err = init_telemetry(&config, None).unwrap_err();
        assert!(matches!(err, ObservabilityError::Config(_)));
    }
}
