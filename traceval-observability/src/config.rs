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


//! Observability configuration
//!
//! Reads the standard OTEL environment variables so evaluation runs can be
//! pointed at a collector without code changes.

use std::env;
use std::fmt;
use std::str::FromStr;

use crate::ObservabilityError;

/// Where finished spans are sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExporterKind {
    /// Spans get real identities but are not exported
    #[default]
    None,
    /// Pretty-print spans to stdout
    Stdout,
    /// OTLP over gRPC
    Otlp,
}

impl FromStr for ExporterKind {
    type Err = ObservabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "stdout" => Ok(Self::Stdout),
            "otlp" => Ok(Self::Otlp),
            other => Err(ObservabilityError::Config(format!(
                "unknown exporter '{other}' (expected none, stdout or otlp)"
            ))),
        }
    }
}

impl fmt::Display for ExporterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Stdout => "stdout",
            Self::Otlp => "otlp",
        };
        f.write_str(name)
    }
}

/// Observability configuration with OTEL standard env vars
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    // OTEL standard env vars
    pub otel_sdk_disabled: bool,
    pub otel_service_name: String,
    pub otel_exporter_otlp_endpoint: String,
    pub sampling_rate: f64,

    // Traceval custom
    pub exporter: ExporterKind,
    /// Fallback filter when `RUST_LOG` is unset
    pub log_filter: String,
    pub json_logs: bool,
}

impl ObservabilityConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            otel_sdk_disabled: env::var("OTEL_SDK_DISABLED")
                .map(|v| v == "true")
                .unwrap_or(false),

            otel_service_name: env::var("OTEL_SERVICE_NAME")
                .unwrap_or(defaults.otel_service_name),

            otel_exporter_otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or(defaults.otel_exporter_otlp_endpoint),

            sampling_rate: env::var("OTEL_TRACES_SAMPLER_ARG")
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .map(|rate| rate.clamp(0.0, 1.0))
                .unwrap_or(defaults.sampling_rate),

            exporter: env::var("TRACEVAL_EXPORTER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.exporter),

            log_filter: defaults.log_filter,

            json_logs: env::var("TRACEVAL_LOG_JSON")
                .map(|v| v == "true")
                .unwrap_or(false),
        }
    }

    /// Exporter actually in effect once `OTEL_SDK_DISABLED` is applied
    pub fn effective_exporter(&self) -> ExporterKind {
        if self.otel_sdk_disabled {
            ExporterKind::None
        } else {
            self.exporter
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            otel_sdk_disabled: false,
            otel_service_name: "traceval".to_string(),
            otel_exporter_otlp_endpoint: "http://localhost:4317".to_string(),
            sampling_rate: 1.0,
            exporter: ExporterKind::None,
            log_filter: "info".to_string(),
            json_logs: false,
        }
    }
}
