// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Inference request metrics
//!
//! Prometheus-compatible metrics for the embedding endpoints:
//! - `inference_requests_total{operation,outcome}` - Counter of handled requests
//! - `inference_request_duration_seconds{operation}` - Histogram of handling times

use anyhow::{Context, Result};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::fmt;
use std::time::Duration;

/// Which embedding operation a sample belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Text,
    Image,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Text => "text",
            Operation::Image => "image",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request counters and latency histograms on a private registry
#[derive(Clone)]
pub struct InferenceMetrics {
    registry: Registry,
    /// Requests by operation and outcome (`ok` or an error type)
    pub requests: IntCounterVec,
    /// Handling time by operation
    pub duration: HistogramVec,
}

impl InferenceMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("inference_requests_total", "Total embedding requests handled"),
            &["operation", "outcome"],
        )
        .context("Failed to create request counter")?;

        let duration = HistogramVec::new(
            HistogramOpts::new(
                "inference_request_duration_seconds",
                "Embedding request handling time",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["operation"],
        )
        .context("Failed to create duration histogram")?;

        registry
            .register(Box::new(requests.clone()))
            .context("Failed to register request counter")?;
        registry
            .register(Box::new(duration.clone()))
            .context("Failed to register duration histogram")?;

        Ok(Self {
            registry,
            requests,
            duration,
        })
    }

    /// Record one handled request
    pub fn observe(&self, operation: Operation, outcome: &str, elapsed: Duration) {
        self.requests
            .with_label_values(&[operation.as_str(), outcome])
            .inc();
        self.duration
            .with_label_values(&[operation.as_str()])
            .observe(elapsed.as_secs_f64());
    }

    pub fn request_count(&self, operation: Operation, outcome: &str) -> u64 {
        self.requests
            .with_label_values(&[operation.as_str(), outcome])
            .get()
    }

    /// Prometheus text exposition of every registered metric
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .context("Failed to encode metrics")?;
        String::from_utf8(buffer).context("Metrics output is not UTF-8")
    }
}

impl fmt::Debug for InferenceMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceMetrics").finish_non_exhaustive()
    }
}
