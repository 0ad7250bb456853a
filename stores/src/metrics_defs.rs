//! Metrics definitions for the collaborator stores.

use shared::metrics_defs::{MetricDef, MetricType};

pub const NEGATIVE_CACHE_HIT: MetricDef = MetricDef {
    name: "store_directory.negative_cache.hit",
    metric_type: MetricType::Counter,
    description: "Number of store lookups answered by the negative cache",
};

pub const NEGATIVE_CACHE_MISS: MetricDef = MetricDef {
    name: "store_directory.negative_cache.miss",
    metric_type: MetricType::Counter,
    description: "Number of store lookups that missed the negative cache",
};

pub const PLATFORM_REQUEST_DURATION: MetricDef = MetricDef {
    name: "platform.request.duration",
    metric_type: MetricType::Histogram,
    description: "Duration of platform API calls in seconds. Tagged with operation.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    NEGATIVE_CACHE_HIT,
    NEGATIVE_CACHE_MISS,
    PLATFORM_REQUEST_DURATION,
];
