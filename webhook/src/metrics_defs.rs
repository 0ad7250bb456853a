use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "webhook.request.duration",
    metric_type: MetricType::Histogram,
    description: "Webhook request duration in seconds. Tagged with status.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "webhook.requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of webhook requests currently being processed",
};

pub const ENTRIES: MetricDef = MetricDef {
    name: "webhook.entries",
    metric_type: MetricType::Counter,
    description: "Number of decoded entries. Tagged with kind and operation.",
};

pub const PAGES_PUBLISHED: MetricDef = MetricDef {
    name: "pages.published",
    metric_type: MetricType::Counter,
    description: "Number of page artifacts written",
};

pub const PAGES_UNPUBLISHED: MetricDef = MetricDef {
    name: "pages.unpublished",
    metric_type: MetricType::Counter,
    description: "Number of page artifacts removed",
};

pub const PAGES_FAILED: MetricDef = MetricDef {
    name: "pages.failed",
    metric_type: MetricType::Counter,
    description: "Number of page locales that could not be reconciled",
};

pub const PRODUCTS_UPSERTED: MetricDef = MetricDef {
    name: "products.upserted",
    metric_type: MetricType::Counter,
    description: "Number of catalog products created or updated. Tagged with created.",
};

pub const PRODUCTS_RETIRED: MetricDef = MetricDef {
    name: "products.retired",
    metric_type: MetricType::Counter,
    description: "Number of catalog products deactivated or deleted. Tagged with mode.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    ENTRIES,
    PAGES_PUBLISHED,
    PAGES_UNPUBLISHED,
    PAGES_FAILED,
    PRODUCTS_UPSERTED,
    PRODUCTS_RETIRED,
];
