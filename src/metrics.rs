use std::sync::LazyLock;

use prometheus::*;

static METRIC_ENCODED_IMAGES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "clip_encoded_images",
        "count of the images written to the vector store",
        &["collection"]
    )
    .expect("failed to register clip_encoded_images")
});

static METRIC_FAILED_BATCHES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "clip_failed_batches",
        "count of the batches the provider failed to encode",
        &["collection"]
    )
    .expect("failed to register clip_failed_batches")
});

static METRIC_PROVIDER_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!("clip_provider_duration", "duration of the per-call provider invocation in seconds")
        .expect("failed to register clip_provider_duration")
});

static METRIC_SEARCH_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!("clip_search_duration", "duration of the per-query search in seconds")
        .expect("failed to register clip_search_duration")
});

pub fn inc_encoded_images(collection: &str, n: u64) {
    METRIC_ENCODED_IMAGES.with_label_values(&[collection]).inc_by(n);
}

pub fn inc_failed_batches(collection: &str) {
    METRIC_FAILED_BATCHES.with_label_values(&[collection]).inc();
}

pub fn observe_provider_duration(seconds: f64) {
    METRIC_PROVIDER_DURATION.observe(seconds);
}

pub fn observe_search_duration(seconds: f64) {
    METRIC_SEARCH_DURATION.observe(seconds);
}

/// 以文本格式导出所有指标
pub fn gather_text() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    Ok(encoder.encode_to_string(&prometheus::gather())?)
}
