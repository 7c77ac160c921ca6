use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    pub static ref RECEIVED_ALERTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "githubreceiver_alerts_total",
        "Number of incoming alerts from AlertManager.",
        &["alertname", "status"]
    )
    .expect("register githubreceiver_alerts_total");

    // "status" is always "firing" here, so it is not a label.
    pub static ref CREATED_ISSUES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "githubreceiver_created_issues_total",
        "Number of firing issues for which an alert has been created.",
        &["alertname"]
    )
    .expect("register githubreceiver_created_issues_total");

    pub static ref RECEIVER_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "githubreceiver_duration_seconds",
        "A histogram of request latencies to the receiver handler.",
        &["code"]
    )
    .expect("register githubreceiver_duration_seconds");
}

/// Text exposition of everything in the default registry.
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
