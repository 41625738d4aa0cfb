//! # Cloud Monitoring Reporter
//!
//! Publishes metrics to the AWS CloudWatch `PutMetricData` query API, signed
//! with Signature Version 4.

use super::sigv4::{self, Credentials};
use super::{datums, Datum, Reporter, ReporterSettings, METRIC_PREFIX};
use crate::core::http_client::HttpClientBuilder;
use crate::error::MonitoringError;
use crate::metrics::RegistrySnapshot;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use tracing::debug;
use url::{form_urlencoded, Url};

/// CloudWatch accepts at most this many datums per `PutMetricData` call.
pub const MAX_DATUMS_PER_REQUEST: usize = 20;

const SERVICE: &str = "monitoring";
const API_VERSION: &str = "2010-08-01";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// CloudWatch unit of a flattened metric field.
pub fn unit_for(field: &str) -> &'static str {
    match field {
        "count" => "Count",
        "m1_rate" | "m5_rate" | "m15_rate" | "mean_rate" => "Count/Second",
        "max" | "mean" | "min" | "stddev" | "p50" | "p75" | "p95" | "p98" | "p99" | "p999" => {
            "Milliseconds"
        }
        _ => "None",
    }
}

/// # Cloud Reporter
#[derive(Debug, Clone)]
pub struct CloudReporter {
    client: Client,
    endpoint: Url,
    region: String,
    namespace: String,
    credentials: Credentials,
}

impl CloudReporter {
    pub fn new(client: Client, endpoint: Url, region: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            client,
            endpoint,
            region: region.into(),
            namespace: METRIC_PREFIX.to_string(),
            credentials,
        }
    }

    /// Regional API endpoint.
    pub fn regional_endpoint(region: &str) -> Result<Url, MonitoringError> {
        Url::parse(&format!("https://monitoring.{}.amazonaws.com/", region))
            .map_err(|e| MonitoringError::Config(format!("Invalid region '{}': {}", region, e)))
    }

    /// Build from settings when both credentials are present.
    pub fn from_settings(settings: &ReporterSettings) -> Result<Option<Self>, MonitoringError> {
        let Some(credentials) = settings.credentials.clone() else {
            return Ok(None);
        };

        let endpoint = match settings.cloud_endpoint.as_deref() {
            Some(endpoint) => Url::parse(endpoint)
                .map_err(|e| MonitoringError::Config(format!("Invalid cloud endpoint '{}': {}", endpoint, e)))?,
            None => Self::regional_endpoint(&settings.region)?,
        };

        let mut builder = HttpClientBuilder::new().timeout(settings.http_timeout);
        if let Some(proxy) = &settings.https_proxy {
            builder = builder.https_proxy(proxy.as_str());
        }
        let client = builder.build()?;

        Ok(Some(Self::new(client, endpoint, settings.region.clone(), credentials)))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Form body of one `PutMetricData` call.
    pub(crate) fn form_body(&self, batch: &[Datum], timestamp_millis: u64) -> String {
        let timestamp = Utc
            .timestamp_millis_opt(timestamp_millis as i64)
            .single()
            .unwrap_or_else(Utc::now)
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string();

        let mut form = form_urlencoded::Serializer::new(String::new());
        form.append_pair("Action", "PutMetricData")
            .append_pair("Version", API_VERSION)
            .append_pair("Namespace", &self.namespace);

        for (i, datum) in batch.iter().enumerate() {
            let member = format!("MetricData.member.{}", i + 1);
            form.append_pair(
                &format!("{}.MetricName", member),
                &format!("{}.{}", datum.metric, datum.field),
            )
            .append_pair(&format!("{}.Value", member), &datum.value.to_string())
            .append_pair(&format!("{}.Unit", member), unit_for(datum.field))
            .append_pair(&format!("{}.Timestamp", member), &timestamp);
        }
        form.finish()
    }

    async fn put_metric_data(&self, body: String) -> Result<(), MonitoringError> {
        let now = Utc::now();
        let amz_date = sigv4::amz_date(&now);
        let host = sigv4::host_header(&self.endpoint);
        let authorization = sigv4::authorization(
            &self.credentials,
            &self.region,
            SERVICE,
            &now,
            "POST",
            &self.endpoint,
            &[
                ("content-type", FORM_CONTENT_TYPE),
                ("host", host.as_str()),
                ("x-amz-date", amz_date.as_str()),
            ],
            body.as_bytes(),
        )?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .header("x-amz-date", amz_date)
            .header(AUTHORIZATION, authorization)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(MonitoringError::Reporter(format!(
                "Cloud monitoring API returned {}: {}",
                status, detail
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Reporter for CloudReporter {
    fn name(&self) -> &'static str {
        "cloud"
    }

    async fn report(&self, snapshot: &RegistrySnapshot) -> Result<(), MonitoringError> {
        let datums = datums(snapshot);
        for batch in datums.chunks(MAX_DATUMS_PER_REQUEST) {
            self.put_metric_data(self.form_body(batch, snapshot.timestamp)).await?;
        }
        debug!(
            datums = datums.len(),
            requests = datums.len().div_ceil(MAX_DATUMS_PER_REQUEST),
            "Published metrics to cloud monitoring"
        );
        Ok(())
    }
}
