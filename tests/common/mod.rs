#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Timelike, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use energy_schedule_controller::{
    api,
    config::{Config, SiteConfig},
    controller::AppState,
    hardware::SimulatedSites,
    weather::SiteForecastStore,
};

pub struct Harness {
    pub state: AppState,
    pub sites: Arc<SimulatedSites>,
    pub forecasts: Arc<SiteForecastStore>,
    pub app: Router,
}

pub async fn harness(site_ids: &[&str]) -> Harness {
    let mut cfg = Config::default();
    cfg.sites = site_ids
        .iter()
        .map(|id| SiteConfig {
            id: id.to_string(),
            sunshine_percent: None,
        })
        .collect();

    let sites = Arc::new(SimulatedSites::new());
    for id in site_ids {
        sites.add_site(*id).await;
    }
    let forecasts = Arc::new(SiteForecastStore::new(100));

    let state = AppState::with_parts(cfg.clone(), sites.clone(), sites.clone(), forecasts.clone());
    let app = api::router(state.clone(), &cfg);

    Harness {
        state,
        sites,
        forecasts,
        app,
    }
}

impl Harness {
    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn json(&self, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    pub async fn upload(&self, uri: &str, file: &[u8]) -> (StatusCode, Value) {
        self.send(multipart_request(uri, "schedules.json", file))
            .await
    }

    /// Creates a schedule through the API and returns its group id
    pub async fn create(&self, body: Value) -> String {
        let (status, created) = self.json(Method::POST, "/api/schedules", body).await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {created}");
        created["scheduleGroupId"].as_str().unwrap().to_string()
    }
}

pub fn multipart_request(uri: &str, filename: &str, file: &[u8]) -> Request<Body> {
    let boundary = "XBOUNDARYX";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/json\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(file);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// A valid schedule body; the window is centred on the current UTC time so
/// the schedule is active whenever the test runs
pub fn active_schedule(name: &str, on_peak: u8, off_peak: u8) -> Value {
    let now = Utc::now();
    let start = now - Duration::hours(1);
    let end = now + Duration::hours(1);
    json!({
        "energySiteId": "home",
        "name": name,
        "daysOfWeek": ["MONDAY", "TUESDAY", "WEDNESDAY", "THURSDAY", "FRIDAY", "SATURDAY", "SUNDAY"],
        "startTime": format!("{:02}:{:02}", start.hour(), start.minute()),
        "endTime": format!("{:02}:{:02}", end.hour(), end.minute()),
        "timeZone": "UTC",
        "onPeakBackupPercent": on_peak,
        "offPeakBackupPercent": off_peak
    })
}

/// A valid schedule body that is never active right now
pub fn inactive_schedule(name: &str) -> Value {
    let now = Utc::now();
    let start = now + Duration::hours(3);
    let end = now + Duration::hours(4);
    json!({
        "energySiteId": "home",
        "name": name,
        "daysOfWeek": ["MONDAY", "TUESDAY", "WEDNESDAY", "THURSDAY", "FRIDAY", "SATURDAY", "SUNDAY"],
        "startTime": format!("{:02}:{:02}", start.hour(), start.minute()),
        "endTime": format!("{:02}:{:02}", end.hour(), end.minute()),
        "timeZone": "UTC",
        "onPeakBackupPercent": 10,
        "offPeakBackupPercent": 30
    })
}
