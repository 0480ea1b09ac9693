//! Self-test harness: exercises every bridge endpoint over HTTP.
//!
//! A run passes only if every endpoint answers 200.

use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const PAUSE_BETWEEN: Duration = Duration::from_millis(200);

/// One endpoint exercised by the harness.
#[derive(Debug, Clone)]
pub struct SelfTestCase {
    pub name: &'static str,
    pub method: Method,
    pub path: &'static str,
    pub body: Option<Value>,
}

/// Outcome of one case.
#[derive(Debug, Clone)]
pub struct SelfTestResult {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

/// Sample requests covering every route.
pub fn default_cases() -> Vec<SelfTestCase> {
    vec![
        SelfTestCase {
            name: "Health Check",
            method: Method::GET,
            path: "/health",
            body: None,
        },
        SelfTestCase {
            name: "Vehicle",
            method: Method::POST,
            path: "/vehicle",
            body: Some(json!({"vehicle_name": "ETK 800-Series", "vehicle_model": "2.0T"})),
        },
        SelfTestCase {
            name: "Crash",
            method: Method::POST,
            path: "/crash",
            body: Some(json!({"vehicle_name": "D-Series", "speed_before": 80, "damage_level": 0.5})),
        },
        SelfTestCase {
            name: "Dent",
            method: Method::POST,
            path: "/dent",
            body: Some(json!({"vehicle_name": "Pessima", "damage_amount": 0.2, "total_damage": 0.5})),
        },
        SelfTestCase {
            name: "Scratch",
            method: Method::POST,
            path: "/scratch",
            body: Some(json!({"vehicle_name": "Covet", "damage_amount": 0.01, "total_damage": 0.05})),
        },
        SelfTestCase {
            name: "Surroundings",
            method: Method::POST,
            path: "/surroundings",
            body: Some(json!({"vehicle_name": "ETK K-Series", "location": "Italy", "speed": 75})),
        },
    ]
}

/// Run `cases` against `base_url`, printing a report. Returns all results.
pub async fn run(base_url: &str, cases: &[SelfTestCase]) -> anyhow::Result<Vec<SelfTestResult>> {
    let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    let base_url = base_url.trim_end_matches('/');

    println!("Testing Bridge Server Endpoints");
    println!("{}", "=".repeat(60));

    let mut results = Vec::with_capacity(cases.len());
    for case in cases {
        let result = run_case(&client, base_url, case).await;
        let status = if result.passed { "PASS" } else { "FAIL" };
        println!("{}: {}", result.name, status);
        println!("  Response: {}", result.detail);
        results.push(result);

        tokio::time::sleep(PAUSE_BETWEEN).await;
    }

    let passed = results.iter().filter(|r| r.passed).count();
    println!();
    println!("{}", "=".repeat(60));
    println!("Results: {}/{} tests passed", passed, results.len());

    Ok(results)
}

/// Whether every result passed.
pub fn all_passed(results: &[SelfTestResult]) -> bool {
    results.iter().all(|r| r.passed)
}

async fn run_case(client: &reqwest::Client, base_url: &str, case: &SelfTestCase) -> SelfTestResult {
    let url = format!("{}{}", base_url, case.path);
    let mut request = client.request(case.method.clone(), &url);
    if let Some(body) = &case.body {
        request = request.json(body);
    }

    debug!("Self-test {} {}", case.method, url);

    match request.send().await {
        Ok(response) => {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            SelfTestResult {
                name: case.name,
                passed: status == reqwest::StatusCode::OK,
                detail: format!("{} {}", status.as_u16(), body),
            }
        }
        Err(e) => SelfTestResult {
            name: case.name,
            passed: false,
            detail: e.to_string(),
        },
    }
}
