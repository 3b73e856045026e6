//! Spawns the binary with `--serve` and talks to it over plain TCP.

#![cfg(feature = "api")]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;

const SNAPSHOT_KEYS: &[&str] = &[
    "total_energy_kwh",
    "device_wise_energy_kwh",
    "active_device_count",
    "previous_total_kwh",
    "current_bill",
    "previous_bill",
    "savings_amount",
    "night_usage_percent",
    "primary_driver",
];

struct ChildGuard {
    child: Child,
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[test]
fn served_demo_answers_health_and_metrics() {
    let port = allocate_port();
    let addr = format!("127.0.0.1:{port}");
    let _child = spawn_api_process(port);

    wait_for_server(&addr, Duration::from_secs(8));

    let (health_status, health_body) =
        http_get(&addr, "/health").expect("/health request should succeed");
    assert_eq!(health_status, 200);
    let health: Value = serde_json::from_str(&health_body).expect("health body should be JSON");
    assert_eq!(health["status"], "ok");

    let (metrics_status, metrics_body) =
        http_get(&addr, "/metrics").expect("/metrics request should succeed");
    assert_eq!(metrics_status, 200);
    let metrics: Value = serde_json::from_str(&metrics_body).expect("metrics body should be JSON");
    let obj = metrics.as_object().expect("metrics should be an object");
    for key in SNAPSHOT_KEYS {
        assert!(obj.contains_key(*key), "missing key: {key}");
    }
    assert_eq!(obj.get("active_device_count").and_then(Value::as_u64), Some(5));

    let (bill_status, _) = http_get(&addr, "/bill?kwh=abc").expect("/bill request should succeed");
    assert_eq!(bill_status, 400);
}

fn allocate_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("ephemeral port bind should succeed");
    let port = listener
        .local_addr()
        .expect("local_addr should be available")
        .port();
    drop(listener);
    port
}

fn spawn_api_process(port: u16) -> ChildGuard {
    let child = Command::new(env!("CARGO_BIN_EXE_enverse"))
        .args(["--preset", "demo", "--serve", "--port", &port.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("enverse process should spawn");

    ChildGuard { child }
}

fn wait_for_server(bind_addr: &str, timeout: Duration) {
    let start = Instant::now();
    loop {
        if let Ok((status, _)) = http_get(bind_addr, "/health") {
            if status == 200 {
                return;
            }
        }

        if start.elapsed() >= timeout {
            panic!("timed out waiting for API server on {bind_addr}");
        }

        thread::sleep(Duration::from_millis(50));
    }
}

fn http_get(bind_addr: &str, path: &str) -> Result<(u16, String), String> {
    let mut stream = TcpStream::connect(bind_addr).map_err(|err| format!("connect: {err}"))?;
    let request = format!("GET {path} HTTP/1.1\r\nHost: {bind_addr}\r\nConnection: close\r\n\r\n");
    stream
        .write_all(request.as_bytes())
        .map_err(|err| format!("write: {err}"))?;

    let mut raw = String::new();
    stream
        .read_to_string(&mut raw)
        .map_err(|err| format!("read: {err}"))?;

    let (head, body) = raw
        .split_once("\r\n\r\n")
        .ok_or_else(|| "invalid HTTP response".to_string())?;
    let status_line = head
        .lines()
        .next()
        .ok_or_else(|| "missing status line".to_string())?;
    let status_code = status_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| "missing status code".to_string())?
        .parse::<u16>()
        .map_err(|err| format!("invalid status code: {err}"))?;

    Ok((status_code, body.to_string()))
}
