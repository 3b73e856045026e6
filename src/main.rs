//! enverse entry point: CLI wiring and config-driven composition.

use std::path::{Path, PathBuf};
use std::process;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use enverse::alerts::AlertDetector;
use enverse::anomaly::{AnomalyPort, ThresholdDetector};
use enverse::config::AppConfig;
use enverse::io::export::export_csv;
use enverse::io::{DemoDataSource, source_from_config};
use enverse::metrics::{InsightFormatter, MetricsEngine};

/// Parsed CLI arguments.
struct CliArgs {
    config_path: Option<String>,
    preset: Option<String>,
    data_path: Option<String>,
    json: bool,
    bill_kwh: Option<f64>,
    write_demo: Option<String>,
    #[cfg(feature = "api")]
    serve: bool,
    #[cfg(feature = "api")]
    port: Option<u16>,
}

fn print_help() {
    eprintln!("enverse: household energy metrics");
    eprintln!();
    eprintln!("Usage: enverse [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>          Load configuration from a TOML file");
    eprintln!("  --preset <name>          Use a built-in preset (default, demo)");
    eprintln!("  --data <path>            Read readings from this CSV file");
    eprintln!("  --json                   Print the report as JSON");
    eprintln!("  --bill <kwh>             Print the slab bill for <kwh> units and exit");
    eprintln!("  --write-demo <path>      Write the demo dataset as CSV and exit");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve                  Start the REST API after the report");
        eprintln!("  --port <u16>             API port (default: [api] port, 3000)");
    }
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --config or --preset is given, the default preset is used.");
    eprintln!("Set RUST_LOG (e.g. RUST_LOG=debug) to change log verbosity.");
}

/// Returns the value following flag `args[*i]`, advancing `i`.
fn flag_value<'a>(args: &'a [String], i: &mut usize, what: &str) -> &'a str {
    let flag = &args[*i];
    *i += 1;
    match args.get(*i) {
        Some(v) => v.as_str(),
        None => {
            eprintln!("error: {flag} requires {what}");
            process::exit(1);
        }
    }
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        config_path: None,
        preset: None,
        data_path: None,
        json: false,
        bill_kwh: None,
        write_demo: None,
        #[cfg(feature = "api")]
        serve: false,
        #[cfg(feature = "api")]
        port: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--config" => {
                cli.config_path = Some(flag_value(&args, &mut i, "a path argument").to_string());
            }
            "--preset" => {
                cli.preset = Some(flag_value(&args, &mut i, "a name argument").to_string());
            }
            "--data" => {
                cli.data_path = Some(flag_value(&args, &mut i, "a path argument").to_string());
            }
            "--json" => cli.json = true,
            "--bill" => {
                let raw = flag_value(&args, &mut i, "a kWh argument");
                match raw.parse::<f64>() {
                    Ok(kwh) => cli.bill_kwh = Some(kwh),
                    Err(_) => {
                        eprintln!("error: --bill value \"{raw}\" is not a number");
                        process::exit(1);
                    }
                }
            }
            "--write-demo" => {
                cli.write_demo = Some(flag_value(&args, &mut i, "a path argument").to_string());
            }
            #[cfg(feature = "api")]
            "--serve" => cli.serve = true,
            #[cfg(feature = "api")]
            "--port" => {
                let raw = flag_value(&args, &mut i, "a u16 argument");
                match raw.parse::<u16>() {
                    Ok(p) => cli.port = Some(p),
                    Err(_) => {
                        eprintln!("error: --port value \"{raw}\" is not a valid u16");
                        process::exit(1);
                    }
                }
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Resolves configuration: `--config` over `--preset` over the default,
/// then applies `--data`.
fn load_config(cli: &CliArgs) -> AppConfig {
    let loaded = if let Some(ref path) = cli.config_path {
        AppConfig::from_toml_file(Path::new(path))
    } else if let Some(ref name) = cli.preset {
        AppConfig::from_preset(name)
    } else {
        Ok(AppConfig::default())
    };
    let mut config = loaded.unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    });

    if let Some(ref path) = cli.data_path {
        config.data.source = "csv".to_string();
        config.data.path = PathBuf::from(path);
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }
    config
}

fn main() {
    init_tracing();
    let cli = parse_args();
    let config = load_config(&cli);
    let tariff = config.billing.tariff();

    if let Some(kwh) = cli.bill_kwh {
        match tariff.breakdown(kwh) {
            Ok(bill) if cli.json => {
                println!("{}", serde_json::to_string_pretty(&bill).unwrap_or_default());
            }
            Ok(bill) => println!("{bill}"),
            Err(e) => {
                eprintln!("error: {e}");
                process::exit(1);
            }
        }
        return;
    }

    if let Some(ref path) = cli.write_demo {
        let demo = DemoDataSource::new(config.demo.seed, config.demo.days, config.daytime.band());
        let timeline = demo.generate();
        if let Err(e) = export_csv(&timeline, Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        info!(path = %path, readings = timeline.len(), "demo dataset written");
        return;
    }

    let source = source_from_config(&config);
    info!(source = %config.data.source, path = %config.data.path.display(), "loading readings");
    let engine = MetricsEngine::from_config(&source, &config);
    let timeline = match engine.load() {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "cannot compute metrics");
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    let snapshot = engine.compute_from(&timeline);
    let insights = InsightFormatter::new(config.insights.high_usage_margin)
        .insights(&snapshot, snapshot.lifetime_daily_rate_kwh);
    let anomalies = engine
        .windows(&timeline)
        .map(|w| ThresholdDetector::new(config.anomaly.threshold_kwh).detect(w.current))
        .unwrap_or_default();
    let alerts = AlertDetector::from_config(&config.alerts).detect(&timeline);

    if cli.json {
        let report = serde_json::json!({
            "metrics": snapshot,
            "insights": insights,
            "anomalies": anomalies,
            "alerts": alerts,
        });
        println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
    } else {
        println!("{snapshot}");
        println!("\n--- Insights ---");
        for insight in &insights {
            println!("* {insight}");
        }
        println!("\nAnomalies: {}", anomalies.len());
        for alert in &alerts {
            println!("[{}] {}", alert.severity, alert.message);
        }
    }

    #[cfg(feature = "api")]
    if cli.serve {
        use std::net::SocketAddr;
        use std::sync::Arc;

        let host = config.api.host.clone();
        let port = cli.port.unwrap_or(config.api.port);
        let addr: SocketAddr = match format!("{host}:{port}").parse() {
            Ok(a) => a,
            Err(e) => {
                eprintln!("error: invalid bind address {host}:{port}: {e}");
                process::exit(1);
            }
        };
        let state = Arc::new(enverse::api::AppState::from_config(config, source));
        let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
            eprintln!("error: failed to create tokio runtime: {e}");
            process::exit(1);
        });
        if let Err(e) = rt.block_on(enverse::api::serve(state, addr)) {
            eprintln!("error: API server failed: {e}");
            process::exit(1);
        }
    }
}
