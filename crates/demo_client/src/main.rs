//! # Demo Client
//!
//! Simulates a handful of instrumented apps. Each app loads the stock
//! plugins, connects to an inspector and streams state actions, API
//! responses and log lines until the run is over.

use clap::Parser;
use rand::Rng;
use relay_client::{
    ApiResponseExt, ApiResponsePlugin, Client, ClientIntroPlugin, ClientOptions, LoggerExt,
    LoggerPlugin, PluginError, StateActionExt, StateActionPlugin,
};
use serde_json::json;
use std::time::Duration;
use tokio::time::{interval, sleep, Instant};
use tracing::{error, info, warn};

#[derive(Parser, Debug, Clone)]
#[command(name = "simulate")]
#[command(about = "Streams sample debugging commands to an inspector")]
struct Args {
    /// Inspector WebSocket URL
    #[arg(short, long, default_value = "ws://127.0.0.1:9090")]
    url: String,

    /// Number of simultaneous apps to simulate
    #[arg(short, long, default_value = "1")]
    apps: u32,

    /// Commands each app sends before disconnecting
    #[arg(short, long, default_value = "20")]
    count: u32,

    /// Milliseconds between commands
    #[arg(short, long, default_value = "500")]
    interval: u64,

    /// Version reported in the client intro
    #[arg(long, default_value = env!("CARGO_PKG_VERSION"))]
    app_version: String,
}

/// Sample screens an app navigates between
const SCREENS: [&str; 4] = ["home", "search", "profile", "settings"];

/// Sample API endpoints an app calls
const ENDPOINTS: [&str; 3] = ["/api/user", "/api/feed", "/api/notifications"];

/// Statistics for one simulated app
#[derive(Debug, Default)]
struct AppStats {
    actions: u32,
    responses: u32,
    logs: u32,
    failures: u32,
}

fn build_client(index: u32, args: &Args) -> Result<Client, PluginError> {
    let client = Client::new(
        ClientOptions::new(format!("Demo App {}", index + 1))
            .with_user_agent(format!("demo-client/{}", std::env::consts::OS))
            .with_version(args.app_version.clone()),
    );
    client
        .use_plugin(ClientIntroPlugin)?
        .use_plugin(LoggerPlugin)?
        .use_plugin(ApiResponsePlugin)?
        .use_plugin(StateActionPlugin)?;
    Ok(client)
}

/// Sends one randomly chosen command.
fn send_sample(client: &Client, step: u32, stats: &mut AppStats) -> Result<(), PluginError> {
    let (choice, ms) = {
        let mut rng = rand::thread_rng();
        (rng.gen_range(0..3), rng.gen_range(1..250u64))
    };

    match choice {
        0 => {
            let screen = SCREENS[step as usize % SCREENS.len()];
            client.state_action_complete(
                "navigation/NAVIGATE",
                json!({ "type": "navigation/NAVIGATE", "screen": screen }),
                ms,
            )?;
            stats.actions += 1;
        }
        1 => {
            let endpoint = ENDPOINTS[step as usize % ENDPOINTS.len()];
            client.api_response(
                json!({ "url": endpoint, "method": "GET" }),
                json!({ "status": 200, "body": { "step": step } }),
                ms,
            )?;
            stats.responses += 1;
        }
        _ => {
            if ms > 200 {
                client.warn(format!("step {step} was slow ({ms} ms)"))?;
            } else {
                client.log(format!("step {step} finished"))?;
            }
            stats.logs += 1;
        }
    }
    Ok(())
}

async fn simulate_app(index: u32, args: Args) -> Result<AppStats, Box<dyn std::error::Error + Send + Sync>> {
    let client = build_client(index, &args)?;
    client.connect(&args.url).await?;
    info!("🔗 App {} connected to {}", index + 1, args.url);

    let mut stats = AppStats::default();
    let mut ticker = interval(Duration::from_millis(args.interval.max(1)));
    let started = Instant::now();

    for step in 0..args.count {
        ticker.tick().await;
        if let Err(e) = send_sample(&client, step, &mut stats) {
            warn!("⚠️ App {} failed to send step {}: {}", index + 1, step, e);
            stats.failures += 1;
        }
    }

    client.disconnect().await;
    info!(
        "👋 App {} done in {:.1}s: {:?}",
        index + 1,
        started.elapsed().as_secs_f64(),
        stats
    );
    Ok(stats)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();

    info!("🚀 Starting demo client");
    info!("   • Apps: {}", args.apps);
    info!("   • Commands per app: {}", args.count);
    info!("   • Interval: {} ms", args.interval);
    info!("   • Inspector: {}", args.url);

    let mut handles = Vec::new();
    for index in 0..args.apps {
        let args = args.clone();
        handles.push(tokio::spawn(simulate_app(index, args)));

        // Stagger connections so intros are easy to follow in the console
        sleep(Duration::from_millis(100)).await;
    }

    let mut totals = AppStats::default();
    for (index, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(Ok(stats)) => {
                totals.actions += stats.actions;
                totals.responses += stats.responses;
                totals.logs += stats.logs;
                totals.failures += stats.failures;
            }
            Ok(Err(e)) => error!("❌ App {} failed: {}", index + 1, e),
            Err(e) => error!("❌ App {} task panicked: {}", index + 1, e),
        }
    }

    info!("✅ Simulation complete");
    info!("   • State actions: {}", totals.actions);
    info!("   • API responses: {}", totals.responses);
    info!("   • Log lines: {}", totals.logs);
    if totals.failures > 0 {
        warn!("   • Failed sends: {}", totals.failures);
    }
    Ok(())
}
