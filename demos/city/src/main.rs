//! city: a live crowd over the default old-city bounding box.
//!
//! Loads the road network (JSON cache, or the synthetic grid), starts the
//! four periodic tasks, seeds a wandering population and a routed crowd,
//! runs an event campaign and background traffic, and logs the population
//! every few seconds.  Snapshots are recorded to `output/city/`.
//!
//! ```text
//! cargo run -p city --release -- [config.json]
//! RUST_LOG=debug cargo run -p city
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crowd_agent::AgentFilter;
use crowd_core::{GeoPoint, SimConfig};
use crowd_output::{ChannelSubscriber, CsvRecorder, Publisher};
use crowd_sim::{CrowdRouteRequest, EventCampaignConfig, RandomTrafficConfig, SimBuilder, SimRuntime};
use crowd_spatial::{NetworkSource, RoadNetwork};

// ── Constants ─────────────────────────────────────────────────────────────────

const RUN_SECS:        u64   = 30;
const REPORT_SECS:     u64   = 5;
const INITIAL_AGENTS:  usize = 100;
const CROWD_SIZE:      usize = 50;
const OUTPUT_DIR:      &str  = "output/city";
/// Radius of the proximity count around the event destination, degrees.
const VENUE_RADIUS:    f64   = 0.01;

// ── main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 1. Config.
    let config = match std::env::args().nth(1) {
        Some(path) => SimConfig::from_json_file(Path::new(&path))
            .with_context(|| format!("loading config {path}"))?,
        None => SimConfig::default(),
    };
    let bbox = config.bbox;
    info!(?bbox, seed = config.seed, "config loaded");

    // 2. Road network; write the cache on first run.
    let network = Arc::new(RoadNetwork::from_config(&config)?);
    if let (Some(path), NetworkSource::Synthetic) = (&config.network_cache, network.source()) {
        match network.save_cache(path) {
            Ok(()) => info!(path = %path.display(), "network cache written"),
            Err(e) => warn!(path = %path.display(), error = %e, "could not write network cache"),
        }
    }

    // 3. Sim, publisher and subscribers.
    let publish_timeout = config.publish_timeout();
    let sim = SimBuilder::new(config).network(network).build()?;

    let publisher = Publisher::new(publish_timeout);
    let subscribers = publisher.handle();
    std::fs::create_dir_all(OUTPUT_DIR)?;
    subscribers.subscribe(CsvRecorder::new(Path::new(OUTPUT_DIR))?);

    let (live, mut frames) = ChannelSubscriber::new(16);
    subscribers.subscribe(live);
    let viewer = tokio::spawn(async move {
        let mut received = 0u64;
        let mut bytes = 0usize;
        while let Some(json) = frames.recv().await {
            received += 1;
            bytes += json.len();
        }
        (received, bytes)
    });

    let runtime = SimRuntime::start(sim, publisher);
    let handle = runtime.handle();

    // 4. Population.
    let added = handle.add_agents(INITIAL_AGENTS).await?;
    info!(added, "initial agents");

    let source = GeoPoint::new(bbox.min_lon + 0.01, bbox.min_lat + 0.01);
    let venue = bbox.center();
    match handle
        .add_routed_crowd(CrowdRouteRequest { number: CROWD_SIZE, source, destination: venue })
        .await
    {
        Ok(out) => info!(added = out.added, variants = out.variants_used, "routed crowd"),
        Err(e) => warn!(error = %e, "routed crowd failed"),
    }

    let campaign = handle.start_event(EventCampaignConfig {
        wave_size: 50,
        wave_interval_seconds: 8.0,
        dwell_min_seconds: 5.0,
        dwell_max_seconds: 12.0,
        max_waves: Some(3),
        ..EventCampaignConfig::new(GeoPoint::new(bbox.max_lon - 0.01, bbox.max_lat - 0.01), venue)
    })?;
    handle.start_random_traffic(RandomTrafficConfig::default())?;
    info!(%campaign, "campaigns running");

    // 5. Run and report.
    let mut report = tokio::time::interval(Duration::from_secs(REPORT_SECS));
    report.tick().await;
    for _ in 0..RUN_SECS / REPORT_SECS {
        report.tick().await;
        let perf = handle.perf_status();
        let event = handle.event_status();
        let traffic = handle.random_traffic_status();
        info!(
            agents = perf.agents,
            random = traffic.random_agent_count,
            event_agents = event.event_agents,
            waves = event.waves_launched,
            near_venue = handle.count_within(venue, VENUE_RADIUS),
            bank = perf.route_bank_size,
            variants = perf.variant_cache_keys,
            in_flight = perf.in_flight,
            "population"
        );
    }

    // 6. Wind down.
    handle.stop_event();
    handle.stop_random_traffic();
    let (removed, remaining) = handle.clear_agents(AgentFilter::Random).await?;
    info!(removed, remaining, "background traffic cleared");

    runtime.shutdown().await?;
    drop(subscribers);
    let (received, bytes) = viewer.await?;
    info!(frames = received, bytes, output = OUTPUT_DIR, "done");
    Ok(())
}
