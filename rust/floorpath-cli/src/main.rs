use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

use floorpath_core::{Layout, RouteConfig, RouteRequest};

/// Overrides a handful of `RouteConfig` fields from the environment, for
/// ad hoc tuning without writing a config file: read, parse, fall back
/// to whatever was already set. Unset or unparsable variables leave the
/// field untouched.
fn apply_env_overrides(mut config: RouteConfig) -> RouteConfig {
    if let Some(v) = env::var("FLOORPATH_RASTER_SIZE").ok().and_then(|s| s.parse().ok()) {
        config.raster_size = v;
    }
    if let Some(v) = env::var("FLOORPATH_MAX_NEARBY_DELTA").ok().and_then(|s| s.parse().ok()) {
        config.max_nearby_delta = v;
    }
    if let Some(v) = env::var("FLOORPATH_PORTAL_PENALTY_MULTIPLIER").ok().and_then(|s| s.parse().ok()) {
        config.portal_penalty_multiplier = v;
    }
    if let Some(v) = env::var("FLOORPATH_RAY_SEED").ok().and_then(|s| s.parse().ok()) {
        config.ray_seed = Some(v);
    }
    config
}

#[derive(Parser, Debug)]
#[command(name = "floorpath", version, about = "Plan a route through a store layout from the command line")]
struct Args {
    /// Path to a JSON-encoded Layout.
    #[arg(long = "layout", value_name = "PATH")]
    layout_path: PathBuf,

    /// Path to a JSON-encoded RouteRequest.
    #[arg(long = "request", value_name = "PATH")]
    request_path: PathBuf,

    /// Optional JSON-encoded RouteConfig overriding the defaults.
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_ansi(false).json().finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let args = Args::parse();
    info!(?args, "planning route");

    let layout_json = fs::read_to_string(&args.layout_path)
        .with_context(|| format!("failed to read layout at {:?}", args.layout_path))?;
    let layout: Layout = serde_json::from_str(&layout_json)
        .with_context(|| format!("failed to parse layout at {:?}", args.layout_path))?;

    let request_json = fs::read_to_string(&args.request_path)
        .with_context(|| format!("failed to read route request at {:?}", args.request_path))?;
    let request: RouteRequest = serde_json::from_str(&request_json)
        .with_context(|| format!("failed to parse route request at {:?}", args.request_path))?;

    let config = match &args.config_path {
        Some(path) => {
            let raw = fs::read_to_string(path).with_context(|| format!("failed to read config at {path:?}"))?;
            serde_json::from_str(&raw).with_context(|| format!("failed to parse config at {path:?}"))?
        }
        None => RouteConfig::default(),
    };
    let config = apply_env_overrides(config);

    match floorpath_core::plan(&layout, &request, config) {
        Ok(route) => {
            info!(segments = route.segments.len(), stops = route.visit_order.len(), "route planned");
            println!("{}", serde_json::to_string_pretty(&route)?);
            Ok(())
        }
        Err(err) => {
            error!(%err, "route planning failed");
            anyhow::bail!(err);
        }
    }
}
