//! Trace a utility network element
//!
//! Replays a JSON array of utility network events into the projection and
//! prints the trace of one span segment or terminal as JSON.
//!
//! ```text
//! utility-network-trace <events.json> <element-id> [--outage-view] [--config <config.json>]
//! ```

use anyhow::{bail, Context, Result};
use cim_domain_utility_network::{
    TraceMode, UtilityNetworkConfig, UtilityNetworkEvent, UtilityNetworkProjection,
};
use std::fs;
use uuid::Uuid;

struct Args {
    events_path: String,
    element_id: Uuid,
    mode: TraceMode,
    config_path: Option<String>,
}

fn parse_args() -> Result<Args> {
    let mut positional = Vec::new();
    let mut mode = TraceMode::Simple;
    let mut config_path = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--outage-view" => mode = TraceMode::OutageView,
            "--config" => {
                config_path = Some(args.next().context("--config needs a path")?);
            }
            _ => positional.push(arg),
        }
    }

    let [events_path, element_id] = positional.as_slice() else {
        bail!("usage: utility-network-trace <events.json> <element-id> [--outage-view] [--config <config.json>]");
    };
    Ok(Args {
        events_path: events_path.clone(),
        element_id: element_id
            .parse()
            .with_context(|| format!("'{element_id}' is not a valid element id"))?,
        mode,
        config_path,
    })
}

fn main() -> Result<()> {
    let args = parse_args()?;

    let config = match &args.config_path {
        Some(path) => UtilityNetworkConfig::from_file(path)
            .with_context(|| format!("loading configuration from {path}"))?,
        None => UtilityNetworkConfig::default(),
    };

    let content = fs::read_to_string(&args.events_path)
        .with_context(|| format!("reading events from {}", args.events_path))?;
    let events: Vec<UtilityNetworkEvent> =
        serde_json::from_str(&content).context("parsing utility network events")?;

    let projection = UtilityNetworkProjection::rebuild(config.object_manager, &events)
        .context("replaying events into the utility graph")?;

    let graph = projection.graph();
    let result = match args.mode {
        TraceMode::Simple => graph.simple_trace(args.element_id),
        TraceMode::OutageView => graph.outage_view_trace(args.element_id),
    }
    .context("tracing element")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
