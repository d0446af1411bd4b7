//! `blockmind start`: launch the agent fleet and run until Ctrl-C.

use blockmind_agent::{
    AgentRuntime, Fleet, LaunchPlan, LoopTiming, PolicyGateway, standard_dispatcher,
};
use blockmind_config::{AgentProfile, AppConfig};
use blockmind_core::{DomainEvent, EnvironmentDriver, EventBus, PolicyOracle};
use blockmind_providers::OllamaOracle;
use blockmind_world::{Ambience, SimWorld};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

/// Name of the ambient player who wanders the simulated world.
const AMBIENT_PLAYER: &str = "Steve";

pub async fn run(
    config_path: Option<&Path>,
    agent_specs: Vec<String>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;
    apply_overrides(&mut config, &agent_specs, host, port)?;
    config.validate()?;

    if config.driver.kind != "sim" {
        return Err(format!(
            "driver '{}' is not available in this build (supported: sim)",
            config.driver.kind
        )
        .into());
    }

    let endpoint = config.server.endpoint();
    println!("⛏️  blockmind starting");
    println!("   World:  {} (driver: {})", endpoint, config.driver.kind);
    println!("   Oracle: {} ({})", config.oracle.model, config.oracle.base_url);
    println!("   Memory: {}", config.memory.backend);
    println!(
        "   Agents: {}",
        config
            .agents
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!();

    let store =
        blockmind_memory::open_store(&config.memory.backend, &config.memory.resolved_path())
            .await?;

    let world = SimWorld::demo();
    let (ambience_stop, ambience_rx) = watch::channel(false);
    let ambience = Ambience::new(world.clone(), AMBIENT_PLAYER).start(ambience_rx);

    let events = Arc::new(EventBus::default());
    let oracle: Arc<dyn PolicyOracle> = Arc::new(OllamaOracle::from_config(&config.oracle));
    let gateway = PolicyGateway::from_config(oracle, &config.oracle, &config.behavior)?
        .with_event_bus(events.clone());
    let driver: Arc<dyn EnvironmentDriver> = Arc::new(world.driver());

    let runtime = AgentRuntime {
        driver,
        gateway: Arc::new(gateway),
        dispatcher: Arc::new(standard_dispatcher()),
        store,
        events: events.clone(),
    };
    let plan = LaunchPlan {
        agents: config
            .agents
            .iter()
            .map(|profile| profile.to_identity(endpoint.clone()))
            .collect(),
        stagger: Duration::from_millis(config.behavior.launch_stagger_ms),
        timing: LoopTiming::from_config(&config.behavior),
    };

    let watcher = tokio::spawn(report_events(events.subscribe()));

    let fleet = match Fleet::launch(plan, runtime).await {
        Ok(fleet) => fleet,
        Err(e) => {
            println!("❌ {e}");
            println!("   Is the oracle running? Try `blockmind doctor`.");
            let _ = ambience_stop.send(true);
            let _ = ambience.await;
            watcher.abort();
            return Err(e.into());
        }
    };

    println!("✅ {} agent(s) running. Press Ctrl-C to stop.", fleet.agents().len());
    tokio::signal::ctrl_c().await?;
    println!("\n🛑 Stopping agents...");

    for agent in fleet.agents() {
        info!(agent = agent.name(), summary = %agent.memory().summary(), "Memory at shutdown");
    }
    fleet.shutdown().await;

    let _ = ambience_stop.send(true);
    let _ = ambience.await;
    watcher.abort();
    println!("👋 All agents stopped.");
    Ok(())
}

/// Apply command-line overrides on top of the loaded config.
fn apply_overrides(
    config: &mut AppConfig,
    agent_specs: &[String],
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if !agent_specs.is_empty() {
        config.agents = agent_specs
            .iter()
            .map(|spec| spec.parse::<AgentProfile>())
            .collect::<Result<_, _>>()?;
    }
    Ok(())
}

/// Print chat and fallback activity as it happens.
async fn report_events(mut rx: broadcast::Receiver<Arc<DomainEvent>>) {
    loop {
        match rx.recv().await {
            Ok(event) => match event.as_ref() {
                DomainEvent::ChatSent { agent, peer, .. } => {
                    println!("💬 {agent} → {peer}");
                }
                DomainEvent::OracleFallback { agent, reason, .. } => {
                    println!("⚠️  {agent}: oracle fallback ({reason})");
                }
                DomainEvent::CycleCompleted {
                    agent,
                    action,
                    success,
                    ..
                } => {
                    let mark = if *success { "✔" } else { "✘" };
                    println!("{mark} {agent}: {action}");
                }
                other => debug!(event = ?other, "Domain event"),
            },
            Err(broadcast::error::RecvError::Lagged(n)) => {
                debug!(skipped = n, "Event report lagged")
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
