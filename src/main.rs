//! multids - multi-datasource provisioning
//!
//! Composition root: loads the data-source list, provisions every pool,
//! coordinator and session resource, then holds them until shutdown.

use multids::adapters::outbound::MapPropertySource;
use multids::application::{BuilderRegistry, PipelineSettings, ProvisioningPipeline, Substitution};
use multids::config::{load_specs, load_tree, AppConfig};
use multids::domain::value_objects::ResourceKind;
use multids::infrastructure::shutdown_signal;
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = AppConfig::from_env()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting multids config={} mappers={}",
        cfg.config_path.display(),
        cfg.mapper_root.display()
    );

    // ===== COMPOSITION ROOT =====

    // 1. Configuration tree and the ambient property view over it
    let tree = load_tree(&cfg.config_path)?;
    let specs = load_specs(&tree, &cfg.property_base)?;
    let properties = Arc::new(MapPropertySource::from_json(&tree));

    // 2. Pipeline and the substitution layer in front of it
    let pipeline = Arc::new(ProvisioningPipeline::new(
        specs,
        BuilderRegistry::with_defaults(),
        PipelineSettings::from(&cfg),
    ));
    let substitution = Substitution::for_pipeline(pipeline.clone(), properties)
        .with_default_name(cfg.default_name.clone());

    // 3. Provision. Pool warm-up blocks, so keep it off the runtime threads.
    let runner = pipeline.clone();
    tokio::task::spawn_blocking(move || runner.run()).await??;

    // 4. Hand every registered resource out once so late binding runs now
    let registry = pipeline.registry();
    for kind in ResourceKind::ALL {
        for name in registry.names(kind) {
            if let Some(resource) = registry.get(kind, &name) {
                substitution.intercept(&name, resource)?;
            }
        }
    }

    for (name, pool) in registry.pools_snapshot() {
        let state = pool.state();
        tracing::info!(
            "pool `{}` ({}) connections={} idle={} max={}",
            name,
            pool.kind(),
            state.connections,
            state.idle_connections,
            state.max_size
        );
    }
    tracing::info!(
        "ready: {} pool(s), {} coordinator(s), {} session factory(ies), {} session handle(s)",
        registry.len(ResourceKind::Pool),
        registry.len(ResourceKind::Coordinator),
        registry.len(ResourceKind::SessionFactory),
        registry.len(ResourceKind::SessionHandle)
    );

    if cfg.check_only {
        return Ok(());
    }

    shutdown_signal().await?;
    tracing::info!("released {} data source(s)", registry.len(ResourceKind::Pool));
    Ok(())
}
