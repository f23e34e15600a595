//! Stockroom CLI and Server Binary
//!
//! Entry point for the reservation service. Provides commands for
//! initializing, validating, and starting the service.

use anyhow::{Context, Result};
use cli::{Cli, Commands, LogFormatArg};
use config::{generate_default_config, load_config, save_config, validate_config, MasterConfig};
use observability::{init_logging, init_metrics, LogFormat};
use reservation::api::{create_router, ReservationApiState};
use reservation::{
    Identity, InventoryLedger, InMemoryStore, OrderLifecycle, PostgresStore, PostgresUserDirectory,
    ReservationCoordinator, ReservationPool, StaticUserDirectory, Store, User, UserDirectory, UserId,
};
use server::{
    check_bind, health_routes, validate_port_available, ComponentStatus, HealthState, HttpServer,
    ServerConfig, ServerExt, ShutdownController,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Start {
            config,
            http,
            log_format,
        } => start_service(config, http, log_format).await,
        Commands::Validate { config } => {
            init_logging("stockroom", LogFormat::Pretty)?;
            info!("Executing 'validate' command");
            validate_command(config).await
        }
        Commands::Init { output } => {
            init_logging("stockroom", LogFormat::Pretty)?;
            info!("Executing 'init' command");
            init_command(output).await
        }
    }
}

async fn start_service<P: AsRef<Path>>(
    config_path: P,
    http_override: Option<u16>,
    log_format_override: Option<LogFormatArg>,
) -> Result<()> {
    let mut config = load_config(config_path.as_ref())?;
    if let Some(port) = http_override {
        config.service.http_port = port;
    }

    let format_name = log_format_override
        .map(|f| f.as_str().to_string())
        .unwrap_or_else(|| config.logging().format);
    let format = format_name
        .parse::<LogFormat>()
        .map_err(anyhow::Error::msg)?;
    init_logging(&config.service.name, format)?;

    info!(service = %config.service.name, "Stockroom starting...");

    let report = validate_config(&config);
    for default in &report.defaults_applied {
        debug!(field = %default.field, value = %default.value, "Default applied");
    }
    for warning in &report.warnings {
        warn!(field = %warning.field, message = %warning.message, "Configuration warning");
    }
    if !report.is_valid() {
        error!(
            error_count = report.errors.len(),
            "Configuration validation failed"
        );
        for err in &report.errors {
            error!("{}", err);
        }
        anyhow::bail!("Cannot start service due to configuration errors");
    }

    let server_config = ServerConfig::new(config.service.host.clone(), config.service.http_port)
        .with_request_timeout(Duration::from_secs(config.service.request_timeout_seconds));
    validate_port_available(&server_config).await?;

    let metrics = config.metrics();
    if metrics.enabled {
        check_bind(&config.service.host, metrics.port, "metrics").await?;
        init_metrics(metrics.port)?;
    }

    let health = Arc::new(HealthState::new(config.service.name.clone()));
    let (store, users) = build_backend(&config, &health).await?;

    let reservation = config.reservation();
    let coordinator = Arc::new(ReservationCoordinator::new(Arc::clone(&store), users));
    let pool = Arc::new(ReservationPool::start(
        coordinator,
        reservation.worker_pool_size,
        reservation.queue_capacity,
    ));
    health.set_component(ComponentStatus::healthy(
        "reservation_pool",
        format!("{} workers", reservation.worker_pool_size),
    ));

    let state = Arc::new(ReservationApiState {
        pool: Arc::clone(&pool),
        lifecycle: Arc::new(OrderLifecycle::new(Arc::clone(&store))),
        ledger: InventoryLedger::new(store),
    });
    let router = create_router(state).merge(health_routes(health));

    info!(
        host = %server_config.host,
        http_port = server_config.http_port,
        workers = reservation.worker_pool_size,
        "Starting HTTP server"
    );

    let served = HttpServer::new(server_config, router)
        .run_until(ShutdownController::with_signals())
        .await;

    // Queued orders still get an answer before the process exits
    pool.shutdown().await;
    served?;

    info!("Stockroom stopped");
    Ok(())
}

async fn build_backend(
    config: &MasterConfig,
    health: &HealthState,
) -> Result<(Arc<dyn Store>, Arc<dyn UserDirectory>)> {
    let storage = &config.storage;

    if storage.is_postgres() {
        let pg = storage
            .postgres
            .as_ref()
            .context("storage type is 'postgres' but postgres configuration is missing")?;

        info!(url = %pg.redacted_url(), "Connecting to PostgreSQL");
        let store = PostgresStore::connect(
            &pg.connection_url(),
            pg.max_connections,
            Duration::from_secs(pg.connection_timeout_seconds),
        )
        .await
        .context("Failed to connect to PostgreSQL")?;

        if storage.run_migrations {
            store.migrate().await.context("Failed to run migrations")?;
        }

        health.set_component(ComponentStatus::healthy("storage", "postgres"));
        let users: Arc<dyn UserDirectory> = Arc::new(PostgresUserDirectory::new(store.pool()));
        let store: Arc<dyn Store> = Arc::new(store);
        return Ok((store, users));
    }

    let seed = config.seed();
    let store = Arc::new(InMemoryStore::new());
    let ledger = InventoryLedger::new(store.clone());
    for item in &seed.inventory {
        ledger
            .upsert(&Identity::system(), &item.product_id, item.total_stock)
            .await
            .with_context(|| format!("Failed to seed inventory for {}", item.product_id))?;
    }
    let users = StaticUserDirectory::new(seed.users.into_iter().map(|user| User {
        id: UserId(user.id),
        email: user.email,
        display_name: user.display_name,
    }));

    info!(
        products = store.all_inventory().len(),
        users = users.len(),
        "Using in-memory storage"
    );
    health.set_component(ComponentStatus::healthy("storage", "memory"));

    let store: Arc<dyn Store> = store;
    let users: Arc<dyn UserDirectory> = Arc::new(users);
    Ok((store, users))
}

async fn validate_command<P: AsRef<Path>>(config_path: P) -> Result<()> {
    info!(path = ?config_path.as_ref(), "Validating configuration");

    let config = match load_config(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "Failed to load configuration");
            anyhow::bail!(e);
        }
    };

    let report = validate_config(&config);

    println!("\n=== Configuration Validation Report ===\n");

    if !report.defaults_applied.is_empty() {
        println!("Defaults Applied ({}):", report.defaults_applied.len());
        for default in &report.defaults_applied {
            println!("  [info] {} = {}", default.field, default.value);
        }
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    let seed = config.seed();
    println!("[ok] Configuration is valid!");
    println!();
    println!("Service: {}", config.service.name);
    println!("HTTP: {}:{}", config.service.host, config.service.http_port);
    println!("Storage: {}", config.storage.storage_type);
    println!("Workers: {}", config.reservation().worker_pool_size);
    println!("Seed products: {}", seed.inventory.len());
    println!("Seed users: {}", seed.users.len());

    Ok(())
}

async fn init_command<P: AsRef<Path>>(output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!(?output_path, "Initializing new configuration file");

    let config = generate_default_config();
    save_config(&config, output_path)?;

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    println!();
    println!("This configuration includes:");
    println!("  - In-memory storage");
    println!("  - 1 seed user and 2 seed products");
    println!();
    println!("Next steps:");
    println!("  1. Edit the configuration file to customize settings");
    println!(
        "  2. Run 'stockroom validate --config {:?}' to check configuration",
        output_path
    );
    println!(
        "  3. Run 'stockroom start --config {:?}' to start the service",
        output_path
    );

    Ok(())
}
