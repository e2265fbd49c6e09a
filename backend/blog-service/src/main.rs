use actix_web::HttpServer;
use anyhow::{bail, Context};
use blog_service::db::{group_repo, run_migrations, user_repo};
use blog_service::{build_app, AppState, Config, SERVICE_NAME};
use db_pool::{create_pool, DbConfig};
use sqlx::SqlitePool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: blog-service [serve | migrate | create-user <username> | \
create-group <slug> <title> [description] | issue-token <username> | healthcheck]";

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn connect(config: &Config) -> anyhow::Result<SqlitePool> {
    let db_cfg = DbConfig::from_env_with_url(SERVICE_NAME, config.database.url.clone());
    db_cfg.log_config();

    create_pool(db_cfg)
        .await
        .context("Failed to create database pool")
}

async fn serve(config: Config, pool: SqlitePool) -> anyhow::Result<()> {
    run_migrations(&pool).await.context("Failed to run migrations")?;

    tokio::fs::create_dir_all(&config.media.root)
        .await
        .with_context(|| format!("Failed to create media root {}", config.media.root.display()))?;

    let state = AppState::new(pool, &config);
    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("Starting HTTP server at {}", bind_address);

    let server = HttpServer::new(move || build_app(state.clone()))
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .workers(config.app.workers)
        .disable_signals()
        .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    shutdown_signal().await;
    tracing::info!("Shutdown signal received");
    server_handle.stop(true).await;

    server_task
        .await
        .context("HTTP server task failed")?
        .context("HTTP server error")?;

    tracing::info!("Blog-service shutting down");
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(config.logging.json);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("serve");

    tracing::info!("Starting {} v{}", SERVICE_NAME, env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    let pool = connect(&config).await?;

    match (command, &args[1.min(args.len())..]) {
        ("serve", _) => serve(config, pool).await,
        ("migrate", _) => {
            run_migrations(&pool).await.context("Failed to run migrations")?;
            Ok(())
        }
        ("create-user", [username]) => {
            run_migrations(&pool).await?;
            let user = user_repo::create_user(&pool, username)
                .await
                .with_context(|| format!("Failed to create user {}", username))?;
            println!("{}", user.id);
            Ok(())
        }
        ("create-group", [slug, title, rest @ ..]) if rest.len() <= 1 => {
            run_migrations(&pool).await?;
            let description = rest.first().map(String::as_str).unwrap_or_default();
            let group = group_repo::create_group(&pool, title, slug, description)
                .await
                .with_context(|| format!("Failed to create group {}", slug))?;
            println!("{}", group.id);
            Ok(())
        }
        ("issue-token", [username]) => {
            let user = user_repo::find_user_by_username(&pool, username)
                .await?
                .with_context(|| format!("Unknown user {}", username))?;
            let state = AppState::new(pool, &config);
            let token = state.jwt_keys.issue_token(&user)?;
            println!("{}", token);
            Ok(())
        }
        ("healthcheck", _) => {
            let mut conn = db_pool::acquire_with_metrics(&pool, SERVICE_NAME).await?;
            sqlx::query("SELECT 1")
                .execute(&mut *conn)
                .await
                .context("healthcheck query failed")?;
            Ok(())
        }
        _ => bail!("{}", USAGE),
    }
}
