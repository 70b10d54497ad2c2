use std::{process::ExitCode, sync::Arc};

use clap::Parser;

use ops_core::config::{ConfigFile, Settings};
use ops_core::context::ServerContext;
use ops_core::policy::audit::AuditLogger;
use ops_core::tools;
use ops_core::transport::{http, stdio};

const EXIT_BAD_CONFIG: u8 = 64;
const EXIT_BIND_FAILURE: u8 = 69;
const EXIT_INTERNAL: u8 = 70;

/// Operations control-plane server: bridges SSH, Docker, and Kubernetes
/// backends to a JSON-RPC 2.0 client under policy (§1).
#[derive(Parser, Debug)]
#[command(name = "ops-core")]
struct Args {
    /// Bind address for the HTTP transport (`POST /rpc`, `GET /events`).
    /// Stdio is always started; this adds HTTP alongside it.
    #[arg(long, env = "OPS_CORE_HTTP_BIND")]
    http: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(error) => {
            tracing::error!(%error, "bad configuration");
            return ExitCode::from(EXIT_BAD_CONFIG);
        }
    };

    let config = match ConfigFile::load(&settings.config_path) {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "bad configuration");
            return ExitCode::from(EXIT_BAD_CONFIG);
        }
    };

    if !config.profiles.contains_key(&config.default_profile) {
        tracing::error!(profile = %config.default_profile, "default_profile not found among configured profiles");
        return ExitCode::from(EXIT_BAD_CONFIG);
    }
    let default_profile = config.default_profile.clone();

    let audit_path = settings.audit_log_override.clone().unwrap_or_else(|| config.audit.path.clone());
    let audit = match AuditLogger::spawn(&audit_path) {
        Ok(audit) => audit,
        Err(error) => {
            tracing::error!(%error, "bad configuration");
            return ExitCode::from(EXIT_BAD_CONFIG);
        }
    };

    let ctx = match ServerContext::new(config, settings, audit) {
        Ok(ctx) => Arc::new(ctx),
        Err(error) => {
            tracing::error!(%error, "bad configuration");
            return ExitCode::from(EXIT_BAD_CONFIG);
        }
    };

    let registry = match tools::build_registry() {
        Ok(registry) => Arc::new(registry),
        Err(error) => {
            tracing::error!(%error, "tool registration failed");
            return ExitCode::from(EXIT_BAD_CONFIG);
        }
    };

    if let Some(bind) = &args.http {
        let listener = match tokio::net::TcpListener::bind(bind).await {
            Ok(listener) => listener,
            Err(error) => {
                tracing::error!(%error, bind, "failed to bind HTTP transport");
                return ExitCode::from(EXIT_BIND_FAILURE);
            }
        };
        let app = http::router(ctx.clone(), registry.clone(), &default_profile);
        tokio::spawn(async move {
            if let Err(error) = axum::serve(listener, app).await {
                tracing::error!(%error, "HTTP transport exited");
            }
        });
    }

    match stdio::run(ctx, registry, &default_profile).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "unhandled internal error on the stdio transport");
            ExitCode::from(EXIT_INTERNAL)
        }
    }
}
