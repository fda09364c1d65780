use anyhow::{bail, Result};
use axum::http::Uri;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use consumers::api::server::{ApiServer, ApiServerConfig};
use consumers::JwtAuth;
use consumers_store::{schema::MIGRATOR, CacheKeys, DatabaseClient, RequestDescriptor};

#[derive(Parser)]
#[command(name = "consumers")]
#[command(about = "Water usage consumers service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start API server
    Serve {
        /// Host to bind to (default: CONSUMERS_HOST or 0.0.0.0)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (default: CONSUMERS_PORT or 8000)
        #[arg(short, long)]
        port: Option<u16>,

        /// JWT secret key (can also use JWT_SECRET env var)
        #[arg(long)]
        jwt_secret: Option<String>,

        /// Redis URL of the shared response cache (can also use REDIS_URL env var)
        #[arg(long)]
        redis_url: Option<String>,

        /// Disable 304 answers for matching If-None-Match headers
        #[arg(long)]
        no_etag_fast_path: bool,
    },

    /// Apply database migrations
    Migrate {
        /// Database URL (default: DATABASE_URL)
        #[arg(long)]
        database_url: Option<String>,
    },

    /// Probe a running instance, exit non-zero unless it answers
    Healthcheck {
        #[arg(long, default_value = "http://127.0.0.1:8000/ping")]
        url: String,
    },

    /// Print the fingerprint and cache keys of a request
    Fingerprint {
        /// Request path and query, e.g. "/?id=A&id=B"
        uri: String,
    },

    /// Issue a bearer token for the API
    Token {
        /// Subject of the token
        subject: String,

        /// Scope to grant (repeatable, default: REQUIRED_SCOPE)
        #[arg(short, long)]
        scope: Vec<String>,

        /// Validity in hours
        #[arg(long, default_value = "24")]
        hours: i64,

        /// JWT secret key (can also use JWT_SECRET env var)
        #[arg(long)]
        jwt_secret: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "consumers=info,consumers_store=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = ApiServerConfig::default();

    match cli.command {
        Commands::Serve {
            host,
            port,
            jwt_secret,
            redis_url,
            no_etag_fast_path,
        } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if jwt_secret.is_some() {
                config.jwt_secret = jwt_secret;
            }
            if redis_url.is_some() {
                config.redis_url = redis_url;
            }
            if no_etag_fast_path {
                config.cache.enable_if_none_match_fast_path = false;
            }

            ApiServer::new(config).start().await?;
        }

        Commands::Migrate { database_url } => {
            let url = database_url.unwrap_or(config.database_url);
            let client = DatabaseClient::new(&url).await?;
            MIGRATOR.run(client.pool()).await?;
            println!("Migrations applied");
        }

        Commands::Healthcheck { ref url } => {
            let response = reqwest::get(url).await?;
            if response.status() != reqwest::StatusCode::NO_CONTENT {
                bail!("Unexpected status {} from {}", response.status(), url);
            }
            println!("OK");
        }

        Commands::Fingerprint { ref uri } => {
            let uri: Uri = uri.parse()?;
            let fingerprint = RequestDescriptor::from_uri(&uri).fingerprint();
            let keys = CacheKeys::new(&config.cache.namespace, &fingerprint);

            println!("fingerprint: {}", fingerprint);
            println!("data key:    {}", keys.data);
            println!("change key:  {}", keys.last_change);
        }

        Commands::Token {
            ref subject,
            ref scope,
            hours,
            jwt_secret,
        } => {
            let Some(secret) = jwt_secret.or(config.jwt_secret) else {
                bail!("No JWT secret given. Set JWT_SECRET or pass --jwt-secret");
            };
            let scopes = if scope.is_empty() {
                vec![config.required_scope.clone()]
            } else {
                scope.clone()
            };

            let token = JwtAuth::new(&secret).generate_token(subject, &scopes, Some(hours))?;
            println!("{}", token);
        }
    }

    Ok(())
}
