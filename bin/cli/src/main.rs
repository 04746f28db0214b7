//! `conduit`: check and exercise proxy-service connections from a shell.
//!
//! Configuration comes from `CONDUIT_*` environment variables. Output is
//! JSON on stdout; token values are never printed.

use clap::{Parser, Subcommand, ValueEnum};
use conduit_client::{ClientConfig, Conduit};
use conduit_integration::{ApiResponse, HttpMethod, ProxyRequest};
use conduit_services::{
    GmailIntegration, LinkedInIntegration, OpenAiIntegration, ServiceIntegration,
    SheetsIntegration,
};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "conduit", version, about = "Inspect conduit connections")]
struct Cli {
    /// Connection id; overrides CONDUIT_CONNECTION_ID.
    #[arg(long, global = true)]
    connection_id: Option<String>,

    /// Proxy service host; overrides CONDUIT_HOST.
    #[arg(long, global = true)]
    host: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check that a service's stored credentials are usable.
    Validate {
        /// Service to check; all services when omitted.
        service: Option<Service>,
    },
    /// Print which kind of token a service's connection holds.
    TokenKind { service: Service },
    /// Send a raw request through the proxy service.
    Proxy {
        service: Service,
        /// HTTP method, e.g. GET or POST.
        method: HttpMethod,
        /// Upstream path, e.g. /gmail/v1/users/me/profile.
        endpoint: String,
        /// JSON request body.
        #[arg(long)]
        data: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Service {
    Gmail,
    Sheets,
    Linkedin,
    Openai,
}

#[derive(Serialize)]
struct TokenKindOutput {
    service: &'static str,
    kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: failed to render output: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn token_kind(conduit: &Conduit, service: Service) -> TokenKindOutput {
    // Each integration narrows to its own token type; only the tag leaves here.
    let (name, result) = match service {
        Service::Gmail => (
            GmailIntegration::SERVICE_NAME,
            conduit.gmail().integration().get_auth_token().await.map(|_| "OAUTH2"),
        ),
        Service::Sheets => (
            SheetsIntegration::SERVICE_NAME,
            conduit.sheets().integration().get_auth_token().await.map(|_| "OAUTH2"),
        ),
        Service::Linkedin => (
            LinkedInIntegration::SERVICE_NAME,
            conduit.linkedin().integration().get_auth_token().await.map(|_| "OAUTH2"),
        ),
        Service::Openai => (
            OpenAiIntegration::SERVICE_NAME,
            conduit.openai().integration().get_auth_token().await.map(|_| "API_KEY"),
        ),
    };
    match result {
        Ok(kind) => TokenKindOutput {
            service: name,
            kind: Some(kind),
            error: None,
        },
        Err(report) => TokenKindOutput {
            service: name,
            kind: None,
            error: Some(report.current_context().to_string()),
        },
    }
}

async fn proxy(
    conduit: &Conduit,
    service: Service,
    method: HttpMethod,
    endpoint: String,
    data: Option<String>,
) -> ApiResponse<JsonValue> {
    let mut request = ProxyRequest::new(method, endpoint);
    if let Some(data) = data {
        match serde_json::from_str(&data) {
            Ok(body) => request = request.with_data(body),
            Err(e) => return ApiResponse::failure(format!("--data is not valid JSON: {e}")),
        }
    }

    let result = match service {
        Service::Gmail => conduit.gmail().integration().proxy_request(request).await,
        Service::Sheets => conduit.sheets().integration().proxy_request(request).await,
        Service::Linkedin => conduit.linkedin().integration().proxy_request(request).await,
        Service::Openai => conduit.openai().integration().proxy_request(request).await,
    };
    ApiResponse::from_result(result.map(|response| response.data), "Request proxied successfully")
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = ClientConfig {
        connection_id: cli.connection_id,
        host: cli.host,
        ..ClientConfig::default()
    };
    let conduit = match Conduit::new(config) {
        Ok(conduit) => conduit,
        Err(report) => {
            tracing::error!(error = %report.current_context(), "failed to configure client");
            eprintln!("error: {report}");
            return ExitCode::from(2);
        }
    };

    match cli.command {
        Command::Validate { service: None } => print_json(&conduit.validate_all().await),
        Command::Validate {
            service: Some(service),
        } => {
            let status = match service {
                Service::Gmail => conduit.gmail().validate_connection().await,
                Service::Sheets => conduit.sheets().validate_connection().await,
                Service::Linkedin => conduit.linkedin().validate_connection().await,
                Service::Openai => conduit.openai().validate_connection().await,
            };
            print_json(&status)
        }
        Command::TokenKind { service } => print_json(&token_kind(&conduit, service).await),
        Command::Proxy {
            service,
            method,
            endpoint,
            data,
        } => print_json(&proxy(&conduit, service, method, endpoint, data).await),
    }
}
