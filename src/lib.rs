use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};

use crate::intake::IntakeLimits;
use crate::mail::{MailTransport, PickupDirTransport, SendmailTransport};
use crate::models::config::{MailTransportKind, ServerConfig};
use crate::routes::AppState;
use crate::services::staging::StagingArea;
use crate::services::submission::SubmissionService;

pub mod client;
pub mod domain;
pub mod dto;
pub mod forms;
pub mod intake;
pub mod mail;
pub mod models;
pub mod routes;
pub mod services;

/// Pick the mail transport named in the configuration.
pub fn build_transport(config: &ServerConfig) -> Arc<dyn MailTransport> {
    match config.mail.transport {
        MailTransportKind::Sendmail => Arc::new(SendmailTransport::new(&config.mail.sendmail_path)),
        MailTransportKind::Pickup => {
            let dir = config
                .mail
                .pickup_dir
                .clone()
                .unwrap_or_else(|| "./outbox".to_string());
            Arc::new(PickupDirTransport::new(dir))
        }
    }
}

/// Assemble handler state from configuration and a mail transport.
pub fn build_state(config: &ServerConfig, transport: Arc<dyn MailTransport>) -> AppState {
    AppState {
        service: SubmissionService::new(
            config.attachment_policy(),
            StagingArea::new(config.staging_dir()),
            config.recipients.clone(),
            transport,
        ),
        limits: IntakeLimits {
            spool_dir: config.transport_dir(),
            max_file_size: config.max_file_size,
            max_total_size: config.max_total_size,
            max_field_size: config.max_field_size,
        },
    }
}

fn cors(allowed_origins: &[String]) -> Cors {
    allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["POST"])
        .max_age(3600)
}

pub async fn run(server_config: ServerConfig) -> std::io::Result<()> {
    let address = server_config.address.clone();
    let port = server_config.port;
    let state = web::Data::new(build_state(
        &server_config,
        build_transport(&server_config),
    ));

    log::info!(
        "Relaying submissions to {} recipient(s) via {:?}",
        server_config.recipients.len(),
        server_config.mail.transport
    );

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors(&server_config.allowed_origins))
            .app_data(state.clone())
            .configure(routes::configure)
    })
    .bind((address, port))?
    .run()
    .await
}
