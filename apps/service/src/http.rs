//! Liveness endpoint for container orchestration.

use actix_web::dev::Server;
use actix_web::{App, HttpResponse, HttpServer, Responder, get, web};
use serde::Serialize;
use std::net::SocketAddr;

use crate::commands::{ServiceStatus, StatusReporter};

#[derive(Serialize)]
struct StatusBody {
    targets: Vec<ServiceStatus>,
}

/// Health check route
/// This route returns no content, the response status is enough.
#[get("/")]
pub async fn health_route() -> impl Responder {
    HttpResponse::Ok()
}

/// Cached per-target health, no probes are triggered
#[get("/status")]
pub async fn status_route(reporter: web::Data<StatusReporter>) -> impl Responder {
    HttpResponse::Ok().json(StatusBody { targets: reporter.services() })
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health_route).service(status_route);
}

/// Bind the server; the returned future must be awaited or spawned to serve
pub fn run_server(addr: SocketAddr, reporter: StatusReporter) -> std::io::Result<Server> {
    let reporter = web::Data::new(reporter);
    let server = HttpServer::new(move || App::new().app_data(reporter.clone()).configure(routes))
        .workers(1)
        .disable_signals()
        .bind(addr)?
        .run();

    tracing::info!(%addr, "Liveness endpoint listening");
    Ok(server)
}
