//! Thin actix-web surface wrapping `SubmissionFrontend`: deserializes the
//! logical submission schema, calls the core, and serializes the logical
//! ack/status schemas back out. All validation, dispatch, and retry
//! semantics live in the core modules, not here.

use actix_web::{web, App, HttpResponse, HttpServer};
use tracing::{error, info};

use crate::submission::{SubmissionFrontend, SubmissionRequest};
use crate::worker_pool::WorkerPool;

async fn submit(
    pool: web::Data<WorkerPool>,
    body: web::Json<SubmissionRequest>,
) -> HttpResponse {
    let frontend = SubmissionFrontend::new(&pool);
    match frontend.submit(body.into_inner()).await {
        Ok(ack) => HttpResponse::Ok().json(ack),
        Err(_unavailable) => {
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "accepted": false,
                "taskId": "",
                "error": "No healthy workers available",
            }))
        }
    }
}

async fn status(pool: web::Data<WorkerPool>) -> HttpResponse {
    let frontend = SubmissionFrontend::new(&pool);
    HttpResponse::Ok().json(frontend.status().await)
}

/// Binds `host:port` and serves `/submit` and `/status` until the process
/// is asked to shut down.
pub async fn serve(
    host: &str,
    port: u16,
    pool: web::Data<WorkerPool>,
) -> std::io::Result<()> {
    info!("starting HTTP server on {host}:{port}");
    let server = HttpServer::new(move || {
        App::new()
            .app_data(pool.clone())
            .service(web::resource("/submit").route(web::post().to(submit)))
            .service(web::resource("/status").route(web::get().to(status)))
    })
    .bind((host, port))
    .map_err(|e| {
        error!("failed to bind to {host}:{port}: {e}");
        e
    })?
    .run();

    server.await
}
