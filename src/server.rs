use std::io;

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use log::{error, info};
use serde_json::json;

use crate::{
    config::ControllerConfig,
    error::ControllerError,
    learners::Learners,
    router::{Dispatcher, Route},
    storage::{RecordLog, Storage},
};

/// Training batches of a full adaptation space do not fit the default limit.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Registers the controller endpoint.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(MAX_BODY_BYTES)).service(
        web::resource("/")
            .route(web::post().to(training_testing))
            .default_service(web::to(only_post)),
    );
}

/// Handles one request from the simulator.
async fn training_testing(
    req: HttpRequest,
    body: Result<web::Bytes, actix_web::Error>,
    dispatcher: web::Data<Dispatcher>,
) -> Result<HttpResponse, ControllerError> {
    let body = body.map_err(|e| ControllerError::BadRequest(format!("unreadable body: {e}")));
    let outcome = match (Route::from_query(req.query_string()), body) {
        (Ok(route), Ok(body)) => dispatcher.dispatch(route, &body).await,
        (Err(e), _) | (_, Err(e)) => Err(e),
    };

    match outcome {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(e) => {
            error!(kind = e.kind(); "request '{}' failed: {e}", req.query_string());
            Err(e)
        }
    }
}

async fn only_post() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": "only POST requests are allowed" }))
}

/// Builds the shared dispatcher for a storage root.
///
/// Must be called from within a running actix system.
///
/// # Errors
/// Returns an io error if the storage layout cannot be created.
pub fn dispatcher(storage: Storage, learners: Learners) -> io::Result<web::Data<Dispatcher>> {
    storage.ensure_layout()?;
    let records = RecordLog::start(storage.clone());
    Ok(web::Data::new(Dispatcher::new(storage, records, learners)))
}

/// Runs the HTTP server with the built-in learners until it is shut down.
pub async fn serve(config: ControllerConfig) -> io::Result<()> {
    let storage = Storage::new(&config.root);
    let learners = Learners::baseline(&storage);
    let dispatcher = dispatcher(storage, learners)?;

    let addr = config.addr();
    info!("serving {} at {addr}", config.root.display());

    HttpServer::new(move || {
        App::new()
            .app_data(dispatcher.clone())
            .configure(configure)
    })
    .workers(config.workers.get())
    .bind(&addr)?
    .run()
    .await?;

    info!("server stopped");
    Ok(())
}
