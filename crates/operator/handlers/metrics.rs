use actix_web::{get, web::Data, HttpRequest, HttpResponse, Responder};
use git_controller::controllers::poller::State;
use prometheus::{Encoder, TextEncoder};
use tracing::error;

#[get("/metrics")]
pub async fn metrics(c: Data<State>, _req: HttpRequest) -> impl Responder {
    let metrics = c.metrics();
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    match encoder.encode(&metrics, &mut buffer) {
        Ok(()) => HttpResponse::Ok()
            .content_type(encoder.format_type())
            .body(buffer),
        Err(e) => {
            error!("failed to encode metrics: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}
