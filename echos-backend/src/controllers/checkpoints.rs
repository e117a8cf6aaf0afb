use actix_web::{web, HttpResponse, Responder};

use crate::AppState;

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/checkpoints").route(web::get().to(list_checkpoints)));
}

/// Current ingestion checkpoints for the running agent.
async fn list_checkpoints(state: web::Data<AppState>) -> impl Responder {
    match state.agent.db.list_checkpoints(state.agent.name()) {
        Ok(checkpoints) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "agent": state.agent.name(),
            "checkpoints": checkpoints
        })),
        Err(e) => {
            log::error!("Failed to list checkpoints: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "error": format!("Database error: {}", e)
            }))
        }
    }
}
