use actix_web::{HttpResponse, Responder, get, web};
use serde_json::json;

use super::models::ErrorResponse;
use crate::node::Node;

#[get("/health/")]
pub async fn health_check(node: web::Data<Node>) -> impl Responder {
    let res = web::block(move || (node.chain_len(), node.difficulty())).await;
    match res {
        Ok((height, difficulty)) => HttpResponse::Ok().json(json!({
            "status": "up",
            "height": height,
            "difficulty": difficulty,
        })),
        Err(e) => HttpResponse::InternalServerError().json(ErrorResponse::new(e)),
    }
}
