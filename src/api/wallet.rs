use actix_web::{HttpResponse, Responder, post, web};
use serde::Serialize;

use super::models::ErrorResponse;
use crate::node::Node;
use crate::wallet::generate_keypair_hex;

#[derive(Serialize)]
struct NewWalletResponse {
    private_key: String,
    address: String,
    balance: u64,
}

/// Dev helper: hand out a fresh keypair with its chain-derived balance.
#[post("/wallet/new/")]
pub async fn create_wallet(node: web::Data<Node>) -> impl Responder {
    let (private_key, address) = generate_keypair_hex();
    let res = web::block(move || {
        let balance = node.balance_of(&address);
        NewWalletResponse {
            private_key,
            address,
            balance,
        }
    })
    .await;
    match res {
        Ok(resp) => HttpResponse::Ok().json(resp),
        Err(e) => HttpResponse::InternalServerError().json(ErrorResponse::new(e)),
    }
}
