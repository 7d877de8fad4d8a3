use actix_web::{HttpResponse, Responder, get, web};

use super::models::{BalanceResponse, ErrorResponse};
use crate::node::Node;

#[get("/balance/{address}/")]
pub async fn get_balance(node: web::Data<Node>, path: web::Path<(String,)>) -> impl Responder {
    let address = path.into_inner().0;
    let res = web::block(move || {
        let balance = node.balance_of(&address);
        BalanceResponse { address, balance }
    })
    .await;
    match res {
        Ok(resp) => HttpResponse::Ok().json(resp),
        Err(e) => HttpResponse::InternalServerError().json(ErrorResponse::new(e)),
    }
}

/// Address and chain-derived balance of this node's wallet.
#[get("/wallet-info/")]
pub async fn get_wallet_info(node: web::Data<Node>) -> impl Responder {
    match web::block(move || node.wallet_info()).await {
        Ok((address, balance)) => HttpResponse::Ok().json(BalanceResponse { address, balance }),
        Err(e) => HttpResponse::InternalServerError().json(ErrorResponse::new(e)),
    }
}
