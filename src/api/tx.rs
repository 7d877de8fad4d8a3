use actix_web::{HttpResponse, Responder, get, post, web};
use log::{debug, info, warn};
use std::time::Instant;

use super::models::{ErrorResponse, PoolResponse, TransactRequest, TransactResponse};
use crate::node::Node;
use crate::transaction::Transaction;

/// Pay from this node's wallet, amending its pending transaction if any.
#[post("/transact/")]
pub async fn post_transact(
    node: web::Data<Node>,
    body: web::Json<TransactRequest>,
) -> impl Responder {
    let t0 = Instant::now();
    let TransactRequest { recipient, amount } = body.into_inner();
    if recipient.trim().is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponse::new("recipient required"));
    }
    debug!("POST /transact/ - recipient={recipient} amount={amount}");

    let res = web::block(move || node.submit_transaction(recipient.trim(), amount)).await;
    match res {
        Ok(Ok(transaction)) => {
            info!(
                "POST /transact/ - tx={} OK ({} ms)",
                transaction.id,
                t0.elapsed().as_millis()
            );
            HttpResponse::Ok().json(TransactResponse {
                kind: "success",
                transaction,
            })
        }
        Ok(Err(e)) => {
            warn!("POST /transact/ - rejected: {e}");
            HttpResponse::BadRequest().json(ErrorResponse::new(e))
        }
        Err(e) => HttpResponse::InternalServerError().json(ErrorResponse::new(e)),
    }
}

/// Current pending transactions.
#[get("/transaction-pool-map/")]
pub async fn get_pool(node: web::Data<Node>) -> impl Responder {
    let transactions = node.pool_snapshot();
    HttpResponse::Ok().json(PoolResponse {
        size: transactions.len(),
        transactions,
    })
}

/// Transaction relayed by a peer.
#[post("/tx/receive/")]
pub async fn post_receive(node: web::Data<Node>, body: web::Json<Transaction>) -> impl Responder {
    let tx = body.into_inner();
    let id = tx.id.clone();
    match node.receive_transaction(tx) {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "accepted": id })),
        Err(e) => HttpResponse::BadRequest().json(ErrorResponse::new(e)),
    }
}
