use actix_web::{HttpResponse, Responder, get, post, web};
use log::{info, warn};
use serde_json::Value;

use super::models::{
    ChainResponse, ErrorResponse, MineRequest, MineResponse, ReplaceResponse, ValidateResponse,
};
use crate::blockchain::{Block, BlockData};
use crate::error::LedgerError;
use crate::node::Node;
use crate::transaction::Transaction;

// Chain reads wait on a running nonce search, so they leave the async
// worker free for `/mine/cancel/`.

/// Get the full blockchain.
#[get("/blocks/")]
pub async fn get_chain(node: web::Data<Node>) -> impl Responder {
    match web::block(move || node.get_chain()).await {
        Ok(chain) => HttpResponse::Ok().json(ChainResponse {
            length: chain.len(),
            difficulty: chain.last().map(|b| b.difficulty).unwrap_or_default(),
            chain,
        }),
        Err(e) => HttpResponse::InternalServerError().json(ErrorResponse::new(e)),
    }
}

/// Validate the whole chain.
#[get("/validate/")]
pub async fn validate_chain(node: web::Data<Node>) -> impl Responder {
    let res = web::block(move || ValidateResponse {
        valid: node.is_valid(),
        length: node.chain_len(),
        difficulty: node.difficulty(),
    })
    .await;
    match res {
        Ok(resp) => HttpResponse::Ok().json(resp),
        Err(e) => HttpResponse::InternalServerError().json(ErrorResponse::new(e)),
    }
}

/// Mine arbitrary data into a new block.
#[post("/mine/")]
pub async fn mine_block(node: web::Data<Node>, req: web::Json<MineRequest>) -> impl Responder {
    let data = into_block_data(req.into_inner().data);
    mined_response(web::block(move || node.add_block(data)).await)
}

/// Mine the valid pool transactions plus this node's reward.
#[post("/mine-transactions/")]
pub async fn mine_transactions(node: web::Data<Node>) -> impl Responder {
    mined_response(web::block(move || node.mine_transactions()).await)
}

/// Abort a running mining search; the pending request fails with 503.
#[post("/mine/cancel/")]
pub async fn cancel_mining(node: web::Data<Node>) -> impl Responder {
    node.cancel_mining();
    HttpResponse::Accepted().finish()
}

/// Candidate chain pushed by a peer; adopted only if longer and valid.
#[post("/chain/replace/")]
pub async fn replace_chain(node: web::Data<Node>, body: web::Json<Vec<Block>>) -> impl Responder {
    let candidate = body.into_inner();
    let res = web::block(move || {
        node.receive_candidate_chain(candidate)
            .map(|()| node.chain_len())
    })
    .await;
    match res {
        Ok(Ok(length)) => HttpResponse::Ok().json(ReplaceResponse {
            replaced: true,
            length,
        }),
        Ok(Err(e)) => {
            warn!("POST /chain/replace/ - rejected: {e}");
            HttpResponse::Conflict().json(ErrorResponse::new(e))
        }
        Err(e) => HttpResponse::InternalServerError().json(ErrorResponse::new(e)),
    }
}

fn mined_response(
    res: Result<Result<(usize, Block), LedgerError>, actix_web::error::BlockingError>,
) -> HttpResponse {
    match res {
        Ok(Ok((mined_index, block))) => {
            let resp = MineResponse {
                mined_index,
                hash: block.hash,
                nonce: block.nonce,
                difficulty: block.difficulty,
            };
            info!(
                "MINER - sealed block #{} (hash={}, nonce={})",
                resp.mined_index, resp.hash, resp.nonce
            );
            HttpResponse::Ok().json(resp)
        }
        Ok(Err(e)) => HttpResponse::ServiceUnavailable().json(ErrorResponse::new(e)),
        Err(e) => HttpResponse::InternalServerError().json(ErrorResponse::new(e)),
    }
}

// Entries that parse as transactions are kept as such; anything else is
// mined as an opaque payload.
fn into_block_data(data: Value) -> Vec<BlockData> {
    let entry = |v: Value| match serde_json::from_value::<Transaction>(v.clone()) {
        Ok(tx) => BlockData::Transaction(tx),
        Err(_) => BlockData::Payload(v),
    };
    match data {
        Value::Array(items) => items.into_iter().map(entry).collect(),
        other => vec![entry(other)],
    }
}
