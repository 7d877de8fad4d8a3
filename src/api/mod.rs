mod balance;
mod chain;
mod health;
pub mod models;
mod tx;
mod wallet;

use actix_web::web::{self, ServiceConfig};

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(chain::get_chain)
            .service(chain::validate_chain)
            .service(chain::mine_block)
            .service(chain::mine_transactions)
            .service(chain::cancel_mining)
            .service(chain::replace_chain)
            .service(tx::post_transact)
            .service(tx::get_pool)
            .service(tx::post_receive)
            .service(balance::get_balance)
            .service(balance::get_wallet_info)
            .service(wallet::create_wallet),
    );
}
