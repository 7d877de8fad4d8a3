mod api;
mod blockchain;
mod config;
mod error;
mod node;
mod transaction;
mod util;
mod wallet;

use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::info;

use config::NodeConfig;
use node::{LogBroadcaster, Node};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let config = NodeConfig::from_env();
    let node = web::Data::new(Node::new(&config, Box::new(LogBroadcaster)));
    let (address, balance) = node.wallet_info();

    info!(
        "⛓️ Starting ledger node at http://{}:{} (wallet {address}, balance {balance})",
        config.host, config.port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(node.clone())
            .configure(api::init_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
