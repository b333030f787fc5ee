use env_logger::Env;
use log::error;

use kart_core::GLOBAL_CONFIG;

mod game;
mod presenter;

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let ip_addr = format!("{}:{}", GLOBAL_CONFIG.server_address, GLOBAL_CONFIG.port);
    let result = game::GameClient::new(ip_addr).and_then(|mut client| client.start_loop());
    if let Err(e) = result {
        error!("game client stopped: {}", e);
        std::process::exit(1);
    }
}
