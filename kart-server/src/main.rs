use env_logger::Env;
use log::error;

use kart_core::GLOBAL_CONFIG;

mod checkpoints;
mod game;
mod progress;

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    // kick off the game loop
    let ip_addr = format!("0.0.0.0:{}", GLOBAL_CONFIG.port);
    let result = game::GameServer::new(ip_addr).and_then(|mut server| server.start_loop());
    if let Err(e) = result {
        error!("game server stopped: {}", e);
        std::process::exit(1);
    }
}
