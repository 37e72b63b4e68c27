mod catalog;
mod config;
mod conflicts;
mod constraints;
mod data;
mod error;
mod scoring;
mod search;
mod server;
mod solver;
#[cfg(test)]
mod test_support;

use log::error;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match config::AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Could not load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server::run_server(config).await {
        error!("Server stopped: {}", e);
        std::process::exit(1);
    }
}
