mod api;
mod config;
mod input;
mod logging;
mod relay;

use std::env;
use std::io;
use std::process::exit;
use tracing::info;

use api::ApiClient;
use config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    logging::init_tracing(logging::DEFAULT_FILTER);
    info!("Starting...");

    let args = config::message_words(env::args_os().skip(1));
    let outcome = relay::run(Config::from_env(), ApiClient::new, &args, || {
        io::read_to_string(io::stdin())
    })
    .await;

    // stdout is the only channel the calling process treats as the reply
    println!("{}", outcome);
    exit(outcome.exit_code());
}
