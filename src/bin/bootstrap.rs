// Lambda bootstrap entry point for the scheduled digest worker

use channel_digest::setup_logging;
use channel_digest::worker::function_handler;
use lambda_runtime::{Error, run, service_fn};

#[tokio::main]
async fn main() -> Result<(), Error> {
    setup_logging();

    run(service_fn(function_handler)).await
}
