mod worker;

use std::sync::Arc;
use std::time::Duration;

use coordinator_config::Config;
use coordinator_core::default_reader::DefaultReaderFactory;
use coordinator_core::Coordinator;
use tokio::time::sleep;
use tracing::info;
use transport_core::{Message, QueueAddress, Transport};
use transport_inmemory::{InMemoryBus, InMemoryTransport};

pub use worker::LoggingMessageWorker;

const DEMO_QUEUE: &str = "demo-queue";

/// Runs the coordinator against an in-memory transport, trickling a handful
/// of synthetic messages into the queue so the pool actually has something to
/// grow on, until either `duration` elapses or the process receives Ctrl-C.
pub async fn run(config: Config, duration: Option<Duration>) {
    let address = QueueAddress::new(DEMO_QUEUE);
    let bus = InMemoryBus::new();
    let transport = InMemoryTransport::new(bus, address);
    let message_worker = Arc::new(LoggingMessageWorker::default());

    let reader_factory = Arc::new(DefaultReaderFactory::new(
        Arc::new(transport.clone()) as Arc<dyn Transport>,
        message_worker.clone(),
    ));

    let coordinator = Arc::new(Coordinator::new(
        "demo-coordinator",
        config.coordinator.max_workers,
        config.coordinator.max_read_parallelism,
        config.coordinator.shutdown_timeout,
        config.coordinator.stop_grace_period,
        reader_factory,
    ));

    coordinator.start();
    info!(
        max_workers = config.coordinator.max_workers,
        "coordinator started"
    );

    let producer = tokio::spawn(produce_messages(transport, coordinator.token()));

    match duration {
        Some(duration) => {
            tokio::select! {
                _ = sleep(duration) => {
                    info!(?duration, "demo duration elapsed");
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("received Ctrl-C");
                }
            }
        }
        None => {
            let _ = tokio::signal::ctrl_c().await;
            info!("received Ctrl-C");
        }
    }

    producer.abort();
    coordinator.dispose().await;

    info!(
        processed = message_worker.processed_count(),
        "demo finished"
    );
}

/// Publishes one message every 200ms, simulating a slow but steady producer.
async fn produce_messages(transport: InMemoryTransport, token: tokio_util::sync::CancellationToken) {
    let mut counter: u64 = 0;

    loop {
        if token.is_cancelled() {
            return;
        }

        counter += 1;
        let payload = format!("message #{counter}");
        if transport.publish(Message::new(payload)).await.is_err() {
            return;
        }

        sleep(Duration::from_millis(200)).await;
    }
}

/// Prints the fully resolved configuration the demo would run with.
pub fn show_config(config: &Config) {
    println!("coordinator:");
    println!("  max_workers           = {}", config.coordinator.max_workers);
    println!(
        "  max_read_parallelism  = {}",
        config.coordinator.max_read_parallelism
    );
    println!(
        "  shutdown_timeout      = {:?}",
        config.coordinator.shutdown_timeout
    );
    println!(
        "  stop_grace_period     = {:?}",
        config.coordinator.stop_grace_period
    );
    println!("logging:");
    println!(
        "  filter_directives     = {}",
        config.logging.filter_directives
    );
}
