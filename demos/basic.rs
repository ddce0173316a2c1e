use std::sync::Arc;

use machine_inventory::{Dispatcher, InMemoryStore, InventoryService, MachineDraft, NotifierConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("machine_inventory=debug,basic=info")),
        )
        .init();

    let config = NotifierConfig::from_env()?;
    tracing::info!(url = %config.notification_url, "Loaded notifier configuration");

    let dispatcher = Arc::new(Dispatcher::new(
        config.dispatcher.clone(),
        config.build_transport()?,
    ));
    let service = InventoryService::new(Arc::new(InMemoryStore::new()), dispatcher.clone())
        .with_trigger(config.trigger);

    // The third machine for `abc` crosses the threshold.
    for n in 1..=3 {
        let draft = MachineDraft::new(
            format!("00:1a:2b:3c:4d:{n:02x}"),
            format!("laptop-{n}"),
            format!("10.0.0.{n}"),
        )
        .with_owner("abc");

        let machine = service.create_machine(draft).await?;
        tracing::info!(id = %machine.id, "created machine");
    }

    dispatcher.shutdown().await;
    tracing::info!(stats = ?dispatcher.stats(), "dispatcher drained");
    Ok(())
}
