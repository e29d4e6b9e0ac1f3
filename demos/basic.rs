use nuvix_realtime::{RealtimeClient, RealtimeConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let client = RealtimeClient::new(RealtimeConfig::new(
        "https://api.nuvix.in/v1",
        "my-project",
    ))?;

    println!("Subscribing to documents and files...");
    let subscription = client
        .subscribe(["documents", "files"], |event| {
            println!(
                "{:?} on {:?}: {}",
                event.events, event.channels, event.payload
            );
        })
        .await;

    // Keep receiving until interrupted
    tokio::signal::ctrl_c().await?;

    println!("Unsubscribing...");
    subscription.unsubscribe().await;

    Ok(())
}
