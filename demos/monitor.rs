use std::env;
use std::sync::Arc;

use carrier_infinity::{
    DeltaMerger, InfinityClient, JournalMode, MessageJournal, RealtimeChannel, RealtimeConfig,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> carrier_infinity::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let (Some(username), Some(password)) = (args.get(1), args.get(2)) else {
        eprintln!("usage: monitor <username> <password> [--journal <path>]");
        std::process::exit(2);
    };
    let journal_path = args
        .iter()
        .position(|a| a == "--journal")
        .and_then(|i| args.get(i + 1));

    let mut builder = InfinityClient::builder(username, password);
    let mut merger_journal = None;
    if let Some(path) = journal_path {
        let journal = Arc::new(MessageJournal::open(JournalMode::Diffed, path)?);
        builder = builder.journal(Arc::clone(&journal));
        merger_journal = Some(journal);
    }
    let client = builder.build()?;

    client.login().await?;
    let systems = client.load_systems().await?;
    for system in &systems {
        println!(
            "{} ({}) | mode: {:?}",
            system.name().unwrap_or("unnamed"),
            system.serial(),
            system.config.mode,
        );
    }

    let mut merger = DeltaMerger::new(systems).on_update(|system| {
        for zone in &system.status.zones {
            println!(
                "[{} / zone {}] {}\u{00b0} {}% | {:?} | fan: {:?}{}",
                system.serial(),
                zone.id,
                zone.temperature.map(|t| format!("{t:.0}")).unwrap_or_else(|| "-".into()),
                zone.humidity.map(|h| h.to_string()).unwrap_or_else(|| "-".into()),
                zone.current_activity,
                zone.fan,
                if zone.hold { " | HOLD" } else { "" },
            );
        }
    });
    if let Some(journal) = merger_journal {
        merger = merger.journal(journal);
    }
    let merger = Arc::new(merger);

    let channel = RealtimeChannel::new(client.clone(), RealtimeConfig::default());
    channel.add_handler(merger.handler());
    client.attach_realtime(channel.sender());

    let cancel = CancellationToken::new();
    let listener = channel.spawn(cancel.clone());
    println!("Listening for updates, Ctrl-C to stop...");

    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("Signal error: {e}");
    }
    cancel.cancel();
    let _ = listener.await;
    Ok(())
}
