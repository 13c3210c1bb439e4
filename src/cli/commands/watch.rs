use futures::StreamExt;
use tracing::info;

use crate::cli::{
    CommandResult, SourceArgs,
    formatting::{format_entry, format_reload_header},
};

use super::open_provider;

pub(super) async fn execute(source: &SourceArgs, pattern: &str) -> CommandResult {
    let provider = open_provider(source, |options| options.reload_on_change(true))?;
    let mut reloads = Box::pin(provider.reloads_matching(pattern));

    println!("Watching '{}' for changes to '{}'...", provider.options().root_key, pattern);
    println!("Press Ctrl+C to stop");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            event = reloads.next() => {
                let Some(event) = event else {
                    break;
                };

                let clock = chrono::Local::now().format("%H:%M:%S%.3f").to_string();
                println!("{}", format_reload_header(&event, &clock));

                let data = provider.snapshot();
                for path in &event.changed_paths {
                    match data.get_entry(path) {
                        Some(value) => println!("  {}", format_entry(path, value)),
                        None => println!("  {path} (removed)"),
                    }
                }
            }
        }
    }

    info!("Stopping watch");
    provider.shutdown().await;

    Ok("Watch ended".to_string())
}
