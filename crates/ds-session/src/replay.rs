//! Replay mode
//!
//! Feeds a recorded reply (JSON lines of `{"kind", "text"}`) through the
//! live renderer, pacing fragments the way a streaming response arrives.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use ds_core::{ChatFragment, Config, read_fragments};
use ds_display::{Console, StreamRenderer, TerminalSurface};
use futures::{Stream, StreamExt, stream};
use tracing::info;

/// Default pause between replayed fragments
pub const DEFAULT_DELAY_MS: u64 = 30;

/// Fragments as a stream, each one released after `delay`
fn paced(fragments: Vec<ChatFragment>, delay: Duration) -> impl Stream<Item = ChatFragment> {
    stream::iter(fragments).then(move |fragment| async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        fragment
    })
}

pub async fn run_replay(
    config: &Config,
    path: &Path,
    thinking: bool,
    delay: Duration,
) -> anyhow::Result<()> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let fragments = read_fragments(BufReader::new(file))
        .with_context(|| format!("Failed to read fragments from {}", path.display()))?;

    info!("Replaying {} fragments from {}", fragments.len(), path.display());

    let mut console = Console::stdout();
    console.print_response_start();

    let response = StreamRenderer::new(TerminalSurface::stdout(), thinking)
        .refresh_per_second(config.display.refresh_per_second)
        .run_stream(paced(fragments, delay))
        .await?;

    info!("Replay produced {} response chars", response.chars().count());

    console.print_goodbye();
    Ok(())
}
