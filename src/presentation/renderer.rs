// Log renderer - prints the headline tiles whenever the buffer changes
use crate::application::buffer::DualSourceBuffer;
use crate::domain::dashboard::DashboardSnapshot;
use tokio_util::sync::CancellationToken;

pub fn render_tiles(snapshot: &DashboardSnapshot) -> String {
    snapshot
        .tiles()
        .iter()
        .map(|tile| format!("{}: {}", tile.title, tile.display_value()))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Log every snapshot until `shutdown` fires, then tear the buffer down.
pub async fn render_until(buffer: &DualSourceBuffer, shutdown: CancellationToken) {
    let mut updates = buffer.updates();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                tracing::info!(
                    raw_points = snapshot.raw.len(),
                    sliding_points = snapshot.sliding.len(),
                    "{}",
                    render_tiles(&snapshot)
                );
            }
        }
    }

    buffer.close();
}
