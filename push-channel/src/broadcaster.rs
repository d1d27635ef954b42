use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use tokio::sync::watch;

use analytics_types::AnalyticsRecord;

pub const DEFAULT_CADENCE_HZ: f64 = 10.0;

/// Drives one WebSocket connection: wakes at `cadence` and pushes whatever
/// is currently the latest record, skipping frames in between. Never
/// blocks on a slow client beyond its own send; if the socket closes the
/// task exits.
pub async fn run_connection(
    mut socket: WebSocket,
    mut latest: watch::Receiver<Option<AnalyticsRecord>>,
    cadence: Duration,
) {
    let mut ticker = tokio::time::interval(cadence);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let record = latest.borrow_and_update().clone();
                let Some(record) = record else { continue };
                let payload = match serde_json::to_string(&record) {
                    Ok(payload) => payload,
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to encode analytics record for push channel");
                        continue;
                    }
                };
                if socket.send(Message::Text(payload.into())).await.is_err() {
                    return;
                }
            }
            incoming = socket.recv() => {
                // This channel is push-only; any client message is ignored.
                // `None` means the socket closed.
                if incoming.is_none() {
                    return;
                }
            }
        }
    }
}

pub fn cadence_from_hz(hz: f64) -> Duration {
    Duration::from_secs_f64(1.0 / hz.max(0.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cadence_from_ten_hz_is_a_tenth_of_a_second() {
        let cadence = cadence_from_hz(10.0);
        approx::assert_relative_eq!(cadence.as_secs_f64(), 0.1, max_relative = 1e-9);
    }
}
