//! Simulated price publisher
//!
//! Emits random buy/sell events for each subject on a fixed tick, the same
//! traffic shape the upstream stock publisher produces.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use stockflow_core::{Event, EventKind};

/// Prices are drawn uniformly from `[MIN_PRICE, MIN_PRICE + PRICE_SPREAD)`
pub const MIN_PRICE: f64 = 50.0;
pub const PRICE_SPREAD: f64 = 500.0;

/// Random event for `subject`
pub fn random_event<R: Rng + ?Sized>(rng: &mut R, subject: &str) -> Event {
    let kinds = EventKind::all();
    let kind = kinds[rng.gen_range(0..kinds.len())];
    let price = MIN_PRICE + rng.gen::<f64>() * PRICE_SPREAD;
    Event::new(subject, kind, price)
}

pub struct SimulatedPublisher {
    subjects: Vec<String>,
    interval: Duration,
    limit: Option<usize>,
}

impl SimulatedPublisher {
    pub fn new(subjects: Vec<String>, interval: Duration) -> Self {
        Self {
            subjects,
            interval,
            limit: None,
        }
    }

    /// Stop each subject after `limit` events
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Start one task per subject. Each task ends when its limit is reached
    /// or the receiving side goes away.
    pub fn spawn(self, tx: mpsc::Sender<Vec<u8>>) -> Vec<JoinHandle<()>> {
        self.subjects
            .into_iter()
            .map(|subject| {
                let tx = tx.clone();
                let interval = self.interval;
                let limit = self.limit;
                tokio::spawn(async move {
                    publish(subject, interval, limit, tx).await;
                })
            })
            .collect()
    }
}

async fn publish(
    subject: String,
    interval: Duration,
    limit: Option<usize>,
    tx: mpsc::Sender<Vec<u8>>,
) {
    let mut rng = StdRng::from_entropy();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Publishing {} every {:?}", subject, interval);
    let mut sent = 0usize;

    while limit.map_or(true, |limit| sent < limit) {
        ticker.tick().await;

        let event = random_event(&mut rng, &subject);
        let payload = match serde_json::to_vec(&event) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode {} event: {}", subject, e);
                continue;
            }
        };

        if tx.send(payload).await.is_err() {
            debug!("Receiver for {} closed", subject);
            break;
        }
        sent += 1;
    }

    info!("Publisher for {} stopped after {} events", subject, sent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockflow_core::decode;

    #[test]
    fn test_random_event_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let event = random_event(&mut rng, "AAPL");
            assert_eq!(event.subject, "AAPL");
            assert!(event.price >= MIN_PRICE && event.price < MIN_PRICE + PRICE_SPREAD);
        }
    }

    #[tokio::test]
    async fn test_publisher_respects_limit() {
        let (tx, mut rx) = mpsc::channel(64);
        let handles = SimulatedPublisher::new(
            vec!["MSFT".to_string(), "TSLA".to_string()],
            Duration::from_millis(1),
        )
        .with_limit(5)
        .spawn(tx);

        for handle in handles {
            handle.await.unwrap();
        }

        let mut received = vec![];
        while let Some(payload) = rx.recv().await {
            received.push(decode(&payload).unwrap());
        }

        assert_eq!(received.len(), 10);
        assert_eq!(received.iter().filter(|e| e.subject == "MSFT").count(), 5);
    }

    #[tokio::test]
    async fn test_publisher_stops_when_receiver_drops() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let handles = SimulatedPublisher::new(vec!["MSFT".to_string()], Duration::from_millis(1))
            .spawn(tx);
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
