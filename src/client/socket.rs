use std::future::Future;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until};
use tracing::debug;
use uuid::Uuid;

use crate::client::{ActivityCache, Reconnect, ReconnectPolicy, Step, SyncStatus};
use crate::sync::Envelope;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect refused: {0}")]
    Refused(String),
    #[error("transport closed")]
    Closed,
}

/// Frame channels of one established connection. The driver owns this
/// exclusively; nothing else holds the transport.
#[derive(Debug)]
pub struct Link {
    pub tx: mpsc::UnboundedSender<String>,
    pub rx: mpsc::UnboundedReceiver<String>,
}

/// Network seam for the device side, mockable in tests. A connection is
/// closed when its receiving half yields `None`.
pub trait Transport: Send {
    fn connect(&mut self) -> impl Future<Output = Result<Link, TransportError>> + Send;
}

#[derive(Debug)]
pub enum Command {
    Connect,
    Disconnect,
    Send(Envelope),
}

/// Drives one device's connection: reconciles inbound frames into the cache
/// and reconnects with a fixed delay, up to the policy's attempt cap.
pub struct SyncClient<T: Transport> {
    transport: T,
    machine: Reconnect,
    cache: ActivityCache,
    status_tx: watch::Sender<SyncStatus>,
}

impl<T: Transport> SyncClient<T> {
    pub fn new(
        device_id: Uuid,
        transport: T,
        policy: ReconnectPolicy,
    ) -> (Self, watch::Receiver<SyncStatus>) {
        let (status_tx, status_rx) = watch::channel(SyncStatus::Disconnected);

        (
            Self {
                transport,
                machine: Reconnect::new(policy),
                cache: ActivityCache::new(device_id),
                status_tx,
            },
            status_rx,
        )
    }

    /// Runs until the command channel closes; returns the final cache.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) -> ActivityCache {
        let mut link: Option<Link> = None;
        // The single pending retry timer, if any.
        let mut retry_at: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;

                frame = recv_frame(&mut link) => match frame {
                    Some(frame) => self.on_frame(&frame),
                    None => {
                        link = None;
                        self.step_after_close(&mut retry_at);
                    }
                },

                _ = sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                    retry_at = None;
                    link = self.attempt(&mut retry_at).await;
                }

                command = commands.recv() => match command {
                    Some(Command::Connect) => {
                        if link.is_none() {
                            retry_at = None;
                            self.machine.on_connect_requested();
                            link = self.attempt(&mut retry_at).await;
                        }
                    }
                    Some(Command::Disconnect) => {
                        retry_at = None;
                        link = None;
                        self.machine.on_disconnect_requested();
                        self.publish_status();
                    }
                    Some(Command::Send(envelope)) => self.send(&link, &envelope),
                    None => break,
                },
            }
        }

        self.cache
    }

    async fn attempt(&mut self, retry_at: &mut Option<Instant>) -> Option<Link> {
        self.machine.begin_attempt();
        self.publish_status();

        match self.transport.connect().await {
            Ok(link) => {
                self.machine.on_open();
                self.publish_status();
                Some(link)
            }
            Err(err) => {
                debug!("connect attempt failed: {err}");
                self.machine.on_error();
                self.publish_status();
                self.step_after_close(retry_at);
                None
            }
        }
    }

    fn step_after_close(&mut self, retry_at: &mut Option<Instant>) {
        match self.machine.on_close() {
            Step::RetryAfter(delay) => *retry_at = Some(Instant::now() + delay),
            Step::GiveUp => debug!("retry budget exhausted, staying disconnected"),
        }
        self.publish_status();
    }

    fn on_frame(&mut self, frame: &str) {
        match Envelope::decode(frame.as_bytes()) {
            Ok(envelope) => {
                self.cache.apply(&envelope);
            }
            Err(err) => debug!("discarding malformed frame: {err}"),
        }
    }

    fn send(&self, link: &Option<Link>, envelope: &Envelope) {
        // Sends while offline are dropped.
        let Some(link) = link else { return };

        match envelope.encode() {
            Ok(frame) => {
                let _ = link.tx.send(frame);
            }
            Err(err) => debug!("failed to encode outbound frame: {err}"),
        }
    }

    fn publish_status(&self) {
        let _ = self.status_tx.send(self.machine.status());
    }
}

async fn recv_frame(link: &mut Option<Link>) -> Option<String> {
    match link {
        Some(link) => link.rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::db::{Activity, ActivityKind};
    use crate::sync::Action;

    fn stub_link() -> (
        Link,
        mpsc::UnboundedSender<String>,
        mpsc::UnboundedReceiver<String>,
    ) {
        let (server_tx, client_rx) = mpsc::unbounded_channel();
        let (client_tx, server_rx) = mpsc::unbounded_channel();

        (
            Link {
                tx: client_tx,
                rx: client_rx,
            },
            server_tx,
            server_rx,
        )
    }

    struct ScriptedTransport {
        links: VecDeque<Link>,
        attempts: Arc<AtomicU32>,
    }

    impl ScriptedTransport {
        fn new(links: Vec<Link>) -> (Self, Arc<AtomicU32>) {
            let attempts = Arc::new(AtomicU32::new(0));
            (
                Self {
                    links: links.into(),
                    attempts: Arc::clone(&attempts),
                },
                attempts,
            )
        }
    }

    impl Transport for ScriptedTransport {
        async fn connect(&mut self) -> Result<Link, TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.links
                .pop_front()
                .ok_or_else(|| TransportError::Refused("nobody home".to_owned()))
        }
    }

    fn activity(started_at: i64) -> Activity {
        Activity {
            id: Uuid::now_v7(),
            family_id: Uuid::now_v7(),
            kind: ActivityKind::Feeding,
            data: serde_json::json!({ "feedType": "bottle" }),
            started_at,
            ended_at: None,
            created_by: None,
            created_at: started_at,
        }
    }

    #[tokio::test]
    async fn connect_applies_inbound_frames() {
        let (link, server_tx, mut server_rx) = stub_link();
        let (transport, _) = ScriptedTransport::new(vec![link]);

        let device_id = Uuid::now_v7();
        let (client, status_rx) = SyncClient::new(device_id, transport, ReconnectPolicy::default());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let driver = tokio::spawn(client.run(cmd_rx));

        cmd_tx.send(Command::Connect).unwrap();

        let a = activity(1000);
        let b = activity(2000);
        server_tx
            .send(Envelope::sync(vec![b.clone(), a.clone()]).encode().unwrap())
            .unwrap();

        let c = activity(3000);
        server_tx
            .send(
                Envelope::activity(Action::Create, c.clone(), Some(Uuid::now_v7()))
                    .encode()
                    .unwrap(),
            )
            .unwrap();

        // Outbound frames flow to the server side.
        cmd_tx
            .send(Command::Send(Envelope::activity(
                Action::Create,
                activity(4000),
                Some(device_id),
            )))
            .unwrap();

        drop(cmd_tx);
        let cache = driver.await.unwrap();

        assert_eq!(*status_rx.borrow(), SyncStatus::Connected);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(c.id).unwrap().started_at, 3000);

        let outbound = server_rx.recv().await.unwrap();
        assert!(outbound.contains("\"action\":\"create\""));
    }

    #[tokio::test]
    async fn gives_up_after_the_retry_budget() {
        let (transport, attempts) = ScriptedTransport::new(vec![]);

        let policy = ReconnectPolicy {
            delay: Duration::ZERO,
            max_attempts: 5,
        };
        let (client, status_rx) = SyncClient::new(Uuid::now_v7(), transport, policy);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let driver = tokio::spawn(client.run(cmd_rx));

        cmd_tx.send(Command::Connect).unwrap();

        // Initial attempt plus five retries, then it stays down.
        while attempts.load(Ordering::SeqCst) < 6 {
            tokio::task::yield_now().await;
        }
        tokio::task::yield_now().await;

        drop(cmd_tx);
        driver.await.unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 6);
        assert_eq!(*status_rx.borrow(), SyncStatus::Disconnected);
    }

    #[tokio::test]
    async fn self_echo_never_lands_in_the_cache() {
        let (link, server_tx, _server_rx) = stub_link();
        let (transport, _) = ScriptedTransport::new(vec![link]);

        let device_id = Uuid::now_v7();
        let (client, _) = SyncClient::new(device_id, transport, ReconnectPolicy::default());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let driver = tokio::spawn(client.run(cmd_rx));

        cmd_tx.send(Command::Connect).unwrap();
        server_tx
            .send(
                Envelope::activity(Action::Create, activity(1000), Some(device_id))
                    .encode()
                    .unwrap(),
            )
            .unwrap();

        drop(cmd_tx);
        let cache = driver.await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn manual_disconnect_cancels_the_pending_retry() {
        let (transport, attempts) = ScriptedTransport::new(vec![]);

        let policy = ReconnectPolicy {
            delay: Duration::from_secs(60),
            max_attempts: 5,
        };
        let (client, status_rx) = SyncClient::new(Uuid::now_v7(), transport, policy);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let driver = tokio::spawn(client.run(cmd_rx));

        cmd_tx.send(Command::Connect).unwrap();
        while attempts.load(Ordering::SeqCst) < 1 {
            tokio::task::yield_now().await;
        }

        // The 60s retry timer is pending; disconnect instead of waiting it out.
        cmd_tx.send(Command::Disconnect).unwrap();
        drop(cmd_tx);
        driver.await.unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(*status_rx.borrow(), SyncStatus::Disconnected);
    }
}
