use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;
use uuid::Uuid;

/// Sending half of one live connection. Pushes never block; the socket task
/// drains queued frames into the transport.
pub type ConnectionTx = mpsc::UnboundedSender<String>;

/// Maps a family id to its set of live connections. Rooms are created on
/// first join and reaped when the last member leaves.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<Uuid, HashMap<Uuid, ConnectionTx>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, family_id: Uuid, connection_id: Uuid, tx: ConnectionTx) {
        self.rooms
            .lock()
            .unwrap()
            .entry(family_id)
            .or_default()
            .insert(connection_id, tx);
    }

    /// Idempotent; absent rooms and members are fine.
    pub fn leave(&self, family_id: Uuid, connection_id: Uuid) {
        let mut rooms = self.rooms.lock().unwrap();
        if let Some(room) = rooms.get_mut(&family_id) {
            room.remove(&connection_id);
            if room.is_empty() {
                rooms.remove(&family_id);
            }
        }
    }

    pub fn room_size(&self, family_id: Uuid) -> usize {
        self.rooms
            .lock()
            .unwrap()
            .get(&family_id)
            .map_or(0, HashMap::len)
    }

    /// Delivers `frame` to every live member of the family's room except
    /// `exclude`, over a point-in-time snapshot of the membership. Dead
    /// connections are skipped. Returns the number of deliveries.
    pub fn broadcast(&self, family_id: Uuid, frame: &str, exclude: Option<Uuid>) -> usize {
        let members: Vec<ConnectionTx> = {
            let rooms = self.rooms.lock().unwrap();
            let Some(room) = rooms.get(&family_id) else {
                return 0;
            };
            room.iter()
                .filter(|(id, _)| Some(**id) != exclude)
                .map(|(_, tx)| tx.clone())
                .collect()
        };

        let mut delivered = 0;
        for tx in members {
            if tx.send(frame.to_owned()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}
