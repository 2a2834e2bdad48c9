use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::sync::{self, ConnectionTx, Envelope, RoomRegistry};

/// `familyId` is mandatory; a request without it never upgrades (the Query
/// extractor rejects it with a 400). Devices that don't announce themselves
/// get a throwaway id for the session.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WsParams {
    family_id: Uuid,
    device_id: Option<Uuid>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn family_ws(
    Query(WsParams {
        family_id,
        device_id,
    }): Query<WsParams>,
    State(db_pool): State<SqlitePool>,
    State(registry): State<Arc<RoomRegistry>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let device_id = device_id.unwrap_or_else(Uuid::now_v7);

    ws.on_upgrade(move |socket| handle_socket(socket, db_pool, registry, family_id, device_id))
}

/// Connection lifecycle: register and snapshot on open, stamp-and-relay per
/// message, deregister on close.
async fn handle_socket(
    socket: WebSocket,
    db_pool: SqlitePool,
    registry: Arc<RoomRegistry>,
    family_id: Uuid,
    device_id: Uuid,
) {
    let connection_id = Uuid::now_v7();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    registry.join(family_id, connection_id, tx.clone());
    info!(%family_id, %device_id, "device joined");

    if let Err(err) = send_snapshot(&db_pool, family_id, &tx).await {
        // Degraded join: the device still receives live updates.
        warn!(%family_id, "initial snapshot failed: {err}");
    }

    let forward_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        handle_inbound(&registry, family_id, device_id, connection_id, &msg.into_data());
    }

    registry.leave(family_id, connection_id);
    info!(%family_id, %device_id, "device left");
    forward_task.abort();
}

/// Relays one inbound frame to the rest of the family, stamping the sender's
/// device id over whatever the device claimed. Malformed frames are dropped
/// without closing the session.
pub fn handle_inbound(
    registry: &RoomRegistry,
    family_id: Uuid,
    device_id: Uuid,
    connection_id: Uuid,
    frame: &[u8],
) {
    let envelope = match Envelope::decode(frame) {
        Ok(envelope) => envelope,
        Err(err) => {
            debug!(%device_id, "discarding malformed frame: {err}");
            return;
        }
    };

    match envelope {
        Envelope::Activity { action, data, .. } => {
            let stamped = Envelope::activity(action, data, Some(device_id));
            match stamped.encode() {
                Ok(frame) => {
                    registry.broadcast(family_id, &frame, Some(connection_id));
                }
                Err(err) => warn!(%device_id, "failed to encode relay frame: {err}"),
            }
        }
        Envelope::Sync { .. } | Envelope::Unknown => {
            debug!(%device_id, "ignoring non-relayable frame");
        }
    }
}

async fn send_snapshot(
    db_pool: &SqlitePool,
    family_id: Uuid,
    tx: &ConnectionTx,
) -> anyhow::Result<()> {
    let frame = sync::snapshot(db_pool, family_id).await?.encode()?;
    tx.send(frame)?;
    Ok(())
}
