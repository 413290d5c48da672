use std::time::Duration;

use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use marquee_engagement::{Session, Subscription};
use marquee_types::events::LiveEvent;

use crate::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Streams live events over a WebSocket. The live service runs for as long
/// as at least one socket is open.
pub async fn live_upgrade(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let subscription = state.engagement.live.subscribe();
    ws.on_upgrade(move |socket| relay(socket, subscription, session.user_id()))
}

/// Notifications go only to their recipient; everything else is public.
fn visible_to(event: &LiveEvent, viewer: Option<Uuid>) -> bool {
    match event {
        LiveEvent::Notification(n) => viewer == Some(n.owner_id),
        _ => true,
    }
}

async fn relay(socket: WebSocket, mut subscription: Subscription, viewer: Option<Uuid>) {
    let (mut sender, mut receiver) = socket.split();
    info!("Live socket opened (viewer {:?})", viewer);

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else { break };
                if !visible_to(&event, viewer) {
                    continue;
                }
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to encode live event: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            msg = receiver.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = heartbeat.tick() => {
                if sender.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }
        }
    }

    debug!("Live socket closed (viewer {:?})", viewer);
}
