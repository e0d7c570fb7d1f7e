use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::messages::{PortMessage, PortRequest};
use crate::application::services::bridge::Bridge;
use crate::bootstrap::app_context::AppContext;
use crate::domain::bridge::{DeliveryMode, Request};
use crate::infrastructure::outbound::ChannelResponsePublisher;

#[utoipa::path(
    get,
    path = "/api/ports",
    responses(
        (status = 101, description = "Switching Protocols (WebSocket upgrade)")
    ),
    tag = "Ports"
)]
pub async fn port_socket_entry(
    ws: WebSocketUpgrade,
    State(ctx): State<AppContext>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| port_session(socket, ctx))
}

// One bridge per socket. Bridge deliveries and direct replies share a single
// channel so the client sees them in publish order.
async fn port_session(socket: WebSocket, ctx: AppContext) {
    let session = Uuid::new_v4();
    tracing::debug!(%session, "port_session_opened");

    let (mut sink, mut stream) = socket.split();
    let (publisher, mut outbound) = ChannelResponsePublisher::<PortMessage>::channel();
    let replies = publisher.sender();
    let bridge = ctx.open_bridge(Arc::new(publisher));

    let writer = tokio::spawn(async move {
        while let Some(msg) = outbound.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(%session, error = %e, "port_message_encode_failed");
                    continue;
                }
            };
            if sink.send(AxumMessage::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(AxumMessage::Text(text)) => handle_text(&bridge, &replies, &text).await,
            Ok(AxumMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(%session, error = %e, "port_session_read_failed");
                break;
            }
        }
    }

    let detached = bridge.detach_all().await;
    writer.abort();
    tracing::info!(%session, detached, "port_session_closed");
}

async fn handle_text(bridge: &Bridge, replies: &mpsc::UnboundedSender<PortMessage>, text: &str) {
    let msg = match serde_json::from_str::<PortRequest>(text) {
        Ok(msg) => msg,
        Err(e) => {
            let _ = replies.send(PortMessage::Error {
                message: format!("malformed port message: {e}"),
            });
            return;
        }
    };
    match msg {
        PortRequest::RequestItem { id, mode } => {
            submit(bridge, Request::item(id.into_string()), mode).await;
        }
        PortRequest::RequestFeed { name, mode } => {
            submit(bridge, Request::feed(name), mode).await;
        }
        PortRequest::Detach { subscription } => {
            let reply = if bridge.detach(subscription).await {
                PortMessage::Detached { subscription }
            } else {
                PortMessage::Error {
                    message: format!("no active subscription {subscription}"),
                }
            };
            let _ = replies.send(reply);
        }
    }
}

async fn submit(bridge: &Bridge, request: Request, mode: Option<DeliveryMode>) {
    match mode {
        Some(mode) => bridge.request_with_mode(request, mode).await,
        None => bridge.request(request).await,
    };
}
