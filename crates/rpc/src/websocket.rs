// rpc/src/websocket.rs

//! JSON-RPC over WebSocket, the only transport that can carry
//! `eth_subscribe` notifications.

use crate::server::RpcServer;
use futures::{SinkExt, StreamExt};
use hyper_tungstenite::tungstenite::Message;
use hyper_tungstenite::HyperWebsocket;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use transformer::RequestContext;

/// Drive one upgraded connection until either side closes it
pub async fn serve_connection(server: Arc<RpcServer>, socket: HyperWebsocket, addr: SocketAddr) {
    let stream = match socket.await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(%addr, error = %e, "WebSocket handshake failed");
            return;
        }
    };
    tracing::info!(%addr, "New WebSocket connection");

    let (mut sender, mut receiver) = stream.split();
    let (notification_tx, mut notification_rx) = mpsc::unbounded_channel::<String>();

    let notifier = server.agent().new_notifier(notification_tx);
    let shutdown = server.shutdown_token().child_token();
    let ctx = RequestContext::new(shutdown.clone()).with_notifier(notifier.clone());

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let Some(msg) = msg else { break };
                match msg {
                    Ok(Message::Text(text)) => {
                        let response = server.process_payload(text.as_bytes(), &ctx).await;
                        if let Err(e) = sender.send(Message::Text(response.to_string())).await {
                            tracing::error!(%addr, error = %e, "Failed to send response");
                            break;
                        }
                    }
                    Ok(Message::Binary(data)) => {
                        let response = server.process_payload(&data, &ctx).await;
                        if let Err(e) = sender.send(Message::Text(response.to_string())).await {
                            tracing::error!(%addr, error = %e, "Failed to send response");
                            break;
                        }
                    }
                    Ok(Message::Ping(data)) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            tracing::error!(%addr, error = %e, "Failed to send pong");
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        tracing::info!(%addr, "WebSocket close message");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(%addr, error = %e, "WebSocket error");
                        break;
                    }
                }
            }
            Some(notification) = notification_rx.recv() => {
                if let Err(e) = sender.send(Message::Text(notification)).await {
                    tracing::error!(%addr, error = %e, "Failed to send subscription notification");
                    break;
                }
            }
            _ = shutdown.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    let subscriptions = notifier.subscription_count();
    notifier.close();
    tracing::info!(%addr, subscriptions, "WebSocket connection closed");
}
