//! One client connection: read requests, answer them in order.

use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;
use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use crate::core::{RequestCoordinator, ResponseSink, SimulationBackend};
use crate::models::{ErrorReply, FeeResult};
use crate::utils::{FeeForkError, Result};

/// Reason carried by the close frame when the server ends a connection.
pub const CLOSE_ACK: &str = "Ok!";

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Writes fee results as JSON text frames.
struct WsResponder<'a> {
    sink: &'a mut WsSink,
}

#[async_trait]
impl ResponseSink for WsResponder<'_> {
    async fn send_fee(&mut self, result: &FeeResult) -> Result<()> {
        let json = serde_json::to_string(result)?;
        self.sink.send(Message::Text(json)).await?;
        Ok(())
    }
}

async fn close(sink: &mut WsSink, code: CloseCode, reason: &'static str) -> Result<()> {
    let frame = CloseFrame {
        code,
        reason: Cow::Borrowed(reason),
    };
    sink.send(Message::Close(Some(frame))).await?;
    Ok(())
}

/// Serve one upgraded connection until the client leaves, sends something
/// unusable, or `shutdown` fires.
pub async fn handle_connection<B>(
    ws: WebSocketStream<TcpStream>,
    peer: SocketAddr,
    coordinator: Arc<RequestCoordinator<B>>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    B: SimulationBackend,
{
    let (mut sink, mut stream) = ws.split();
    tracing::info!(%peer, "client connected");

    loop {
        tokio::select! {
            message = stream.next() => {
                let text = match message {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Binary(_))) => {
                        reject(&mut sink, peer, "binary frames are not supported").await?;
                        break;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!(%peer, ?frame, "client closed connection");
                        // The close reply is only written on the next read.
                        while let Some(Ok(_)) = stream.next().await {}
                        break;
                    }
                    // Ping/pong are answered by the protocol layer.
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::warn!(%peer, "WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                };

                tracing::debug!(%peer, "Gotten {}", text);
                let mut responder = WsResponder { sink: &mut sink };
                match coordinator.serve_message(&text, &mut responder).await {
                    Ok(_) => {}
                    Err(FeeForkError::MalformedRequest(reason)) => {
                        reject(&mut sink, peer, &reason).await?;
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    close(&mut sink, CloseCode::Normal, CLOSE_ACK).await?;
                    break;
                }
            }
        }
    }

    tracing::info!(%peer, "client disconnected");
    Ok(())
}

/// Tell the client why, then drop the connection.
async fn reject(sink: &mut WsSink, peer: SocketAddr, reason: &str) -> Result<()> {
    tracing::warn!(%peer, "rejecting malformed request: {}", reason);

    let reply = ErrorReply {
        error: format!("malformed request: {}", reason),
    };
    sink.send(Message::Text(serde_json::to_string(&reply)?)).await?;
    close(sink, CloseCode::Invalid, "malformed request").await
}
