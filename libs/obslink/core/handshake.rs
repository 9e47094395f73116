//! Identification handshake
//!
//! Exactly two sends and two receives before any other traffic is
//! meaningful: read Hello (op 0), send Identify (op 1) with the protocol
//! version and event-subscription bitmask, read Identified (op 2). Anything
//! else — wrong op, malformed frame, close, stream end — is a uniform
//! handshake failure. Retry is the supervisor's job, not this module's.

use crate::core::config::ClientConfig;
use crate::core::frame::{Frame, Identify, OpCode};
use crate::traits::{ObsLinkError, Result};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

pub(crate) type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Run the Hello → Identify → Identified exchange on an open transport
pub(crate) async fn identify(ws: &mut WsStream, config: &ClientConfig) -> Result<()> {
    let hello = recv_frame(ws).await?;
    if hello.op != OpCode::Hello {
        return Err(ObsLinkError::Handshake(format!(
            "expected Hello, got {:?}",
            hello.op
        )));
    }
    debug!("received hello frame");

    let identify = Frame::identify(&Identify {
        rpc_version: config.rpc_version(),
        event_subscriptions: config.event_subscriptions(),
    })
    .and_then(|frame| frame.encode())
    .map_err(|e| ObsLinkError::Handshake(e.to_string()))?;

    ws.send(Message::Text(identify))
        .await
        .map_err(|e| ObsLinkError::Handshake(format!("failed to send identify: {}", e)))?;
    debug!("sent identify frame");

    let identified = recv_frame(ws).await?;
    if identified.op != OpCode::Identified {
        return Err(ObsLinkError::Handshake(format!(
            "expected Identified, got {:?}",
            identified.op
        )));
    }
    debug!("identification confirmed");

    Ok(())
}

/// Read the next text frame, skipping transport control messages
async fn recv_frame(ws: &mut WsStream) -> Result<Frame> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return Frame::decode(&text).map_err(|e| ObsLinkError::Handshake(e.to_string()));
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) => {
                return Err(ObsLinkError::Handshake(
                    "transport closed during handshake".to_string(),
                ));
            }
            Some(Ok(other)) => {
                return Err(ObsLinkError::Handshake(format!(
                    "unexpected non-text frame during handshake: {:?}",
                    other
                )));
            }
            Some(Err(e)) => return Err(ObsLinkError::Handshake(e.to_string())),
            None => {
                return Err(ObsLinkError::Handshake(
                    "stream ended during handshake".to_string(),
                ));
            }
        }
    }
}
