use super::{ConnectParams, Transport, TransportEvent, TransportFactory};
use crate::types::{error::Result, RealtimeError, QUERY_CHANNELS, QUERY_PROJECT};
use async_trait::async_trait;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};
use url::Url;

const EVENT_BUFFER: usize = 64;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Production transport factory backed by tokio-tungstenite.
///
/// tungstenite has no built-in reconnection, so the `reconnection` flag in
/// [`ConnectParams`] needs no handling here.
pub struct WebSocketFactory;

struct WebSocketTransport {
    write: RwLock<Option<WsSink>>,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&self, text: String) -> Result<()> {
        let mut guard = self.write.write().await;
        match guard.as_mut() {
            Some(sink) => {
                sink.send(Message::Text(text.into())).await?;
                Ok(())
            }
            None => Err(RealtimeError::NotConnected),
        }
    }

    async fn disconnect(&self) {
        let mut guard = self.write.write().await;
        if let Some(sink) = guard.as_mut() {
            if let Err(e) = sink.close().await {
                tracing::debug!("WebSocket close failed: {}", e);
            }
        }
        *guard = None;
    }
}

#[async_trait]
impl TransportFactory for WebSocketFactory {
    async fn connect(
        &self,
        url: &str,
        params: &ConnectParams,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>)> {
        let mut url = Url::parse(url)?;
        url.query_pairs_mut()
            .append_pair(QUERY_PROJECT, &params.project)
            .append_pair(QUERY_CHANNELS, &params.channels);

        tracing::debug!("opening WebSocket connection to {}", url);
        let (stream, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
        let (write, mut read) = stream.split();

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(async move {
            let mut reason = String::from("connection closed");
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if tx
                            .send(TransportEvent::Message(text.to_string()))
                            .await
                            .is_err()
                        {
                            // Receiver gone, the connection was torn down.
                            return;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        if let Some(frame) = frame {
                            reason = frame.reason.to_string();
                        }
                        break;
                    }
                    // Ping/pong are handled by tungstenite; binary frames are
                    // not part of the protocol.
                    Ok(_) => {}
                    Err(e) => {
                        reason = e.to_string();
                        break;
                    }
                }
            }
            let _ = tx.send(TransportEvent::Disconnected(reason)).await;
        });

        let transport = WebSocketTransport {
            write: RwLock::new(Some(write)),
        };
        Ok((Arc::new(transport), rx))
    }
}
