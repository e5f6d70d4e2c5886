use crate::error::AppError;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tracing::debug;

pub type FeedWsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const MAX_MESSAGE_BYTES: usize = 16 << 20;
const MAX_FRAME_BYTES: usize = 4 << 20;

/// Opens the duplex feed connection. The handshake response is discarded;
/// the server pushes frames without any subscription request.
pub async fn connect_feed_stream(url: &str) -> Result<FeedWsStream, AppError> {
    let ws_config = WebSocketConfig {
        max_message_size: Some(MAX_MESSAGE_BYTES),
        max_frame_size: Some(MAX_FRAME_BYTES),
        ..Default::default()
    };

    let (stream, response) = connect_async_with_config(url, Some(ws_config), true).await?;
    debug!(%url, status = %response.status(), "websocket handshake complete");
    Ok(stream)
}
