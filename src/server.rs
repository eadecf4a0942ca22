//! Binary TCP query server.
//!
//! One task per connection, one request per connection: read 48 bytes,
//! run the query, stream the encoded rows back, close. Connection close is
//! the end-of-results signal, so there is no framing to get wrong.
//!
//! Each connection opens its own read-only [`CatalogStore`] handle and
//! runs the query on the blocking pool; a failure in one connection is
//! logged and never disturbs the accept loop or other connections.

use crate::error::{CatalogError, Result};
use crate::store::{CatalogStore, QueryRect};
use crate::wire::{self, Request, REQUEST_SIZE};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 13330;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Light store path; the heavy companion is located by convention.
    pub light_path: PathBuf,
}

/// Run the accept loop forever. Returns only if accepting itself fails.
pub async fn serve(listener: TcpListener, config: ServerConfig) -> Result<()> {
    let config = Arc::new(config);
    tracing::info!(addr = %listener.local_addr()?, "listening");

    loop {
        let (socket, peer) = listener.accept().await?;
        let config = Arc::clone(&config);
        tokio::spawn(async move {
            tracing::debug!(%peer, "connection accepted");
            if let Err(error) = handle_connection(socket, &config).await {
                tracing::warn!(%peer, %error, "connection failed");
            }
        });
    }
}

/// Accumulate exactly one 48-byte request, tolerating fragmented reads.
async fn read_request<R>(socket: &mut R) -> Result<Request>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; REQUEST_SIZE];
    let mut got = 0;
    while got < REQUEST_SIZE {
        let n = socket.read(&mut buf[got..]).await?;
        if n == 0 {
            return Err(CatalogError::ShortRead { got });
        }
        got += n;
    }
    Request::decode(&buf)
}

async fn handle_connection(mut socket: TcpStream, config: &ServerConfig) -> Result<()> {
    let request = read_request(&mut socket).await?;

    let light_path = config.light_path.clone();
    let rows = tokio::task::spawn_blocking(move || {
        let mut store = CatalogStore::open(&light_path)?;
        let rect = QueryRect {
            ralo: request.ralo,
            rahi: request.rahi,
            declo: request.declo,
            dechi: request.dechi,
        };
        store.query(&rect, request.mag_ceiling, request.groups)
    })
    .await
    .map_err(|e| CatalogError::Io(std::io::Error::other(e)))??;

    let mut out = Vec::with_capacity(wire::row_size(request.groups));
    for row in &rows {
        out.clear();
        wire::encode_row(row, request.groups, request.order, &mut out);
        socket.write_all(&out).await?;
    }
    socket.shutdown().await?;

    tracing::info!(
        rows = rows.len(),
        light = request.groups.light,
        heavy = request.groups.heavy,
        "query served"
    );
    Ok(())
}
