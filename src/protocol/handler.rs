//! Connection handler for the echo/checksum protocol.

use bytes::BytesMut;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use super::mode::Reply;

/// Receive buffer capacity; one read never returns more than this.
pub const BUFFER_CAPACITY: usize = 8 * 1024 * 1024 + 1;

/// Handle one connection until the peer closes or an I/O error occurs.
///
/// Each read is treated as one message and answered with a single write.
/// The buffer is owned by this handler, so concurrent connections never
/// observe each other's data.
///
/// With `read_deadline` set, a read that stays pending longer than the
/// deadline fails with `TimedOut`. Without it reads may block forever.
pub async fn handle_connection<S>(mut stream: S, read_deadline: Option<Duration>) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = BytesMut::zeroed(BUFFER_CAPACITY);

    loop {
        let n = read_chunk(&mut stream, &mut buffer, read_deadline).await?;
        if n == 0 {
            // EOF
            trace!("Connection closed by client");
            return Ok(());
        }

        let reply = Reply::for_chunk(&buffer[..n]);
        trace!(len = n, mode = ?reply.mode(), "Processing chunk");

        stream.write_all(reply.as_bytes()).await?;
    }
}

async fn read_chunk<S>(
    stream: &mut S,
    buffer: &mut [u8],
    read_deadline: Option<Duration>,
) -> io::Result<usize>
where
    S: AsyncRead + Unpin,
{
    match read_deadline {
        None => stream.read(buffer).await,
        Some(deadline) => tokio::time::timeout(deadline, stream.read(buffer))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connection idle timeout"))?,
    }
}
