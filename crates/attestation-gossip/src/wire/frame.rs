//! Length-prefixed framing.
//!
//! ```text
//! +------------------+-------------+
//! | Length (4 bytes) | Payload     |
//! +------------------+-------------+
//! ```

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{GossipError, GossipResult};

/// Largest accepted payload. Checked before allocating.
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Write one frame and flush.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> GossipResult<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    if payload.len() > MAX_FRAME_SIZE {
        return Err(GossipError::Protocol(format!(
            "frame of {} bytes exceeds {MAX_FRAME_SIZE}",
            payload.len()
        )));
    }
    let len = u32::try_from(payload.len())
        .map_err(|_| GossipError::Protocol("frame length overflow".to_string()))?;
    writer.write_u32(len).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame.
pub async fn read_frame<R>(reader: &mut R) -> GossipResult<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let len = reader.read_u32().await? as usize;
    if len > MAX_FRAME_SIZE {
        return Err(GossipError::Protocol(format!(
            "peer announced {len} byte frame, limit {MAX_FRAME_SIZE}"
        )));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// [`read_frame`] bounded by `timeout`.
pub async fn read_frame_timeout<R>(reader: &mut R, timeout: Duration) -> GossipResult<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    tokio::time::timeout(timeout, read_frame(reader))
        .await
        .map_err(|_| GossipError::Timeout(timeout))?
}

/// [`write_frame`] bounded by `timeout`.
pub async fn write_frame_timeout<W>(
    writer: &mut W,
    payload: &[u8],
    timeout: Duration,
) -> GossipResult<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    tokio::time::timeout(timeout, write_frame(writer, payload))
        .await
        .map_err(|_| GossipError::Timeout(timeout))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_in_sequence() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        write_frame(&mut a, b"first").await.unwrap();
        write_frame(&mut a, b"").await.unwrap();
        write_frame(&mut a, &[7u8; 300]).await.unwrap();

        assert_eq!(read_frame(&mut b).await.unwrap(), b"first");
        assert!(read_frame(&mut b).await.unwrap().is_empty());
        assert_eq!(read_frame(&mut b).await.unwrap().len(), 300);
    }

    #[tokio::test]
    async fn test_oversized_announcement_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u32((MAX_FRAME_SIZE + 1) as u32).await.unwrap();

        let err = read_frame(&mut b).await.unwrap_err();
        assert!(matches!(err, GossipError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_oversized_write_rejected() {
        let (mut a, _b) = tokio::io::duplex(64);
        let payload = vec![0u8; MAX_FRAME_SIZE + 1];
        assert!(matches!(
            write_frame(&mut a, &payload).await,
            Err(GossipError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_truncated_frame_is_transport_error() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u32(10).await.unwrap();
        a.write_all(b"abc").await.unwrap();
        drop(a);

        assert!(matches!(
            read_frame(&mut b).await,
            Err(GossipError::Transport { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout() {
        let (_a, mut b) = tokio::io::duplex(64);
        let err = read_frame_timeout(&mut b, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, GossipError::Timeout(_)));
    }
}
