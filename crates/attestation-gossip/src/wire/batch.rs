//! Batched attestation protocol: one stream, one frame, one batch.

use shared_types::AttestedFact;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::frame::{read_frame_timeout, write_frame_timeout};
use crate::error::{GossipError, GossipResult};

/// Send `facts` as a single frame and close the write side.
pub async fn write_batch<S>(stream: &mut S, facts: &[AttestedFact], timeout: Duration) -> GossipResult<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    let payload = bincode::serialize(facts)?;
    write_frame_timeout(stream, &payload, timeout).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Receive one batch.
pub async fn read_batch<S>(stream: &mut S, timeout: Duration) -> GossipResult<Vec<AttestedFact>>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let payload = read_frame_timeout(stream, timeout).await?;
    bincode::deserialize(&payload).map_err(|e| GossipError::Decode(e.to_string()))
}
