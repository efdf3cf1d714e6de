//! State snapshot protocol.
//!
//! ```text
//! requester                       responder
//!     │ ── [0x01] ──────────────────► │
//!     │ ◄────────────────── [0x02] ── │  begin
//!     │ ── "ack_begin" ─────────────► │
//!     │ ◄── [0x03|count u32|len u32]─ │  header   ┐
//!     │ ── "ack_header" ────────────► │           │ per batch of
//!     │ ◄──────────── [0x04|facts] ── │  data     │ ≤ 100 facts
//!     │ ── "ack_data" ──────────────► │           ┘
//!     │ ◄────────────────── [0x05] ── │  end
//! ```
//!
//! Every message is one length-prefixed frame. The acks pace the responder
//! to the requester. Each read is bounded by the caller's timeout and a
//! dump is bounded by [`MAX_STATE_DUMP_FACTS`].

use shared_types::AttestedFact;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use super::frame::{read_frame_timeout, write_frame_timeout};
use super::{MAX_QUORUM_TXS_PER_BATCH, MAX_STATE_DUMP_FACTS};
use crate::error::{GossipError, GossipResult};

pub const PREFIX_SEND_STATE: u8 = 0x01;
pub const PREFIX_BATCH_BEGIN: u8 = 0x02;
pub const PREFIX_BATCH_HEADER: u8 = 0x03;
pub const PREFIX_BATCH_DATA: u8 = 0x04;
pub const PREFIX_BATCH_END: u8 = 0x05;

pub const ACK_BEGIN: &[u8] = b"ack_begin";
pub const ACK_HEADER: &[u8] = b"ack_header";
pub const ACK_DATA: &[u8] = b"ack_data";

const HEADER_LEN: usize = 9;

async fn expect_ack<S>(stream: &mut S, ack: &[u8], timeout: Duration) -> GossipResult<()>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let frame = read_frame_timeout(stream, timeout).await?;
    if frame != ack {
        return Err(GossipError::Protocol(format!(
            "expected {}, got {} bytes",
            String::from_utf8_lossy(ack),
            frame.len()
        )));
    }
    Ok(())
}

fn encode_header(count: usize, byte_len: usize) -> GossipResult<[u8; HEADER_LEN]> {
    let count = u32::try_from(count).map_err(|_| GossipError::Protocol("batch too large".into()))?;
    let byte_len =
        u32::try_from(byte_len).map_err(|_| GossipError::Protocol("batch too large".into()))?;
    let mut header = [0u8; HEADER_LEN];
    header[0] = PREFIX_BATCH_HEADER;
    header[1..5].copy_from_slice(&count.to_be_bytes());
    header[5..9].copy_from_slice(&byte_len.to_be_bytes());
    Ok(header)
}

fn decode_header(frame: &[u8]) -> GossipResult<(usize, usize)> {
    if frame.len() != HEADER_LEN {
        return Err(GossipError::Protocol(format!(
            "batch header of {} bytes",
            frame.len()
        )));
    }
    let mut count = [0u8; 4];
    let mut byte_len = [0u8; 4];
    count.copy_from_slice(&frame[1..5]);
    byte_len.copy_from_slice(&frame[5..9]);
    Ok((
        u32::from_be_bytes(count) as usize,
        u32::from_be_bytes(byte_len) as usize,
    ))
}

/// Answer one state request with `facts`, truncated to
/// [`MAX_STATE_DUMP_FACTS`]. Returns the number of batches sent.
pub async fn serve_state<S>(stream: &mut S, facts: &[AttestedFact], timeout: Duration) -> GossipResult<usize>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    let request = read_frame_timeout(stream, timeout).await?;
    if request != [PREFIX_SEND_STATE] {
        return Err(GossipError::Protocol("expected state request".into()));
    }

    write_frame_timeout(stream, &[PREFIX_BATCH_BEGIN], timeout).await?;
    expect_ack(stream, ACK_BEGIN, timeout).await?;

    if facts.len() > MAX_STATE_DUMP_FACTS {
        warn!(facts = facts.len(), served = MAX_STATE_DUMP_FACTS, "State dump truncated");
    }
    let facts = &facts[..facts.len().min(MAX_STATE_DUMP_FACTS)];

    let mut batches = 0;
    for chunk in facts.chunks(MAX_QUORUM_TXS_PER_BATCH) {
        let payload = bincode::serialize(chunk)?;

        let header = encode_header(chunk.len(), payload.len())?;
        write_frame_timeout(stream, &header, timeout).await?;
        expect_ack(stream, ACK_HEADER, timeout).await?;

        let mut data = Vec::with_capacity(payload.len() + 1);
        data.push(PREFIX_BATCH_DATA);
        data.extend_from_slice(&payload);
        write_frame_timeout(stream, &data, timeout).await?;
        expect_ack(stream, ACK_DATA, timeout).await?;

        batches += 1;
    }

    write_frame_timeout(stream, &[PREFIX_BATCH_END], timeout).await?;
    stream.shutdown().await?;
    debug!(facts = facts.len(), batches, "State dump served");
    Ok(batches)
}

/// Ask the peer on `stream` for its state and collect every fact.
///
/// # Errors
///
/// `Protocol` on any out-of-sequence frame or once the dump exceeds
/// [`MAX_STATE_DUMP_FACTS`].
pub async fn request_state<S>(stream: &mut S, timeout: Duration) -> GossipResult<Vec<AttestedFact>>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    collect_state(stream, timeout, MAX_STATE_DUMP_FACTS).await
}

async fn collect_state<S>(
    stream: &mut S,
    timeout: Duration,
    max_facts: usize,
) -> GossipResult<Vec<AttestedFact>>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    write_frame_timeout(stream, &[PREFIX_SEND_STATE], timeout).await?;

    let begin = read_frame_timeout(stream, timeout).await?;
    if begin != [PREFIX_BATCH_BEGIN] {
        return Err(GossipError::Protocol("expected batch begin".into()));
    }
    write_frame_timeout(stream, ACK_BEGIN, timeout).await?;

    let mut facts = Vec::new();
    loop {
        let frame = read_frame_timeout(stream, timeout).await?;
        match frame.first() {
            Some(&PREFIX_BATCH_END) => break,
            Some(&PREFIX_BATCH_HEADER) => {}
            _ => return Err(GossipError::Protocol("expected batch header or end".into())),
        }

        let (count, byte_len) = decode_header(&frame)?;
        if count > MAX_QUORUM_TXS_PER_BATCH {
            return Err(GossipError::Protocol(format!("batch of {count} facts")));
        }
        if facts.len() + count > max_facts {
            return Err(GossipError::Protocol(format!("state dump over {max_facts} facts")));
        }
        write_frame_timeout(stream, ACK_HEADER, timeout).await?;

        let data = read_frame_timeout(stream, timeout).await?;
        if data.first() != Some(&PREFIX_BATCH_DATA) || data.len() - 1 != byte_len {
            return Err(GossipError::Protocol("batch data does not match header".into()));
        }
        let batch: Vec<AttestedFact> =
            bincode::deserialize(&data[1..]).map_err(|e| GossipError::Decode(e.to_string()))?;
        if batch.len() != count {
            return Err(GossipError::Protocol(format!(
                "header announced {count} facts, got {}",
                batch.len()
            )));
        }
        facts.extend(batch);
        write_frame_timeout(stream, ACK_DATA, timeout).await?;
    }

    Ok(facts)
}
