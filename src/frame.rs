//! Length-prefixed frame transport (RFC 5734 §4).
//!
//! A frame is a big-endian `u32` `total_size`, counting itself, followed by
//! `total_size - 4` bytes of UTF-8 XML. Both halves of the protocol (client
//! and server) read and write frames with [`read_frame`] and [`write_frame`];
//! neither function is safe to call concurrently on the same stream.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, FrameError};

/// Header size in bytes: one big-endian `u32`.
const HEADER_LEN: usize = 4;

/// Read deadline applied when the caller doesn't set one of their own.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Reads one frame from `stream`, returning its XML payload as bytes.
///
/// `deadline` bounds the whole read (header + body); pass `None` to fall
/// back to [`DEFAULT_READ_TIMEOUT`].
pub async fn read_frame<S>(stream: &mut S, deadline: Option<Duration>) -> Result<Vec<u8>, Error>
where
    S: AsyncRead + Unpin,
{
    let deadline = deadline.unwrap_or(DEFAULT_READ_TIMEOUT);

    let mut header = [0u8; HEADER_LEN];
    timeout(deadline, stream.read_exact(&mut header))
        .await?
        .map_err(|_| Error::Framing(FrameError::MissingHeader))?;

    let total_size = u32::from_be_bytes(header) as usize;
    if total_size < HEADER_LEN {
        return Err(Error::Framing(FrameError::TooShort));
    }

    let mut body = vec![0u8; total_size - HEADER_LEN];
    timeout(deadline, stream.read_exact(&mut body)).await??;

    Ok(body)
}

/// Writes one frame containing `payload` to `stream`.
pub async fn write_frame<S>(
    stream: &mut S,
    payload: &[u8],
    deadline: Option<Duration>,
) -> Result<(), Error>
where
    S: AsyncWrite + Unpin,
{
    let deadline = deadline.unwrap_or(DEFAULT_READ_TIMEOUT);

    let total_size: u32 = (payload.len() + HEADER_LEN)
        .try_into()
        .map_err(|_| Error::Framing(FrameError::PayloadTooLarge))?;

    let mut buf = Vec::with_capacity(payload.len() + HEADER_LEN);
    buf.extend_from_slice(&total_size.to_be_bytes());
    buf.extend_from_slice(payload);

    timeout(deadline, stream.write_all(&buf)).await??;
    timeout(deadline, stream.flush()).await??;
    Ok(())
}

/// Races `fut` against `deadline`, mapping an elapsed timer to [`Error::Timeout`].
pub(crate) async fn timeout<T>(
    deadline: Duration,
    fut: impl std::future::Future<Output = std::io::Result<T>>,
) -> Result<std::io::Result<T>, Error> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => Ok(result),
        Err(_) => Err(Error::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;

    fn framed(payload: &[u8]) -> Vec<u8> {
        let total_size = (payload.len() + HEADER_LEN) as u32;
        let mut buf = total_size.to_be_bytes().to_vec();
        buf.extend_from_slice(payload);
        buf
    }

    #[tokio::test]
    async fn round_trip() {
        let payload = b"<epp/>";
        let mut mock = Builder::new().read(&framed(payload)).build();
        let got = read_frame(&mut mock, None).await.unwrap();
        assert_eq!(got, payload);
    }

    #[tokio::test]
    async fn write_then_frame_matches() {
        let payload = b"<epp><hello/></epp>";
        let mut mock = Builder::new().write(&framed(payload)).build();
        write_frame(&mut mock, payload, None).await.unwrap();
    }

    #[tokio::test]
    async fn header_too_short_is_rejected() {
        // total_size = 3 is smaller than the 4-byte header itself.
        let mut mock = Builder::new().read(&3u32.to_be_bytes()).build();
        let err = read_frame(&mut mock, None).await.unwrap_err();
        assert!(matches!(err, Error::Framing(FrameError::TooShort)));
    }

    #[tokio::test]
    async fn truncated_header_is_rejected() {
        let mut mock = Builder::new().read(&[0, 0]).build();
        let err = read_frame(&mut mock, None).await.unwrap_err();
        assert!(matches!(err, Error::Framing(FrameError::MissingHeader)));
    }

    #[tokio::test]
    async fn minimum_frame_is_five_bytes() {
        let payload = b"x";
        let mut mock = Builder::new().read(&framed(payload)).build();
        let got = read_frame(&mut mock, None).await.unwrap();
        assert_eq!(got, payload);
    }

    #[tokio::test]
    async fn write_rejects_oversized_payload() {
        // We can't actually allocate u32::MAX bytes in a test; exercise the
        // bounds check directly via the size arithmetic instead.
        let total_size_would_be = (u32::MAX as usize) + HEADER_LEN;
        assert!(u32::try_from(total_size_would_be).is_err());
    }
}
