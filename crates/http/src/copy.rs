use futures_lite::{future, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use std::io::Result;

/// Copy a body reader to the transport, yielding to the executor
/// every `loops_per_yield` iterations so a large file send cannot
/// monopolize its thread.
pub(crate) async fn copy(
    mut reader: impl AsyncRead + Unpin,
    writer: &mut (impl AsyncWrite + Unpin),
    loops_per_yield: usize,
) -> Result<u64> {
    let mut buf = vec![0u8; 16 * 1024];
    let mut total = 0u64;
    let mut loops = 0;

    loop {
        if loops == loops_per_yield {
            loops = 0;
            future::yield_now().await;
        }
        loops += 1;

        let bytes = reader.read(&mut buf).await?;
        if bytes == 0 {
            return Ok(total);
        }

        writer.write_all(&buf[..bytes]).await?;
        total += bytes as u64;
    }
}
