use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Writes a response made of a header block and an optional mapped body.
///
/// Tracks how far it got so a failed write can be reported with the number
/// of bytes that did reach the peer.
pub struct ResponseWriter<'a> {
    parts: [&'a [u8]; 2],
    written: usize,
}

impl<'a> ResponseWriter<'a> {
    pub fn new(header: &'a [u8], body: Option<&'a [u8]>) -> Self {
        Self {
            parts: [header, body.unwrap_or_default()],
            written: 0,
        }
    }

    /// Total number of bytes in the response.
    pub fn len(&self) -> usize {
        self.parts.iter().map(|p| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub async fn write_to_stream<W: AsyncWrite + Unpin + ?Sized>(
        &mut self,
        stream: &mut W,
    ) -> anyhow::Result<()> {
        for part in self.parts {
            let mut done = 0;
            while done < part.len() {
                let n = stream.write(&part[done..]).await?;

                if n == 0 {
                    return Err(anyhow::anyhow!(
                        "connection closed while writing ({} of {} bytes sent)",
                        self.written,
                        self.len()
                    ));
                }

                done += n;
                self.written += n;
            }
        }
        stream.flush().await?;

        Ok(())
    }
}
