//! 와이어 코덱
//!
//! 필드 단위로 정확한 바이트 수만 읽고 쓴다. 메시지 경계 표시가 없으므로
//! 한 번 어긋나면 (버그, 블록 크기 불일치 등) 그 연결은 복구할 수 없다.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::message::{FileDescriptor, Message, Step};
use crate::{Error, Result};

/// 메시지 송신기 (세션 방향당 단일 writer)
pub struct MessageWriter<W> {
    inner: W,
    buf: BytesMut,
    bytes_written: u64,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(4096),
            bytes_written: 0,
        }
    }

    /// 메시지 하나를 인코딩해서 전송 후 flush
    pub async fn send(&mut self, msg: &Message) -> Result<()> {
        self.buf.clear();
        msg.encode(&mut self.buf);

        self.inner.write_all(&self.buf).await?;
        self.inner.flush().await?;
        self.bytes_written += self.buf.len() as u64;
        trace!("송신: {:?} ({} bytes)", msg.step(), self.buf.len());
        Ok(())
    }

    /// 블록 원본 바이트 전송 (Bytes로 복사하지 않음)
    pub async fn send_block(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write_all(data).await?;
        self.inner.flush().await?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    /// 지금까지 쓴 바이트 수
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// 메시지 수신기
///
/// 파일 이름을 개행까지 읽어야 하므로 버퍼링된 스트림을 요구한다.
pub struct MessageReader<R> {
    inner: R,
    bytes_read: u64,
}

impl<R: AsyncBufRead + Unpin> MessageReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes_read: 0,
        }
    }

    /// i32 파일 수
    pub async fn read_file_count(&mut self) -> Result<u32> {
        let count = self
            .inner
            .read_i32_le()
            .await
            .map_err(|e| Error::read(Step::FileCount, e))?;
        self.bytes_read += 4;

        u32::try_from(count).map_err(|_| Error::InvalidFileCount(count))
    }

    /// 파일 이름 '\n' + i64 크기
    pub async fn read_descriptor(&mut self, max_name_len: usize) -> Result<FileDescriptor> {
        let limit = max_name_len as u64 + 1;
        let mut raw = Vec::new();
        let n = (&mut self.inner)
            .take(limit)
            .read_until(b'\n', &mut raw)
            .await
            .map_err(|e| Error::read(Step::Descriptor, e))?;
        self.bytes_read += n as u64;

        if raw.last() != Some(&b'\n') {
            if n as u64 >= limit {
                return Err(Error::FileNameTooLong { max: max_name_len });
            }
            return Err(Error::Truncated {
                step: Step::Descriptor,
            });
        }
        raw.pop();

        let name = String::from_utf8(raw).map_err(|e| Error::InvalidFileName {
            name: String::from_utf8_lossy(e.as_bytes()).into_owned(),
            reason: "UTF-8 아님",
        })?;

        let size = self
            .inner
            .read_i64_le()
            .await
            .map_err(|e| Error::read(Step::Descriptor, e))?;
        self.bytes_read += 8;

        let size = u64::try_from(size).map_err(|_| Error::InvalidFileSize(size))?;
        Ok(FileDescriptor { name, size })
    }

    /// u32 x count (길이 프리픽스 없음)
    pub async fn read_checksums(&mut self, count: usize) -> Result<Vec<u32>> {
        let mut raw = vec![0u8; count * 4];
        self.inner
            .read_exact(&mut raw)
            .await
            .map_err(|e| Error::read(Step::SourceChecksums, e))?;
        self.bytes_read += raw.len() as u64;

        let mut buf = raw.as_slice();
        Ok((0..count).map(|_| buf.get_u32_le()).collect())
    }

    /// bool x count, 0이 아니면 true
    pub async fn read_match_vector(&mut self, count: usize) -> Result<Vec<bool>> {
        let mut raw = vec![0u8; count];
        self.inner
            .read_exact(&mut raw)
            .await
            .map_err(|e| Error::read(Step::MatchVector, e))?;
        self.bytes_read += raw.len() as u64;

        Ok(raw.into_iter().map(|b| b != 0).collect())
    }

    /// 블록 `len` 바이트를 `buf` 크기 단위로 읽어 `sink`에 넘기면서 CRC32 계산
    ///
    /// 반환값은 수신한 바이트의 CRC32.
    pub async fn read_block<F>(&mut self, len: usize, buf: &mut [u8], mut sink: F) -> Result<u32>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        debug_assert!(!buf.is_empty());
        let mut hasher = crc32fast::Hasher::new();
        let mut remaining = len;

        while remaining > 0 {
            let n = remaining.min(buf.len());
            self.inner
                .read_exact(&mut buf[..n])
                .await
                .map_err(|e| Error::read(Step::BlockData, e))?;
            self.bytes_read += n as u64;

            hasher.update(&buf[..n]);
            sink(&buf[..n])?;
            remaining -= n;
        }

        Ok(hasher.finalize())
    }

    /// 지금까지 읽은 바이트 수
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writer_reader_script() {
        let desc = FileDescriptor::new("b.bin", 10).unwrap();

        let mut writer = MessageWriter::new(Vec::new());
        writer.send(&Message::FileCount(1)).await.unwrap();
        writer.send(&Message::Descriptor(desc.clone())).await.unwrap();
        writer.send(&Message::SourceChecksums(vec![7, 8])).await.unwrap();
        writer.send_block(b"0123456789").await.unwrap();
        assert_eq!(writer.bytes_written(), 4 + 6 + 8 + 8 + 10);

        let wire = writer.into_inner();
        let mut reader = MessageReader::new(wire.as_slice());
        assert_eq!(reader.read_file_count().await.unwrap(), 1);
        assert_eq!(reader.read_descriptor(4096).await.unwrap(), desc);
        assert_eq!(reader.read_checksums(2).await.unwrap(), vec![7, 8]);

        let mut received = Vec::new();
        let mut buf = [0u8; 3];
        let crc = reader
            .read_block(10, &mut buf, |chunk| {
                received.extend_from_slice(chunk);
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(received, b"0123456789");
        assert_eq!(crc, crc32fast::hash(b"0123456789"));
        assert_eq!(reader.bytes_read(), wire.len() as u64);
    }

    #[tokio::test]
    async fn test_negative_file_count() {
        let wire = (-1i32).to_le_bytes();
        let mut reader = MessageReader::new(&wire[..]);
        assert!(matches!(
            reader.read_file_count().await,
            Err(Error::InvalidFileCount(-1))
        ));
    }

    #[tokio::test]
    async fn test_negative_file_size() {
        let mut wire = b"x\n".to_vec();
        wire.extend_from_slice(&(-5i64).to_le_bytes());
        let mut reader = MessageReader::new(wire.as_slice());
        assert!(matches!(
            reader.read_descriptor(64).await,
            Err(Error::InvalidFileSize(-5))
        ));
    }

    #[tokio::test]
    async fn test_name_too_long() {
        let wire = vec![b'a'; 100];
        let mut reader = MessageReader::new(wire.as_slice());
        assert!(matches!(
            reader.read_descriptor(16).await,
            Err(Error::FileNameTooLong { max: 16 })
        ));
    }

    #[tokio::test]
    async fn test_name_without_terminator_is_truncated() {
        let mut reader = MessageReader::new(&b"abc"[..]);
        assert!(matches!(
            reader.read_descriptor(16).await,
            Err(Error::Truncated {
                step: Step::Descriptor
            })
        ));
    }

    #[tokio::test]
    async fn test_truncated_checksums() {
        let wire = [1u8, 0, 0, 0, 2, 0];
        let mut reader = MessageReader::new(&wire[..]);
        assert!(matches!(
            reader.read_checksums(2).await,
            Err(Error::Truncated {
                step: Step::SourceChecksums
            })
        ));
    }

    #[tokio::test]
    async fn test_match_vector_nonzero_is_true() {
        let wire = [0u8, 1, 2, 255];
        let mut reader = MessageReader::new(&wire[..]);
        assert_eq!(
            reader.read_match_vector(4).await.unwrap(),
            vec![false, true, true, true]
        );
    }
}
