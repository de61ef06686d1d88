//! 소스 측 연결 관리자
//!
//! - 모든 인터페이스에서 리슨
//! - 수락한 연결마다 독립 태스크에서 파일 목록 전체를 순서대로 전송
//! - 연결 하나의 실패는 그 태스크만 끝내고 리스너는 계속 수락

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{split, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::cache::ChecksumCache;
use crate::codec::{MessageReader, MessageWriter};
use crate::session::run_source;
use crate::stats::TransferStats;
use crate::{Config, Error, Result};

/// 소스 서버
pub struct Server {
    cache: ChecksumCache,
    listener: TcpListener,
}

impl Server {
    /// 리스너 바인딩
    ///
    /// 캐시는 같은 블록 크기로 미리 계산되어 있어야 한다.
    pub async fn bind(addr: SocketAddr, config: Config, cache: ChecksumCache) -> Result<Self> {
        config.validate()?;
        if cache.block_size() != config.block_size {
            return Err(Error::InvalidConfig(format!(
                "캐시 블록 크기 {} != 설정 블록 크기 {}",
                cache.block_size(),
                config.block_size
            )));
        }

        let listener = TcpListener::bind(addr).await?;
        info!(
            "blocksync source started on {} ({} files, block size {} bytes)",
            listener.local_addr()?,
            cache.len(),
            config.block_size
        );

        Ok(Self { cache, listener })
    }

    /// 실제 바인딩된 주소 (포트 0으로 바인딩한 경우)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// 종료 없이 계속 수락
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// `shutdown`이 완료될 때까지 수락
    ///
    /// 이미 처리 중인 연결 태스크는 끝까지 실행된다.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("리스너 종료");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            info!("클라이언트 연결: {}", peer);
                            if let Err(e) = stream.set_nodelay(true) {
                                debug!("TCP_NODELAY 설정 실패: {}", e);
                            }

                            let cache = self.cache.clone();
                            tokio::spawn(async move {
                                match serve_connection(stream, &cache).await {
                                    Ok(stats) => info!("{} 전송 완료: {}", peer, stats.summary()),
                                    Err(e) => warn!("{} 연결 처리 실패: {}", peer, e),
                                }
                            });
                        }
                        Err(e) => {
                            // fd 고갈 등, 잠깐 쉬고 계속 수락
                            warn!("accept 에러: {}", e);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
            }
        }
    }
}

/// 연결 하나에서 소스 역할 실행
///
/// 파일 수를 먼저 보내고 캐시의 파일들을 목록 순서대로 전송한 뒤 쓰기 방향을 닫는다.
pub async fn serve_connection<S>(stream: S, cache: &ChecksumCache) -> Result<TransferStats>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, write_half) = split(stream);
    let mut reader = MessageReader::new(BufReader::new(read_half));
    let mut writer = MessageWriter::new(write_half);

    let stats = run_source(&mut reader, &mut writer, cache).await?;

    let mut write_half = writer.into_inner();
    write_half.shutdown().await?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_rejects_block_size_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"abc").unwrap();
        let cache = ChecksumCache::build(&[&path], 1024).unwrap();

        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let result = Server::bind(addr, Config::default(), cache).await;
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_run_until_stops_listener() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"abc").unwrap();
        let config = Config::default();
        let cache = ChecksumCache::build(&[&path], config.block_size).unwrap();

        let server = Server::bind("127.0.0.1:0".parse().unwrap(), config, cache)
            .await
            .unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(server.run_until(async {
            let _ = rx.await;
        }));

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
