//! 대상 측 연결 관리자
//!
//! Idle → Connecting → Syncing → Done
//! Connecting/Syncing 실패 → 대기(RetryPolicy) → Connecting
//!
//! 어느 단계에서 실패하든 파일 단위가 아니라 연결 시도 전체를 처음부터 다시 한다.
//! 이미 일치하는 블록은 체크섬 비교로 다시 건너뛰므로 대역폭은 낭비되지 않는다.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{split, AsyncRead, AsyncWrite, BufReader};
use tokio::net::{lookup_host, TcpStream};
use tracing::{debug, info, warn};

use crate::codec::{MessageReader, MessageWriter};
use crate::progress::{NoopObserver, ProgressObserver};
use crate::retry::{FixedDelay, RetryPolicy};
use crate::session::run_destination;
use crate::stats::TransferStats;
use crate::{Config, Error, Result};

/// 동기화 결과
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// 성공한 연결의 전송 통계
    pub stats: TransferStats,

    /// 성공까지 걸린 시도 횟수
    pub attempts: u32,
}

/// 대상 클라이언트
pub struct Client {
    config: Config,
    root: PathBuf,
    retry: Box<dyn RetryPolicy>,
    observer: Arc<dyn ProgressObserver>,
}

impl Client {
    /// 현재 디렉터리에 쓰고, 설정의 고정 간격으로 무제한 재시도
    pub fn new(config: Config) -> Self {
        let retry = FixedDelay::new(config.retry_delay());
        Self {
            config,
            root: PathBuf::from("."),
            retry: Box::new(retry),
            observer: Arc::new(NoopObserver),
        }
    }

    /// 파일을 쓸 디렉터리
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// 재시도 정책 교체
    pub fn with_retry_policy<P: RetryPolicy + 'static>(mut self, policy: P) -> Self {
        self.retry = Box::new(policy);
        self
    }

    /// 진행률 옵저버
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// 한 번 성공할 때까지 접속 + 동기화 반복
    ///
    /// 복구 불가능한 에러(로컬 파일을 열 수 없음 등)나 정책이 포기하면 에러 반환.
    pub async fn sync(&mut self, peer: &str) -> Result<SyncReport> {
        self.config.validate()?;

        let mut attempt = 0u32;
        loop {
            attempt = attempt.saturating_add(1);

            match self.sync_once(peer).await {
                Ok(stats) => {
                    self.retry.reset();
                    info!("동기화 완료 (시도 {}회): {}", attempt, stats.summary());
                    return Ok(SyncReport {
                        stats,
                        attempts: attempt,
                    });
                }
                Err(e) if !e.is_recoverable() => {
                    warn!("복구 불가능한 에러: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("Error: {}", e);
                    match self.retry.next_delay(attempt) {
                        Some(delay) => {
                            info!("Reconnecting in {:?}...", delay);
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            return Err(Error::RetriesExhausted {
                                attempts: attempt,
                                last: Box::new(e),
                            });
                        }
                    }
                }
            }
        }
    }

    /// 접속 1회 + 동기화 (재시도 없음)
    pub async fn sync_once(&self, peer: &str) -> Result<TransferStats> {
        let addrs = resolve_peer(peer, self.config.port).await?;
        let stream = connect_any(&addrs, self.config.connect_timeout()).await?;
        debug!("연결됨: {:?}", stream.peer_addr().ok());
        self.sync_stream(stream).await
    }

    /// 이미 열린 스트림에서 대상 역할 실행
    pub async fn sync_stream<S>(&self, stream: S) -> Result<TransferStats>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (read_half, write_half) = split(stream);
        let mut reader = MessageReader::new(BufReader::new(read_half));
        let mut writer = MessageWriter::new(write_half);

        run_destination(
            &mut reader,
            &mut writer,
            &self.root,
            &self.config,
            self.observer.as_ref(),
        )
        .await
    }
}

/// 피어 주소 해석
///
/// 포트가 없으면 `default_port`를 붙인다. `host`, `host:port`, IPv4/IPv6,
/// `[v6]`, `[v6]:port` 형식을 받는다.
pub async fn resolve_peer(peer: &str, default_port: u16) -> Result<Vec<SocketAddr>> {
    let peer = peer.trim();

    if let Ok(addr) = peer.parse::<SocketAddr>() {
        return Ok(vec![addr]);
    }
    let bare = peer
        .strip_prefix('[')
        .and_then(|p| p.strip_suffix(']'))
        .unwrap_or(peer);
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, default_port)]);
    }

    let target = if has_port(peer) {
        peer.to_string()
    } else {
        format!("{}:{}", peer, default_port)
    };

    let addrs: Vec<SocketAddr> = lookup_host(&target)
        .await
        .map_err(|e| Error::Resolve(format!("{}: {}", target, e)))?
        .collect();

    if addrs.is_empty() {
        return Err(Error::Resolve(format!("{}: 주소 없음", target)));
    }
    Ok(addrs)
}

fn has_port(peer: &str) -> bool {
    match peer.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && !host.contains(':') && port.parse::<u16>().is_ok(),
        None => false,
    }
}

/// 해석된 주소를 순서대로 시도
async fn connect_any(addrs: &[SocketAddr], timeout: Duration) -> Result<TcpStream> {
    let mut last_err = None;

    for addr in addrs {
        match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("TCP_NODELAY 설정 실패: {}", e);
                }
                return Ok(stream);
            }
            Ok(Err(e)) => {
                debug!("{} 접속 실패: {}", addr, e);
                last_err = Some(Error::Io(e));
            }
            Err(_) => last_err = Some(Error::ConnectTimeout(addr.to_string())),
        }
    }

    Err(last_err.unwrap_or_else(|| Error::Resolve("주소 없음".into())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_literal_addresses() {
        assert_eq!(
            resolve_peer("127.0.0.1", 3333).await.unwrap(),
            vec!["127.0.0.1:3333".parse::<SocketAddr>().unwrap()]
        );
        assert_eq!(
            resolve_peer("127.0.0.1:4000", 3333).await.unwrap(),
            vec!["127.0.0.1:4000".parse::<SocketAddr>().unwrap()]
        );
        assert_eq!(
            resolve_peer("[::1]", 3333).await.unwrap(),
            vec!["[::1]:3333".parse::<SocketAddr>().unwrap()]
        );
        assert_eq!(
            resolve_peer("::1", 3333).await.unwrap(),
            vec!["[::1]:3333".parse::<SocketAddr>().unwrap()]
        );
    }

    #[test]
    fn test_has_port() {
        assert!(has_port("example.com:80"));
        assert!(!has_port("example.com"));
        assert!(!has_port("example.com:http"));
        assert!(!has_port(":80"));
    }

    #[tokio::test]
    async fn test_gives_up_when_policy_exhausted() {
        // 아무도 리슨하지 않는 포트
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let dir = tempfile::tempdir().unwrap();
        let mut client = Client::new(Config::default())
            .with_root(dir.path())
            .with_retry_policy(FixedDelay::new(Duration::from_millis(5)).with_max_attempts(3));

        let err = client
            .sync(&format!("127.0.0.1:{}", port))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RetriesExhausted { attempts: 3, .. }), "{err}");
    }

    #[tokio::test]
    async fn test_sync_stream_over_duplex() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        let path = src_dir.path().join("d.bin");
        std::fs::write(&path, vec![42u8; 5000]).unwrap();

        let config = Config::default().with_block_size(1024);
        let cache = crate::ChecksumCache::build(&[&path], 1024).unwrap();
        let client = Client::new(config).with_root(dst_dir.path());

        let (a, b) = tokio::io::duplex(4096);
        let (sent, received) = tokio::join!(
            crate::server::serve_connection(a, &cache),
            client.sync_stream(b)
        );

        assert_eq!(sent.unwrap().transferred_blocks(), 5);
        assert_eq!(received.unwrap().transferred_bytes(), 5000);
        assert_eq!(std::fs::read(dst_dir.path().join("d.bin")).unwrap(), vec![42u8; 5000]);
    }
}
