//! # blocksync
//!
//! TCP 위에서 고정 크기 블록 CRC32 비교로 파일을 동기화하는 델타 전송 프로토콜
//!
//! ## 핵심 특징
//! - **고정 블록**: 오프셋 기준 고정 크기 블록 (롤링 체크섬 아님)
//! - **일괄 체크섬 교환**: 블록 데이터가 움직이기 전에 체크섬을 먼저 교환
//! - **대상 측 판정**: 어떤 블록을 받을지 대상이 자기 파일로 직접 계산
//! - **수신 검증**: 받은 블록마다 CRC32를 다시 계산해 전송 중 손상 감지
//! - **연결별 격리**: 소스는 연결마다 독립 태스크, 체크섬 캐시만 읽기 전용 공유
//! - **재접속**: 대상은 성공할 때까지 연결 전체를 재시도 (정책 주입 가능)
//!
//! 블록 크기는 와이어에서 협상하지 않는다. 양쪽이 같은 [`Config::block_size`]를 써야 한다.

pub mod block;
pub mod cache;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod message;
pub mod progress;
pub mod retry;
pub mod server;
pub mod session;
pub mod stats;

pub use block::{BlockIndex, BlockLayout, ChecksumVector, MatchVector};
pub use cache::{CachedFile, ChecksumCache};
pub use client::{Client, SyncReport};
pub use codec::{MessageReader, MessageWriter};
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use message::{FileDescriptor, Message, Role, Step};
pub use progress::{NoopObserver, ProgressObserver};
pub use retry::{ExponentialBackoff, FixedDelay, RetryPolicy};
pub use server::Server;
pub use stats::{FileStats, TransferStats};

/// 기본 블록 크기 (바이트)
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024; // 64KB

/// 기본 포트
pub const DEFAULT_PORT: u16 = 3333;
