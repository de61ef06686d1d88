//! 프로토콜 설정
//!
//! 블록 크기는 와이어에서 협상되지 않는다. 양쪽 피어가 같은 `block_size`로
//! 실행되어야 하며, 다르면 모든 블록이 불일치로 판정되어 전부 재전송된다.

use std::time::Duration;

use crate::{Error, Result, DEFAULT_BLOCK_SIZE, DEFAULT_PORT};

/// 동기화 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 블록 크기 (바이트), 양쪽 피어가 동일해야 함
    pub block_size: usize,

    /// 소스 측 리슨 포트 / 대상 측 기본 접속 포트
    pub port: u16,

    /// 재접속 대기 시간 (밀리초)
    pub retry_delay_ms: u64,

    /// 접속 시도 타임아웃 (밀리초)
    pub connect_timeout_ms: u64,

    /// 대상 측이 허용하는 최대 파일 크기 (바이트)
    /// 피어가 보낸 크기로 로컬 파일을 잘라내기 전에 검사
    pub max_file_size: u64,

    /// 파일 이름 최대 길이 (바이트, 개행 제외)
    pub max_file_name_len: usize,

    /// 블록 수신 시 스트리밍 버퍼 크기
    pub io_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            port: DEFAULT_PORT,
            retry_delay_ms: 2000,             // 2초 고정 대기
            connect_timeout_ms: 10_000,       // 10초
            max_file_size: 1 << 40,           // 1TB
            max_file_name_len: 4096,
            io_buffer_size: 64 * 1024,        // 64KB
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 대용량 파일용 설정 (4MB 블록)
    ///
    /// 블록 수와 체크섬 벡터가 작아지는 대신 블록 하나가 틀려도 4MB를 다시 보낸다.
    pub fn large_blocks() -> Self {
        Self {
            block_size: 4 * 1024 * 1024,
            io_buffer_size: 256 * 1024,
            ..Self::default()
        }
    }

    /// 블록 크기 변경
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// 포트 변경
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// 재접속 대기 시간
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// 접속 타임아웃
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::InvalidConfig("block_size는 0보다 커야 함".into()));
        }
        if self.block_size as u64 > u32::MAX as u64 {
            return Err(Error::InvalidConfig(format!(
                "block_size {} 가 너무 큼 (최대 {})",
                self.block_size,
                u32::MAX
            )));
        }
        if self.io_buffer_size == 0 {
            return Err(Error::InvalidConfig("io_buffer_size는 0보다 커야 함".into()));
        }
        if self.max_file_name_len == 0 {
            return Err(Error::InvalidConfig("max_file_name_len은 0보다 커야 함".into()));
        }
        Ok(())
    }
}
