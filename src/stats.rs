//! 전송 통계
//!
//! 연결마다 따로 집계한다. 연결 사이에 공유되는 가변 상태는 없다.

use std::time::{Duration, Instant};

/// 파일 하나의 동기화 통계
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStats {
    /// 파일 이름
    pub name: String,

    /// 파일 크기
    pub size: u64,

    /// 총 블록 수
    pub total_blocks: u64,

    /// 체크섬 일치로 건너뛴 블록 수
    pub matched_blocks: u64,

    /// 전송된 블록 수
    pub transferred_blocks: u64,

    /// 전송된 블록 페이로드 바이트 (헤더/체크섬 제외)
    pub transferred_bytes: u64,
}

impl FileStats {
    pub fn new(name: impl Into<String>, size: u64, total_blocks: u64) -> Self {
        Self {
            name: name.into(),
            size,
            total_blocks,
            matched_blocks: 0,
            transferred_blocks: 0,
            transferred_bytes: 0,
        }
    }

    /// 일치 블록 기록
    pub fn record_match(&mut self) {
        self.matched_blocks += 1;
    }

    /// 전송 블록 기록
    pub fn record_transfer(&mut self, len: usize) {
        self.transferred_blocks += 1;
        self.transferred_bytes += len as u64;
    }

    /// 모든 블록이 처리되었는지
    pub fn is_complete(&self) -> bool {
        self.matched_blocks + self.transferred_blocks == self.total_blocks
    }

    /// 재사용률 (일치 블록 비율)
    pub fn match_ratio(&self) -> f64 {
        if self.total_blocks == 0 {
            return 1.0;
        }
        self.matched_blocks as f64 / self.total_blocks as f64
    }
}

/// 연결 하나(파일 여러 개)의 전송 통계
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 파일별 통계 (처리 순서)
    pub files: Vec<FileStats>,
}

impl TransferStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            files: Vec::new(),
        }
    }

    /// 파일 통계 추가
    pub fn push(&mut self, file: FileStats) {
        self.files.push(file);
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 총 블록 수
    pub fn total_blocks(&self) -> u64 {
        self.files.iter().map(|f| f.total_blocks).sum()
    }

    /// 총 전송 블록 수
    pub fn transferred_blocks(&self) -> u64 {
        self.files.iter().map(|f| f.transferred_blocks).sum()
    }

    /// 총 전송 바이트
    pub fn transferred_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.transferred_bytes).sum()
    }

    /// 블록 페이로드 처리율 (bytes/sec)
    pub fn throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.transferred_bytes() as f64 / elapsed
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Files: {}, Blocks: {}/{} transferred, Bytes: {}, Elapsed: {:.2}s, Throughput: {:.2} MB/s",
            self.files.len(),
            self.transferred_blocks(),
            self.total_blocks(),
            self.transferred_bytes(),
            self.elapsed().as_secs_f64(),
            self.throughput() / 1_000_000.0
        )
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stats_completion() {
        let mut stats = FileStats::new("a.txt", 150_000, 3);
        stats.record_match();
        stats.record_transfer(65536);
        assert!(!stats.is_complete());
        stats.record_match();
        assert!(stats.is_complete());
        assert_eq!(stats.transferred_bytes, 65536);
        assert!((stats.match_ratio() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_transfer_totals() {
        let mut total = TransferStats::new();
        let mut a = FileStats::new("a", 10, 1);
        a.record_transfer(10);
        let mut b = FileStats::new("b", 20, 2);
        b.record_match();
        b.record_transfer(4);
        total.push(a);
        total.push(b);

        assert_eq!(total.total_blocks(), 3);
        assert_eq!(total.transferred_blocks(), 2);
        assert_eq!(total.transferred_bytes(), 14);
        assert!(total.summary().starts_with("Files: 2"));
    }
}
