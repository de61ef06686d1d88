//! 에러 타입 정의

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::message::Step;

/// 에러 분류
///
/// 와이어 포맷에 재동기화 마커가 없으므로 `Decode`와 `Verification`은
/// 해당 연결에서 복구할 수 없다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 접속/수락 실패, 스트림 중간 끊김
    Connection,
    /// 메시지 해석 실패
    Decode,
    /// 수신 블록 체크섬 불일치
    Verification,
    /// 로컬 파일 I/O 실패
    LocalIo,
    /// 잘못된 설정 또는 파일 목록
    Config,
}

/// blocksync 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("파일 열기 실패 {path:?}: {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("파일 IO 에러 {path:?}: {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("스트림이 메시지 도중에 끝남: {step:?}")]
    Truncated { step: Step },

    #[error("유효하지 않은 파일 수: {0}")]
    InvalidFileCount(i32),

    #[error("유효하지 않은 파일 크기: {0}")]
    InvalidFileSize(i64),

    #[error("파일 크기 초과: {size} > 최대 {max}")]
    FileTooLarge { size: u64, max: u64 },

    #[error("유효하지 않은 파일 이름 {name:?}: {reason}")]
    InvalidFileName { name: String, reason: &'static str },

    #[error("파일 이름이 너무 김: 최대 {max} 바이트")]
    FileNameTooLong { max: usize },

    #[error("CRC 불일치: file={file}, block={block}, expected {expected:08X}, got {got:08X}")]
    ChecksumMismatch {
        file: String,
        block: u64,
        expected: u32,
        got: u32,
    },

    #[error("주소 해석 실패: {0}")]
    Resolve(String),

    #[error("접속 타임아웃: {0}")]
    ConnectTimeout(String),

    #[error("재시도 횟수 초과 ({attempts}회): {last}")]
    RetriesExhausted { attempts: u32, last: Box<Error> },

    #[error("잘못된 설정: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// 로컬 파일 I/O 에러 (경로 포함)
    pub fn file(path: &Path, source: std::io::Error) -> Self {
        Error::FileIo {
            path: path.to_path_buf(),
            source,
        }
    }

    /// 스트림 읽기 에러 변환
    ///
    /// 메시지 도중의 EOF는 `Truncated`로 구분한다.
    pub(crate) fn read(step: Step, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Truncated { step }
        } else {
            Error::Io(err)
        }
    }

    /// 에러 분류
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_)
            | Error::Resolve(_)
            | Error::ConnectTimeout(_)
            | Error::RetriesExhausted { .. } => ErrorKind::Connection,
            Error::Truncated { .. }
            | Error::InvalidFileCount(_)
            | Error::InvalidFileSize(_)
            | Error::FileTooLarge { .. }
            | Error::InvalidFileName { .. }
            | Error::FileNameTooLong { .. } => ErrorKind::Decode,
            Error::ChecksumMismatch { .. } => ErrorKind::Verification,
            Error::FileOpen { .. } | Error::FileIo { .. } => ErrorKind::LocalIo,
            Error::InvalidConfig(_) => ErrorKind::Config,
        }
    }

    /// 대상 측 재접속 루프에서 다시 시도할 가치가 있는지 여부
    ///
    /// 파일을 열 수 없거나, 소스가 같은 잘못된 파일을 다시 보낼 것이 확실한 경우는 false.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Error::FileOpen { .. }
                | Error::FileTooLarge { .. }
                | Error::InvalidFileName { .. }
                | Error::FileNameTooLong { .. }
                | Error::InvalidConfig(_)
                | Error::RetriesExhausted { .. }
        )
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eof_maps_to_truncated() {
        let eof = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
        let err = Error::read(Step::SourceChecksums, eof);
        assert!(matches!(err, Error::Truncated { step: Step::SourceChecksums }));
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_open_failure_is_fatal() {
        let err = Error::FileOpen {
            path: PathBuf::from("a.txt"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert_eq!(err.kind(), ErrorKind::LocalIo);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_checksum_mismatch_is_distinct() {
        let err = Error::ChecksumMismatch {
            file: "a.txt".into(),
            block: 1,
            expected: 1,
            got: 2,
        };
        assert_eq!(err.kind(), ErrorKind::Verification);
        assert!(err.is_recoverable());
    }
}
