//! 프로토콜 메시지 정의
//!
//! 메시지 타입 태그도, 길이 프리픽스도 없다. 양쪽이 아래 순서를 그대로
//! 실행하는 고정 스크립트이며 분기는 매치 벡터 값에서만 일어난다.
//!
//! ```text
//! Source → Dest:   i32 fileCount                      (연결당 1회)
//! 파일마다:
//!   Source → Dest: filename '\n'
//!   Source → Dest: i64 fileSize
//!   Source → Dest: u32[blockCount] sourceChecksums
//!   Dest → Source: bool[blockCount] matchVector
//!   matchVector[i] == false 인 i 마다 (오름차순):
//!     Source → Dest: blockLen(i) 바이트
//! ```
//!
//! 정수는 모두 리틀 엔디언.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Result};

/// 프로토콜 참여자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// 파일을 제공하는 쪽 (리슨)
    Source,
    /// 파일을 갱신하는 쪽 (접속)
    Destination,
}

/// 프로토콜 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// i32 파일 수
    FileCount,
    /// 파일 이름 + '\n' + i64 크기
    Descriptor,
    /// u32 x blockCount
    SourceChecksums,
    /// bool x blockCount
    MatchVector,
    /// 불일치 블록 원본 바이트
    BlockData,
}

impl Step {
    /// 파일 하나에 대한 단계 순서
    pub const FILE_SEQUENCE: [Step; 4] = [
        Step::Descriptor,
        Step::SourceChecksums,
        Step::MatchVector,
        Step::BlockData,
    ];

    /// 이 단계를 보내는 쪽
    pub const fn sender(self) -> Role {
        match self {
            Step::MatchVector => Role::Destination,
            _ => Role::Source,
        }
    }
}

/// 파일 식별자
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// 파일 이름 (개행 불가)
    pub name: String,

    /// 파일 크기 (바이트), 소스 측 값이 기준
    pub size: u64,
}

impl FileDescriptor {
    /// 소스 측에서 와이어로 보낼 수 있는 이름인지 검사하여 생성
    pub fn new(name: impl Into<String>, size: u64) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidFileName {
                name,
                reason: "빈 이름",
            });
        }
        if name.contains('\n') {
            return Err(Error::InvalidFileName {
                name,
                reason: "개행 문자 포함",
            });
        }
        if size > i64::MAX as u64 {
            return Err(Error::FileTooLarge {
                size,
                max: i64::MAX as u64,
            });
        }
        Ok(Self { name, size })
    }

    /// 대상 측에서 로컬 경로로 써도 안전한 이름인지 검사
    ///
    /// 디렉터리 구성요소를 허용하지 않으므로 루트 디렉터리 밖으로 나갈 수 없다.
    pub fn validate_local_name(&self) -> Result<()> {
        let reason = if self.name.is_empty() {
            Some("빈 이름")
        } else if self.name == "." || self.name == ".." {
            Some("상대 경로 구성요소")
        } else if self.name.contains(&['/', '\\'][..]) {
            Some("경로 구분자 포함")
        } else if self.name.contains(&['\0', '\n'][..]) {
            Some("제어 문자 포함")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(Error::InvalidFileName {
                name: self.name.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

/// 와이어 메시지 (타입이 있는 페이로드)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    FileCount(u32),
    Descriptor(FileDescriptor),
    SourceChecksums(Vec<u32>),
    MatchVector(Vec<bool>),
    BlockData(Bytes),
}

impl Message {
    /// 메시지 단계
    pub fn step(&self) -> Step {
        match self {
            Message::FileCount(_) => Step::FileCount,
            Message::Descriptor(_) => Step::Descriptor,
            Message::SourceChecksums(_) => Step::SourceChecksums,
            Message::MatchVector(_) => Step::MatchVector,
            Message::BlockData(_) => Step::BlockData,
        }
    }

    /// 인코딩된 길이
    pub fn encoded_len(&self) -> usize {
        match self {
            Message::FileCount(_) => 4,
            Message::Descriptor(desc) => desc.name.len() + 1 + 8,
            Message::SourceChecksums(checksums) => checksums.len() * 4,
            Message::MatchVector(matches) => matches.len(),
            Message::BlockData(data) => data.len(),
        }
    }

    /// 버퍼에 인코딩
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        match self {
            Message::FileCount(count) => dst.put_i32_le(*count as i32),
            Message::Descriptor(desc) => {
                dst.put_slice(desc.name.as_bytes());
                dst.put_u8(b'\n');
                dst.put_i64_le(desc.size as i64);
            }
            Message::SourceChecksums(checksums) => {
                for checksum in checksums {
                    dst.put_u32_le(*checksum);
                }
            }
            Message::MatchVector(matches) => {
                for matched in matches {
                    dst.put_u8(u8::from(*matched));
                }
            }
            Message::BlockData(data) => dst.put_slice(data),
        }
    }

    /// 바이트로 직렬화
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_senders() {
        let senders: Vec<Role> = Step::FILE_SEQUENCE.iter().map(|s| s.sender()).collect();
        assert_eq!(
            senders,
            vec![Role::Source, Role::Source, Role::Destination, Role::Source]
        );
        assert_eq!(Step::FileCount.sender(), Role::Source);

        assert_eq!(Message::MatchVector(vec![true]).step().sender(), Role::Destination);
        assert_eq!(Message::BlockData(Bytes::from_static(b"x")).step(), Step::BlockData);
    }

    #[test]
    fn test_descriptor_encoding() {
        let desc = FileDescriptor::new("a.txt", 150_000).unwrap();
        let bytes = Message::Descriptor(desc).to_bytes();

        let mut expected = b"a.txt\n".to_vec();
        expected.extend_from_slice(&150_000i64.to_le_bytes());
        assert_eq!(bytes.as_ref(), expected.as_slice());
    }

    #[test]
    fn test_vectors_are_not_length_prefixed() {
        let checksums = Message::SourceChecksums(vec![0x0102_0304, 0xAABB_CCDD]).to_bytes();
        assert_eq!(
            checksums.as_ref(),
            &[0x04, 0x03, 0x02, 0x01, 0xDD, 0xCC, 0xBB, 0xAA]
        );

        let matches = Message::MatchVector(vec![true, false, true]).to_bytes();
        assert_eq!(matches.as_ref(), &[1, 0, 1]);
    }

    #[test]
    fn test_descriptor_rejects_newline() {
        assert!(matches!(
            FileDescriptor::new("bad\nname", 1),
            Err(Error::InvalidFileName { .. })
        ));
        assert!(FileDescriptor::new("", 1).is_err());
    }

    #[test]
    fn test_local_name_validation() {
        let ok = FileDescriptor::new("a.txt", 0).unwrap();
        assert!(ok.validate_local_name().is_ok());

        for name in ["..", ".", "../etc/passwd", "dir/file", "dir\\file", "nul\0"] {
            let desc = FileDescriptor {
                name: name.to_string(),
                size: 0,
            };
            assert!(desc.validate_local_name().is_err(), "{name:?} 허용되면 안 됨");
        }
    }
}
