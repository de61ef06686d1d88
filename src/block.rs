//! 블록 분할과 블록 체크섬
//!
//! - Block: 파일의 고정 오프셋 구간, 마지막 블록만 짧을 수 있음
//! - Checksum Vector: 블록별 CRC32 (IEEE)
//! - Match Vector: 블록별 양쪽 체크섬 일치 여부

use std::io::{self, Read, Seek, SeekFrom};

/// 블록 인덱스
pub type BlockIndex = u64;

/// 블록별 CRC32
pub type ChecksumVector = Vec<u32>;

/// 블록별 일치 여부 (true = 일치, 전송 불필요)
pub type MatchVector = Vec<bool>;

/// 파일 크기와 블록 크기로 정해지는 블록 배치
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    /// 파일 크기 (바이트)
    pub file_size: u64,

    /// 블록 크기 (바이트)
    pub block_size: u64,
}

impl BlockLayout {
    pub fn new(file_size: u64, block_size: usize) -> Self {
        debug_assert!(block_size > 0);
        Self {
            file_size,
            block_size: block_size as u64,
        }
    }

    /// 블록 수: ceil(file_size / block_size)
    pub fn block_count(&self) -> u64 {
        self.file_size.div_ceil(self.block_size)
    }

    /// 블록 시작 오프셋
    pub fn offset(&self, index: BlockIndex) -> u64 {
        index * self.block_size
    }

    /// 블록 길이
    ///
    /// 마지막 블록은 `file_size - index * block_size`, 나머지는 `block_size`.
    pub fn block_len(&self, index: BlockIndex) -> usize {
        let offset = self.offset(index);
        if offset >= self.file_size {
            return 0;
        }
        (self.file_size - offset).min(self.block_size) as usize
    }

    /// 블록 인덱스 순회
    pub fn indices(&self) -> impl Iterator<Item = BlockIndex> {
        0..self.block_count()
    }
}

/// 처음부터 블록 단위로 읽어 체크섬 벡터 계산
///
/// 호출 전에 다른 용도로 읽었을 수 있으므로 항상 0으로 seek 한다.
/// 블록 하나라도 기대한 길이만큼 읽지 못하면 `UnexpectedEof` I/O 에러
/// (외부에서 동시에 수정되었거나 잘린 파일).
pub fn compute_checksums<R: Read + Seek>(
    reader: &mut R,
    layout: BlockLayout,
) -> io::Result<ChecksumVector> {
    reader.seek(SeekFrom::Start(0))?;

    let mut buf = vec![0u8; layout.block_len(0)];
    let mut checksums = Vec::with_capacity(layout.block_count() as usize);

    for index in layout.indices() {
        let len = layout.block_len(index);
        read_block(reader, &mut buf[..len], index)?;
        checksums.push(crc32fast::hash(&buf[..len]));
    }

    Ok(checksums)
}

/// 정확히 `buf.len()` 바이트를 읽음
pub(crate) fn read_block<R: Read>(reader: &mut R, buf: &mut [u8], index: BlockIndex) -> io::Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "블록 {} 읽기 부족: expected {} bytes, got {}",
                        index,
                        buf.len(),
                        filled
                    ),
                ));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// 매치 벡터 계산: `local[i] == peer[i]`
///
/// 길이가 다르면 짧은 쪽을 넘는 블록은 불일치로 본다.
pub fn compare_checksums(local: &[u32], peer: &[u32]) -> MatchVector {
    peer.iter()
        .enumerate()
        .map(|(i, expected)| local.get(i) == Some(expected))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_layout_scenario() {
        // 150000 바이트, 64KB 블록 -> 65536, 65536, 18928
        let layout = BlockLayout::new(150_000, 65536);
        assert_eq!(layout.block_count(), 3);
        assert_eq!(layout.block_len(0), 65536);
        assert_eq!(layout.block_len(1), 65536);
        assert_eq!(layout.block_len(2), 18928);
        assert_eq!(layout.offset(2), 131072);
    }

    #[test]
    fn test_layout_exact_multiple() {
        let layout = BlockLayout::new(4 * 1024, 1024);
        assert_eq!(layout.block_count(), 4);
        assert_eq!(layout.block_len(3), 1024);
        assert_eq!(layout.block_len(4), 0);
    }

    #[test]
    fn test_layout_empty_file() {
        let layout = BlockLayout::new(0, 1024);
        assert_eq!(layout.block_count(), 0);
        assert_eq!(layout.indices().count(), 0);
    }

    #[test]
    fn test_checksums_match_direct_crc() {
        let data: Vec<u8> = (0..2500u32).map(|i| (i % 251) as u8).collect();
        let mut cursor = Cursor::new(data.clone());

        // 다른 용도로 읽은 뒤에도 0부터 계산해야 함
        cursor.seek(SeekFrom::Start(1234)).unwrap();

        let checksums = compute_checksums(&mut cursor, BlockLayout::new(2500, 1000)).unwrap();
        assert_eq!(
            checksums,
            vec![
                crc32fast::hash(&data[..1000]),
                crc32fast::hash(&data[1000..2000]),
                crc32fast::hash(&data[2000..]),
            ]
        );
    }

    #[test]
    fn test_short_file_is_io_error() {
        // 레이아웃은 3000 바이트를 기대하지만 실제로는 2500
        let mut cursor = Cursor::new(vec![7u8; 2500]);
        let err = compute_checksums(&mut cursor, BlockLayout::new(3000, 1000)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_compare_checksums() {
        assert_eq!(compare_checksums(&[1, 2, 3], &[1, 9, 3]), vec![true, false, true]);
        assert_eq!(compare_checksums(&[1], &[1, 2]), vec![true, false]);
        assert!(compare_checksums(&[], &[]).is_empty());
    }
}
