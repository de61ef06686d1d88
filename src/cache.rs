//! 소스 측 체크섬 캐시
//!
//! 시작할 때 한 번 계산하고 이후로는 읽기 전용이다. 모든 연결 태스크가
//! `Arc`로 같은 스냅샷을 공유하므로 락이 필요 없다.

use std::collections::HashSet;
use std::fs::{File, Metadata};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::block::{compute_checksums, BlockLayout};
use crate::message::FileDescriptor;
use crate::{Error, Result};

/// 캐시된 파일 하나
#[derive(Debug, Clone)]
pub struct CachedFile {
    /// 로컬 경로
    pub path: PathBuf,

    /// 와이어로 보낼 식별자 (경로의 마지막 구성요소 + 크기)
    pub descriptor: FileDescriptor,

    /// 계산 당시 수정 시각
    pub modified: Option<SystemTime>,

    /// 블록별 CRC32
    pub checksums: Arc<[u32]>,
}

impl CachedFile {
    /// 현재 메타데이터가 스냅샷과 같은지 (다르면 연결 단위로 다시 계산)
    pub fn is_fresh(&self, metadata: &Metadata) -> bool {
        metadata.len() == self.descriptor.size && metadata.modified().ok() == self.modified
    }
}

/// 파일 목록 순서대로의 체크섬 스냅샷
#[derive(Debug, Clone)]
pub struct ChecksumCache {
    block_size: usize,
    files: Arc<[CachedFile]>,
}

impl ChecksumCache {
    /// 모든 파일의 체크섬을 병렬로 계산
    pub fn build<P>(paths: &[P], block_size: usize) -> Result<Self>
    where
        P: AsRef<Path> + Sync,
    {
        if block_size == 0 {
            return Err(Error::InvalidConfig("block_size는 0보다 커야 함".into()));
        }

        let files = paths
            .par_iter()
            .map(|path| snapshot_file(path.as_ref(), block_size))
            .collect::<Result<Vec<_>>>()?;

        let mut seen = HashSet::new();
        for file in &files {
            if !seen.insert(file.descriptor.name.as_str()) {
                warn!(
                    "같은 이름의 파일이 여러 개: {} (대상 측에서 덮어써짐)",
                    file.descriptor.name
                );
            }
        }

        Ok(Self {
            block_size,
            files: files.into(),
        })
    }

    /// 캐시 계산에 사용한 블록 크기
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// 파일 목록 (순서 유지)
    pub fn files(&self) -> &[CachedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn snapshot_file(path: &Path, block_size: usize) -> Result<CachedFile> {
    let mut file = File::open(path).map_err(|source| Error::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let metadata = file.metadata().map_err(|e| Error::file(path, e))?;
    if !metadata.is_file() {
        return Err(Error::InvalidConfig(format!("일반 파일이 아님: {:?}", path)));
    }

    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::InvalidFileName {
            name: path.display().to_string(),
            reason: "UTF-8 파일 이름 없음",
        })?;
    let descriptor = FileDescriptor::new(name, metadata.len())?;

    let layout = BlockLayout::new(metadata.len(), block_size);
    let checksums = compute_checksums(&mut file, layout).map_err(|e| Error::file(path, e))?;

    info!(
        "체크섬 계산 완료: {} ({} bytes, {} blocks)",
        descriptor.name,
        descriptor.size,
        checksums.len()
    );

    Ok(CachedFile {
        path: path.to_path_buf(),
        descriptor,
        modified: metadata.modified().ok(),
        checksums: checksums.into(),
    })
}
