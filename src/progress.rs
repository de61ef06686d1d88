//! 진행률 알림
//!
//! 코어는 진행률을 그리지 않는다. 블록 하나가 처리될 때마다 옵저버를 호출할 뿐이고
//! 표시는 바이너리(indicatif) 또는 호출자가 맡는다.

use crate::block::BlockIndex;
use crate::message::FileDescriptor;
use crate::stats::FileStats;

/// 대상 측 진행률 옵저버
pub trait ProgressObserver: Send + Sync {
    /// 파일 동기화 시작 (체크섬 교환 직후)
    fn on_file_start(&self, _descriptor: &FileDescriptor, _block_count: u64) {}

    /// 블록 하나 처리 완료 (일치해서 건너뛰었거나 수신/기록 완료)
    fn on_progress(&self, block_index: BlockIndex, matched: bool);

    /// 파일 동기화 완료
    fn on_file_complete(&self, _descriptor: &FileDescriptor, _stats: &FileStats) {}
}

/// 아무것도 하지 않는 옵저버
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _block_index: BlockIndex, _matched: bool) {}
}
