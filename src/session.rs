//! 전송 세션
//!
//! 파일 하나에 대한 고정 순서 교환:
//! 1. 소스가 식별자(이름, 크기)와 체크섬 벡터를 보냄
//! 2. 대상이 자기 파일 크기를 맞추고 로컬 체크섬을 계산해 매치 벡터를 돌려줌
//! 3. 소스는 매치 벡터가 false인 블록만 오름차순으로 보냄
//! 4. 대상은 받은 블록을 쓰면서 CRC를 다시 계산해 소스 체크섬과 대조
//!
//! 매치 벡터는 항상 대상 측이 계산한다. 어떤 블록을 갱신할지는 대상이 자기
//! 파일을 보고 직접 판단한다.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{debug, info};

use crate::block::{compare_checksums, compute_checksums, read_block, BlockLayout};
use crate::cache::{CachedFile, ChecksumCache};
use crate::codec::{MessageReader, MessageWriter};
use crate::message::{FileDescriptor, Message};
use crate::progress::ProgressObserver;
use crate::stats::{FileStats, TransferStats};
use crate::{Config, Error, Result};

/// 소스 역할: 연결 하나에서 캐시의 모든 파일을 목록 순서대로 전송
pub async fn run_source<R, W>(
    reader: &mut MessageReader<R>,
    writer: &mut MessageWriter<W>,
    cache: &ChecksumCache,
) -> Result<TransferStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stats = TransferStats::new();
    let count = u32::try_from(cache.len())
        .ok()
        .filter(|count| *count <= i32::MAX as u32)
        .ok_or_else(|| Error::InvalidConfig(format!("파일이 너무 많음: {}", cache.len())))?;

    writer.send(&Message::FileCount(count)).await?;

    for entry in cache.files() {
        let file_stats = send_file(reader, writer, entry, cache.block_size()).await?;
        stats.push(file_stats);
    }

    Ok(stats)
}

/// 소스 역할: 파일 하나
///
/// 캐시된 체크섬은 파일 크기/수정 시각이 그대로일 때만 재사용한다.
pub async fn send_file<R, W>(
    reader: &mut MessageReader<R>,
    writer: &mut MessageWriter<W>,
    entry: &CachedFile,
    block_size: usize,
) -> Result<FileStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let path = entry.path.as_path();
    let mut file = File::open(path).map_err(|source| Error::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let metadata = file.metadata().map_err(|e| Error::file(path, e))?;

    let (descriptor, checksums): (FileDescriptor, Arc<[u32]>) = if entry.is_fresh(&metadata) {
        (entry.descriptor.clone(), entry.checksums.clone())
    } else {
        debug!("체크섬 캐시가 오래됨, 다시 계산: {:?}", path);
        let descriptor = FileDescriptor::new(entry.descriptor.name.clone(), metadata.len())?;
        let layout = BlockLayout::new(descriptor.size, block_size);
        let checksums = compute_checksums(&mut file, layout).map_err(|e| Error::file(path, e))?;
        (descriptor, checksums.into())
    };

    let layout = BlockLayout::new(descriptor.size, block_size);
    let mut stats = FileStats::new(&descriptor.name, descriptor.size, layout.block_count());

    writer.send(&Message::Descriptor(descriptor.clone())).await?;
    writer
        .send(&Message::SourceChecksums(checksums.to_vec()))
        .await?;

    let matches = reader.read_match_vector(checksums.len()).await?;

    let mut buf = vec![0u8; layout.block_len(0)];
    for (index, matched) in layout.indices().zip(matches) {
        if matched {
            stats.record_match();
            continue;
        }

        let len = layout.block_len(index);
        file.seek(SeekFrom::Start(layout.offset(index)))
            .map_err(|e| Error::file(path, e))?;
        read_block(&mut file, &mut buf[..len], index).map_err(|e| Error::file(path, e))?;

        writer.send_block(&buf[..len]).await?;
        stats.record_transfer(len);
    }

    debug!(
        "파일 전송 완료: {} ({}/{} blocks, {} bytes)",
        descriptor.name, stats.transferred_blocks, stats.total_blocks, stats.transferred_bytes
    );

    Ok(stats)
}

/// 대상 역할: 연결 하나에서 소스가 보내는 파일 수만큼 순서대로 수신
pub async fn run_destination<R, W, O>(
    reader: &mut MessageReader<R>,
    writer: &mut MessageWriter<W>,
    root: &Path,
    config: &Config,
    observer: &O,
) -> Result<TransferStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    O: ProgressObserver + ?Sized,
{
    let mut stats = TransferStats::new();
    let count = reader.read_file_count().await?;
    debug!("파일 수: {}", count);

    for _ in 0..count {
        let file_stats = receive_file(reader, writer, root, config, observer).await?;
        stats.push(file_stats);
    }

    Ok(stats)
}

/// 대상 역할: 파일 하나
///
/// 받은 크기로 로컬 파일을 먼저 맞춘 뒤(잘라내기/늘리기) 블록 I/O를 한다.
/// 중간에 끊기면 파일은 크기만 맞고 일부 블록이 옛 내용인 상태로 남으며,
/// 다음 시도의 체크섬 비교에서 그 블록들이 다시 전송된다.
pub async fn receive_file<R, W, O>(
    reader: &mut MessageReader<R>,
    writer: &mut MessageWriter<W>,
    root: &Path,
    config: &Config,
    observer: &O,
) -> Result<FileStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    O: ProgressObserver + ?Sized,
{
    let descriptor = reader.read_descriptor(config.max_file_name_len).await?;
    descriptor.validate_local_name()?;
    if descriptor.size > config.max_file_size {
        return Err(Error::FileTooLarge {
            size: descriptor.size,
            max: config.max_file_size,
        });
    }

    let layout = BlockLayout::new(descriptor.size, config.block_size);
    let block_count = usize::try_from(layout.block_count()).map_err(|_| Error::FileTooLarge {
        size: descriptor.size,
        max: config.max_file_size,
    })?;

    info!("{}, size = {} bytes", descriptor.name, descriptor.size);

    let path = root.join(&descriptor.name);
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(|source| Error::FileOpen {
            path: path.clone(),
            source,
        })?;
    file.set_len(descriptor.size)
        .map_err(|e| Error::file(&path, e))?;

    let local = compute_checksums(&mut file, layout).map_err(|e| Error::file(&path, e))?;
    let peer = reader.read_checksums(block_count).await?;

    let matches = compare_checksums(&local, &peer);
    writer.send(&Message::MatchVector(matches.clone())).await?;

    observer.on_file_start(&descriptor, layout.block_count());

    let mut stats = FileStats::new(&descriptor.name, descriptor.size, layout.block_count());
    let mut buf = vec![0u8; config.io_buffer_size.min(layout.block_len(0)).max(1)];

    for (index, matched) in layout.indices().zip(matches) {
        if matched {
            stats.record_match();
        } else {
            let len = layout.block_len(index);
            file.seek(SeekFrom::Start(layout.offset(index)))
                .map_err(|e| Error::file(&path, e))?;

            let got = reader
                .read_block(len, &mut buf, |chunk| {
                    file.write_all(chunk).map_err(|e| Error::file(&path, e))
                })
                .await?;

            let expected = peer[index as usize];
            if got != expected {
                return Err(Error::ChecksumMismatch {
                    file: descriptor.name.clone(),
                    block: index,
                    expected,
                    got,
                });
            }
            stats.record_transfer(len);
        }

        observer.on_progress(index, matched);
    }

    debug!(
        "파일 수신 완료: {} ({} matched, {} transferred)",
        descriptor.name, stats.matched_blocks, stats.transferred_blocks
    );
    observer.on_file_complete(&descriptor, &stats);

    Ok(stats)
}
