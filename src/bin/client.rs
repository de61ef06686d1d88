//! blocksync 클라이언트 (대상)
//!
//! 서버에 접속해 서버가 보내는 파일들을 지정 디렉터리에 동기화한다.
//! 네트워크 실패 시에는 성공할 때까지 재접속하고, 로컬 파일을 열 수 없는 등
//! 복구 불가능한 에러에서만 종료한다.
//!
//! 사용법:
//!   cargo run --release --bin blocksync-client -- [OPTIONS] <HOST>
//!
//! 예시:
//!   cargo run --release --bin blocksync-client -- 192.168.0.10
//!   cargo run --release --bin blocksync-client -- --dir ./mirror --port 4000 server.local

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use blocksync::{
    Client, Config, FileDescriptor, FileStats, FixedDelay, ProgressObserver, DEFAULT_BLOCK_SIZE,
    DEFAULT_PORT,
};

#[derive(Parser, Debug)]
#[command(name = "blocksync-client", version)]
#[command(about = "blocksync 대상: 서버의 파일 목록을 로컬에 동기화")]
struct Args {
    /// 서버 주소 (host 또는 host:port)
    host: String,

    /// 포트 (host에 포트가 없을 때)
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// 파일을 쓸 디렉터리
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// 블록 크기 (바이트), 서버와 같아야 함
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// 재접속 대기 (밀리초)
    #[arg(long, default_value_t = 2000)]
    retry_delay_ms: u64,

    /// 최대 시도 횟수 (기본: 무제한)
    #[arg(long)]
    max_attempts: Option<u32>,

    /// 허용할 최대 파일 크기 (바이트)
    #[arg(long)]
    max_file_size: Option<u64>,
}

/// 파일마다 블록 단위 진행률 바
#[derive(Default)]
struct BarObserver {
    bar: Mutex<Option<ProgressBar>>,
}

impl ProgressObserver for BarObserver {
    fn on_file_start(&self, descriptor: &FileDescriptor, block_count: u64) {
        let bar = ProgressBar::new(block_count);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:>20} [{bar:30.cyan/dim}] {pos}/{len} blocks")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_message(descriptor.name.clone());
        *self.bar.lock() = Some(bar);
    }

    fn on_progress(&self, _block_index: u64, _matched: bool) {
        if let Some(bar) = self.bar.lock().as_ref() {
            bar.inc(1);
        }
    }

    fn on_file_complete(&self, descriptor: &FileDescriptor, stats: &FileStats) {
        if let Some(bar) = self.bar.lock().take() {
            bar.finish_with_message(format!(
                "{} ({} sent)",
                descriptor.name, stats.transferred_blocks
            ));
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정 (RUST_LOG 없으면 info)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = Config::default()
        .with_block_size(args.block_size)
        .with_port(args.port);
    config.retry_delay_ms = args.retry_delay_ms;
    if let Some(max) = args.max_file_size {
        config.max_file_size = max;
    }
    config.validate()?;

    let mut policy = FixedDelay::new(config.retry_delay());
    if let Some(max_attempts) = args.max_attempts {
        policy = policy.with_max_attempts(max_attempts);
    }

    info!("blocksync client starting...");
    info!("Server: {}, output dir: {:?}", args.host, args.dir);

    let mut client = Client::new(config)
        .with_root(&args.dir)
        .with_retry_policy(policy)
        .with_observer(Arc::new(BarObserver::default()));

    let report = client.sync(&args.host).await?;
    info!("Sync complete after {} attempt(s)", report.attempts);
    info!("  {}", report.stats.summary());

    Ok(())
}
