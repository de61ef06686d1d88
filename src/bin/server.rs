//! blocksync 서버 (소스)
//!
//! 지정한 파일들의 블록 체크섬을 시작 시 한 번 계산해 두고,
//! 접속하는 대상마다 차이 나는 블록만 전송한다.
//!
//! 사용법:
//!   cargo run --release --bin blocksync-server -- [OPTIONS] <FILES>...
//!
//! 예시:
//!   cargo run --release --bin blocksync-server -- a.txt b.bin
//!   cargo run --release --bin blocksync-server -- --port 4000 --block-size 4194304 disk.img

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use blocksync::{ChecksumCache, Config, Server, DEFAULT_BLOCK_SIZE, DEFAULT_PORT};

#[derive(Parser, Debug)]
#[command(name = "blocksync-server", version)]
#[command(about = "blocksync 소스: 파일 목록을 제공하고 차이 나는 블록만 전송")]
struct Args {
    /// 바인드 주소
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// 리슨 포트
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// 블록 크기 (바이트), 클라이언트와 같아야 함
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// 제공할 파일 (목록 순서대로 전송)
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정 (RUST_LOG 없으면 info)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = Config::default()
        .with_block_size(args.block_size)
        .with_port(args.port);
    config.validate()?;

    info!("blocksync server starting...");
    info!("Block size: {} bytes", config.block_size);
    info!("Calculating hashes for {} files...", args.files.len());

    let files = args.files.clone();
    let block_size = config.block_size;
    let cache =
        tokio::task::spawn_blocking(move || ChecksumCache::build(files.as_slice(), block_size)).await??;
    info!("Hashes done");

    let server = Server::bind(SocketAddr::new(args.bind, args.port), config, cache).await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                // 시그널 대기 불가, 종료 없이 계속 수락
                warn!("Ctrl-C 핸들러 설치 실패: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}
