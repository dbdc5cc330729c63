use std::time::Duration;

use anyhow::Result;
use clap::{ArgAction, Parser};
use rpcwrk::{logging, HttpInvoker, RunConfig, Statistics, Work};

/// Load generator for unary RPC endpoints.
///
/// Every call POSTs a JSON `HelloRequest` over a fresh HTTP/1.1 connection
/// and expects a JSON `HelloReply` back. gRPC framing is not spoken.
#[derive(Parser, Debug)]
#[command(author, version)]
struct Args {
    /// Number of requests to run
    #[arg(short = 'n', default_value_t = 200)]
    requests: usize,

    /// Number of workers to run concurrently
    #[arg(short = 'c', default_value_t = 50)]
    concurrency: usize,

    /// Rate limit in queries per second, per worker. 0 means no limit
    #[arg(short = 'q', default_value_t = 0.0)]
    qps: f64,

    /// Timeout for each request in seconds
    #[arg(short = 'T', default_value_t = 20)]
    timeout: u64,

    /// Number of runtime threads to use
    #[arg(short = 't', default_value_t = num_cpus::get())]
    threads: usize,

    /// Name to put into requests, may be repeated
    #[arg(long = "name")]
    names: Vec<String>,

    /// Be verbose in terms of logging
    #[arg(short, action = ArgAction::Count)]
    verbose: u8,

    /// Target endpoint, an http:// URL taking JSON POSTs over HTTP/1.1
    #[arg(default_value = "http://localhost:50051/helloworld.Greeter/SayHello")]
    url: String,
}

fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    // 初始化日志
    logging::init(args.verbose);

    let mut builder = RunConfig::builder(args.url)
        .requests(args.requests)
        .concurrency(args.concurrency)
        .qps(args.qps)
        .timeout(Duration::from_secs(args.timeout));
    if !args.names.is_empty() {
        builder = builder.names(args.names);
    }
    let config = builder.build()?;

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(args.threads.max(1))
        .enable_all()
        .build()?
        .block_on(run(config))
}

async fn run(config: RunConfig) -> Result<()> {
    println!("Running {} requests @ {}", config.requests(), config.endpoint());
    println!(
        "  {} workers, {} requests each",
        config.concurrency(),
        config.calls_per_worker()
    );

    let invoker = HttpInvoker::new(config.endpoint())?;
    let work = Work::new(config, invoker, Statistics::stdout()?);

    // Ctrl-C 时让 worker 优雅退出
    let stop = work.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.request_stop();
        }
    });

    let summary = work.run().await?;
    tracing::debug!(requests = summary.requests, errors = summary.errors, "run completed");

    Ok(())
}
