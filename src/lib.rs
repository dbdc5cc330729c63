//! A concurrent load generator for unary RPC endpoints.
//!
//! A run issues a fixed number of calls split evenly across a fixed number of
//! workers. Every call produces a [`ResultSample`] that flows through a bounded
//! queue into a [`Reporter`], which renders the final summary once every
//! worker is done.
//!
//! ```no_run
//! use rpcwrk::{HttpInvoker, RunConfig, Statistics, Work};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = RunConfig::builder("http://127.0.0.1:50051/helloworld.Greeter/SayHello")
//!     .requests(1000)
//!     .concurrency(10)
//!     .build()?;
//! let invoker = HttpInvoker::new(config.endpoint())?;
//! let summary = Work::new(config, invoker, Statistics::stdout()?).run().await?;
//! println!("{} calls failed", summary.errors);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod invoker;
pub mod logging;
pub mod report;
pub mod request;
pub mod sample;
pub mod stats;
pub mod work;
pub mod worker;

pub use config::{ConfigError, RunConfig};
pub use invoker::{CallInvoker, HttpInvoker};
pub use report::Reporter;
pub use request::{HelloReply, HelloRequest, RequestFactory};
pub use sample::{CallError, CallOutcome, ResultSample, Timings};
pub use stats::{Statistics, Summary};
pub use work::{StopHandle, Work};
