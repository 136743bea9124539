use std::sync::Arc;

use anyhow::Result;
use atp_cli::server::{router, serve};
use atp_cli::startup::{build_pipeline, init_tracing};
use atp_core::config::Config;

fn main() -> Result<()> {
    init_tracing();
    let config = Config::load()?;
    let settings = config.settings()?;
    let base = std::env::current_dir()?;
    let addr = settings.server.socket_addr()?;

    // Built outside the runtime: model loading and the index's own runtime
    // must not block or nest inside an async context.
    let pipeline = Arc::new(build_pipeline(&settings, &base)?);

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let served = runtime.block_on(serve(addr, router(pipeline.clone())));
    // Tear down the HTTP runtime before the last pipeline handle goes away.
    drop(runtime);
    drop(pipeline);
    served
}
