mod args;

use clap::Parser;
use sheetpull_core::params::RunParameters;
use sheetpull_core::persist::OutputArtifact;
use sheetpull_core::pipeline::Pipeline;
use sheetpull_error::{Result, ResultExt};
use sheetpull_http::aws::credentials::AwsCredentials;
use sheetpull_http::client::ReqwestClient;
use tracing::{debug, error, info};

use crate::args::Cli;

fn main() {
    let cli = Cli::parse();
    logutil::init(cli.verbose, cli.log_mode.unwrap_or_default().into());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        job_name = ?cli.job.job_name,
        job_run_id = ?cli.job.job_run_id,
        "starting..."
    );
    if !cli.job.runner_args.is_empty() {
        debug!(runner_args = ?cli.job.runner_args, "ignoring job runner arguments");
    }

    let params = RunParameters::from(cli.run);

    // Nested result. Outer result for the panic, inner is execution result.
    let result = std::panic::catch_unwind(move || run(params));

    match result {
        Ok(Err(err)) => {
            error!(kind = %err.kind(), %err, "run failed");
            eprintln!("ERROR: {err}");
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("PANIC: {err:?}");
            std::process::exit(2);
        }
        Ok(Ok(artifact)) => {
            info!(%artifact, "run complete");
            println!("{}", artifact.location);
        }
    }
}

fn run(params: RunParameters) -> Result<OutputArtifact> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_io()
        .enable_time()
        .thread_name("sheetpull_tokio")
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(async move {
        let client = ReqwestClient::default();
        let aws_credentials = AwsCredentials::resolve(&client).await?;
        Pipeline::with_system_clock(client, aws_credentials)
            .run(&params)
            .await
    })
}
