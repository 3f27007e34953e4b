use anyhow::Result;
use commitgrid::cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.common.verbose);

    cli.execute().inspect_err(|err| {
        tracing::error!("run failed, previous artifacts left in place: {err:#}");
    })
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "commitgrid=debug" } else { "commitgrid=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
