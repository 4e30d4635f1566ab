use anyhow::Context as _;

/// Installs the stderr subscriber.
///
/// `RUST_LOG` wins when set; otherwise library logs are shown at `warn`, or
/// at `debug` with `--verbose`.
pub fn init(verbose: bool) -> anyhow::Result<()> {
    let fallback = if verbose { "marginalia_core=debug,marginalia=debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(fallback))
        .context("build log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}
