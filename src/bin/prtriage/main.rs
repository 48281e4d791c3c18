use anyhow::Context;
use chrono::Utc;
use prtriage::{
    ConfigError, GitHub, github::setup_github_client, load_repositories, parse_args,
    render_report, scan,
};

fn handle_clap_help_version(clap_err: &clap::Error) -> ! {
    use clap::error::ErrorKind;
    match clap_err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            print!("{clap_err}");
            std::process::exit(0);
        }
        _ => {
            eprint!("{clap_err}");
            std::process::exit(2);
        }
    }
}

fn handle_config_error(config_err: &ConfigError) -> ! {
    eprintln!("{config_err}");
    std::process::exit(2);
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let options = match parse_args(std::env::args_os()) {
        Ok(options) => options,
        Err(err) => {
            if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
                handle_clap_help_version(clap_err);
            } else if let Some(config_err) = err.downcast_ref::<ConfigError>() {
                handle_config_error(config_err);
            } else {
                return Err(err);
            }
        }
    };

    let repos = load_repositories(&options.sources, options.timeout)
        .await
        .context("Failed to load repository list")?;
    let client = setup_github_client(options.token.as_deref())?;
    let forge = GitHub::new(client, options.maintainers.clone());

    let spec = options.scan_spec(Utc::now());
    let report = scan(&repos, &spec, &forge).await;

    render_report(
        &report,
        &options.output,
        &mut std::io::stdout().lock(),
        &mut std::io::stderr().lock(),
    )?;

    Ok(())
}
