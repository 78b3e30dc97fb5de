//! nprobe - ICMP echo, TCP connect and HTTP reachability probing

use clap::Parser;
use network_probe::{
    app::App,
    cli::Cli,
    config::{load_config, EnvManager},
    error::{AppError, ErrorReporter},
};
use std::process;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(99);
    }));

    let cli = Cli::parse();

    if cli.should_show_topic_help() {
        println!("{}", cli.display_help());
        return;
    }

    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose || cli.debug);
    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            reporter.report_error(&e);
            e.exit_code()
        }
    };
    process::exit(code);
}

async fn run(cli: Cli) -> Result<i32, AppError> {
    if let Some(path) = &cli.init_env {
        EnvManager::save_example_env_file(path)?;
        println!("Wrote example configuration to {}", path.display());
        return Ok(0);
    }

    let config = load_config(cli)?;
    let app = App::new(config);

    let summary = app.run().await?;
    println!("{}", app.render(&summary)?);

    Ok(summary.exit_code())
}
