mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "funcraft", about = "Build Function Compute functions and their dependencies")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build functions into .fun/build/artifacts and write a rewritten template
    Build(RunArgs),
    /// Install function dependencies in place
    Install(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// `service/function`, a service name, or a function name
    build_name: Option<String>,
    /// Build inside the runtime container even without a Funfile
    #[arg(long, short = 'd')]
    use_docker: bool,
    /// Path to the template
    #[arg(long, short = 't', default_value = "template.yml")]
    template: PathBuf,
    /// Show install output and debug logs
    #[arg(long)]
    verbose: bool,
}

impl RunArgs {
    fn into_options(self) -> commands::RunOptions {
        commands::RunOptions {
            build_name: self.build_name,
            use_docker: self.use_docker,
            template: self.template,
            verbose: self.verbose,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let verbose = match &cli.command {
        Commands::Build(args) | Commands::Install(args) => args.verbose,
    };
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Build(args) => commands::build(args.into_options()).await?,
        Commands::Install(args) => commands::install(args.into_options()).await?,
    }

    Ok(())
}
