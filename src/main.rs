use clap::{Parser, Subcommand};

mod api;
mod cli;
mod config;
mod error;
mod output;
mod utils;
mod workflows;

use config::Config;

#[derive(Parser)]
#[command(name = "datacat")]
#[command(about = "Command-line client for the Datacat content catalog")]
#[command(version)]
struct Cli {
    /// Enable verbose logging and diagnostics
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (optional)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the catalog
    Search(cli::search::SearchArgs),

    /// List resources, yours or everyone's
    List(cli::list::ListArgs),

    /// Show a single resource
    Show(cli::show::ShowArgs),

    /// Create a new resource
    Create(cli::create::CreateArgs),

    /// Update an existing resource
    Update(cli::update::UpdateArgs),

    /// Destroy a resource
    Destroy(cli::destroy::DestroyArgs),

    /// Download a dataset's package
    Download(cli::download::DownloadArgs),

    /// Package and upload data into a dataset
    Upload(cli::upload::UploadArgs),

    /// Submit many create/update operations in one request
    Batch(cli::batch::BatchArgs),

    /// Verify that your API credentials work
    Test(cli::test::TestArgs),
}

async fn run(cli: Cli) -> error::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.verbose = cli.verbose;

    match cli.command {
        Commands::Search(args) => cli::search::execute(args, &config).await,
        Commands::List(args) => cli::list::execute(args, &config).await,
        Commands::Show(args) => cli::show::execute(args, &config).await,
        Commands::Create(args) => cli::create::execute(args, &config).await,
        Commands::Update(args) => cli::update::execute(args, &config).await,
        Commands::Destroy(args) => cli::destroy::execute(args, &config).await,
        Commands::Download(args) => cli::download::execute(args, &config).await,
        Commands::Upload(args) => cli::upload::execute(args, &config).await,
        Commands::Batch(args) => cli::batch::execute(args, &config).await,
        Commands::Test(args) => cli::test::execute(args, &config).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    if let Err(err) = utils::logging::init_logging(verbose) {
        eprintln!("Failed to initialize logging: {}", err);
        std::process::exit(3);
    }

    if let Err(err) = run(cli).await {
        if verbose {
            eprintln!("{:?}", err);
        } else {
            eprintln!("{}", err);
        }
        std::process::exit(err.exit_code());
    }
}
