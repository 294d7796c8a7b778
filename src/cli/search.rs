use clap::Args;

use crate::api::{ApiRequest, AuthMode};
use crate::cli::{print_result, Model};
use crate::config::Config;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Words to search for
    #[arg(required = true)]
    pub query: Vec<String>,

    /// Restrict results to a single resource type
    #[arg(short, long, value_enum)]
    pub model: Option<Model>,

    /// Print the raw response as pretty JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: SearchArgs, config: &Config) -> Result<()> {
    let mut request = ApiRequest::new(config, "/search.json")
        .auth(AuthMode::IfPossible)
        .param("query", &args.query.join(" "));
    if let Some(model) = args.model {
        request = request.param("model", model.singular());
    }
    let response = request.get().await?;
    print_result(&response, args.json, config)
}
