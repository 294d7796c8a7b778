use clap::Args;

use crate::api::{ApiRequest, AuthMode};
use crate::cli::{print_result, Model};
use crate::config::Config;
use crate::error::{DatacatError, Result};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Resource type to list
    #[arg(value_enum, default_value = "dataset")]
    pub model: Model,

    /// List all resources, not just your own
    #[arg(short, long)]
    pub all: bool,

    /// Print the raw response as pretty JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: ListArgs, config: &Config) -> Result<()> {
    let mut request =
        ApiRequest::new(config, &args.model.index_path()).auth(AuthMode::IfPossible);
    if !args.all {
        let Some(username) = config.username.as_deref().filter(|name| !name.is_empty())
        else {
            return Err(DatacatError::Authentication(
                "Set a username in the identity file (or pass --all to list everything)"
                    .to_string(),
            ));
        };
        request = request.param("id", username);
    }
    let response = request.get().await?;
    print_result(&response, args.json, config)
}
