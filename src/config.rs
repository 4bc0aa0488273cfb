use clap::Parser;
use std::path::PathBuf;

/// Results review sidecar: JSON requests on stdin, one response per line on stdout.
#[derive(Parser, Debug, Clone)]
#[command(name = "resultsd")]
#[command(about = "Result aggregation and filtering engine for the admin results screens")]
pub struct Args {
    /// Workspace directory to open at startup (same as a `workspace.select` request)
    #[arg(long, env = "RESULTSD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Log filter directive, e.g. `info` or `resultsd=debug`. Logs go to stderr.
    #[arg(long, env = "RESULTSD_LOG", default_value = "info")]
    pub log_level: String,

    /// Rows per page before the user picks another size
    #[arg(long, env = "RESULTSD_PAGE_SIZE", default_value_t = 10,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub page_size: u32,
}
