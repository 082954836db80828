use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// The address of the coordinator server
    #[arg(short = 'j', long = "join", default_value = "http://[::1]:8030")]
    pub address: String,

    /// Identifier reported to the coordinator. Defaults to one derived
    /// from the process ID.
    #[arg(long)]
    pub id: Option<String>,

    /// Milliseconds to wait before asking again when no task is available.
    #[arg(short, long, default_value = "500")]
    pub poll_ms: u64,

    /// Consecutive failed requests after which the worker gives up.
    #[arg(long, default_value = "5")]
    pub max_request_failures: u32,
}
