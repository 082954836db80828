use clap::{Parser, Subcommand};

//
// For parsing user specified command.
//
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// The address of the coordinator server.
    #[arg(short, long, default_value = "http://[::1]:8030", global = true)]
    pub address: String,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Display what the coordinator is doing: the job phase, every task
    /// and every worker that has checked in.
    Status,
    /// List only the tasks that are not completed yet.
    Pending,
}

pub fn parse_args() -> Args {
    Args::parse()
}
