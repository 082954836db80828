mod args;
use args::{parse_args, Commands};

mod core;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args();

    let reply = core::fetch_status(args.address).await?;
    match args.command {
        Commands::Status => print!("{}", core::render(&reply, false)),
        Commands::Pending => print!("{}", core::render(&reply, true)),
    }

    Ok(())
}
