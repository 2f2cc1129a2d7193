mod arg_parser;
mod client_cli;

use arg_parser::{ArgParser, SubCommand};
use client_cli::ClientCli;

use clap::Parser;
use std::error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn error::Error>> {
    let args = ArgParser::parse();
    let mut client = ClientCli::connect(&args.server).await?;

    match args.sub_command {
        SubCommand::Submit {
            kind,
            fields,
            files,
            out,
        } => {
            client.submit_job(&kind, &fields, &files, &out).await?;
        }
        SubCommand::Poll { kind, job_id, out } => {
            client.poll_job(&kind, job_id, &out).await?;
        }
    }

    Ok(())
}
