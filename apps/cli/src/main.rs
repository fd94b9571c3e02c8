//! corpusmerge CLI: cluster related documents and merge each cluster into
//! one collision-safe unit.
//!
//! Reads a directory of documents, writes a listing of merged units plus a
//! manifest sidecar, and can verify that every unit splits back into its
//! original documents.

mod commands;
mod source;
mod writer;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
