//! CLI module for s3bridge
//!
//! ```bash
//! # List containers, then the blobs of one
//! s3bridge ls
//! s3bridge ls photos --prefix 2012/ --recursive
//!
//! # Transfer files
//! s3bridge put photos a.jpg ./a.jpg --content-type image/jpeg --meta color=blue
//! s3bridge get photos a.jpg ./copy.jpg
//!
//! # Containers
//! s3bridge mb photos
//! s3bridge rb photos
//! ```

pub mod args;
pub mod commands;

use anyhow::Result;

use crate::client::Client;
use args::Commands;

/// Run one parsed command against a client
pub async fn dispatch(client: &Client, command: Commands) -> Result<()> {
    match command {
        Commands::Ls {
            container,
            prefix,
            recursive,
        } => commands::cmd_ls(client, container.as_deref(), prefix.as_deref(), recursive).await,
        Commands::Mb { container } => commands::cmd_mb(client, &container).await,
        Commands::Rb { container } => commands::cmd_rb(client, &container).await,
        Commands::Head { container, blob } => commands::cmd_head(client, &container, &blob).await,
        Commands::Get { container, blob, file } => commands::cmd_get(client, &container, &blob, &file).await,
        Commands::Put {
            container,
            blob,
            file,
            content_type,
            metadata,
        } => commands::cmd_put(client, &container, &blob, &file, content_type.as_deref(), &metadata).await,
        Commands::Rm { container, blob } => commands::cmd_rm(client, &container, &blob).await,
    }
}
