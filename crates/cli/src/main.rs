use std::path::PathBuf;

use clap::{Parser, Subcommand};
use drive_core::constants::DEFAULT_DATA_DIR;
use drive_core::{CoreConfig, DriveServices, FileNode, ShardableUuid};

#[derive(Parser)]
#[command(name = "drive")]
#[command(about = "Drive file service admin CLI")]
struct Cli {
    /// Data directory holding users, metadata and content
    #[arg(long, global = true, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a user
    Register {
        /// Email address (case-insensitive)
        email: String,
        /// Password
        password: String,
    },
    /// List a user's files and folders
    List {
        /// Owner's email address
        email: String,
        /// Folder to list (defaults to the root)
        #[arg(long)]
        parent: Option<String>,
    },
    /// Print the breadcrumb path of a node
    Path {
        /// Node id
        id: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let services = DriveServices::open(&CoreConfig::with_defaults(cli.data_dir))?;

    match cli.command {
        Commands::Register { email, password } => {
            let user = services.credentials.register(&email, &password)?;
            println!("Registered {} with ID: {}", user.email, user.id);
        }
        Commands::List { email, parent } => {
            let user = services
                .credentials
                .find_by_email(&email)
                .ok_or_else(|| format!("No user registered as {email}"))?;
            let parent = parent.as_deref().map(ShardableUuid::parse).transpose()?;

            let nodes = services.files.list(&user.id, parent.as_ref());
            if nodes.is_empty() {
                println!("No files found.");
            }
            for node in &nodes {
                println!("{}", describe(node));
            }
        }
        Commands::Path { id } => {
            let id = ShardableUuid::parse(&id)?;
            let path = services.files.resolve_path(&id)?;
            let names: Vec<&str> = path.iter().map(|entry| entry.name.as_str()).collect();
            println!("/{}", names.join("/"));
        }
    }

    Ok(())
}

fn describe(node: &FileNode) -> String {
    let visibility = if node.is_public { "public" } else { "private" };
    match node.size() {
        Some(size) => format!(
            "{}  {:<6} {:<7} {} ({} bytes, {})",
            node.id,
            node.node_type(),
            visibility,
            node.name,
            size,
            node.mime_type().unwrap_or("-")
        ),
        None => format!(
            "{}  {:<6} {:<7} {}/",
            node.id,
            node.node_type(),
            visibility,
            node.name
        ),
    }
}
