//! remapfs CLI - user namespace id remapping

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use remapfs::ops::{translate_tree, TranslateOptions};
use remapfs::{Config, HostFs, IdentityMapping};

#[derive(Parser)]
#[command(name = "remapfs")]
#[command(about = "user namespace id remapping and ownership translation")]
#[command(version)]
struct Cli {
    /// configuration file (toml)
    #[arg(short, long, env = "REMAPFS_CONFIG")]
    config: Option<PathBuf>,

    /// more logging (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// resolve a remapped root specification to uid:gid
    ResolveRoot {
        /// uid, uid:gid, user, user:group or "default" (defaults to the configured one)
        spec: Option<String>,
    },

    /// show the uid/gid ranges for a user/group pair
    Mappings {
        /// user whose subordinate uid ranges are used
        user: String,

        /// group whose subordinate gid ranges are used (defaults to the user name)
        group: Option<String>,
    },

    /// translate a single id through a user/group mapping
    MapId {
        /// id to translate
        id: u32,

        /// user whose ranges define the mapping
        #[arg(short, long)]
        user: String,

        /// group whose ranges define the mapping (defaults to the user name)
        #[arg(short, long)]
        group: Option<String>,

        /// translate a gid instead of a uid
        #[arg(long)]
        gid: bool,

        /// translate host -> container instead of container -> host
        #[arg(long)]
        to_container: bool,
    },

    /// rewrite ownership of a tree between host root and container root
    Translate {
        /// root of the tree
        path: PathBuf,

        /// undo a previous translation
        #[arg(long)]
        inverse: bool,

        /// container root uid (defaults to the configured account)
        #[arg(long)]
        root_id: Option<u32>,

        /// only report what would change
        #[arg(long)]
        dry_run: bool,
    },

    /// print the highest assignable host id
    HostMaxId,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> remapfs::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let source = config.identity_source();

    match cli.command {
        Commands::ResolveRoot { spec } => {
            let spec = spec
                .or_else(|| config.remapped_root.clone())
                .ok_or_else(|| remapfs::Error::InvalidRootSpec(String::new()))?;
            let (uid, gid) = source.resolve_remapped_root(&spec)?;
            println!("{}:{}", uid, gid);
        }

        Commands::Mappings { user, group } => {
            let group = group.unwrap_or_else(|| user.clone());
            let mapping = source.build_identity_mapping(&user, &group)?;
            print_mapping(&mapping)?;
        }

        Commands::MapId {
            id,
            user,
            group,
            gid,
            to_container,
        } => {
            let group = group.unwrap_or_else(|| user.clone());
            let mapping = source.build_identity_mapping(&user, &group)?;
            let mapped = match (gid, to_container) {
                (false, false) => mapping.uid_to_host(id)?,
                (false, true) => mapping.uid_to_container(id)?,
                (true, false) => mapping.gid_to_host(id)?,
                (true, true) => mapping.gid_to_container(id)?,
            };
            println!("{}", mapped);
        }

        Commands::Translate {
            path,
            inverse,
            root_id,
            dry_run,
        } => {
            let container_root = match root_id {
                Some(id) => id,
                None => source.resolve_container_root_id()?,
            };
            let options = TranslateOptions { inverse, dry_run };
            let stats = translate_tree(&HostFs, &path, container_root, &options)?;

            let action = if dry_run { "would rewrite" } else { "rewrote" };
            println!(
                "{} {} of {} entries under {} (container root {})",
                action,
                stats.rewritten,
                stats.examined,
                path.display(),
                container_root
            );
            if stats.already_remapped > 0 {
                println!(
                    "{} entries were already owned by container root",
                    stats.already_remapped
                );
            }
        }

        Commands::HostMaxId => {
            println!("{}", source.host_max_id()?);
        }
    }

    Ok(())
}

fn print_mapping(mapping: &IdentityMapping) -> remapfs::Result<()> {
    println!("uid_map:");
    for range in &mapping.uid_map {
        println!("  {}", range.to_proc_format());
    }
    println!("gid_map:");
    for range in &mapping.gid_map {
        println!("  {}", range.to_proc_format());
    }

    let (uid, gid) = mapping.root_pair()?;
    println!("root: {}:{}", uid, gid);
    Ok(())
}
