use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use fg_core::{ArtStyle, GenerationOptions, ModelFormat, PolycountLevel, SymmetryMode, TextureMap, Topology};

#[derive(Parser, Debug)]
#[command(name = "forge3d")]
#[command(about = "Text-to-3D generation gateway and client", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Gateway base URL used by client commands (defaults to the local gateway)
    #[arg(long, global = true)]
    pub gateway: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the generation gateway and proxy relay
    Serve {
        /// Address to bind (overrides HOST)
        #[arg(long)]
        host: Option<IpAddr>,

        /// Port to bind (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Create a preview model from a prompt and follow it to completion
    #[command(after_help = "Example: forge3d generate 'a red cube' --art-style sculpture --polycount medium")]
    Generate {
        prompt: String,

        #[arg(long, default_value = "realistic")]
        art_style: ArtStyle,

        /// Seed for reproducible results
        #[arg(long, conflicts_with = "random_seed")]
        seed: Option<u64>,

        /// Let the vendor pick a seed
        #[arg(long)]
        random_seed: bool,

        #[arg(long, default_value = "quad")]
        topology: Topology,

        #[arg(long, default_value = "auto")]
        symmetry: SymmetryMode,

        /// low, medium, high or ultra
        #[arg(long, default_value = "high")]
        polycount: PolycountLevel,

        /// Print the task id and exit without polling
        #[arg(long)]
        no_wait: bool,
    },
    /// Texture a finished preview model
    Texture {
        preview_task_id: String,

        /// Skip PBR maps
        #[arg(long)]
        no_pbr: bool,

        #[arg(long)]
        no_wait: bool,
    },
    /// List tasks known to the vendor
    List,
    /// Download a finished model or texture map through the proxy relay
    Download {
        task_id: String,

        #[arg(short, long, default_value = "glb")]
        format: ModelFormat,

        /// Fetch a texture map instead of the model: base_color, metallic, roughness or normal
        #[arg(long, conflicts_with = "format")]
        map: Option<TextureMap>,

        /// Texture set index, for tasks with more than one
        #[arg(long, default_value_t = 0)]
        set: usize,

        /// Output file (defaults to `<task_id>.<ext>` or `<task_id>_<map>_<set>.<ext>`)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Report whether the gateway has a usable API key
    CheckKey,
    /// Show or reset the free generation counter
    Quota {
        #[arg(long)]
        reset: bool,
    },
}

impl Commands {
    /// Generation options for `generate`, `None` for every other command.
    pub fn generation_options(&self) -> Option<GenerationOptions> {
        match self {
            Commands::Generate {
                art_style,
                seed,
                random_seed,
                topology,
                symmetry,
                polycount,
                ..
            } => {
                let defaults = GenerationOptions::default();
                Some(GenerationOptions {
                    art_style: *art_style,
                    seed: if *random_seed { None } else { seed.or(defaults.seed) },
                    topology: *topology,
                    symmetry: *symmetry,
                    polycount: *polycount,
                })
            }
            _ => None,
        }
    }
}
