use clap::{Args, Parser, Subcommand};
use quire::build::{self, BuildContext, BuildOptions};
use quire::config::{self, ConfigOverrides};
use quire::node::ROOT_URL;
use quire::output::{self, TreeOptions};
use quire::site;
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quire", version)]
#[command(about = "Static site builder: a directory of text files becomes a website")]
#[command(long_about = "\
Static site builder: a directory of text files becomes a website

Site structure:

  site.toml                 # Marks the site's home (optional if src/ and out/ exist)
  src/                      # Source tree, one node per file or directory
  ├── index.md              # Homepage content
  ├── about.md              # Node `about`
  └── about/                # ...whose children live here
      └── team.md           # Node `about/team`
  lib/<theme>/
  ├── templates/            # node.jinja, node-about.jinja, ...
  └── resources/            # Copied to out/ before rendering
  inc/                      # Snippets available to templates as `includes`
  res/                      # Site resources, copied to out/ after the theme's
  out/                      # Generated site

Link between pages with @root/ urls: \"@root/about//\" becomes a relative
link to the about page from wherever it is written.

Run 'quire gen-config' to generate a documented site.toml.")]
struct Cli {
    /// Site home directory (default: nearest ancestor holding site.toml)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Log more: -v for info, -vv for debug (default: $RUST_LOG, else warn)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the site
    Build(BuildArgs),
    /// Empty the output directory
    Clear {
        /// Also delete the persisted build cache
        #[arg(long)]
        cache: bool,
    },
    /// Print the node tree
    Tree {
        /// Virtual url of the subtree to print
        #[arg(long, default_value = ROOT_URL)]
        root: String,
        /// Show slugs instead of urls
        #[arg(long)]
        slugs: bool,
        /// Append a metadata value to each line (repeatable)
        #[arg(long = "attr", value_name = "KEY")]
        attrs: Vec<String>,
    },
    /// Print a stock site.toml with all options documented
    GenConfig,
}

#[derive(Args)]
struct BuildArgs {
    /// Empty the output directory before building
    #[arg(long)]
    clear: bool,
    /// Disable the build cache: write every page
    #[arg(long)]
    no_cache: bool,
    /// Source directory
    #[arg(long)]
    src: Option<PathBuf>,
    /// Output directory
    #[arg(long)]
    out: Option<PathBuf>,
    /// Theme library directory
    #[arg(long)]
    lib: Option<PathBuf>,
    /// Includes directory
    #[arg(long)]
    inc: Option<PathBuf>,
    /// Resources directory
    #[arg(long)]
    res: Option<PathBuf>,
    /// Theme name or path
    #[arg(long)]
    theme: Option<String>,
}

impl BuildArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            src: self.src.clone(),
            out: self.out.clone(),
            lib: self.lib.clone(),
            inc: self.inc.clone(),
            res: self.res.clone(),
            theme: self.theme.clone(),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // -v enables INFO, -vv DEBUG, otherwise RUST_LOG or WARN
    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli) {
        eprintln!("Error: {err}");
        let mut source = err.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Command::Build(args) => {
            let home = resolve_home(cli.home.as_deref())?;
            let ctx = BuildContext::open(&home, &args.overrides())?;
            let options = BuildOptions {
                clear_output: args.clear,
                use_cache: !args.no_cache,
                cache_dir: None,
            };
            let stats = build::build(&ctx, &options)?;
            output::print_build_summary(&stats);
        }
        Command::Clear { cache } => {
            let home = resolve_home(cli.home.as_deref())?;
            let config = config::load_config(&home)?;
            build::clear_output(&home.join(&config.dirs.out))?;
            if cache {
                build::clear_cache(&home, None)?;
            }
        }
        Command::Tree { root, slugs, attrs } => {
            let home = resolve_home(cli.home.as_deref())?;
            let ctx = BuildContext::open(&home, &ConfigOverrides::default())?;
            let tree = ctx.scan()?;
            let node = tree
                .node_by_url(&root)
                .ok_or_else(|| format!("no node at '{root}'"))?;
            output::print_tree(node, &ctx.paths.src, &TreeOptions { slugs, attrs });
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }
    Ok(())
}

/// The explicit `--home` made absolute, else the nearest site home above the
/// working directory.
fn resolve_home(home: Option<&Path>) -> Result<PathBuf, Box<dyn Error>> {
    match home {
        Some(dir) => Ok(std::path::absolute(dir)?),
        None => Ok(site::find_home(&std::env::current_dir()?)?),
    }
}
