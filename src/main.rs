use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};
use slideforge::{
    config::Config,
    deck::DeckSpec,
    design::color::Color,
    generate::{DeckGenerator, GenerateOptions},
    theme::{self, registry::ThemeFilter},
};
use std::{fs, path::Path, path::PathBuf, time::Duration};

#[derive(Parser)]
#[command(name = "slideforge", about = "Generate slide decks against a presentation service")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, env = "SLIDEFORGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a deck from a YAML or JSON spec file.
    Generate {
        spec: PathBuf,

        /// Overall deadline in seconds.
        #[arg(long)]
        deadline: Option<u64>,
    },

    /// Validate a deck spec without touching the upstream service.
    Validate { spec: PathBuf },

    /// Append a slide to an existing deck.
    AddSlide { deck_id: String, spec: PathBuf },

    /// Re-style an existing deck with a registered theme.
    ApplyTheme { deck_id: String, theme: String },

    /// Inspect and manage themes.
    Themes {
        #[command(subcommand)]
        command: ThemeCommand,
    },

    /// Engine health.
    Health,
}

#[derive(Subcommand)]
enum ThemeCommand {
    /// List registered themes.
    List {
        /// Only built-in themes.
        #[arg(long, conflicts_with = "custom")]
        builtin: bool,

        /// Only custom themes.
        #[arg(long)]
        custom: bool,
    },

    /// Print a theme as canonical JSON.
    Export { id: String },

    /// Register a theme from a canonical JSON file.
    Import { path: PathBuf },

    /// Derive and register a theme from one or more '#RRGGBB' base colors.
    Derive {
        name: String,

        #[arg(required = true)]
        colors: Vec<String>,
    },

    /// Delete a custom theme.
    Delete { id: String },

    /// Make a registered theme the active one.
    SetActive { id: String },

    /// Show the active theme.
    Active,
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    env_logger::Builder::new().filter_level(config.observability.log_level.into()).init();

    let generator = DeckGenerator::new(config)?;
    match cli.command {
        Command::Generate { spec, deadline } => {
            let spec = load_spec(&spec)?;
            let options = GenerateOptions {
                deadline: deadline.map(Duration::from_secs),
                ..Default::default()
            };
            let result = generator.generate(spec, options);
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.ok {
                bail!("deck generation failed");
            }
        }
        Command::Validate { spec } => {
            let report = generator.validate(load_spec(&spec)?);
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.ok {
                bail!("spec is invalid");
            }
        }
        Command::AddSlide { deck_id, spec } => {
            let contents = fs::read_to_string(&spec)?;
            let slide = serde_yaml::from_str(&contents)
                .with_context(|| format!("parsing {}", spec.display()))?;
            let handle = generator.add_slide(&deck_id, slide)?;
            println!(
                "{}",
                serde_json::json!({ "slide_id": handle.slide_id, "index": handle.index })
            );
        }
        Command::ApplyTheme { deck_id, theme } => {
            let applied = generator.apply_theme(&deck_id, &theme)?;
            println!("{}", serde_json::to_string_pretty(&applied)?);
        }
        Command::Themes { command } => run_theme_command(&generator, command)?,
        Command::Health => {
            println!("{}", serde_json::to_string_pretty(&generator.health())?);
        }
    }
    Ok(())
}

fn run_theme_command(generator: &DeckGenerator, command: ThemeCommand) -> anyhow::Result<()> {
    let themes = generator.themes();
    match command {
        ThemeCommand::List { builtin, custom } => {
            let filter = match (builtin, custom) {
                (true, _) => Some(ThemeFilter::Builtin),
                (_, true) => Some(ThemeFilter::Custom),
                _ => None,
            };
            for theme in themes.list(filter) {
                let marker = if theme.builtin { "builtin" } else { "custom" };
                println!("{:<20} {:<10} {}", theme.id, marker, theme.name);
            }
        }
        ThemeCommand::Export { id } => println!("{}", themes.export(&id)?),
        ThemeCommand::Import { path } => {
            let contents = fs::read_to_string(&path)?;
            let theme = themes.import(&contents)?;
            println!("imported '{}' as '{}'", theme.name, theme.id);
        }
        ThemeCommand::Derive { name, colors } => {
            let bases = colors
                .iter()
                .map(|raw| raw.parse::<Color>())
                .collect::<Result<Vec<_>, _>>()
                .context("parsing base colors")?;
            let id = name.to_lowercase().replace(' ', "-");
            let theme = theme::derive_theme(&id, &name, &bases)?;
            let registered = themes.register(theme)?;
            println!("{}", registered.canonical_json()?);
        }
        ThemeCommand::Delete { id } => {
            themes.delete(&id)?;
            println!("deleted '{id}'");
        }
        ThemeCommand::SetActive { id } => {
            themes.set_active(&id)?;
            println!("active theme is now '{id}'");
        }
        ThemeCommand::Active => {
            let active = themes.active();
            println!("{:<20} {}", active.id, active.name);
        }
    }
    Ok(())
}

fn load_spec(path: &Path) -> anyhow::Result<DeckSpec> {
    let contents = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    // YAML is a superset of JSON, so one parser covers both spec formats.
    serde_yaml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}
