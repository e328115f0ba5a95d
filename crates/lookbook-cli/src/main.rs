use std::io::{self, BufRead, ErrorKind, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lookbook_contracts::chat::{parse_intent, STUDIO_HELP_COMMANDS};
use lookbook_contracts::session::{GarmentCategory, GarmentPolicy, UploadedImage};
use lookbook_contracts::shots::{ShotCatalog, ShotSelection, ToggleOutcome};
use lookbook_engine::{
    CredentialProvider, EnvKeyProvider, GenerationOutcome, StaticKeyProvider, StudioConfig,
    StudioEngine, StudioError,
};
use serde_json::Value;

#[derive(Debug, Parser)]
#[command(name = "lookbook", version, about = "Garment lookbook studio")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive session driven by slash commands.
    Studio(StudioArgs),
    /// One generation from flags, then exit.
    Generate(GenerateArgs),
    /// List the shot catalog.
    Shots,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    aspect_ratio: Option<String>,
    #[arg(long)]
    image_size: Option<String>,
    /// Request timeout in seconds (clamped to 15..=300).
    #[arg(long)]
    timeout: Option<f64>,
    /// Keep generation locked when no credential provider can answer.
    #[arg(long)]
    require_credential_check: bool,
    /// `any` (one top or bottom) or `both` (a top and a bottom).
    #[arg(long)]
    garment_policy: Option<GarmentPolicy>,
}

#[derive(Debug, Parser)]
struct StudioArgs {
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long = "top")]
    tops: Vec<PathBuf>,
    #[arg(long = "bottom")]
    bottoms: Vec<PathBuf>,
    #[arg(long)]
    shoe: Option<PathBuf>,
    #[arg(long)]
    shoe_text: Option<String>,
    #[arg(long = "shot", required = true)]
    shots: Vec<String>,
    /// Use this key instead of GEMINI_API_KEY / GOOGLE_API_KEY.
    #[arg(long)]
    api_key: Option<String>,
    #[command(flatten)]
    config: ConfigArgs,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("lookbook error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Studio(args) => {
            run_studio(args)?;
            Ok(0)
        }
        Command::Generate(args) => run_generate(args),
        Command::Shots => {
            for line in shot_listing(&ShotCatalog::default(), &ShotSelection::new()) {
                println!("{line}");
            }
            Ok(0)
        }
    }
}

fn build_config(args: &ConfigArgs) -> StudioConfig {
    let mut config = StudioConfig::from_env();
    if let Some(model) = args.model.as_deref() {
        config = config.with_model(model);
    }
    if args.aspect_ratio.is_some() || args.image_size.is_some() {
        let aspect_ratio = args
            .aspect_ratio
            .clone()
            .unwrap_or_else(|| config.aspect_ratio.clone());
        let image_size = args
            .image_size
            .clone()
            .unwrap_or_else(|| config.image_size.clone());
        config = config.with_image_config(aspect_ratio, image_size);
    }
    if let Some(timeout) = args.timeout {
        config = config.with_request_timeout(timeout);
    }
    if args.require_credential_check {
        config = config.with_require_credential_check(true);
    }
    if let Some(policy) = args.garment_policy {
        config = config.with_garment_policy(policy);
    }
    config
}

struct TerminalKeyProvider {
    keys: StaticKeyProvider,
}

impl TerminalKeyProvider {
    fn new() -> Self {
        Self {
            keys: StaticKeyProvider::new(EnvKeyProvider.api_key()),
        }
    }
}

impl CredentialProvider for TerminalKeyProvider {
    fn name(&self) -> &str {
        "terminal"
    }

    fn has_authorization(&self) -> Result<Option<bool>> {
        self.keys.has_authorization()
    }

    fn request_authorization(&mut self) -> Result<()> {
        print!("Gemini API key: ");
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("failed to read API key")?;
        self.keys.offer(line.trim());
        self.keys.request_authorization()
    }

    fn api_key(&self) -> Option<String> {
        self.keys.api_key()
    }
}

fn run_studio(args: StudioArgs) -> Result<()> {
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let mut engine = StudioEngine::new(
        &args.out,
        &events_path,
        build_config(&args.config),
        Box::new(TerminalKeyProvider::new()),
    )?;
    engine.check_authorization()?;

    println!("Lookbook studio started. Type /help for commands.");
    for line in status_lines(&engine) {
        println!("{line}");
    }

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        let intent = parse_intent(input);
        match intent.action.as_str() {
            "noop" => continue,
            "help" => {
                println!("Commands: {}", STUDIO_HELP_COMMANDS.join(" "));
            }
            "quit" => break,
            "add_tops" | "add_bottoms" => {
                let category = if intent.action == "add_tops" {
                    GarmentCategory::Top
                } else {
                    GarmentCategory::Bottom
                };
                let paths = value_as_string_list(intent.command_args.get("paths"));
                if paths.is_empty() {
                    println!("/{} requires at least one path", category.as_str());
                    continue;
                }
                let offered = paths.len();
                let images = paths
                    .into_iter()
                    .map(UploadedImage::from_path)
                    .collect::<Vec<_>>();
                let accepted = engine.add_images(category, images)?;
                println!(
                    "Added {accepted} {category} image(s); {} total.",
                    engine.wardrobe().images(category).len()
                );
                if accepted < offered {
                    println!(
                        "Dropped {} image(s): at most {} per category.",
                        offered - accepted,
                        category.capacity()
                    );
                }
            }
            "set_accessory_image" => {
                let Some(path) = value_as_non_empty_string(intent.command_args.get("path")) else {
                    println!("/shoe requires a path");
                    continue;
                };
                engine.add_images(
                    GarmentCategory::Accessory,
                    vec![UploadedImage::from_path(path.as_str())],
                )?;
                println!("Accessory image set to {path}");
            }
            "set_accessory_text" => {
                let text = value_as_non_empty_string(intent.command_args.get("text"));
                let cleared = text.is_none();
                engine.set_accessory_text(text)?;
                if cleared {
                    println!("Accessory description cleared.");
                } else {
                    println!("Accessory description set.");
                }
            }
            "toggle_shots" => {
                let ids = value_as_string_list(intent.command_args.get("ids"));
                if ids.is_empty() {
                    println!("/shot requires at least one shot id (see /shots)");
                    continue;
                }
                for id in ids {
                    match engine.toggle_shot(&id) {
                        Ok(ToggleOutcome::Selected) => println!("Selected {id}"),
                        Ok(ToggleOutcome::Deselected) => println!("Deselected {id}"),
                        Err(StudioError::Validation(message)) => println!("{message}"),
                        Err(err) => return Err(err.into()),
                    }
                }
            }
            "remove_image" => {
                let category = match parse_category(intent.command_args.get("category")) {
                    Ok(category) => category,
                    Err(message) => {
                        println!("{message}");
                        continue;
                    }
                };
                let Some(index) = one_based_index(intent.command_args.get("index")) else {
                    println!("/remove requires a category and a 1-based index");
                    continue;
                };
                match engine.remove_image(category, index)? {
                    Some(image) => println!("Removed {category} image {}", image.label()),
                    None => println!("No {category} image at position {}", index + 1),
                }
            }
            "clear_images" => match parse_category(intent.command_args.get("category")) {
                Ok(category) => {
                    engine.clear_images(category)?;
                    println!("Cleared {category} images.");
                }
                Err(message) => println!("{message}"),
            },
            "list_shots" => {
                for line in shot_listing(engine.catalog(), engine.selection()) {
                    println!("{line}");
                }
            }
            "status" => {
                for line in status_lines(&engine) {
                    println!("{line}");
                }
            }
            "authorize" => {
                let state = engine.request_authorization()?;
                println!("Credential state: {}", state.as_str());
            }
            "generate" => {
                println!("Generating...");
                match engine.generate() {
                    Ok(GenerationOutcome::Generated(artifact)) => {
                        println!("Saved {}", artifact.image_path.display());
                        println!("Receipt {}", artifact.receipt_path.display());
                    }
                    Ok(GenerationOutcome::Empty) => {
                        println!("The model returned no image. Adjust the shots and try again.");
                    }
                    Err(StudioError::Io(err)) => return Err(err),
                    Err(err) => {
                        println!("{err}");
                        if err.requires_reauthorization() {
                            println!("Run /auth to select an API key.");
                        }
                    }
                }
            }
            _ => {
                let command = value_as_non_empty_string(intent.command_args.get("command"));
                match command {
                    Some(command) => println!("Unknown command: /{command}. Type /help."),
                    None => println!("Commands start with '/'. Type /help."),
                }
            }
        }
    }

    engine.finish()?;
    Ok(())
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let provider: Box<dyn CredentialProvider> = match args.api_key.clone() {
        Some(key) => Box::new(StaticKeyProvider::new(Some(key))),
        None => Box::new(EnvKeyProvider),
    };
    let mut engine = StudioEngine::new(
        &args.out,
        &events_path,
        build_config(&args.config),
        provider,
    )?;
    engine.check_authorization()?;

    engine.add_images(
        GarmentCategory::Top,
        args.tops.iter().map(UploadedImage::from_path).collect(),
    )?;
    engine.add_images(
        GarmentCategory::Bottom,
        args.bottoms.iter().map(UploadedImage::from_path).collect(),
    )?;
    if let Some(shoe) = args.shoe.as_ref() {
        engine.add_images(
            GarmentCategory::Accessory,
            vec![UploadedImage::from_path(shoe)],
        )?;
    }
    engine.set_accessory_text(args.shoe_text.clone())?;
    for id in &args.shots {
        if engine.selection().contains(id.trim()) {
            continue;
        }
        engine.toggle_shot(id)?;
    }

    let outcome = engine.generate();
    engine.finish()?;
    match outcome {
        Ok(GenerationOutcome::Generated(artifact)) => {
            println!("{}", artifact.image_path.display());
            Ok(0)
        }
        Ok(GenerationOutcome::Empty) => {
            eprintln!("The model returned no image.");
            Ok(2)
        }
        Err(err) => Err(err).context("generation failed"),
    }
}

fn status_lines(engine: &StudioEngine) -> Vec<String> {
    let wardrobe = engine.wardrobe();
    let list = |category: GarmentCategory| {
        let labels = wardrobe
            .images(category)
            .iter()
            .map(|image| format!("{}. {}", image.ordinal + 1, image.label()))
            .collect::<Vec<_>>();
        if labels.is_empty() {
            "-".to_string()
        } else {
            labels.join(", ")
        }
    };
    let shots = engine.selected_shot_ids();
    let config = engine.config();
    vec![
        format!(
            "Phase: {} (credential: {})",
            engine.phase().as_str(),
            engine.credential_state().as_str()
        ),
        format!("Tops: {}", list(GarmentCategory::Top)),
        format!("Bottoms: {}", list(GarmentCategory::Bottom)),
        format!("Shoe: {}", list(GarmentCategory::Accessory)),
        format!(
            "Shoe description: {}",
            wardrobe.accessory().description().unwrap_or("-")
        ),
        format!(
            "Shots: {}",
            if shots.is_empty() {
                "-".to_string()
            } else {
                shots.join(", ")
            }
        ),
        format!(
            "Model: {} ({}, {})",
            config.model, config.aspect_ratio, config.image_size
        ),
        format!("Output: {}", engine.out_dir().display()),
    ]
}

fn shot_listing(catalog: &ShotCatalog, selection: &ShotSelection) -> Vec<String> {
    catalog
        .list()
        .map(|shot| {
            let mark = if selection.contains(&shot.id) { "x" } else { " " };
            format!("[{mark}] {:<16} {}", shot.id, shot.name)
        })
        .collect()
}

fn parse_category(value: Option<&Value>) -> Result<GarmentCategory, String> {
    let Some(raw) = value_as_non_empty_string(value) else {
        return Err("A category is required: top, bottom or shoe.".to_string());
    };
    raw.parse::<GarmentCategory>()
}

/// Positions are shown 1-based; the wardrobe is 0-based.
fn one_based_index(value: Option<&Value>) -> Option<usize> {
    value
        .and_then(Value::as_u64)
        .filter(|index| *index > 0)
        .map(|index| index as usize - 1)
}

fn value_as_string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn value_as_non_empty_string(value: Option<&Value>) -> Option<String> {
    let raw = value
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}
