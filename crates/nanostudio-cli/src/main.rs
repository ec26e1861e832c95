use std::io::{self, BufRead, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{ArgAction, Parser, Subcommand};
use nanostudio_contracts::chat::{parse_intent, STUDIO_HELP_COMMANDS};
use nanostudio_contracts::library::PROMPT_LIBRARY;
use nanostudio_contracts::{AppMode, AspectRatio};
use nanostudio_engine::config::body_limit_from_mb;
use nanostudio_engine::studio::GENERATION_FAILED_ERROR;
use nanostudio_engine::{
    DirectBackend, FallbackBackend, KeyRole, RelayServer, Studio, StudioBackend, StudioConfig,
};
use similar::{ChangeTag, TextDiff};

#[derive(Debug, Parser)]
#[command(name = "nanostudio", version, about = "Nano Banana image studio and relay")]
struct Cli {
    /// -v info, -vv debug, -vvv trace
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP relay.
    Serve(ServeArgs),
    /// Generate one image and save it.
    Generate(GenerateArgs),
    /// Print an optimized version of a prompt.
    Optimize(OptimizeArgs),
    /// Interactive session.
    Studio(StudioArgs),
    /// List the prompt library.
    Library,
}

#[derive(Debug, Clone, Default, clap::Args)]
struct ProviderArgs {
    #[arg(long)]
    provider: Option<String>,
    #[arg(long)]
    image_model: Option<String>,
    #[arg(long)]
    text_model: Option<String>,
    /// Outbound request timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Debug, Clone, Default, clap::Args)]
struct BackendArgs {
    #[command(flatten)]
    provider: ProviderArgs,
    #[arg(long)]
    relay_url: Option<String>,
    /// Skip the relay and call the provider directly.
    #[arg(long)]
    direct: bool,
}

#[derive(Debug, Parser)]
struct ServeArgs {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    body_limit_mb: Option<usize>,
    #[command(flatten)]
    provider: ProviderArgs,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long, value_parser = parse_mode_arg, default_value = "text")]
    mode: AppMode,
    #[arg(long, value_parser = parse_ratio_arg)]
    ratio: Option<AspectRatio>,
    #[arg(long)]
    image: Option<PathBuf>,
    /// Rewrite the prompt before generating.
    #[arg(long)]
    optimize: bool,
    #[arg(long, default_value = ".")]
    out: PathBuf,
    #[command(flatten)]
    backend: BackendArgs,
}

#[derive(Debug, Parser)]
struct OptimizeArgs {
    #[arg(long)]
    prompt: String,
    #[command(flatten)]
    backend: BackendArgs,
}

#[derive(Debug, Parser)]
struct StudioArgs {
    /// Where /download writes images.
    #[arg(long, default_value = ".")]
    out: PathBuf,
    #[command(flatten)]
    backend: BackendArgs,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("nanostudio error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let mut config = StudioConfig::from_env();
    match cli.command {
        Command::Serve(args) => run_serve(args, &mut config),
        Command::Generate(args) => {
            apply_backend_args(&mut config, &args.backend);
            run_generate(args, &config)
        }
        Command::Optimize(args) => {
            apply_backend_args(&mut config, &args.backend);
            run_optimize(args, &config)
        }
        Command::Studio(args) => {
            apply_backend_args(&mut config, &args.backend);
            let backend = build_backend(&config, args.backend.direct)?;
            let stdin = io::stdin();
            let stdout = io::stdout();
            run_studio_session(
                &mut Studio::new(),
                backend.as_ref(),
                stdin.lock(),
                stdout.lock(),
                &args.out,
            )?;
            Ok(0)
        }
        Command::Library => {
            print_library(&mut io::stdout().lock())?;
            Ok(0)
        }
    }
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

fn apply_provider_args(config: &mut StudioConfig, args: &ProviderArgs) {
    if let Some(provider) = &args.provider {
        config.provider = provider.trim().to_ascii_lowercase();
    }
    if let Some(model) = &args.image_model {
        config.image_model = model.clone();
    }
    if let Some(model) = &args.text_model {
        config.text_model = model.clone();
    }
    if let Some(secs) = args.timeout {
        config.request_timeout = Some(Duration::from_secs(secs));
    }
}

fn apply_backend_args(config: &mut StudioConfig, args: &BackendArgs) {
    apply_provider_args(config, &args.provider);
    if let Some(url) = &args.relay_url {
        config.relay_url = url.trim().trim_end_matches('/').to_string();
    }
}

fn parse_mode_arg(raw: &str) -> Result<AppMode, String> {
    AppMode::parse(raw).ok_or_else(|| format!("unknown mode '{raw}' (use text, image or edit)"))
}

fn parse_ratio_arg(raw: &str) -> Result<AspectRatio, String> {
    AspectRatio::parse(raw).ok_or_else(|| {
        format!(
            "unknown aspect ratio '{raw}' (use {})",
            AspectRatio::ALL.map(|ratio| ratio.as_str()).join(", ")
        )
    })
}

fn build_backend(config: &StudioConfig, direct: bool) -> Result<Box<dyn StudioBackend>> {
    if direct {
        log::info!("calling {} directly", config.provider);
        Ok(Box::new(DirectBackend::from_config(config, KeyRole::Client)?))
    } else {
        log::info!("using relay at {}", config.relay_url);
        Ok(Box::new(FallbackBackend::from_config(config)?))
    }
}

fn apply_serve_args(config: &mut StudioConfig, args: &ServeArgs) -> Result<()> {
    apply_provider_args(config, &args.provider);
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(mb) = args.body_limit_mb {
        let Some(bytes) = body_limit_from_mb(mb) else {
            bail!("--body-limit-mb must be between 1 and {}", usize::MAX / (1024 * 1024));
        };
        config.body_limit_bytes = bytes;
    }
    Ok(())
}

fn run_serve(args: ServeArgs, config: &mut StudioConfig) -> Result<i32> {
    apply_serve_args(config, &args)?;
    let relay = RelayServer::from_config(config)?.bind(&format!("{}:{}", args.host, config.port))?;
    println!(
        "Server running on http://{} (provider: {}, image model: {})",
        relay.addr(),
        config.provider,
        config.image_model
    );
    relay.run();
    Ok(0)
}

fn run_generate(args: GenerateArgs, config: &StudioConfig) -> Result<i32> {
    let backend = build_backend(config, args.backend.direct)?;
    let mut studio = Studio::new();
    studio.set_mode(args.mode);
    if let Some(ratio) = args.ratio {
        studio.set_aspect_ratio(ratio);
    }
    if let Some(path) = args.image.as_deref() {
        studio.select_image_file(path)?;
    }
    studio.set_prompt(args.prompt);
    if args.optimize {
        let before = studio.prompt.clone();
        if studio.optimize(backend.as_ref()) {
            eprintln!("Optimized prompt ({})", summarize_prompt_diff(&before, &studio.prompt));
        }
    }

    let Some(id) = studio.generate(backend.as_ref()).map(|image| image.id.clone()) else {
        eprintln!("{}", studio.error().unwrap_or(GENERATION_FAILED_ERROR));
        return Ok(1);
    };
    let path = studio.download(&id, &args.out)?;
    println!("{}", path.display());
    Ok(0)
}

fn run_optimize(args: OptimizeArgs, config: &StudioConfig) -> Result<i32> {
    if args.prompt.trim().is_empty() {
        bail!("--prompt must not be empty");
    }
    let backend = build_backend(config, args.backend.direct)?;
    let optimized = backend.optimize_prompt(&args.prompt)?;
    eprintln!("{}", summarize_prompt_diff(&args.prompt, &optimized));
    println!("{optimized}");
    Ok(0)
}

fn run_studio_session<R: BufRead, W: Write>(
    studio: &mut Studio,
    backend: &dyn StudioBackend,
    mut input: R,
    mut out: W,
    download_dir: &Path,
) -> Result<()> {
    writeln!(out, "Nano Banana Studio. Type /help for commands.")?;
    print_mode_banner(&mut out, studio.mode)?;

    let mut line = String::new();
    loop {
        write!(out, "> ")?;
        out.flush()?;

        line.clear();
        let read = match input.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        match intent.action.as_str() {
            "noop" => {}
            "help" => {
                writeln!(out, "Commands: {}", STUDIO_HELP_COMMANDS.join(" "))?;
                writeln!(out, "Plain text sets the prompt and generates.")?;
            }
            "quit" => break,
            "set_mode" => match intent.arg_str("mode").and_then(AppMode::parse) {
                Some(mode) => {
                    studio.set_mode(mode);
                    print_mode_banner(&mut out, mode)?;
                }
                None => writeln!(out, "Unknown mode. Use text, image or edit.")?,
            },
            "set_aspect_ratio" => {
                match intent.arg_str("aspect_ratio").and_then(AspectRatio::parse) {
                    Some(ratio) => {
                        studio.set_aspect_ratio(ratio);
                        writeln!(out, "Aspect ratio set to {ratio}")?;
                    }
                    None => writeln!(
                        out,
                        "Unknown aspect ratio. Use one of: {}",
                        AspectRatio::ALL.map(|ratio| ratio.as_str()).join(", ")
                    )?,
                }
            }
            "set_prompt" => {
                studio.set_prompt(intent.prompt.clone().unwrap_or_default());
                writeln!(out, "{}: {}", studio.mode.prompt_label(), studio.prompt)?;
            }
            "set_image" => {
                let Some(path) = intent.arg_str("path") else {
                    writeln!(out, "/image requires a path")?;
                    continue;
                };
                match studio.select_image_file(Path::new(path)) {
                    Ok(selected) => writeln!(out, "Reference image set to {}", selected.name)?,
                    Err(err) => writeln!(out, "Could not load image: {err:#}")?,
                }
            }
            "clear_image" => {
                studio.clear_image();
                writeln!(out, "Reference image cleared")?;
            }
            "generate" | "generate_current" => {
                if let Some(prompt) = intent.prompt.clone() {
                    studio.set_prompt(prompt);
                }
                writeln!(out, "Generating...")?;
                match studio.generate(backend) {
                    Some(image) => writeln!(
                        out,
                        "Generated image {} ({}). Use /download to save it.",
                        image.id,
                        image.mode.label()
                    )?,
                    None => print_error(&mut out, studio)?,
                }
            }
            "optimize" => {
                let before = studio.prompt.clone();
                if before.trim().is_empty() {
                    writeln!(out, "Nothing to optimize. Set a prompt first.")?;
                    continue;
                }
                if studio.optimize(backend) {
                    writeln!(out, "Optimized ({})", summarize_prompt_diff(&before, &studio.prompt))?;
                    writeln!(out, "{}: {}", studio.mode.prompt_label(), studio.prompt)?;
                } else {
                    print_error(&mut out, studio)?;
                }
            }
            "show_library" => print_library(&mut out)?,
            "pick_library" => {
                let number = intent
                    .arg_str("number")
                    .and_then(|raw| raw.parse::<usize>().ok());
                match number.and_then(|number| studio.select_library_prompt(number)) {
                    Some(prompt) => writeln!(out, "Prompt: {prompt}")?,
                    None => writeln!(out, "/pick requires a number from /library")?,
                }
            }
            "show_gallery" => print_gallery(&mut out, studio)?,
            "download" => {
                let target = intent.arg_str("target").unwrap_or("1");
                let dir = intent.arg_str("dir").map(Path::new).unwrap_or(download_dir);
                match studio.download(target, dir) {
                    Ok(path) => writeln!(out, "Saved {}", path.display())?,
                    Err(err) => writeln!(out, "Download failed: {err:#}")?,
                }
            }
            "show_status" => print_status(&mut out, studio)?,
            _ => {
                let command = intent.arg_str("command").unwrap_or_default();
                writeln!(out, "Unknown command /{command}. Type /help for commands.")?;
            }
        }
    }
    Ok(())
}

fn print_mode_banner<W: Write>(out: &mut W, mode: AppMode) -> io::Result<()> {
    writeln!(out, "[{}] {}", mode.label(), mode.title())?;
    writeln!(out, "Tip: {}", mode.tip())
}

fn print_error<W: Write>(out: &mut W, studio: &Studio) -> io::Result<()> {
    if let Some(message) = studio.error() {
        writeln!(out, "Error: {message}")?;
    }
    Ok(())
}

fn print_library<W: Write>(out: &mut W) -> io::Result<()> {
    let mut number = 0;
    for category in PROMPT_LIBRARY {
        writeln!(out, "{}", category.category)?;
        for item in category.items {
            number += 1;
            writeln!(out, "  {number}. {item}")?;
        }
    }
    Ok(())
}

fn print_gallery<W: Write>(out: &mut W, studio: &Studio) -> io::Result<()> {
    if studio.gallery.is_empty() {
        return writeln!(out, "No images yet.");
    }
    for (idx, image) in studio.gallery.iter().enumerate() {
        writeln!(
            out,
            "  {}. [{}] {} {}",
            idx + 1,
            image.id,
            image.mode.label(),
            clamp_text(&image.prompt, 60)
        )?;
    }
    Ok(())
}

fn print_status<W: Write>(out: &mut W, studio: &Studio) -> io::Result<()> {
    writeln!(out, "Mode: {}", studio.mode.label())?;
    writeln!(out, "Aspect ratio: {}", studio.config.aspect_ratio)?;
    writeln!(
        out,
        "{}: {}",
        studio.mode.prompt_label(),
        if studio.prompt.is_empty() {
            "(empty)"
        } else {
            studio.prompt.as_str()
        }
    )?;
    writeln!(
        out,
        "Reference image: {}",
        studio
            .selected_image
            .as_ref()
            .map(|selected| selected.name.as_str())
            .unwrap_or("(none)")
    )?;
    writeln!(out, "Gallery: {} image(s)", studio.gallery.len())
}

fn clamp_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{head}...")
}

/// Word-level summary of how an optimized prompt differs from the original.
fn summarize_prompt_diff(before: &str, after: &str) -> String {
    let diff = TextDiff::from_words(before, after);
    let mut added = 0usize;
    let mut removed = 0usize;
    for change in diff.iter_all_changes() {
        if change.value().trim().is_empty() {
            continue;
        }
        match change.tag() {
            ChangeTag::Insert => added += 1,
            ChangeTag::Delete => removed += 1,
            ChangeTag::Equal => {}
        }
    }
    if added == 0 && removed == 0 {
        return "unchanged".to_string();
    }
    format!("+{} {}, -{} {}", added, plural(added), removed, plural(removed))
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        "word"
    } else {
        "words"
    }
}
