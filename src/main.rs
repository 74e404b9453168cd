use anyhow::Context;
use clap::Parser;
use ephsig::export::{ExportOutcome, Exporter, Notifier};
use ephsig::{ExportConfig, Field, SignatureApp, SignatureDraft};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Generate the EPH email signature and export it as an 8K PNG.
#[derive(Parser, Debug)]
#[command(name = "ephsig", version, about)]
struct Cli {
    /// Full name
    #[arg(long)]
    name: Option<String>,
    /// Job title
    #[arg(long)]
    title: Option<String>,
    /// First phone number
    #[arg(long)]
    phone1: Option<String>,
    /// Second phone number
    #[arg(long)]
    phone2: Option<String>,
    /// JSON file with initial field values
    #[arg(long)]
    draft: Option<PathBuf>,
    /// JSON export configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory or base URL the card's image locators resolve against.
    /// Required unless the config file sets `asset_base`.
    #[arg(long)]
    assets: Option<String>,
    /// Directory the PNG is written into
    #[arg(long)]
    out: Option<PathBuf>,
    /// Print the card markup and exit
    #[arg(long)]
    html: bool,
    /// Print a text preview and exit
    #[arg(long)]
    preview: bool,
    /// Edit fields line by line (`name=...`, `export`, `quit`)
    #[arg(long, short = 'i')]
    interactive: bool,
    /// Debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn alert(&self, message: &str) {
        eprintln!("{}", message);
    }
}

fn asset_base(assets: &str) -> anyhow::Result<String> {
    if url::Url::parse(assets).is_ok() {
        return Ok(assets.to_string());
    }
    let dir = std::fs::canonicalize(assets)
        .with_context(|| format!("asset directory {} not found", assets))?;
    let url = url::Url::from_directory_path(&dir)
        .map_err(|_| anyhow::anyhow!("cannot express {} as a file URL", dir.display()))?;
    Ok(url.to_string())
}

fn build_config(cli: &Cli) -> anyhow::Result<ExportConfig> {
    let mut config = match &cli.config {
        Some(path) => ExportConfig::from_json_file(path)?,
        None => ExportConfig::default(),
    };
    match (&cli.assets, &config.asset_base) {
        (Some(assets), _) => config.asset_base = Some(asset_base(assets)?),
        (None, Some(_)) => {}
        (None, None) => anyhow::bail!("no asset location: pass --assets DIR|URL or set asset_base in --config"),
    }
    if let Some(out) = &cli.out {
        config.output_dir = out.clone();
    }
    Ok(config)
}

fn build_draft(cli: &Cli) -> anyhow::Result<SignatureDraft> {
    let mut draft = match &cli.draft {
        Some(path) => SignatureDraft::from_json_file(path)?,
        None => SignatureDraft::default(),
    };
    let overrides = [
        (Field::Name, &cli.name),
        (Field::JobTitle, &cli.title),
        (Field::Phone1, &cli.phone1),
        (Field::Phone2, &cli.phone2),
    ];
    for (field, value) in overrides {
        if let Some(v) = value {
            draft.set(field, v.clone());
        }
    }
    Ok(draft)
}

fn report(outcome: &ExportOutcome) -> bool {
    match outcome {
        ExportOutcome::Delivered { path, width, height } => {
            println!("Saved {} ({}x{})", path.display(), width, height);
            true
        }
        ExportOutcome::Skipped | ExportOutcome::Busy => false,
        // already surfaced through the notifier
        ExportOutcome::Failed(_) => false,
    }
}

async fn interactive(app: &mut SignatureApp) -> anyhow::Result<()> {
    println!("{}", app.preview_text());
    println!("Edit with field=value (fields: name, title, phone1, phone2); `export` or `quit`.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let cmd = line.as_str();
        match cmd.trim() {
            "" => continue,
            "quit" | "exit" => break,
            "export" => {
                report(&app.export().await);
                continue;
            }
            _ => {}
        }
        match cmd.split_once('=') {
            Some((key, value)) => match Field::from_key(key.trim()) {
                Some(field) => {
                    app.set(field, value);
                    println!("{}", app.preview_text());
                }
                None => eprintln!("unknown field `{}`", key.trim()),
            },
            None => eprintln!("expected field=value, `export` or `quit`"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let draft = build_draft(&cli)?;

    if cli.html || cli.preview {
        let assets = match &cli.config {
            Some(path) => ExportConfig::from_json_file(path)?.assets,
            None => ephsig::AssetLocators::default(),
        };
        if cli.html {
            print!("{}", ephsig::template::render_card(&draft, &assets));
        }
        if cli.preview {
            print!("{}", ephsig::template::render_text_preview(&draft));
        }
        return Ok(());
    }

    let config = build_config(&cli)?;
    log::debug!("config: {:?}", config);

    let exporter = Exporter::new(config.clone()).with_notifier(Arc::new(StderrNotifier));
    let mut app = SignatureApp::new(config)?
        .with_exporter(exporter)
        .with_draft(draft);
    app.mount();

    if cli.interactive {
        return interactive(&mut app).await;
    }

    if !report(&app.export().await) {
        std::process::exit(1);
    }
    Ok(())
}
