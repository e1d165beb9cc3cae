mod cli;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};

use clipshare_av::{ClipExtractor, ToolRegistry, WorkDir};
use clipshare_core::config::Config;
use clipshare_core::ClipToken;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path);

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting clipshare {}", env!("CARGO_PKG_VERSION"));
    clipshare_server::start(config).await?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "clipshare=trace,clipshare_core=trace,clipshare_av=trace,clipshare_server=trace,tower_http=debug".to_string()
        } else {
            "clipshare=info,clipshare_core=info,clipshare_av=info,clipshare_server=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Extract {
            input,
            start,
            end,
            output,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(extract(&input, start, end, output, cli.config.as_deref()))
        }
        Commands::CheckTools { json } => check_tools(cli.config.as_deref(), json),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("clipshare {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn extract(
    input: &Path,
    start: f64,
    end: f64,
    output: Option<std::path::PathBuf>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = Config::load_or_default(config_path);

    let output = match output {
        Some(path) => path,
        None => {
            let dir = WorkDir::resolve(&config.clips.resolved_candidates())?;
            let token = ClipToken::generate_with_len(config.clips.token_bytes);
            dir.clip_path(&token, &config.clips.output_extension)
        }
    };

    let tools = ToolRegistry::discover(&config.tools);
    let extractor = ClipExtractor::from_registry(
        &tools,
        Duration::from_secs(config.tools.extraction_timeout_secs),
    );

    let artifact = extractor
        .run(input, start, end, &output)
        .await
        .with_context(|| format!("failed to extract clip from {}", input.display()))?;

    println!("Clip written: {}", artifact.path.display());
    println!("  Size: {} bytes", artifact.size_bytes);
    println!("  Took: {:.2}s", artifact.elapsed.as_secs_f64());
    Ok(())
}

fn check_tools(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = Config::load_or_default(config_path);
    let tools = ToolRegistry::discover(&config.tools).check_all();

    if json {
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    println!("Checking external tools...\n");

    let mut all_ok = true;
    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("ffmpeg is missing. Install it or set tools.ffmpeg_path in the config.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let config = Config::load(p)
                .with_context(|| format!("invalid config file {}", p.display()))?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    if let Some(ref url) = config.server.public_base_url {
        println!("  Public URL: {url}");
    }
    println!("  Default expiry: {}h", config.clips.default_expire_hours);
    println!("  Sweep interval: {}s", config.clips.sweep_interval_secs);
    println!("  Library items: {}", config.library.len());

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &warnings {
            println!("  - {warning}");
        }
    }

    Ok(())
}
