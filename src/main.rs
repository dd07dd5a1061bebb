mod cli;

use syncwall::{config, dashboard, registry::StreamRegistry, server, supervisor, tools};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;

struct StartOverrides {
    host: Option<String>,
    port: Option<u16>,
    source: Option<String>,
    streams: Option<u32>,
}

async fn start(overrides: StartOverrides, config_path: Option<&Path>) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    if let Some(host) = overrides.host {
        config.server.host = host;
    }
    if let Some(port) = overrides.port {
        config.server.port = port;
    }
    if let Some(source) = overrides.source {
        config.transcode.source = source;
    }
    if let Some(count) = overrides.streams {
        config.streams.count = count;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting syncwall");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    let registry = Arc::new(StreamRegistry::from_config(&config.streams));
    let supervisor = Arc::new(supervisor::TranscodeSupervisor::new(
        registry,
        config.transcode.clone(),
    ));

    let report = supervisor.start_all();
    for (index, error) in &report.failed {
        tracing::error!("Stream {} did not start: {}", index, error);
    }

    server::start_server(config, Some(supervisor)).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "syncwall=trace,syncwall_player=trace,tower_http=debug".to_string()
        } else {
            "syncwall=debug,syncwall_player=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start {
            host,
            port,
            source,
            streams,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            let overrides = StartOverrides {
                host,
                port,
                source,
                streams,
            };
            rt.block_on(start(overrides, cli.config.as_deref()))
        }
        Commands::Streams => list_streams(cli.config.as_deref()),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate(path.as_deref())
        }
        Commands::Watch { server, arm } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(dashboard::run_dashboard(&config.player, &server, arm))
        }
        Commands::Version => {
            println!("syncwall {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn list_streams(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let registry = StreamRegistry::from_config(&config.streams);

    for stream in registry.iter() {
        let invocation = supervisor::TranscodeInvocation::for_stream(&config.transcode, stream);
        println!("{} ({})", stream.name, stream.public_url);
        println!("  output: {}", stream.manifest_path.display());
        println!(
            "  command: {} {}",
            invocation.program().display(),
            invocation.display_args().join(" ")
        );
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    println!("Checking external tools...\n");

    let tool = tools::check_engine(&config.transcode.ffmpeg_path);
    let status = if tool.available { "✓" } else { "✗" };
    print!("{} {}", status, tool.name);

    if let Some(ref version) = tool.version {
        print!(" ({})", version);
    }
    if let Some(ref path) = tool.path {
        print!(" - {}", path.display());
    }
    println!("\n");

    if tool.available {
        println!("Transcoding engine is available!");
    } else {
        println!("Transcoding engine not found. Streams will exit immediately after launch.");
    }

    Ok(())
}

fn validate(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Streams: {}", config.streams.count);
    println!("  Output root: {}", config.streams.output_root.display());
    println!("  Source: {}", config.transcode.source);
    println!("  Engine: {}", config.transcode.ffmpeg_path.display());

    Ok(())
}
