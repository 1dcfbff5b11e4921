mod cli;

use webpbin::config;
use webpbin_av::{CWebP, DWebP, Gif2WebP, Tool, ToolRegistry};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::io;
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "webpbin=debug,webpbin_av=debug".to_string()
        } else {
            "webpbin=info,webpbin_av=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Gif2webp {
            input,
            output,
            quality,
        } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let registry = ToolRegistry::discover(&config.tools);
            gif_to_webp(
                &registry,
                &input,
                &output,
                quality.or(config.encode.quality),
            )
        }
        Commands::Encode {
            input,
            output,
            quality,
            lossless,
        } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let registry = ToolRegistry::discover(&config.tools);
            encode_image(
                &registry,
                &input,
                &output,
                quality.or(config.encode.quality),
                lossless || config.encode.lossless,
            )
        }
        Commands::Decode { input, output } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let registry = ToolRegistry::discover(&config.tools);
            decode_image(&registry, &input, &output)
        }
        Commands::CheckTools { json } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            check_tools(&ToolRegistry::discover(&config.tools), json)
        }
        Commands::ToolVersion { tool } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            tool_version(&ToolRegistry::discover(&config.tools), tool)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("webpbin {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// `-` stands for stdin or stdout.
fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn require_input(input: &Path) -> Result<()> {
    if !is_stdio(input) && !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }
    Ok(())
}

fn gif_to_webp(
    registry: &ToolRegistry,
    input: &Path,
    output: &Path,
    quality: Option<u32>,
) -> Result<()> {
    require_input(input)?;
    tracing::info!("Converting {:?} to {:?}", input, output);

    let mut stdout = io::stdout();
    let mut g = Gif2WebP::new(registry)?;
    if let Some(q) = quality {
        g.quality(q);
    }
    if is_stdio(input) {
        g.input_reader(io::stdin());
    } else {
        g.input_file(input);
    }
    if is_stdio(output) {
        g.output_writer(&mut stdout);
    } else {
        g.output_file(output);
    }

    g.run()
        .with_context(|| format!("gif2webp failed for {:?}", input))
}

fn encode_image(
    registry: &ToolRegistry,
    input: &Path,
    output: &Path,
    quality: Option<u32>,
    lossless: bool,
) -> Result<()> {
    require_input(input)?;
    tracing::info!("Encoding {:?} to {:?}", input, output);

    let mut stdout = io::stdout();
    let mut c = CWebP::new(registry)?;
    if let Some(q) = quality {
        c.quality(q);
    }
    c.lossless(lossless);
    if is_stdio(input) {
        c.input_reader(io::stdin());
    } else {
        c.input_file(input);
    }
    if is_stdio(output) {
        c.output_writer(&mut stdout);
    } else {
        c.output_file(output);
    }

    c.run().with_context(|| format!("cwebp failed for {:?}", input))
}

fn decode_image(registry: &ToolRegistry, input: &Path, output: &Path) -> Result<()> {
    require_input(input)?;
    tracing::info!("Decoding {:?} to {:?}", input, output);

    let mut stdout = io::stdout();
    let mut d = DWebP::new(registry)?;
    if is_stdio(input) {
        d.input_reader(io::stdin());
    } else {
        d.input_file(input);
    }
    if is_stdio(output) {
        d.output_writer(&mut stdout);
    } else {
        d.output_file(output);
    }

    d.run().with_context(|| format!("dwebp failed for {:?}", input))
}

fn check_tools(registry: &ToolRegistry, json: bool) -> Result<()> {
    let tools = registry.check_all();

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
        println!("All tools are available!");
    } else {
        println!("Some tools are missing. Install libwebp's command-line tools.");
    }

    Ok(())
}

fn tool_version(registry: &ToolRegistry, tool: Tool) -> Result<()> {
    let version = registry
        .version(tool)
        .with_context(|| format!("Could not query {} version", tool))?;
    println!("{}", version);
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_config(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            print_config(&config::Config::default());
        }
    }

    Ok(())
}

fn print_config(config: &config::Config) {
    for tool in Tool::ALL {
        match config.tools.path_for(tool) {
            Some(p) => println!("  {}: {}", tool, p.display()),
            None => println!("  {}: search PATH", tool),
        }
    }
    println!("  Timeout: {}s", config.tools.timeout_secs);
    match config.encode.quality {
        Some(q) => println!("  Quality: {}", q),
        None => println!("  Quality: tool default"),
    }
    println!("  Lossless: {}", config.encode.lossless);
}
