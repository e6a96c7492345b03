use clap::{value_parser, Arg, ArgAction, Command};
use log::LevelFilter;
use md2site::components::schema::registry;
use md2site::config::load_config;
use md2site::pipeline::process_offline;
use md2site::{
    Config, MicrositePipeline, OpenAiCollaborator, OrderingMode, ParseRequest, PipelineOutput,
    Strictness,
};
use std::io::Read;
use std::path::Path;
use std::process;
use std::sync::Arc;

const DEFAULT_CONFIG_PATH: &str = "md2site.yaml";

#[tokio::main]
async fn main() {
    let matches = Command::new("md2site")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Turn long-form markdown into ordered microsite page components")
        .arg(
            Arg::new("input")
                .value_name("FILE")
                .help("Markdown file to convert, or - for stdin"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (default: ./md2site.yaml if present)"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("strictness")
                .short('s')
                .long("strictness")
                .value_name("LEVEL")
                .help("Filtering preset: strict, moderate or lenient"),
        )
        .arg(
            Arg::new("ordering")
                .short('o')
                .long("ordering")
                .value_name("MODE")
                .help("Ordering mode: rules, ai or hybrid"),
        )
        .arg(
            Arg::new("max-components")
                .short('m')
                .long("max-components")
                .value_name("N")
                .help("Component budget (clamped to the preset's range)")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("chunking")
                .long("chunking")
                .help("Always split the document into chunks")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-intelligent")
                .long("no-intelligent")
                .help("Send the raw markdown in a single call")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("full")
                .long("full")
                .help("Emit the full envelope including warnings")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("offline")
                .long("offline")
                .help("Skip the extraction service and use the header-based parser")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("list-types")
                .long("list-types")
                .help("List registered component types and their props")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        match Config::generate_default(generate_path) {
            Ok(()) => println!("Default configuration written to: {}", generate_path),
            Err(e) => {
                eprintln!("Error generating configuration: {e:#}");
                process::exit(1);
            }
        }
        return;
    }

    if matches.get_flag("list-types") {
        list_types();
        return;
    }

    let explicit_config = matches.get_one::<String>("config");
    let config_path = explicit_config
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_PATH);
    let loaded = if explicit_config.is_some() || Path::new(config_path).exists() {
        Some(load_config(config_path))
    } else {
        None
    };

    let verbose = matches.get_flag("verbose");
    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        match &loaded {
            Some(Ok(config)) => config.logging.level_filter(),
            _ => LevelFilter::Info,
        }
    };

    let mut logger = env_logger::Builder::from_default_env();
    if verbose || std::env::var_os("RUST_LOG").is_none() {
        logger.filter_level(log_level);
    }
    logger.init();

    let config = match loaded {
        Some(Ok(config)) => {
            log::info!("Loaded configuration from: {}", config_path);
            config
        }
        Some(Err(e)) if explicit_config.is_some() => {
            eprintln!("Error loading configuration: {e:#}");
            process::exit(1);
        }
        Some(Err(e)) => {
            log::warn!("Failed to load config ({:#}), using defaults", e);
            Config::default()
        }
        None => Config::default(),
    };

    let markdown = match read_markdown(matches.get_one::<String>("input").map(String::as_str)) {
        Ok(markdown) => markdown,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(e.exit_code());
        }
    };

    let mut request = ParseRequest::new(markdown);
    request.filtering_strictness = matches
        .get_one::<String>("strictness")
        .map(|s| Strictness::from(s.clone()));
    request.ordering = matches
        .get_one::<String>("ordering")
        .map(|s| OrderingMode::from(s.clone()));
    request.max_components = matches.get_one::<usize>("max-components").copied();
    if matches.get_flag("chunking") {
        request.use_chunking = Some(true);
        request.use_intelligent_selection = Some(false);
    }
    if matches.get_flag("no-intelligent") {
        request.use_intelligent_selection = Some(false);
    }
    if matches.get_flag("full") {
        request.compact = Some(false);
    }

    let output = if matches.get_flag("offline") {
        process_offline(&request, &config.defaults)
    } else {
        match OpenAiCollaborator::new(&config.collaborator) {
            Ok(collaborator) => {
                let pipeline = MicrositePipeline::new(Arc::new(collaborator), &config);
                pipeline.process(&request).await
            }
            Err(e) => {
                log::warn!("Collaborator unavailable ({:#}), using offline parser", e);
                process_offline(&request, &config.defaults)
            }
        }
    };

    print_output(&output);
    if !output.success() {
        process::exit(1);
    }
}

/// Exit code for input that is missing or cannot be read.
const EXIT_INPUT_ERROR: i32 = 2;

#[derive(Debug, thiserror::Error)]
enum InputError {
    #[error("No input given. Pass a markdown file or - for stdin (see --help).")]
    Missing,
    #[error("Error reading {input}: {source}")]
    Unreadable { input: String, source: std::io::Error },
}

impl InputError {
    fn exit_code(&self) -> i32 {
        EXIT_INPUT_ERROR
    }
}

fn read_markdown(input: Option<&str>) -> Result<String, InputError> {
    let input = input.ok_or(InputError::Missing)?;
    read_input(input).map_err(|source| InputError::Unreadable {
        input: input.to_string(),
        source,
    })
}

fn read_input(input: &str) -> std::io::Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(input)
    }
}

fn print_output(output: &PipelineOutput) {
    match serde_json::to_string_pretty(output) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing response: {}", e);
            process::exit(1);
        }
    }
}

fn list_types() {
    println!("Registered component types:");
    for schema in registry().iter() {
        println!("  {}", schema.kind);
        if !schema.required_props.is_empty() {
            println!("    required: {}", schema.required_props.join(", "));
        }
        if !schema.optional_props.is_empty() {
            println!("    optional: {}", schema.optional_props.join(", "));
        }
    }
}
