//! compextract CLI - composition table extraction tool

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use compextract::{
    build_state, collect_sources, AzureDocumentIntelligence, AzureOpenAi, AzureOpenAiConfig,
    BatchReport, DocumentAnalyzer, DocumentIntelligenceConfig, DocumentSource, ElementTable,
    JsonFormat, LocalStore, Normalizer, Pipeline, PipelineOptions, PopplerRasterizer,
};

#[derive(Parser)]
#[command(name = "compextract")]
#[command(author = "iyulab")]
#[command(version)]
#[command(
    about = "Extract chemical composition tables from scanned documents and patents",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on a file or on every file in a directory
    Run {
        /// Input document or directory
        #[arg(value_name = "PATH")]
        input: PathBuf,

        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        services: ServiceArgs,
    },

    /// Run the full pipeline on remote documents
    Url {
        /// Document URLs
        #[arg(value_name = "URL", required = true)]
        urls: Vec<String>,

        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        services: ServiceArgs,
    },

    /// Analyze a document and show the detected pages and tables
    Analyze {
        /// Input document
        #[arg(value_name = "FILE")]
        input: String,

        #[command(flatten)]
        services: ServiceArgs,
    },

    /// Show normalized tables from a `_normalized.json` artifact
    Show {
        /// Normalized artifact
        #[arg(value_name = "ARTIFACT")]
        artifact: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

#[derive(Args)]
struct RunArgs {
    /// Output directory for artifacts
    #[arg(short, long, value_name = "DIR", default_value = "output")]
    output: PathBuf,

    /// Also extract supplier, invoice number and date
    #[arg(long)]
    main_info: bool,

    /// Skip stages already recorded in existing artifacts
    #[arg(long)]
    resume: bool,

    /// Extraction attempts per table
    #[arg(long, value_name = "N", default_value_t = compextract::pipeline::DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    /// Page rendering resolution
    #[arg(long, value_name = "N", default_value_t = compextract::render::DEFAULT_DPI)]
    dpi: u32,

    /// Write compact JSON artifacts
    #[arg(long)]
    compact: bool,

    /// Reference element list (one name per line)
    #[arg(long, value_name = "FILE")]
    elements: Option<PathBuf>,

    /// Detect table orientation locally instead of asking the model
    #[arg(long)]
    local_orientation: bool,
}

#[derive(Args)]
struct ServiceArgs {
    /// Document analysis endpoint
    #[arg(long, env = "ENDPOINT_DOCINT", hide_env_values = true)]
    docint_endpoint: Option<String>,

    /// Document analysis key
    #[arg(long, env = "API_KEY_DOCINT", hide_env_values = true)]
    docint_key: Option<String>,

    /// Azure OpenAI endpoint
    #[arg(long, env = "AZURE_OPENAI_ENDPOINT", hide_env_values = true)]
    openai_endpoint: Option<String>,

    /// Azure OpenAI key
    #[arg(long, env = "AZURE_OPENAI_API_KEY", hide_env_values = true)]
    openai_key: Option<String>,

    /// Azure OpenAI deployment
    #[arg(long, env = "AZURE_OPENAI_DEPLOYMENT")]
    deployment: Option<String>,

    /// Azure OpenAI API version
    #[arg(long, env = "OPENAI_API_VERSION")]
    api_version: Option<String>,

    /// Timeout of each service request in seconds
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = compextract::config::DEFAULT_TIMEOUT.as_secs()
    )]
    timeout: u64,
}

fn required(value: &Option<String>, name: &str) -> Result<String, Box<dyn std::error::Error>> {
    value
        .clone()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| format!("{} is not set (use --help for options)", name).into())
}

impl ServiceArgs {
    fn analyzer(&self) -> Result<AzureDocumentIntelligence, Box<dyn std::error::Error>> {
        let config = DocumentIntelligenceConfig::new(
            required(&self.docint_endpoint, "ENDPOINT_DOCINT")?,
            required(&self.docint_key, "API_KEY_DOCINT")?,
        )
        .with_timeout(Duration::from_secs(self.timeout));
        Ok(AzureDocumentIntelligence::new(config)?)
    }

    fn model(&self) -> Result<AzureOpenAi, Box<dyn std::error::Error>> {
        let mut config = AzureOpenAiConfig::new(
            required(&self.openai_endpoint, "AZURE_OPENAI_ENDPOINT")?,
            required(&self.openai_key, "AZURE_OPENAI_API_KEY")?,
            required(&self.deployment, "AZURE_OPENAI_DEPLOYMENT")?,
        )
        .with_timeout(Duration::from_secs(self.timeout));
        if let Some(version) = self.api_version.as_deref().filter(|v| !v.trim().is_empty()) {
            config = config.with_api_version(version);
        }
        Ok(AzureOpenAi::new(config)?)
    }
}

fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Run {
            input,
            run,
            services,
        }) => cmd_run(&input, &run, &services),
        Some(Commands::Url {
            urls,
            run,
            services,
        }) => cmd_url(&urls, &run, &services),
        Some(Commands::Analyze { input, services }) => cmd_analyze(&input, &services),
        Some(Commands::Show { artifact, json }) => cmd_show(&artifact, json),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            println!("{}", "Usage: compextract run <PATH> [-o DIR]".yellow());
            println!("       compextract --help for more information");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn build_pipeline(
    run: &RunArgs,
    services: &ServiceArgs,
) -> Result<Pipeline, Box<dyn std::error::Error>> {
    let format = if run.compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    };
    let store = LocalStore::new(&run.output).with_format(format);

    let mut options = PipelineOptions::new()
        .with_max_retries(run.max_retries)
        .with_dpi(run.dpi)
        .with_main_info(run.main_info)
        .with_resume(run.resume);
    if run.local_orientation {
        options = options.deterministic_orientation();
    }

    let mut pipeline = Pipeline::new(
        services.analyzer()?,
        PopplerRasterizer::new(),
        services.model()?,
        store,
    )
    .with_options(options);

    if let Some(path) = &run.elements {
        let normalizer = Normalizer::new(ElementTable::from_file(path)?);
        println!(
            "{} {} reference element(s) from {}",
            "Loaded".green(),
            normalizer.elements().len(),
            path.display()
        );
        pipeline = pipeline.with_normalizer(normalizer);
    }

    Ok(pipeline)
}

fn cmd_run(
    input: &Path,
    run: &RunArgs,
    services: &ServiceArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let sources = if input.is_dir() {
        collect_sources(input)?
    } else {
        vec![DocumentSource::path(input)]
    };
    if sources.is_empty() {
        println!("{} {}", "No documents in".yellow(), input.display());
        return Ok(());
    }

    run_sources(&sources, run, services)
}

fn cmd_url(
    urls: &[String],
    run: &RunArgs,
    services: &ServiceArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let sources = urls
        .iter()
        .map(|url| DocumentSource::parse(url))
        .collect::<Result<Vec<_>, _>>()?;
    run_sources(&sources, run, services)
}

fn run_sources(
    sources: &[DocumentSource],
    run: &RunArgs,
    services: &ServiceArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = build_pipeline(run, services)?;
    fs::create_dir_all(&run.output)?;
    log::debug!(
        "Running {} document(s) into {}",
        sources.len(),
        run.output.display()
    );

    let pb = ProgressBar::new(sources.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    if let Some(first) = sources.first() {
        pb.set_message(first.to_string());
    }

    let report = pipeline.run_batch_with_progress(sources, |source, outcome| {
        match outcome {
            Ok(document) => pb.println(format!(
                "{} {} ({} table(s))",
                "✓".green(),
                source,
                document.tables.len()
            )),
            Err(e) => pb.println(format!("{} {}: {}", "✗".red(), source, e)),
        }
        pb.inc(1);
    });
    pb.finish_with_message("Done!");

    print_summary(&report, &run.output);

    if report.is_success() {
        Ok(())
    } else {
        Err(format!("{} of {} document(s) failed", report.failed.len(), report.total()).into())
    }
}

fn print_summary(report: &BatchReport, output: &Path) {
    println!("\n{}", "Summary".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "Documents".bold(), report.total());
    println!("{}: {}", "Succeeded".bold(), report.succeeded.len());
    println!("{}: {}", "Failed".bold(), report.failed.len());

    if report.succeeded.is_empty() {
        return;
    }
    println!("\n{} {}", "Output files:".green().bold(), output.display());
    let last = report.succeeded.len() - 1;
    for (i, document) in report.succeeded.iter().enumerate() {
        let branch = if i == last { "└─" } else { "├─" };
        let examples: usize = document.tables.iter().map(|t| t.examples.len()).sum();
        let resumed = document
            .resumed_after
            .map(|stage| format!(" (resumed after {:?})", stage))
            .unwrap_or_default();
        println!(
            "  {} {}_normalized.json: {} table(s), {} example(s){}",
            branch.dimmed(),
            document.key,
            document.tables.len(),
            examples,
            resumed.dimmed()
        );
    }
}

fn cmd_analyze(input: &str, services: &ServiceArgs) -> Result<(), Box<dyn std::error::Error>> {
    let source = DocumentSource::parse(input)?;
    let analyzer = services.analyzer()?;

    let pb = ProgressBar::new_spinner();
    pb.set_message("Analyzing document...");
    pb.enable_steady_tick(Duration::from_millis(120));
    let result = analyzer.analyze(&source)?;
    pb.finish_and_clear();

    let state = build_state(&source.to_string(), &result, Vec::new());

    println!("{}", "Document Analysis".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "Document".bold(), source);
    println!("{}: {}", "Artifact key".bold(), source.artifact_key());
    println!("{}: {}", "Pages".bold(), state.pages.len());
    println!("{}: {}", "Tables".bold(), state.tables.len());
    println!(
        "{}: {}",
        "Characters".bold(),
        state.ocr_text.chars().count()
    );

    if !state.tables.is_empty() {
        println!();
        println!("{}", "Tables".cyan().bold());
        println!("{}", "─".repeat(40).dimmed());
        for table in &state.tables {
            let rows = table.content.lines().count();
            let pages: Vec<String> = table.page_refs.iter().map(|p| p.to_string()).collect();
            println!(
                "{} {}: page {}, {} line(s)",
                "Table".bold(),
                table.id,
                pages.join(", "),
                rows
            );
        }
    }

    Ok(())
}

fn cmd_show(artifact: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let tables = compextract::read_normalized(artifact)?;

    if json {
        println!("{}", compextract::render::to_json(&tables, JsonFormat::Pretty)?);
    } else if tables.is_empty() {
        println!("{}", "No normalized tables".yellow());
    } else {
        print!("{}", compextract::render::to_text(&tables));
    }

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "compextract".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Composition table extraction tool");
    println!();
    println!("License: MIT");
}
