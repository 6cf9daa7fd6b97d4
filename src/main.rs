//! ai-rtl 命令行入口
//!
//! ```text
//! ai-rtl annotate page.html -o page.rtl.html --url https://chatgpt.com/c/1
//! ai-rtl classify "سلام دنیا"
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::debug;

use ai_rtl::config::{FontChoice, FontSize, Sensitivity, Settings};
use ai_rtl::core::{annotate_file, format_output_path, AnnotateOptions};
use ai_rtl::env::{core::LogLevel, engine, EnvVar};
use ai_rtl::{classify, EngineError, EngineOptions, EngineResult};

#[derive(Parser)]
#[command(
    name = "ai-rtl",
    version,
    about = "Detect Persian text in HTML documents and apply right-to-left styling"
)]
struct Cli {
    /// Log level: trace, debug, info, warn, error
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Annotate an HTML file and write the result
    Annotate {
        /// Input HTML file
        input: PathBuf,

        /// Output file; supports %title% and %timestamp%. Defaults to stdout
        #[arg(short, long)]
        output: Option<String>,

        /// Page URL used to pick the site profile
        #[arg(long)]
        url: Option<String>,

        /// Input encoding; defaults to the declared charset
        #[arg(short, long)]
        encoding: Option<String>,

        /// Detection sensitivity: high, medium, low
        #[arg(short, long)]
        sensitivity: Option<Sensitivity>,

        /// Font: vazir, shabnam, default
        #[arg(short, long)]
        font: Option<FontChoice>,

        /// Font size: default, small, medium, large
        #[arg(long)]
        font_size: Option<FontSize>,

        /// Engine options TOML file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Classify a piece of text
    Classify {
        text: String,

        /// Detection sensitivity: high, medium, low
        #[arg(short, long)]
        sensitivity: Option<Sensitivity>,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.log_level.as_deref() {
        Some(level) => LogLevel::parse(level).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            process::exit(1);
        }),
        None => LogLevel::get().unwrap_or_else(|_| "info".to_string()),
    };
    ai_rtl::init_logging(&level);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(command: Commands) -> EngineResult<()> {
    match command {
        Commands::Annotate {
            input,
            output,
            url,
            encoding,
            sensitivity,
            font,
            font_size,
            config,
        } => {
            let settings = Settings {
                detection_sensitivity: sensitivity.unwrap_or_else(default_sensitivity),
                font: font.unwrap_or_else(default_font),
                font_size: font_size.unwrap_or_default(),
                ..Settings::default()
            };
            let annotate = AnnotateOptions {
                page_url: url,
                encoding,
                settings,
                options: EngineOptions::load(config.as_deref())?,
                ..AnnotateOptions::default()
            };

            let annotated = annotate_file(&input, &annotate)?;
            match output {
                Some(template) => {
                    let path = format_output_path(&template, annotated.title.as_deref());
                    write_atomically(Path::new(&path), &annotated.html)?;
                    debug!("已写入 {}", path);
                }
                None => io::stdout()
                    .write_all(&annotated.html)
                    .map_err(EngineError::from)?,
            }
            Ok(())
        }
        Commands::Classify { text, sensitivity } => {
            let language = classify(&text, sensitivity.unwrap_or_else(default_sensitivity));
            println!("{}", language);
            Ok(())
        }
    }
}

fn default_sensitivity() -> Sensitivity {
    engine::DetectionSensitivity::get().unwrap_or_default()
}

fn default_font() -> FontChoice {
    engine::Font::get().unwrap_or_default()
}

/// 先写临时文件再改名，避免留下半个输出
fn write_atomically(path: &Path, data: &[u8]) -> EngineResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(data)?;
    file.persist(path)
        .map_err(|e| EngineError::Internal(format!("cannot write {}: {}", path.display(), e)))?;
    Ok(())
}
