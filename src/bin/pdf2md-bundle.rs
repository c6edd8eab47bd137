//! CLI binary for edgequake-pdf2md-bundle.
//!
//! A thin shim over the library crate: `serve` runs the HTTP service,
//! `tool` runs one plugin-tool invocation from a JSON parameter file.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_pdf2md_bundle::{
    server, ConverterAdapter, InputResolver, LayoutRegistry, PdfTool, PdfiumConverter, Pipeline,
    ServiceConfig, ToolParameters,
};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the service on the default port
  pdf2md-bundle serve

  # Upload a PDF and download the bundle
  curl -F file=@paper.pdf -o paper-artifacts.zip http://localhost:8000/api/v1/pdf/process

  # Same request, inline JSON with embedded images
  curl -F file=@paper.pdf -F response_format=json \
       -F write_images=false -F embed_images=true \
       http://localhost:8000/api/v1/pdf/process

  # One tool invocation, parameters from stdin
  echo '{"pdf_path": "paper.pdf", "extract_images": true}' | pdf2md-bundle tool

PDF ENGINE:
  The pdfium shared library is looked up at PDFIUM_LIB_PATH, then in the
  working directory, then on the system library path.
"#;

/// Turn PDFs into Markdown/HTML artifact bundles.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2md-bundle",
    version,
    about = "Turn PDFs into Markdown/HTML artifact bundles",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to the pdfium shared library.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Parent directory for job workspaces (default: system temp dir).
    #[arg(long, global = true, env = "PDF2MD_WORKSPACE_ROOT")]
    workspace_root: Option<PathBuf>,

    /// Timeout for remote PDF downloads, in seconds.
    #[arg(long, global = true, env = "PDF2MD_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Verbose logging (debug level).
    #[arg(short, long, global = true, env = "PDF2MD_VERBOSE")]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true, env = "PDF2MD_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve(ServeArgs),
    /// Run the plugin tool once and print its messages as JSON lines.
    Tool(ToolArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "PDF2MD_BIND", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// Largest accepted request body, in bytes.
    #[arg(long, env = "PDF2MD_MAX_UPLOAD_BYTES", default_value_t = 100 * 1024 * 1024)]
    max_upload_bytes: usize,
}

#[derive(Args, Debug)]
struct ToolArgs {
    /// JSON parameter file; reads stdin when omitted or `-`.
    params: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // stdout carries tool output, so logs always go to stderr.
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let mut config = ServiceConfig {
        workspace_root: cli.workspace_root.clone(),
        download_timeout_secs: cli.download_timeout,
        pdfium_lib_path: cli.pdfium_lib.clone(),
        ..ServiceConfig::default()
    };
    if let Command::Serve(args) = &cli.command {
        config.bind = args.bind;
        config.max_upload_bytes = args.max_upload_bytes;
    }

    let pipeline = build_pipeline(&config);

    match cli.command {
        Command::Serve(_) => run_server(&config, pipeline).await,
        Command::Tool(args) => run_tool(&config, pipeline, args).await,
    }
}

fn build_pipeline(config: &ServiceConfig) -> Pipeline {
    let converter = match &config.pdfium_lib_path {
        Some(path) => PdfiumConverter::with_library_path(path),
        None => PdfiumConverter::new(),
    };
    let layout = LayoutRegistry::from_build();
    info!(
        "Layout capability {}",
        if layout.is_available() { "available" } else { "not built in" }
    );
    let adapter = ConverterAdapter::new(Arc::new(converter), Arc::new(layout));
    Pipeline::new(adapter, config.workspace_root.clone())
}

async fn run_server(config: &ServiceConfig, pipeline: Pipeline) -> Result<()> {
    if let Some(root) = &config.workspace_root {
        std::fs::create_dir_all(root)
            .with_context(|| format!("Cannot create workspace root {}", root.display()))?;
    }
    let app = server::router(pipeline, config.max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Cannot bind {}", config.bind))?;
    server::serve(listener, app).await.context("Server error")?;
    Ok(())
}

async fn run_tool(config: &ServiceConfig, pipeline: Pipeline, args: ToolArgs) -> Result<()> {
    let raw = match args.params.as_deref() {
        Some(p) if p.as_os_str() != "-" => std::fs::read_to_string(p)
            .with_context(|| format!("Cannot read parameters from {}", p.display()))?,
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Cannot read parameters from stdin")?;
            buf
        }
    };
    let params: ToolParameters =
        serde_json::from_str(&raw).context("Tool parameters must be a JSON object")?;

    let resolver = InputResolver::new(config.download_timeout_secs)?;
    let tool = PdfTool::new(pipeline, resolver);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for message in tool.invoke(&params).await {
        serde_json::to_writer(&mut out, &message).context("Failed to write tool output")?;
        out.write_all(b"\n").context("Failed to write tool output")?;
    }
    out.flush().context("Failed to write tool output")?;
    Ok(())
}
