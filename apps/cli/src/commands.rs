//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use faqbot_core::AppContext;
use faqbot_core::chat;
use faqbot_core::import::{ImportRequest, ImportResult, ProgressReporter, resolve_site_source, run_import};
use faqbot_discovery::SitemapSource;
use faqbot_shared::{AppConfig, init_config, load_config, load_config_from, validate_api_key};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// FAQBot: a website-trained FAQ chatbot.
#[derive(Parser)]
#[command(
    name = "faqbot",
    version,
    about = "Train a FAQ chatbot on your website and serve it over HTTP.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.faqbot/faqbot.toml.
    #[arg(long = "config", global = true, env = "FAQBOT_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Database path, overriding `storage.database_path`.
    #[arg(long, global = true)]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Start the HTTP API and chat widget server.
    Serve {
        /// Address to listen on (defaults to `server.listen_addr`).
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Import a website into a tenant's knowledge index.
    Import(ImportArgs),

    /// Answer a question from FAQs and website content.
    Chat {
        #[arg(short, long)]
        tenant: String,

        question: String,
    },

    /// Answer a question from FAQs only.
    Ask {
        #[arg(short, long)]
        tenant: String,

        question: String,
    },

    /// Manage a tenant's FAQs.
    Faq {
        #[command(subcommand)]
        action: FaqAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
#[command(group(clap::ArgGroup::new("source").required(true).args(["sitemap", "file", "site"])))]
pub(crate) struct ImportArgs {
    /// Tenant that owns the imported content.
    #[arg(short, long)]
    pub tenant: String,

    /// Sitemap URL to read.
    #[arg(long)]
    pub sitemap: Option<String>,

    /// Local sitemap.xml file.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Site URL; its sitemap is located via robots.txt or /sitemap.xml.
    #[arg(long)]
    pub site: Option<String>,

    /// Maximum number of pages to index.
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Re-index pages whose content is unchanged.
    #[arg(long)]
    pub force: bool,
}

/// FAQ subcommands.
#[derive(Subcommand)]
pub(crate) enum FaqAction {
    /// Add a question/answer pair.
    Add {
        #[arg(short, long)]
        tenant: String,
        #[arg(short, long)]
        question: String,
        #[arg(short, long)]
        answer: String,
    },
    /// List FAQs, newest first.
    List {
        #[arg(short, long)]
        tenant: String,
        #[arg(long)]
        limit: Option<u32>,
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Delete a FAQ by id.
    Remove {
        #[arg(short, long)]
        tenant: String,
        id: String,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "faqbot=info",
        1 => "faqbot=debug",
        _ => "faqbot=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&cli),
        };
    }

    let config = resolve_config(&cli)?;

    match cli.command {
        Command::Serve { listen } => cmd_serve(config, listen).await,
        Command::Import(args) => cmd_import(config, args).await,
        Command::Chat { tenant, question } => cmd_chat(config, &tenant, &question, false).await,
        Command::Ask { tenant, question } => cmd_chat(config, &tenant, &question, true).await,
        Command::Faq { action } => cmd_faq(config, action).await,
        Command::Config { .. } => Ok(()),
    }
}

/// Load the config file and apply global flag overrides.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config_file {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(db) = &cli.db {
        config.storage.database_path = db.clone();
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(mut config: AppConfig, listen: Option<String>) -> Result<()> {
    if let Some(addr) = listen {
        config.server.listen_addr = addr;
    }
    let listen_addr = config.server.listen_addr.clone();

    let ctx = Arc::new(AppContext::from_config(config).await?);
    info!(listen_addr = %listen_addr, "starting server");
    faqbot_server::serve(ctx, &listen_addr).await?;
    Ok(())
}

async fn cmd_import(config: AppConfig, args: ImportArgs) -> Result<()> {
    validate_api_key(&config)?;
    let ctx = AppContext::from_config(config).await?;

    let source = match (&args.sitemap, &args.file, &args.site) {
        (Some(url), _, _) => SitemapSource::from_parts(Some(url.as_str()), None)?,
        (None, Some(path), _) => {
            let xml = std::fs::read_to_string(path)
                .map_err(|e| eyre!("cannot read '{}': {e}", path.display()))?;
            SitemapSource::from_parts(None, Some(xml))?
        }
        (None, None, Some(site)) => resolve_site_source(&ctx, site).await?,
        (None, None, None) => return Err(eyre!("provide --sitemap, --file or --site")),
    };

    info!(tenant = %args.tenant, source = %source.label(), "importing site");

    let request = ImportRequest {
        tenant_id: args.tenant.clone(),
        source,
        max_pages: args.max_pages,
        force: args.force,
    };
    let reporter = CliProgress::new();
    let result = run_import(&ctx, &request, &reporter).await?;

    println!();
    println!("  Import finished for tenant {}", args.tenant);
    println!("  Pages:     {}", result.pages);
    println!("  Chunks:    {}", result.chunks);
    println!("  Unchanged: {}", result.unchanged);
    println!("  Skipped:   {}", result.skipped);
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_chat(config: AppConfig, tenant: &str, question: &str, faq_only: bool) -> Result<()> {
    let ctx = AppContext::from_config(config).await?;
    let reply = if faq_only {
        chat::ask(&ctx, tenant, question).await?
    } else {
        chat::answer(&ctx, tenant, question).await?
    };
    println!("{reply}");
    Ok(())
}

async fn cmd_faq(config: AppConfig, action: FaqAction) -> Result<()> {
    let ctx = AppContext::from_config(config).await?;

    match action {
        FaqAction::Add {
            tenant,
            question,
            answer,
        } => {
            let faq = ctx.storage.insert_faq(&tenant, &question, &answer).await?;
            println!("Added FAQ {}", faq.id);
        }
        FaqAction::List {
            tenant,
            limit,
            json,
        } => {
            let faqs = ctx.storage.list_faqs(&tenant, limit).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&faqs)?);
            } else if faqs.is_empty() {
                println!("No FAQs for tenant {tenant}.");
            } else {
                for faq in &faqs {
                    println!("{}  {}", faq.id, faq.created_at.format("%Y-%m-%d %H:%M"));
                    println!("  Q: {}", faq.question);
                    println!("  A: {}", faq.answer);
                }
            }
        }
        FaqAction::Remove { tenant, id } => {
            if !ctx.storage.delete_faq(&tenant, &id).await? {
                return Err(eyre!("FAQ '{id}' not found for tenant {tenant}"));
            }
            println!("Deleted FAQ {id}");
        }
    }

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Import progress shown as an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn page_indexed(&self, url: &str, current: usize, total: usize, chunks: usize) {
        self.spinner
            .set_message(format!("Indexed [{current}/{total}] {url} ({chunks} chunks)"));
    }

    fn page_skipped(&self, url: &str, reason: &str) {
        self.spinner.set_message(format!("Skipped {url}: {reason}"));
    }

    fn done(&self, _result: &ImportResult) {
        self.spinner.finish_and_clear();
    }
}
