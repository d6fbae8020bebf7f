use std::{fs, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use stockroom_api::{
    auth::{AuthConfig, AuthService, SeaOrmPermissionSource, SessionRegistry},
    config::{self, AppConfig},
    db,
    services::imports::{
        detect, parser::parse_headers, required_permission, template_for, ImportRecordKind,
        ImportResult, ImportService, SeaOrmImportStore,
    },
};
use tracing::debug;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "stockroom-import",
    about = "Import products, inventory and orders from CSV files",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a CSV file on behalf of a user and tenant
    Run(RunArgs),
    /// Print the detected record kind of a CSV file
    Detect(DetectArgs),
    /// Print the CSV template for a record kind
    Template(TemplateArgs),
    /// Issue a bearer token for calling the HTTP API
    Token(TokenArgs),
}

#[derive(Args)]
struct RunArgs {
    #[arg(long, help = "Path to the CSV file")]
    file: PathBuf,
    #[arg(long, value_parser = clap::value_parser!(Uuid), help = "Acting user id (UUID)")]
    user: Uuid,
    #[arg(long, help = "Tenant the permissions are scoped to")]
    tenant: String,
}

#[derive(Args)]
struct DetectArgs {
    #[arg(long, help = "Path to the CSV file")]
    file: PathBuf,
}

#[derive(Args)]
struct TemplateArgs {
    #[arg(value_enum)]
    kind: KindArg,
}

#[derive(Args)]
struct TokenArgs {
    #[arg(long, value_parser = clap::value_parser!(Uuid), help = "User id (UUID)")]
    user: Uuid,
    #[arg(long, help = "Tenant id")]
    tenant: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Products,
    Inventory,
    Orders,
}

impl From<KindArg> for ImportRecordKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Products => ImportRecordKind::Products,
            KindArg::Inventory => ImportRecordKind::Inventory,
            KindArg::Orders => ImportRecordKind::Orders,
        }
    }
}

#[derive(Serialize)]
struct DetectOutput {
    file: String,
    kind: ImportRecordKind,
    headers: Vec<String>,
    required_permission: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            let cfg = load_config()?;
            handle_run(&cfg, args, cli.json).await?
        }
        Commands::Detect(args) => handle_detect(args, cli.json)?,
        Commands::Template(args) => handle_template(args)?,
        Commands::Token(args) => {
            let cfg = load_config()?;
            handle_token(&cfg, args, cli.json)?
        }
    }

    Ok(())
}

fn load_config() -> Result<AppConfig> {
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);
    Ok(cfg)
}

fn read_csv(path: &PathBuf) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

async fn handle_run(cfg: &AppConfig, args: RunArgs, json: bool) -> Result<()> {
    let text = read_csv(&args.file)?;

    let pool = db::establish_connection_from_app_config(cfg)
        .await
        .context("failed to connect to database")?;
    if cfg.auto_migrate {
        db::run_migrations(&pool).await?;
    }
    let pool = Arc::new(pool);

    let sessions = SessionRegistry::new(Arc::new(SeaOrmPermissionSource::new(pool.clone())))
        .with_ttl(Duration::from_secs(cfg.session_ttl_secs));
    let session = sessions
        .session_for(args.user, &args.tenant)
        .await
        .context("failed to load user session")?;
    debug!(role = %session.role(), "Session loaded");

    let service = ImportService::new(
        Arc::new(SeaOrmImportStore::new(pool)),
        cfg.import.clone(),
    );
    let result = service
        .import_csv(&session, &text)
        .await
        .map_err(|e| anyhow!("import rejected: {}", e))?;

    if json {
        print_json(&result)?;
    } else {
        render_result(&args.file, &result);
    }

    if result.success {
        Ok(())
    } else {
        Err(anyhow!("no rows were imported"))
    }
}

fn handle_detect(args: DetectArgs, json: bool) -> Result<()> {
    let text = read_csv(&args.file)?;
    let kind = detect(&text);

    if json {
        print_json(&DetectOutput {
            file: args.file.display().to_string(),
            kind,
            headers: parse_headers(&text).unwrap_or_default(),
            required_permission: required_permission(kind)
                .map(|(resource, action)| format!("{}:{}", resource, action)),
        })?;
    } else {
        println!("{}: {}", args.file.display(), kind);
    }

    Ok(())
}

fn handle_template(args: TemplateArgs) -> Result<()> {
    let kind = ImportRecordKind::from(args.kind);
    let template = template_for(kind).ok_or_else(|| anyhow!("no template for {}", kind))?;
    print!("{}", template);
    Ok(())
}

fn handle_token(cfg: &AppConfig, args: TokenArgs, json: bool) -> Result<()> {
    let auth = AuthService::new(AuthConfig::from(cfg));
    let token = auth
        .issue_token(args.user, &args.tenant)
        .map_err(|e| anyhow!("failed to issue token: {}", e))?;

    if json {
        print_json(&serde_json::json!({
            "access_token": token,
            "token_type": "Bearer",
            "expires_in": cfg.jwt_expiration,
        }))?;
    } else {
        println!("{}", token);
    }

    Ok(())
}

fn render_result(file: &PathBuf, result: &ImportResult) {
    println!(
        "{} • {} rows • {} succeeded • {} failed",
        file.display(),
        result.total_rows,
        result.successful_rows,
        result.failed_rows
    );
    for error in &result.errors {
        println!("  • {}", error);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
