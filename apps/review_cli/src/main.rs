use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use review_client::{
    AuthStore, DiagnosisWorkflow, FetchCoordinator, FetchOutcome, GenerationOutcome,
    HttpReviewClient, PatientView, QueryController, ReviewApi,
};
use shared::domain::{PatientId, SearchField, SummaryId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod controller;
mod render;

use config::{load_settings, CliOverrides};
use controller::{
    browse::{BrowseCommand, HELP},
    events::CliFailure,
};

#[derive(Parser, Debug)]
#[command(name = "review", about = "Browse clinical summaries and review their diagnoses")]
struct Cli {
    /// Config file; defaults to ./review.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    server_url: Option<String>,
    #[arg(long, global = true)]
    page_size: Option<u32>,
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    /// Bearer token from `review login`.
    #[arg(long, global = true)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One page of summaries. `--page` beyond 1 costs a second request: the
    /// first page's total is needed before the page can be clamped.
    List {
        #[arg(long, default_value = "keyword")]
        field: SearchField,
        #[arg(long)]
        term: Option<String>,
        #[arg(long, conflicts_with = "term")]
        tag: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    Show {
        id: SummaryId,
    },
    Diagnose {
        id: SummaryId,
    },
    Feedback {
        id: SummaryId,
        #[arg(long, action = clap::ArgAction::Set)]
        helpful: bool,
        #[arg(long, default_value = "")]
        comment: String,
    },
    Patients,
    Patient {
        id: String,
    },
    /// Writes the plain-text export of a summary.
    Export {
        id: SummaryId,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Account,
    /// Interactive list with search, tags and paging.
    Browse,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        let failure = CliFailure::from_anyhow(&err);
        warn!(category = ?failure.category(), "command failed");
        eprintln!("{failure}");
        std::process::exit(failure.exit_code());
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let overrides = CliOverrides {
        server_url: cli.server_url,
        page_size: cli.page_size,
        request_timeout_secs: cli.timeout_secs,
        access_token: cli.token,
    };
    let settings = load_settings(cli.config.as_deref(), &overrides)?;
    let auth = match &settings.access_token {
        Some(token) => AuthStore::with_token(token.clone()),
        None => AuthStore::new(),
    };
    let client = HttpReviewClient::new(&settings.server_url, settings.request_timeout(), auth)
        .context("invalid server url")?;
    info!(server_url = %client.base_url(), "review client ready");
    let auth = client.auth().clone();
    let api: Arc<dyn ReviewApi> = Arc::new(client);

    match cli.command {
        Command::List {
            field,
            term,
            tag,
            page,
        } => {
            let mut controller = QueryController::new(settings.page_size);
            controller.set_search_field(field);
            if let Some(term) = term {
                controller.set_search_term(term);
            }
            if let Some(tag) = tag {
                controller.click_tag(&tag);
            }
            let mut coordinator = FetchCoordinator::new(Arc::clone(&api));
            fetch_now(&mut coordinator, &mut controller).await?;
            if page > 1 && controller.set_page(page).needs_fetch() {
                fetch_now(&mut coordinator, &mut controller).await?;
            }
            print!("{}", render::list(&controller, coordinator.state()));
        }
        Command::Show { id } => {
            let workflow = DiagnosisWorkflow::open(api.as_ref(), id).await;
            if let Some(err) = workflow.summary_error() {
                return Err(err.clone()).context("loading summary");
            }
            print!("{}", render::document(&workflow));
        }
        Command::Diagnose { id } => {
            let mut workflow = DiagnosisWorkflow::open(api.as_ref(), id).await;
            if let Some(err) = workflow.summary_error() {
                return Err(err.clone()).context("loading summary");
            }
            match workflow.generate(api.as_ref()).await? {
                GenerationOutcome::Failed(err) => {
                    print!("{}", render::document(&workflow));
                    return Err(err).context("generating diagnosis");
                }
                GenerationOutcome::Stored | GenerationOutcome::Discarded => {
                    print!("{}", render::document(&workflow));
                }
            }
        }
        Command::Feedback {
            id,
            helpful,
            comment,
        } => {
            let mut workflow = DiagnosisWorkflow::open(api.as_ref(), id).await;
            if let Some(err) = workflow.summary_error() {
                return Err(err.clone()).context("loading summary");
            }
            workflow.set_helpful(Some(helpful));
            workflow.set_comment(comment);
            workflow.submit_feedback(api.as_ref()).await?;
            if let Some(confirmation) = workflow.confirmation() {
                println!("{confirmation}");
            }
        }
        Command::Patients => {
            let patients = api.list_patients().await.context("listing patients")?;
            if patients.is_empty() {
                println!("No patients found.");
            }
            for patient in &patients {
                println!("{}", render::patient_line(patient));
            }
        }
        Command::Patient { id } => {
            let view = PatientView::load(api.as_ref(), &PatientId::new(id), settings.page_size)
                .await
                .context("loading patient")?;
            print!("{}", render::patient(&view));
        }
        Command::Export { id, out } => {
            let summary = api.get_summary(id).await.context("loading summary")?;
            let path = out.unwrap_or_else(|| PathBuf::from(summary.export_file_name()));
            std::fs::write(&path, summary.export_text())
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            println!("wrote {}", path.display());
        }
        Command::Login { email, password } => {
            auth.login(api.as_ref(), &email, &password).await?;
            print_token(&auth);
        }
        Command::Register {
            username,
            email,
            password,
        } => {
            auth.register(api.as_ref(), &username, &email, &password)
                .await?;
            print_token(&auth);
        }
        Command::Account => {
            let account = api.account().await.context("loading account")?;
            println!("{} <{}>", account.username, account.email);
        }
        Command::Browse => browse(api, settings.page_size).await?,
    }
    Ok(())
}

fn print_token(auth: &AuthStore) {
    if let Some(token) = auth.token() {
        println!("signed in; export APP__ACCESS_TOKEN={token}");
    }
}

async fn fetch_now(
    coordinator: &mut FetchCoordinator,
    controller: &mut QueryController,
) -> Result<()> {
    match coordinator.settle(controller).await {
        Some(FetchOutcome::Failed { error, .. }) => Err(error).context("listing summaries"),
        _ => Ok(()),
    }
}

async fn browse(api: Arc<dyn ReviewApi>, page_size: u32) -> Result<()> {
    let mut controller = QueryController::new(page_size);
    let mut coordinator = FetchCoordinator::new(api);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{HELP}");
    coordinator.sync(&controller);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let command = match line.parse::<BrowseCommand>() {
                    Ok(command) => command,
                    Err(message) => {
                        eprintln!("[validation] {message}");
                        continue;
                    }
                };
                match command {
                    BrowseCommand::Quit => break,
                    BrowseCommand::Help => println!("{HELP}"),
                    BrowseCommand::Refresh => {
                        coordinator.refresh(&controller);
                    }
                    other => {
                        other.apply(&mut controller);
                        if coordinator.sync(&controller).is_none() {
                            print!("{}", render::list(&controller, coordinator.state()));
                        }
                    }
                }
            }
            outcome = coordinator.next_outcome(&mut controller) => {
                match outcome {
                    FetchOutcome::Discarded { .. } => {}
                    FetchOutcome::Failed { error, .. } => {
                        eprintln!("{}", CliFailure::from_client_error(&error));
                    }
                    FetchOutcome::Applied { .. } => {
                        print!("{}", render::list(&controller, coordinator.state()));
                    }
                }
            }
        }
    }

    coordinator.cancel();
    Ok(())
}
