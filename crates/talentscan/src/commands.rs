//! Command handlers.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use talentscan_auth::{
    AuthApi, AuthFlow, BrowserSurface, Credentials, DelegatedFlow, DirectFlow, MailProvider,
    MessageBus, SessionStore,
};
use talentscan_core::{
    ApiClient, Candidate, CandidateRepository, ClientConfig, ScanApi,
    ScanProgress, ScanReport, ScanSession, ScanState,
};
use talentscan_query::compile;
use tracing::{debug, info};

use crate::cli::{CandidatesArgs, ImapArgs, ScanArgs};
use crate::relay::StdinRelay;

/// Environment variable holding the mailbox password for `login imap`.
const PASSWORD_ENV: &str = "TALENTSCAN_PASSWORD";

/// Shared state for one invocation.
pub struct App {
    config: ClientConfig,
    store: Arc<SessionStore>,
    api: Arc<ApiClient>,
}

impl App {
    /// Builds the clients and loads any stored session.
    pub async fn new(config: ClientConfig) -> Result<Self> {
        let store = Arc::new(config.session_store());
        if let Some(session) = store.load().await {
            debug!("Restored session for {}", session.user.email);
        }
        let api = Arc::new(
            ApiClient::new(&config, Arc::clone(&store)).context("Failed to create API client")?,
        );
        Ok(Self { config, store, api })
    }

    fn auth_api(&self) -> Result<Arc<dyn AuthApi>> {
        Ok(Arc::new(self.api.auth_client()?))
    }

    fn scan_session(&self) -> ScanSession {
        ScanSession::new(
            Arc::clone(&self.store),
            Arc::clone(&self.api) as Arc<dyn ScanApi>,
            Arc::clone(&self.api) as Arc<dyn CandidateRepository>,
            self.config.timings(),
        )
    }

    pub async fn login_google(&self) -> Result<()> {
        let bus = MessageBus::new();
        let flow = DelegatedFlow::new(self.auth_api()?, Arc::new(BrowserSurface), bus.clone())
            .with_origins(self.config.origin_policy());

        eprintln!("Complete sign-in in the browser window, then paste the completion message here.");
        let _relay = StdinRelay::spawn(bus);

        let session = AuthFlow::new(Arc::clone(&self.store))
            .authenticate(&flow)
            .await
            .map_err(|e| anyhow!(e.user_message()))?;
        println!("Signed in as {}", session.user.display_name());
        Ok(())
    }

    pub async fn login_imap(&self, args: ImapArgs) -> Result<()> {
        let provider = match args.provider {
            Some(provider) => provider,
            None => MailProvider::from_address(&args.email).ok_or_else(|| {
                anyhow!(
                    "Cannot tell the provider of {}; pass --provider gmail|outlook|yahoo",
                    args.email
                )
            })?,
        };
        if provider.requires_app_password() {
            eprintln!(
                "{} requires an app password: {}",
                provider.display_name(),
                provider.help_url()
            );
        }

        let password = read_password()?;
        let flow = DirectFlow::new(
            self.auth_api()?,
            Credentials::new(provider, args.email, password),
        );

        let session = AuthFlow::new(Arc::clone(&self.store))
            .authenticate(&flow)
            .await
            .map_err(|e| anyhow!(e.user_message()))?;
        println!("Signed in as {}", session.user.display_name());
        if session.token().is_none() {
            eprintln!("The server did not issue a token; scanning will require a Google sign-in.");
        }
        Ok(())
    }

    pub async fn logout(&self) -> Result<()> {
        let auth_api = self.auth_api()?;
        AuthFlow::new(Arc::clone(&self.store))
            .logout(auth_api.as_ref())
            .await?;
        println!("Signed out");
        Ok(())
    }

    pub fn whoami(&self) {
        match self.store.current() {
            Some(session) => {
                println!("{} <{}>", session.user.display_name(), session.user.email);
                println!("Signed in {}", session.created_at.format("%Y-%m-%d %H:%M UTC"));
                if session.token().is_none() {
                    println!("No API token");
                }
            }
            None => println!("Not signed in"),
        }
    }

    pub async fn scan(&self, args: &ScanArgs) -> Result<()> {
        let facets = args.facets()?;
        let query = compile(&facets);
        println!(
            "Query: {} ({} active filters)",
            if query.is_empty() {
                "(no filter)"
            } else {
                query.as_str()
            },
            facets.active_count()
        );
        if args.dry_run {
            return Ok(());
        }

        let session = self.scan_session();
        let mut updates = session.subscribe();
        let handle = session
            .start(&query)
            .await
            .context("Scan could not be started")?;
        info!(generation = handle.generation(), "Scan started");

        let printer = tokio::spawn(async move {
            let mut last_sequence = 0;
            while updates.changed().await.is_ok() {
                let snapshot = updates.borrow_and_update().clone();
                if snapshot.state != ScanState::Polling || snapshot.sequence == last_sequence {
                    continue;
                }
                last_sequence = snapshot.sequence;
                if let Some(progress) = &snapshot.progress {
                    print_progress(progress);
                }
            }
        });

        let outcome = tokio::select! {
            report = handle.finished() => report,
            _ = tokio::signal::ctrl_c() => {
                session.stop().await;
                None
            }
        };
        printer.abort();

        match outcome {
            Some(report) => print_report(&report),
            None => {
                println!("Stopped watching; the server keeps scanning.");
                Ok(())
            }
        }
    }

    pub async fn candidates(&self, args: &CandidatesArgs) -> Result<()> {
        let candidates = self.api.search(&args.query()).await?;
        if candidates.is_empty() {
            println!("No candidates");
        }
        for candidate in &candidates {
            print_candidate(candidate);
        }
        Ok(())
    }

    pub async fn reset(&self) {
        self.scan_session().reset_remote().await;
        println!("Scan state reset");
    }
}

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }

    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("No password given");
    }
    Ok(password)
}

fn print_progress(progress: &ScanProgress) {
    let percent = progress
        .percent()
        .map_or_else(String::new, |p| format!(" {p:.0}%"));
    println!(
        "[{}]{percent} {}/{} processed, {} added, {} skipped, {} errors  {}",
        progress.status,
        progress.processed_emails,
        progress.total_emails,
        progress.candidates_added,
        progress.skipped,
        progress.errors,
        progress.current_subject,
    );
}

fn print_report(report: &ScanReport) -> Result<()> {
    if !report.succeeded() {
        let reason = if report.progress.message.trim().is_empty() {
            "Scan failed"
        } else {
            report.progress.message.as_str()
        };
        bail!("{reason}");
    }

    println!(
        "Scan complete: {} processed, {} candidates added, {} skipped, {} errors",
        report.progress.processed_emails,
        report.progress.candidates_added,
        report.progress.skipped,
        report.progress.errors,
    );
    if let Some(notice) = &report.notice {
        println!("{notice}");
    }
    for candidate in &report.candidates {
        print_candidate(candidate);
    }
    Ok(())
}

fn print_candidate(candidate: &Candidate) {
    let role = match (&candidate.current_designation, &candidate.current_company) {
        (Some(title), Some(company)) => format!("{title} @ {company}"),
        (Some(title), None) => title.clone(),
        (None, Some(company)) => company.clone(),
        (None, None) => String::new(),
    };
    println!(
        "  {}  {}  {role}",
        candidate.display_name(),
        candidate.email.as_deref().unwrap_or("-"),
    );
}
