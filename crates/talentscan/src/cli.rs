//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use talentscan_auth::MailProvider;
use talentscan_core::CandidateQuery;
use talentscan_query::{
    AttachmentKind, FilterFacets, KeywordPreset, MailStatus, ParseFacetError, SourceBoard,
    TimeRange,
};

#[derive(Debug, Parser)]
#[command(name = "talentscan", version)]
#[command(about = "Scan a recruiting mailbox for candidates", long_about = None)]
pub struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sign in
    #[command(subcommand)]
    Login(LoginCommand),
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in recruiter
    Whoami,
    /// Scan the mailbox and list the candidates it added
    Scan(ScanArgs),
    /// List saved candidates
    Candidates(CandidatesArgs),
    /// Reset the server-side scan state
    Reset,
}

#[derive(Debug, Subcommand)]
pub enum LoginCommand {
    /// Sign in with Google in the browser
    Google,
    /// Sign in with mailbox credentials (password from TALENTSCAN_PASSWORD or stdin)
    Imap(ImapArgs),
}

#[derive(Debug, Args)]
pub struct ImapArgs {
    /// Mailbox provider: gmail, outlook or yahoo (inferred from the address if omitted)
    #[arg(long)]
    pub provider: Option<MailProvider>,

    /// Mailbox address
    #[arg(long)]
    pub email: String,
}

#[derive(Debug, Default, Args)]
pub struct ScanArgs {
    /// Subject keyword group: job, sales, marketing, invoice, reports, projects, meetings
    #[arg(long, conflicts_with = "custom_keyword")]
    pub keyword: Option<KeywordPreset>,

    /// Custom subject phrase
    #[arg(long)]
    pub custom_keyword: Option<String>,

    /// Age: today, 3days, 7days, 30days, 3months, 6months, year
    #[arg(long, conflicts_with_all = ["from", "to"])]
    pub time: Option<TimeRange>,

    /// Received on or after (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,

    /// Received before (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,

    /// Attachment kind: any, pdf, word, excel, images (repeatable)
    #[arg(long = "attachment")]
    pub attachments: Vec<AttachmentKind>,

    /// Job board: linkedin, indeed, naukri, monster, glassdoor (repeatable)
    #[arg(long = "source")]
    pub sources: Vec<SourceBoard>,

    /// Additional sender address
    #[arg(long)]
    pub source_address: Option<String>,

    /// Mailbox status: unread, read, starred, important, inbox (repeatable)
    #[arg(long = "status")]
    pub statuses: Vec<MailStatus>,

    /// Print the compiled query without scanning
    #[arg(long)]
    pub dry_run: bool,
}

impl ScanArgs {
    /// Collects the flags into facet selections.
    pub fn facets(&self) -> Result<FilterFacets, ParseFacetError> {
        let mut facets = FilterFacets::new();

        if let Some(keyword) = &self.custom_keyword {
            facets = facets.with_custom_keyword(keyword.as_str());
        } else if let Some(preset) = self.keyword {
            facets = facets.with_keyword_preset(preset);
        }

        if self.from.is_some() || self.to.is_some() {
            facets = facets.with_time_range(TimeRange::custom_from_strs(
                self.from.as_deref().unwrap_or_default(),
                self.to.as_deref().unwrap_or_default(),
            )?);
        } else if let Some(range) = self.time {
            facets = facets.with_time_range(range);
        }

        facets.attachments.extend(self.attachments.iter().copied());
        facets.sources.extend(self.sources.iter().copied());
        facets.statuses.extend(self.statuses.iter().copied());
        if let Some(address) = &self.source_address {
            facets = facets.with_source_address(address.as_str());
        }

        Ok(facets)
    }
}

#[derive(Debug, Args)]
pub struct CandidatesArgs {
    /// Free-text search
    #[arg(long)]
    pub search: Option<String>,

    /// Show at most this many records
    #[arg(long)]
    pub limit: Option<u32>,

    /// Experience bucket: 0-1, 1-3, 3-5, 5-10, 10+
    #[arg(long)]
    pub experience: Option<String>,

    /// Degree contains this text
    #[arg(long)]
    pub degree: Option<String>,

    /// Residence contains this text
    #[arg(long)]
    pub location: Option<String>,

    /// Language the CV is written in
    #[arg(long)]
    pub cv_language: Option<String>,

    /// Nationality contains this text
    #[arg(long)]
    pub nationality: Option<String>,

    /// Minimum age
    #[arg(long)]
    pub min_age: Option<u32>,

    /// Maximum age
    #[arg(long)]
    pub max_age: Option<u32>,

    /// Speaks this language
    #[arg(long)]
    pub language: Option<String>,

    /// Career level, e.g. entry, mid, senior
    #[arg(long)]
    pub career_level: Option<String>,

    /// Field of study contains this text
    #[arg(long)]
    pub major: Option<String>,
}

impl CandidatesArgs {
    /// Builds the saved-record search from the flags.
    pub fn query(&self) -> CandidateQuery {
        let mut query = CandidateQuery {
            experience_years: self.experience.clone(),
            education_degree: self.degree.clone(),
            residence_location: self.location.clone(),
            cv_language: self.cv_language.clone(),
            nationality: self.nationality.clone(),
            languages: self.language.clone(),
            career_level: self.career_level.clone(),
            major: self.major.clone(),
            ..CandidateQuery::default()
        }
        .with_age(self.min_age, self.max_age);
        if let Some(search) = &self.search {
            query = query.with_search(search.as_str());
        }
        if let Some(limit) = self.limit {
            query = query.with_page(0, limit);
        }
        query
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use talentscan_query::compile;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("talentscan").chain(args.iter().copied())).unwrap()
    }

    fn scan_args(args: &[&str]) -> ScanArgs {
        match parse(args).command {
            Commands::Scan(scan) => scan,
            other => panic!("expected scan, got {other:?}"),
        }
    }

    #[test]
    fn test_scan_flags_compile() {
        let args = scan_args(&[
            "scan",
            "--attachment",
            "excel",
            "--attachment",
            "pdf",
            "--status",
            "unread",
            "--status",
            "starred",
        ]);
        let query = compile(&args.facets().unwrap());
        assert_eq!(
            query.as_str(),
            "has:attachment (filename:pdf OR (filename:xlsx OR filename:xls OR filename:csv)) \
             is:unread is:starred"
        );
    }

    #[test]
    fn test_custom_dates() {
        let args = scan_args(&["scan", "--from", "2024-01-05", "--custom-keyword", " Java Dev "]);
        let query = compile(&args.facets().unwrap());
        assert_eq!(query.as_str(), "subject:(Java Dev) after:2024/01/05");
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        let args = scan_args(&["scan", "--from", "05/01/2024"]);
        assert!(matches!(
            args.facets(),
            Err(ParseFacetError::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_no_flags_means_no_filter() {
        let args = scan_args(&["scan", "--dry-run"]);
        assert!(args.dry_run);
        assert!(compile(&args.facets().unwrap()).is_empty());
    }

    #[test]
    fn test_unknown_facet_value() {
        let result = Cli::try_parse_from(["talentscan", "scan", "--status", "archived"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_keyword_conflicts() {
        let result = Cli::try_parse_from([
            "talentscan",
            "scan",
            "--keyword",
            "job",
            "--custom-keyword",
            "rust",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_candidate_filters() {
        let args = match parse(&[
            "candidates",
            "--search",
            " rust ",
            "--limit",
            "20",
            "--min-age",
            "25",
            "--career-level",
            "senior",
            "--cv-language",
            "english",
        ])
        .command
        {
            Commands::Candidates(args) => args,
            other => panic!("expected candidates, got {other:?}"),
        };

        let query = args.query();
        assert_eq!(query.search.as_deref(), Some("rust"));
        assert_eq!((query.skip, query.limit), (Some(0), Some(20)));
        assert_eq!((query.age_min, query.age_max), (Some(25), None));
        assert_eq!(query.career_level.as_deref(), Some("senior"));
        assert_eq!(query.cv_language.as_deref(), Some("english"));
        assert_eq!(query.major, None);
    }

    #[test]
    fn test_imap_login_args() {
        match parse(&["login", "imap", "--provider", "outlook", "--email", "a@b.io"]).command {
            Commands::Login(LoginCommand::Imap(args)) => {
                assert_eq!(args.provider, Some(MailProvider::Outlook));
                assert_eq!(args.email, "a@b.io");
            }
            other => panic!("expected imap login, got {other:?}"),
        }
    }
}
