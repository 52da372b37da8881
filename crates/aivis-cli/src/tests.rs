use super::*;
use aivis_core::TrustWindow;
use chrono::NaiveDate;

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["aivis-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli =
        Cli::try_parse_from(["aivis-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["aivis-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn analyze_defaults_to_every_prompt() {
    let cli = Cli::try_parse_from(["aivis-cli", "analyze"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Analyze(AnalyzeArgs {
            prompt_id: None,
            dry_run: false
        }))
    ));
}

#[test]
fn analyze_single_prompt_dry_run() {
    let cli =
        Cli::try_parse_from(["aivis-cli", "analyze", "--prompt-id", "42", "--dry-run"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Analyze(AnalyzeArgs {
            prompt_id: Some(42),
            dry_run: true
        }))
    ));
}

#[test]
fn analyze_rejects_non_numeric_prompt_id() {
    assert!(Cli::try_parse_from(["aivis-cli", "analyze", "--prompt-id", "abc"]).is_err());
}

#[test]
fn citations_verify_default_limit() {
    let cli = Cli::try_parse_from(["aivis-cli", "citations", "verify"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Citations {
            command: CitationCommands::Verify {
                limit: 200,
                all: false,
                id: None
            }
        })
    ));
}

#[test]
fn citations_verify_all_or_one_row() {
    let cli = Cli::try_parse_from(["aivis-cli", "citations", "verify", "--all"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Citations {
            command: CitationCommands::Verify {
                all: true,
                id: None,
                ..
            }
        })
    ));

    let cli = Cli::try_parse_from(["aivis-cli", "citations", "verify", "--id", "5"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Citations {
            command: CitationCommands::Verify {
                all: false,
                id: Some(5),
                ..
            }
        })
    ));

    assert!(
        Cli::try_parse_from(["aivis-cli", "citations", "verify", "--all", "--id", "5"]).is_err()
    );
}

#[test]
fn citations_heatmap_with_filters() {
    let cli = Cli::try_parse_from([
        "aivis-cli",
        "citations",
        "heatmap",
        "--engine",
        "gpt-4o",
        "--top",
        "5",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Citations {
            command: CitationCommands::Heatmap {
                engine: Some(ref e),
                top: Some(5)
            }
        }) if e == "gpt-4o"
    ));
}

#[test]
fn citations_check_requires_url_and_claim() {
    assert!(Cli::try_parse_from(["aivis-cli", "citations", "check", "--url", "https://a.com"])
        .is_err());
    let cli = Cli::try_parse_from([
        "aivis-cli",
        "citations",
        "check",
        "--url",
        "https://a.com",
        "--claim",
        "A is fast",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Citations {
            command: CitationCommands::Check { content: None, .. }
        })
    ));
}

#[test]
fn trust_recompute_parses_date() {
    let cli =
        Cli::try_parse_from(["aivis-cli", "trust", "recompute", "--date", "2026-03-10"]).unwrap();
    let expected = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Trust {
            command: TrustCommands::Recompute { date: Some(d) }
        }) if d == expected
    ));
}

#[test]
fn trust_recompute_rejects_bad_date() {
    assert!(Cli::try_parse_from(["aivis-cli", "trust", "recompute", "--date", "03/10"]).is_err());
}

#[test]
fn trust_trends_window_is_validated_at_run_time() {
    assert_eq!(
        trust::parse_window(Some("30d")).unwrap(),
        Some(TrustWindow::Month)
    );
    assert_eq!(trust::parse_window(None).unwrap(), None);
    let err = trust::parse_window(Some("1y")).unwrap_err();
    assert!(err.to_string().contains("expected one of"));
}

#[test]
fn truncate_keeps_short_text() {
    assert_eq!(citations::truncate("acme.com", 31), "acme.com");
    assert_eq!(citations::truncate("abcdefghij", 8), "abcde...");
}
