use super::*;

#[test]
fn parses_list_command() {
    let cli = Cli::try_parse_from(["petlead", "list"]).expect("expected valid cli args");

    assert!(matches!(cli.command, Commands::List));
    assert!(!cli.verbose);
}

#[test]
fn run_defaults_to_all_sites_with_delays() {
    let cli = Cli::try_parse_from(["petlead", "run"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Commands::Run {
            site: None,
            no_delay: false
        }
    ));
}

#[test]
fn run_single_site() {
    let cli = Cli::try_parse_from(["petlead", "run", "--site", "bozita"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Run { site: Some(ref s), .. } if s == "bozita"
    ));
}

#[test]
fn website_alias_and_short_flag_select_a_site() {
    let cli = Cli::try_parse_from(["petlead", "run", "--website", "mera"]).unwrap();
    assert!(matches!(cli.command, Commands::Run { site: Some(ref s), .. } if s == "mera"));

    let cli = Cli::try_parse_from(["petlead", "run", "-w", "josera"]).unwrap();
    assert!(matches!(cli.command, Commands::Run { site: Some(ref s), .. } if s == "josera"));
}

#[test]
fn run_no_delay() {
    let cli = Cli::try_parse_from(["petlead", "run", "--no-delay"]).unwrap();
    assert!(matches!(cli.command, Commands::Run { no_delay: true, .. }));
}

#[test]
fn global_flags_work_after_subcommand() {
    let cli = Cli::try_parse_from([
        "petlead",
        "run",
        "-v",
        "--config",
        "/etc/petlead/config.yaml",
    ])
    .unwrap();
    assert!(cli.verbose);
    assert_eq!(cli.config, PathBuf::from("/etc/petlead/config.yaml"));
}

#[test]
fn config_path_has_a_default() {
    if std::env::var_os("PETLEAD_CONFIG").is_some() {
        return;
    }
    let cli = Cli::try_parse_from(["petlead", "list"]).unwrap();
    assert_eq!(cli.config, PathBuf::from("config.yaml"));
}

#[test]
fn subcommand_is_required() {
    assert!(Cli::try_parse_from(["petlead"]).is_err());
}

#[test]
fn unknown_subcommand_is_rejected() {
    assert!(Cli::try_parse_from(["petlead", "scrape-everything"]).is_err());
}
