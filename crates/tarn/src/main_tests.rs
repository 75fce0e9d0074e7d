use super::*;

fn args(parts: &[&str]) -> Vec<String> {
    std::iter::once("tarn")
        .chain(parts.iter().copied())
        .map(str::to_string)
        .collect()
}

#[test]
fn parse_check_without_flags() {
    let command = parse_cli(&args(&["check", "main.json"])).expect("cli parse should succeed");
    assert_eq!(
        command,
        Command::Check {
            input: PathBuf::from("main.json"),
            stats: false,
            trace: false,
        }
    );
}

#[test]
fn parse_check_flags_in_any_order() {
    let command = parse_cli(&args(&["check", "main.json", "--trace", "--stats"]))
        .expect("cli parse should succeed");
    assert_eq!(
        command,
        Command::Check {
            input: PathBuf::from("main.json"),
            stats: true,
            trace: true,
        }
    );
}

#[test]
fn parse_usr_command() {
    let command =
        parse_cli(&args(&["usr", "main.json", "move(dx:dy:)"])).expect("cli parse should succeed");
    assert_eq!(
        command,
        Command::Usr {
            input: PathBuf::from("main.json"),
            name: "move(dx:dy:)".to_string(),
        }
    );
}

#[test]
fn unknown_flag_is_rejected_with_usage() {
    let err = parse_cli(&args(&["check", "main.json", "--fast"])).unwrap_err();
    assert!(err.starts_with("unknown argument `--fast`\nusage:"), "{err}");
}

#[test]
fn usr_needs_a_name() {
    let err = parse_cli(&args(&["usr", "main.json"])).unwrap_err();
    assert!(err.starts_with("missing declaration name"), "{err}");
}

#[test]
fn missing_subcommand_prints_usage() {
    assert_eq!(parse_cli(&args(&[])).unwrap_err(), usage());
    assert_eq!(parse_cli(&args(&["build", "main.json"])).unwrap_err(), usage());
}

#[test]
fn stats_encode_as_json_object() {
    let module = tarn_ast::ModuleBuilder::new("main").finish().expect("empty module links");
    let result = tarn::check(module, &DriverOptions::default());
    let json = to_json(&result.stats).expect("stats should encode");
    assert!(json.starts_with('{'), "{json}");
    assert!(!result.has_errors());
}
