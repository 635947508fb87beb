use std::collections::HashMap;

use super::*;

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    move |key| map.get(key).cloned()
}

#[test]
fn flags_override_environment() {
    let env = env_of(&[("SUPABASE_URL", "https://env.supabase.co"), ("SUPABASE_ANON_KEY", "env-key")]);
    let config = backend_config(Some("https://flag.supabase.co".to_owned()), None, env).unwrap();
    assert_eq!(config.url, "https://flag.supabase.co");
    assert_eq!(config.anon_key, "env-key");
}

#[test]
fn optional_settings_still_come_from_environment() {
    let env = env_of(&[("THREADLINE_POSTS_TABLE", "threads")]);
    let config =
        backend_config(Some("https://abc.supabase.co".to_owned()), Some("anon".to_owned()), env).unwrap();
    assert_eq!(config.posts_table, "threads");
}

#[test]
fn missing_key_is_a_config_error() {
    let err = backend_config(Some("https://abc.supabase.co".to_owned()), None, env_of(&[])).unwrap_err();
    assert_eq!(err, ConfigError::Missing { var: "SUPABASE_ANON_KEY" });
}

#[test]
fn credentials_require_both_halves() {
    let none = CredentialArgs::default();
    assert_eq!(none.resolve().unwrap(), None);

    let both = CredentialArgs { email: Some("a@b.com".to_owned()), password: Some("pw".to_owned()) };
    assert_eq!(
        both.resolve().unwrap(),
        Some(Credentials { email: "a@b.com".to_owned(), password: "pw".to_owned() })
    );

    let half = CredentialArgs { email: Some("a@b.com".to_owned()), password: None };
    assert!(matches!(half.resolve(), Err(CliError::MissingCredentials)));
}

#[test]
fn cli_parses_subcommands_with_global_credentials() {
    let cli = Cli::try_parse_from([
        "threadline",
        "--supabase-url",
        "https://abc.supabase.co",
        "--anon-key",
        "anon",
        "show",
        "--email",
        "a@b.com",
        "--password",
        "pw",
    ])
    .unwrap();
    assert!(matches!(cli.command, Command::Show));
    assert_eq!(cli.credentials.email.as_deref(), Some("a@b.com"));
}
