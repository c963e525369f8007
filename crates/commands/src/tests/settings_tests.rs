use super::*;
use crate::invocation::TokenStream;

#[test]
fn defaults_match_documented_values() {
    let settings = ExecutorSettings::default();
    assert_eq!(settings.prefix, "!");
    assert_eq!(settings.retry.max_attempts, 100);
    assert_eq!(settings.retry.min_backoff(), Duration::from_secs(1));
    assert_eq!(settings.retry.max_backoff(), Duration::from_secs(3600));
    assert!(!settings.requires_full_match(InvocationStyle::Text));
    assert!(settings.requires_full_match(InvocationStyle::Slash));
    assert_eq!(settings.on_match_violation, MatchViolationPolicy::DropEvent);
}

#[test]
fn partial_toml_keeps_defaults_for_the_rest() {
    let settings: ExecutorSettings = toml::from_str(
        r#"
        prefix = "?"
        on_match_violation = "halt_pipeline"

        [retry]
        max_attempts = 5

        [guild_prefixes]
        "42" = "$"

        [aliases]
        "cs" = "config set"
        "#,
    )
    .expect("valid settings");

    assert_eq!(settings.prefix_for(None), "?");
    assert_eq!(settings.prefix_for(Some(GuildId(42))), "$");
    assert_eq!(settings.prefix_for(Some(GuildId(7))), "?");
    assert_eq!(settings.on_match_violation, MatchViolationPolicy::HaltPipeline);
    assert_eq!(settings.retry.max_attempts, 5);
    assert_eq!(settings.retry.min_backoff_secs, 1);
    assert!(settings.full_match.slash);

    let mut stream = TokenStream::from_text("cs volume");
    assert_eq!(
        settings.alias_table().apply(&mut stream),
        Some(Invocation::parse("cs"))
    );
    assert_eq!(stream.remainder(), "config set volume");
}

#[test]
fn max_backoff_never_undercuts_min_backoff() {
    let retry = RetrySettings {
        max_attempts: 1,
        min_backoff_secs: 10,
        max_backoff_secs: 2,
    };
    assert_eq!(retry.max_backoff(), Duration::from_secs(10));
}

#[test]
fn blank_aliases_are_skipped() {
    let settings = ExecutorSettings {
        aliases: HashMap::from([
            (" ".to_string(), "ping".to_string()),
            ("p".to_string(), "".to_string()),
        ]),
        ..ExecutorSettings::default()
    };
    assert!(settings.alias_table().is_empty());
}
