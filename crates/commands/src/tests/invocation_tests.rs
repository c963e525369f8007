use super::*;
use crate::command::{CommandSettings, MemoryRegistry};

fn registry() -> MemoryRegistry {
    MemoryRegistry::new()
        .with(Command::new("config", Invocation::parse("config")).with_settings(
            CommandSettings {
                callable: false,
                ..CommandSettings::default()
            },
        ))
        .with(Command::new("config.set", Invocation::parse("config set")))
        .with(
            Command::new("config.reset", Invocation::parse("config reset"))
                .with_styles([InvocationStyle::Slash]),
        )
        .with(Command::new("ping", Invocation::parse("ping")))
}

#[test]
fn invocations_display_space_separated() {
    let invocation = Invocation::parse("  config   set ");
    assert_eq!(invocation.to_string(), "config set");
    assert_eq!(invocation.name(), Some("set"));
    assert_eq!(invocation.parent(), Some(Invocation::parse("config")));
    assert_eq!(Invocation::root().parent(), None);
}

#[test]
fn quoted_tokens_close_only_before_whitespace() {
    assert_eq!(
        split_all(r#"a "b c" 'd' "e"f" g"#),
        vec!["a", "b c", "d", r#"e"f"#, "g"]
    );
}

#[test]
fn unterminated_quote_takes_everything_verbatim() {
    assert_eq!(split_all(r#"a "b c"#), vec!["a", r#""b c"#]);
}

#[test]
fn stream_remainder_keeps_raw_spacing() {
    let mut stream = TokenStream::from_text("one  two   three");
    assert_eq!(stream.next_token().as_deref(), Some("one"));
    assert_eq!(stream.remainder(), "two   three");
    assert_eq!(stream.peek_many(5), vec!["two", "three"]);
    assert!(stream.has_remaining());
    stream.skip(5);
    assert!(!stream.has_remaining());
    assert_eq!(stream.remainder(), "");
}

#[test]
fn chain_matching_is_greedy_and_stops_at_first_unknown_token() {
    let registry = registry();
    let mut stream = TokenStream::from_text("config set volume 3");
    let matched = match_chain(&registry, InvocationStyle::Text, &mut stream);

    let ids: Vec<&str> = matched.chain.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, ["config", "config.set"]);
    assert_eq!(matched.invocation, Invocation::parse("config set"));
    assert_eq!(stream.remainder(), "volume 3");
}

#[test]
fn chain_matching_respects_invocation_style() {
    let registry = registry();
    let mut stream = TokenStream::from_text("config reset");
    let matched = match_chain(&registry, InvocationStyle::Text, &mut stream);
    assert_eq!(matched.command().map(|c| c.id.as_str()), Some("config"));
    assert_eq!(stream.remainder(), "reset");

    let mut stream = TokenStream::from_tokens(["config", "reset"]);
    let matched = match_chain(&registry, InvocationStyle::Slash, &mut stream);
    assert_eq!(matched.command().map(|c| c.id.as_str()), Some("config.reset"));
}

#[test]
fn unknown_first_token_matches_nothing() {
    let mut stream = TokenStream::from_text("nope ping");
    let matched = match_chain(&registry(), InvocationStyle::Text, &mut stream);
    assert!(matched.is_empty());
    assert_eq!(stream.remainder(), "nope ping");
}

#[test]
fn longest_alias_wins() {
    let aliases = AliasTable::from([("cs", "config set"), ("cs x", "ping")]);
    let mut stream = TokenStream::from_text("cs x tail");
    assert_eq!(aliases.apply(&mut stream), Some(Invocation::parse("cs x")));
    assert_eq!(stream.remainder(), "ping tail");
}

#[test]
fn aliasing_leaves_the_remainder_untouched() {
    let aliases = AliasTable::from([("cs", "config set")]);
    let registry = registry();

    let mut direct = TokenStream::from_text(r#"config set  "a  b"  c"#);
    let direct_match = match_chain(&registry, InvocationStyle::Text, &mut direct);

    let mut aliased = TokenStream::from_text(r#"cs  "a  b"  c"#);
    aliases.apply(&mut aliased);
    let aliased_match = match_chain(&registry, InvocationStyle::Text, &mut aliased);

    assert_eq!(direct_match.invocation, aliased_match.invocation);
    assert_eq!(direct.remainder(), aliased.remainder());
    assert_eq!(direct.drain_tokens(), aliased.drain_tokens());
}

#[test]
fn empty_alias_table_is_a_no_op() {
    let mut stream = TokenStream::from_text("ping");
    assert_eq!(AliasTable::new().apply(&mut stream), None);
    assert_eq!(stream.remainder(), "ping");
}
