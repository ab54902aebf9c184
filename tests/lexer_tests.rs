use proptest::prelude::*;
use space_lua::{strip_comments, tokenize, TokenKind};

fn kinds(source: &str) -> Vec<TokenKind> {
    let mut tokens = tokenize(source).unwrap();
    assert_eq!(tokens.pop().map(|t| t.kind), Some(TokenKind::Eof));
    tokens.into_iter().map(|t| t.kind).collect()
}

#[test]
fn numeric_constants() {
    assert_eq!(kinds("3"), vec![TokenKind::Int(3)]);
    assert_eq!(kinds("345"), vec![TokenKind::Int(345)]);
    assert_eq!(kinds("0xff"), vec![TokenKind::Int(255)]);
    assert_eq!(kinds("0xBEBADA"), vec![TokenKind::Int(0xBEBADA)]);
    assert_eq!(kinds("3.0"), vec![TokenKind::Float(3.0)]);
    assert_eq!(kinds("3.1416"), vec![TokenKind::Float(3.1416)]);
    assert_eq!(kinds("314.16e-2"), vec![TokenKind::Float(3.1416)]);
    assert_eq!(kinds("0.31416E1"), vec![TokenKind::Float(3.1416)]);
    assert_eq!(kinds("34e1"), vec![TokenKind::Float(340.0)]);
    assert_eq!(kinds(".5"), vec![TokenKind::Float(0.5)]);
    assert_eq!(kinds("3."), vec![TokenKind::Float(3.0)]);
    // binary exponent forces the float subtype
    assert_eq!(kinds("0x10p2"), vec![TokenKind::Float(64.0)]);
    // decimal literals past i64 spill into floats
    assert_eq!(
        kinds("9223372036854775808"),
        vec![TokenKind::Float(9223372036854775808.0)]
    );
}

#[test]
fn string_escapes() {
    assert_eq!(
        kinds(r#""a\nb\tc""#),
        vec![TokenKind::Str("a\nb\tc".to_string())]
    );
    assert_eq!(
        kinds(r#""\x41\65""#),
        vec![TokenKind::Str("AA".to_string())]
    );
    assert_eq!(
        kinds(r#""\u{48}\u{49}""#),
        vec![TokenKind::Str("HI".to_string())]
    );
    assert_eq!(
        kinds("\"a\\z  \n  b\""),
        vec![TokenKind::Str("ab".to_string())]
    );
    assert_eq!(kinds(r#"'it''s'"#).len(), 2);
}

#[test]
fn nul_bytes_and_unicode_escapes_round_trip() {
    assert_eq!(
        kinds(r#""a\0b\u{1F600}""#),
        vec![TokenKind::Str("a\0b\u{1F600}".to_string())]
    );
}

#[test]
fn invalid_escape_is_an_error() {
    assert!(tokenize(r#""\q""#).is_err());
    assert!(tokenize(r#""\300""#).is_err());
    // a digit run past u32 must error, not wrap
    assert!(tokenize(r#""\u{fffffffffffffffff}""#).is_err());
    assert!(tokenize(r#""\u{110000}""#).is_err());
}

#[test]
fn long_strings() {
    assert_eq!(
        kinds("[[plain]]"),
        vec![TokenKind::LongStr("plain".to_string())]
    );
    // leading newline is dropped
    assert_eq!(
        kinds("[[\nfirst line]]"),
        vec![TokenKind::LongStr("first line".to_string())]
    );
    assert_eq!(
        kinds("[[\r\nfirst line]]"),
        vec![TokenKind::LongStr("first line".to_string())]
    );
    // a close bracket of the wrong level is content
    assert_eq!(
        kinds("[==[a]]b]==]"),
        vec![TokenKind::LongStr("a]]b".to_string())]
    );
    assert_eq!(
        kinds("[[hel]lo]]"),
        vec![TokenKind::LongStr("hel]lo".to_string())]
    );
}

#[test]
fn unterminated_constructs_error() {
    assert!(tokenize("\"abc").is_err());
    assert!(tokenize("[[abc").is_err());
    assert!(tokenize("--[[abc").is_err());
}

#[test]
fn comments_are_skipped() {
    assert_eq!(
        kinds("1 -- one\n+ --[[two]] 2"),
        vec![TokenKind::Int(1), TokenKind::Plus, TokenKind::Int(2)]
    );
}

#[test]
fn query_clause_words_are_plain_names() {
    // from/where/order/by/limit/select stay usable as identifiers
    let tokens = kinds("local select = where + limit");
    assert_eq!(tokens[0], TokenKind::Local);
    assert_eq!(tokens[1], TokenKind::Name("select".to_string()));
}

#[test]
fn strip_comments_blanks_comments_only() {
    let source = "local a = 1 -- trailing\nlocal b = \"-- not a comment\"\n--[[ block\nstill block ]] local c = 3\n";
    let stripped = strip_comments(source);
    assert_eq!(stripped.chars().count(), source.chars().count());
    assert!(!stripped.contains("trailing"));
    assert!(!stripped.contains("block"));
    assert!(stripped.contains("-- not a comment"));
    assert!(stripped.contains("local c = 3"));
    assert_eq!(
        stripped.matches('\n').count(),
        source.matches('\n').count()
    );
}

#[test]
fn strip_comments_leaves_long_strings_alone() {
    let source = "local s = [[ --inside ]] -- outside";
    let stripped = strip_comments(source);
    assert!(stripped.contains("--inside"));
    assert!(!stripped.contains("outside"));
}

proptest! {
    #[test]
    fn strip_comments_preserves_length_and_newlines(source in "[ -~\n]{0,200}") {
        let stripped = strip_comments(&source);
        prop_assert_eq!(stripped.chars().count(), source.chars().count());
        prop_assert_eq!(
            stripped.matches('\n').count(),
            source.matches('\n').count()
        );
    }
}
