//! End-to-end walks through the automaton and the matcher.

use std::sync::Arc;

use pie_json_pda::structured::bitmask::{self, apply_token_bitmask_inplace};
use pie_json_pda::structured::graph::PdaGraph;
use pie_json_pda::structured::matcher::JsonMatcher;
use pie_json_pda::structured::state::JsonState;
use pie_json_pda::structured::tokenizer::TokenizerInfo;
use pie_json_pda::structured::validator::{ConsumedRunes, advance_rune, validate_token};

use crate::common::{JSON_VOCAB, compile, json_vocab, token_id};

/// Feed `text` one rune at a time, each rune its own token.
fn walk_runes(graph: &PdaGraph, text: &str) -> Result<JsonState, (usize, char, JsonState)> {
    let mut state = graph.start();
    for (i, r) in text.chars().enumerate() {
        let mut consumed = ConsumedRunes::new();
        state = advance_rune(graph, state, r, &mut consumed).ok_or((i, r, state))?;
    }
    Ok(state)
}

#[test]
fn test_round_trip_object_with_list() {
    let graph = PdaGraph::build().unwrap();
    assert_eq!(
        walk_runes(&graph, r#"{"a": 1, "b": [1,2]}"#),
        Ok(JsonState::InObjectEnd)
    );
}

#[test]
fn test_list_elements_after_comma_and_space() {
    let graph = PdaGraph::build().unwrap();
    assert_eq!(
        walk_runes(&graph, r#"{"a": [1, 2, true, null]}"#),
        Ok(JsonState::InObjectEnd)
    );
}

#[test]
fn test_round_trip_through_single_rune_masks() {
    let vocab = TokenizerInfo::from_raw(&[
        "{", "}", "[", "]", ":", ",", "\"", " ", "a", "b", "1", "2",
    ]);
    let compiled = Arc::new(compile(&vocab));
    let mut m = JsonMatcher::new(compiled, 0);
    let text = r#"{"a": 1, "b": [1,2]}"#;
    for r in text.chars() {
        let id = vocab
            .decoded_vocab()
            .iter()
            .position(|t| t.chars().eq(std::iter::once(r)))
            .unwrap() as u32;
        assert!(m.accept_token(id), "rejected {r:?} in {}", m.current_state());
    }
    assert_eq!(m.current_state(), JsonState::InObjectEnd);
}

#[test]
fn test_string_self_loop() {
    let graph = PdaGraph::build().unwrap();
    assert_eq!(validate_token(&graph, JsonState::InString, "a"), Some(JsonState::InString));
    assert_eq!(
        validate_token(&graph, JsonState::InString, "\""),
        Some(JsonState::InStringEnd)
    );
}

#[test]
fn test_brace_rejected_in_key() {
    let compiled = compile(&json_vocab());
    assert_eq!(
        compiled.next_state(JsonState::InObjectKey, token_id("{")),
        None
    );
}

#[test]
fn test_skip_ahead_tokens() {
    let vocab = json_vocab();
    let compiled = Arc::new(compile(&vocab));
    let mut m = JsonMatcher::new(compiled, 16);

    // {"name": "a", "key": [1,2]}
    for text in ["{\"", "name", "\": ", "\"a\",", " \"", "key", "\": ", "[1", ",", "2", "]}"] {
        assert!(
            m.accept_token(token_id(text)),
            "rejected {text:?} in {}",
            m.current_state()
        );
    }
    assert_eq!(m.current_state(), JsonState::InObjectEnd);
}

#[test]
fn test_whitespace_variants() {
    let graph = PdaGraph::build().unwrap();
    assert_eq!(
        walk_runes(&graph, "{\n\t\"k\":true\n}"),
        Ok(JsonState::InObjectEnd)
    );
    assert_eq!(walk_runes(&graph, "{ \"k\":null}"), Ok(JsonState::InObjectEnd));
    // Two spaces after a colon is one too many.
    assert!(walk_runes(&graph, "{\"k\":  1}").is_err());
}

#[test]
fn test_escapes_are_not_modeled() {
    let graph = PdaGraph::build().unwrap();
    assert_eq!(validate_token(&graph, JsonState::InString, "\\\""), None);
    assert_eq!(validate_token(&graph, JsonState::InString, "a/b"), None);
}

#[test]
fn test_sampler_loop_with_logits() {
    let vocab = json_vocab();
    let compiled = Arc::new(compile(&vocab));
    let m = JsonMatcher::new(compiled.clone(), 0);

    let mut bm = vec![0u32; bitmask::bitmask_size(JSON_VOCAB.len())];
    m.fill_next_token_bitmask(&mut bm);
    let mut logits = vec![0.0f32; JSON_VOCAB.len()];
    apply_token_bitmask_inplace(&mut logits, &bm);

    let allowed: Vec<&str> = logits
        .iter()
        .enumerate()
        .filter(|(_, l)| l.is_finite())
        .map(|(i, _)| JSON_VOCAB[i])
        .collect();
    assert_eq!(allowed, vec!["{", "[", "{\"", "[1", "[]"]);
    assert_eq!(compiled.mask(JsonState::Start).len(), allowed.len());
}
