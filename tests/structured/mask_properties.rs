//! Properties every compiled mask must satisfy, checked over `JSON_VOCAB`.

use pie_json_pda::structured::compiled::{CompileConfig, CompiledJsonGrammar};
use pie_json_pda::structured::state::{JsonState, STRUCTURAL_RUNES};
use pie_json_pda::structured::validator::validate_token;

use crate::common::{BOS, EOS, JSON_VOCAB, compile, json_vocab, token_id};

#[test]
fn test_special_and_degenerate_tokens_never_masked() {
    let compiled = compile(&json_vocab());
    let excluded = [BOS, EOS, token_id(""), token_id("\"\"")];
    for mask in compiled.masks() {
        for id in excluded {
            assert!(!mask.contains(id), "{} admits excluded token {id}", mask.state());
            assert_eq!(mask.next_state(id), None);
        }
    }
}

#[test]
fn test_structural_runes_rejected_in_free_text() {
    let compiled = compile(&json_vocab());
    for state in [JsonState::InString, JsonState::InObjectKey] {
        for r in STRUCTURAL_RUNES {
            let id = token_id(&r.to_string());
            assert_eq!(
                compiled.next_state(state, id),
                None,
                "{state} admits structural {r:?}"
            );
        }
    }
}

#[test]
fn test_masks_are_deterministic() {
    let vocab = json_vocab();
    let first = compile(&vocab);
    let second = compile(&vocab);
    assert_eq!(first.masks(), second.masks());

    let single = CompiledJsonGrammar::new(
        &vocab,
        &CompileConfig {
            num_threads: Some(1),
            prefix_pruning: false,
        },
    )
    .unwrap();
    assert_eq!(first.masks(), single.masks());
}

#[test]
fn test_masks_are_sound() {
    let compiled = compile(&json_vocab());
    for mask in compiled.masks() {
        for (id, landing) in mask.iter() {
            let text = JSON_VOCAB[id as usize];
            assert_eq!(
                validate_token(compiled.graph(), mask.state(), text),
                Some(landing),
                "{} --{text:?}--> {landing} does not replay",
                mask.state()
            );
        }
    }
}

#[test]
fn test_masks_are_complete() {
    let compiled = compile(&json_vocab());
    for mask in compiled.masks() {
        // The first four entries are BOS, EOS, "" and the `""` literal.
        for (id, text) in JSON_VOCAB.iter().enumerate().skip(4) {
            let expected = validate_token(compiled.graph(), mask.state(), text);
            assert_eq!(
                mask.next_state(id as u32),
                expected,
                "{} disagrees with the validator on {text:?}",
                mask.state()
            );
        }
    }
}

#[test]
fn test_quote_opens_string_wherever_a_value_starts() {
    let compiled = compile(&json_vocab());
    let quote = token_id("\"");
    for state in [
        JsonState::InColon,
        JsonState::InSpace,
        JsonState::InList,
        JsonState::InListComma,
    ] {
        assert_eq!(
            compiled.next_state(state, quote),
            Some(JsonState::InString),
            "{state}"
        );
    }
}

#[test]
fn test_bitmask_agrees_with_token_table() {
    let compiled = compile(&json_vocab());
    for mask in compiled.masks() {
        let ids: Vec<u32> = mask.iter().map(|(id, _)| id).collect();
        let from_bits: Vec<u32> = (0..JSON_VOCAB.len() as u32)
            .filter(|&id| mask.bitmask().contains(id))
            .collect();
        assert_eq!(ids, from_bits, "{}", mask.state());
    }
}

#[test]
fn test_multi_structural_tokens() {
    let compiled = compile(&json_vocab());
    // '}' then ',' cross two different boundaries: fine.
    assert_eq!(
        compiled.next_state(JsonState::InNumber, token_id("},")),
        Some(JsonState::InComma)
    );
    // '}' twice in one token is refused.
    assert_eq!(compiled.next_state(JsonState::InStringEnd, token_id("}}")), None);
    // ']' is not structural, '}' only appears once.
    assert_eq!(
        compiled.next_state(JsonState::InNumber, token_id("]}")),
        Some(JsonState::InObjectEnd)
    );
}
