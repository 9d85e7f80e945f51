use registry_core::columns::{guess_key_column, guess_label_column};
use registry_core::table::merge_tables;
use registry_core::{normalize_token, KeyMapping, KeyOptions, MatchTier, MergeRequest, Table};

const SAMPLES: &[&str] = &[
    "0217x0054", "217x54", "AB1x99", "217:abc", "12x34x56", "ABC123", "   ", "1X2", "5:", "x12", "12x", "a:b:c", "7x8:9",
];

#[test]
fn test_documented_examples() {
    assert_eq!(normalize_token("0217x0054"), "0217x0054");
    assert_eq!(normalize_token("217x54"), "0217x0054");
    assert_eq!(normalize_token("217:abc"), "00217:abc");
    assert_eq!(normalize_token("12x34x56"), "0012x34x56");
    assert_eq!(normalize_token("   "), "");
    assert_eq!(normalize_token("ABC123"), "ABC123");
}

#[test]
fn test_letters_do_not_count_as_digits() {
    assert_eq!(normalize_token("AB1x99"), "000AB1x0099");
}

#[test]
fn test_normalization_is_idempotent() {
    for token in SAMPLES {
        let once = normalize_token(token);
        assert_eq!(normalize_token(&once), once, "token {token:?}");
    }

    let options = KeyOptions::default();
    for token in SAMPLES {
        let once = options.normalize_key(token);
        assert_eq!(options.normalize_key(&once), once, "key {token:?}");
    }
}

#[test]
fn test_mapping_keeps_first_label() {
    let options = KeyOptions::default();
    let mapping = KeyMapping::build(
        [(Some("217x54"), Some("Første")), (Some(" 0217X0054 "), Some("Anden"))],
        &options,
    );

    assert_eq!(mapping.len(), 1);
    assert_eq!(mapping.shadowed_full, 1);
    assert_eq!(mapping.resolve(Some("217x54"), &options).label.as_deref(), Some("Første"));
}

#[test]
fn test_punctuated_key_resolves_via_base_key() {
    let options = KeyOptions::default();
    let mapping = KeyMapping::build([(Some("AB-12"), Some("Maleri"))], &options);

    let result = mapping.resolve(Some("AB-12/b"), &options);
    assert_eq!(result.tier, MatchTier::BaseKey);
    assert_eq!(result.label.as_deref(), Some("Maleri"));

    let strict = KeyOptions {
        use_base_key_fallback: false,
        ..KeyOptions::default()
    };
    let mapping = KeyMapping::build([(Some("AB-12"), Some("Maleri"))], &strict);
    assert_eq!(mapping.resolve(Some("AB-12/b"), &strict).tier, MatchTier::Unresolved);
}

#[test]
fn test_batch_counts_add_up() {
    let options = KeyOptions::default();
    let mapping = KeyMapping::build(
        [(Some("217x54"), Some("Maleri")), (Some("318:2"), Some("Vase"))],
        &options,
    );

    let keys = [Some("217x54"), Some("318:2."), Some("999"), None, Some("  ")];
    let (results, stats) = mapping.resolve_all(keys, &options);

    assert_eq!(results.len(), 5);
    assert_eq!(stats.total, 5);
    assert_eq!(stats.matched, 2);
    assert_eq!(stats.unmatched, 3);
    assert_eq!(stats.exact + stats.fallback, stats.matched);
}

#[test]
fn test_column_guess() {
    let headers = ["ObjektNr", "Titel"];
    assert_eq!(guess_key_column(&headers), Some(0));
    assert_eq!(guess_label_column(&headers), Some(1));
}

#[test]
fn test_merge_applies_one_option_set_to_both_sides() {
    let source = Table::parse("ObjektNr;Titel\nab 12x5;Maleri\n".as_bytes()).unwrap();
    let target = Table::parse("Nummer\nAB  12X5\n".as_bytes()).unwrap();

    let outcome = merge_tables(&source, &target, &MergeRequest::default()).unwrap();
    assert_eq!(outcome.stats.exact, 1);

    let strict = MergeRequest {
        options: KeyOptions::strict(),
        ..MergeRequest::default()
    };
    let outcome = merge_tables(&source, &target, &strict).unwrap();
    assert_eq!(outcome.stats.unmatched, 1);
}
