use lexstone::analysis::hash::SipHashGenerator;
use lexstone::analysis::tokenizer::SliceTokenizer;
use lexstone::{CancellationToken, IndexOptions, SearchEngine};
use tempfile::TempDir;

fn engine(dir: &TempDir) -> SearchEngine<u64> {
    SearchEngine::open(IndexOptions::new(dir.path().join("engine"))).unwrap()
}

fn sorted(mut records: Vec<u64>) -> Vec<u64> {
    records.sort_unstable();
    records
}

fn search(engine: &SearchEngine<u64>, query: &str) -> Vec<u64> {
    sorted(engine.search(query, 0, 0, &CancellationToken::new()).unwrap())
}

/// `{1: "fox", 2: "fox cow cat", 3: "fox cat cow"}` with facet
/// `(3, category, red)`.
fn farm(dir: &TempDir) -> SearchEngine<u64> {
    let engine = engine(dir);
    engine.add_record(1, "fox").unwrap();
    engine.add_record(2, "fox cow cat").unwrap();
    engine.add_record(3, "fox cat cow").unwrap();
    engine.add_facet(3, "category", "red").unwrap();
    engine
}

/// `{1: "cat dog fox", 2: "cat fox", 3: "dog fox", 4: "dog", 5: "fox",
/// 6: "cat"}`.
fn menagerie(dir: &TempDir) -> SearchEngine<u64> {
    let engine = engine(dir);
    engine.add_record(1, "cat dog fox").unwrap();
    engine.add_record(2, "cat fox").unwrap();
    engine.add_record(3, "dog fox").unwrap();
    engine.add_record(4, "dog").unwrap();
    engine.add_record(5, "fox").unwrap();
    engine.add_record(6, "cat").unwrap();
    engine
}

#[test]
fn disjunction_with_negated_facet() {
    let dir = TempDir::new().unwrap();
    let engine = farm(&dir);
    assert_eq!(search(&engine, "(cat OR cow) AND NOT category:tear"), vec![2, 3]);
}

#[test]
fn unordered_pair_minus_facet() {
    let dir = TempDir::new().unwrap();
    let engine = farm(&dir);
    assert_eq!(search(&engine, "cat cow AND NOT category:red"), vec![2]);
}

#[test]
fn phrase_minus_matching_facet_is_empty() {
    let dir = TempDir::new().unwrap();
    let engine = farm(&dir);
    assert_eq!(search(&engine, "'cat cow' AND NOT category:red"), Vec::<u64>::new());
}

#[test]
fn phrase_minus_absent_facet() {
    let dir = TempDir::new().unwrap();
    let engine = farm(&dir);
    assert_eq!(search(&engine, "'cat cow' AND NOT category:blue"), vec![3]);
}

#[test]
fn and_binds_tighter_than_or_end_to_end() {
    let dir = TempDir::new().unwrap();
    let engine = menagerie(&dir);
    assert_eq!(search(&engine, "cat AND dog OR fox"), vec![1, 2, 3, 5]);
}

#[test]
fn negated_group() {
    let dir = TempDir::new().unwrap();
    let engine = menagerie(&dir);
    assert_eq!(search(&engine, "(cat OR dog) AND NOT (fox OR dog)"), vec![6]);
}

#[test]
fn facet_in_list_selects_matching_records() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    engine.add_record(1, "paperback novel").unwrap();
    engine.add_record(2, "noise cancelling headphones").unwrap();
    engine.add_record(3, "wooden blocks").unwrap();
    engine.add_facet(1, "category", "books").unwrap();
    engine.add_facet(2, "category", "electronics").unwrap();
    engine.add_facet(3, "category", "toys").unwrap();

    assert_eq!(
        search(&engine, "category IN [\"books\", \"electronics\"]"),
        vec![1, 2]
    );
}

#[test]
fn unicode_with_min_token_length_one() {
    let dir = TempDir::new().unwrap();
    let engine: SearchEngine<u64> = SearchEngine::with_components(
        IndexOptions::new(dir.path().join("engine")),
        Box::new(SliceTokenizer::new(1, false).unwrap()),
        Box::new(SipHashGenerator::default()),
    )
    .unwrap();
    engine.add_record(1, "こんにちは 世界").unwrap();
    engine.add_record(3, "你好 世界").unwrap();

    assert_eq!(search(&engine, "世界"), vec![1, 3]);
    assert_eq!(search(&engine, "こんにちは"), vec![1]);

    let cancel = CancellationToken::new();
    assert_eq!(
        sorted(engine.simple_search("世界", &[], false, 0, 0, &cancel).unwrap()),
        vec![1, 3]
    );
}

#[test]
fn every_indexed_token_finds_its_record() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    engine.add_record(42, "quick brown foxes jump over lazy dogs").unwrap();

    let cancel = CancellationToken::new();
    for word in ["quick", "brown", "foxes", "jump", "over", "lazy", "dogs"] {
        let hits = engine.simple_search(word, &[], false, 0, 0, &cancel).unwrap();
        assert_eq!(hits, vec![42], "searching {:?}", word);
    }
}

#[test]
fn token_order_chains_through_prev() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    engine.add_record(7, "fox cow cat").unwrap();
    let cancel = CancellationToken::new();

    // The probed sequence may start anywhere, but each later token must
    // immediately follow the previous one.
    let ordered = |text: &str| {
        engine
            .simple_search(text, &[], true, 0, 0, &cancel)
            .unwrap()
    };
    assert_eq!(ordered("fox cow cat"), vec![7]);
    assert_eq!(ordered("cow cat"), vec![7]);
    assert_eq!(ordered("cat cow"), Vec::<u64>::new());
    assert_eq!(ordered("fox cat"), Vec::<u64>::new());

    // Unordered accepts any arrangement.
    assert_eq!(
        engine.simple_search("cat cow fox", &[], false, 0, 0, &cancel).unwrap(),
        vec![7]
    );
}

#[test]
fn facet_add_then_delete_restores_state() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    engine.add_record(1, "red bicycle").unwrap();
    let cancel = CancellationToken::new();
    let facets = [("color", "red")];

    let before = engine
        .simple_search("bicycle", &facets, false, 0, 0, &cancel)
        .unwrap();
    assert!(before.is_empty());

    engine.add_facet(1, "color", "red").unwrap();
    assert_eq!(
        engine.simple_search("bicycle", &facets, false, 0, 0, &cancel).unwrap(),
        vec![1]
    );

    engine.delete_facet(1, "color", "red").unwrap();
    assert!(engine
        .simple_search("bicycle", &facets, false, 0, 0, &cancel)
        .unwrap()
        .is_empty());
    // The record itself is untouched.
    assert_eq!(
        engine.simple_search("bicycle", &[], false, 0, 0, &cancel).unwrap(),
        vec![1]
    );
}

#[test]
fn facet_only_simple_search() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    engine.add_record(1, "first").unwrap();
    engine.add_record(2, "second").unwrap();
    engine.add_facet(1, "kind", "article").unwrap();
    engine.add_facet(2, "kind", "article").unwrap();

    let cancel = CancellationToken::new();
    let hits = engine
        .simple_search("", &[("kind", "article")], false, 0, 0, &cancel)
        .unwrap();
    assert_eq!(sorted(hits), vec![1, 2]);
}

#[test]
fn facet_word_does_not_match_plain_text() {
    // A facet value and a document word must not collide: facets are
    // self-referential triples, words are not.
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    engine.add_record(1, "red herring").unwrap();
    engine.add_facet(2, "color", "red").unwrap();

    let cancel = CancellationToken::new();
    let hits = engine
        .simple_search("", &[("color", "red")], false, 0, 0, &cancel)
        .unwrap();
    assert_eq!(hits, vec![2]);
}

#[test]
fn update_record_matches_delete_then_add() {
    let dir = TempDir::new().unwrap();
    let updated = engine(&dir);
    updated.add_record(1, "cat dog fox").unwrap();
    updated.update_record(1, "cat dog fox", "cat dog wolf").unwrap();

    let fresh_dir = TempDir::new().unwrap();
    let fresh = engine(&fresh_dir);
    fresh.add_record(1, "cat dog wolf").unwrap();

    for query in ["cat", "dog", "wolf", "fox", "'cat dog'", "'dog wolf'"] {
        assert_eq!(
            search(&updated, query),
            search(&fresh, query),
            "query {:?}",
            query
        );
    }
    assert!(search(&updated, "fox").is_empty());
}

#[test]
fn update_record_writes_only_the_difference() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    engine.add_record(1, "cat dog fox").unwrap();
    engine.evict_to_disk().unwrap();
    assert_eq!(engine.index().pending_writes(), 0);

    // Shared prefix "cat dog" is untouched: one tombstone for
    // (fox, prev=dog), one insert for (wolf, prev=dog).
    engine.update_record(1, "cat dog fox", "cat dog wolf").unwrap();
    assert_eq!(engine.index().pending_writes(), 2);
}

#[test]
fn delete_tokens_counts_targeted_triples() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    engine.add_record(1, "cat dog fox").unwrap();
    let removed = engine.delete_tokens(1, "cat dog fox").unwrap();
    assert_eq!(removed, 3);
    assert!(search(&engine, "cat").is_empty());
    assert!(search(&engine, "dog").is_empty());
}

#[test]
fn blank_search_text_is_a_graceful_empty() {
    let dir = TempDir::new().unwrap();
    let engine = farm(&dir);
    let cancel = CancellationToken::new();
    assert!(engine.search("", 0, 0, &cancel).unwrap().is_empty());
    assert!(engine.search("   ", 0, 0, &cancel).unwrap().is_empty());
    assert!(engine
        .simple_search("", &[], false, 0, 0, &cancel)
        .unwrap()
        .is_empty());
}

#[test]
fn malformed_query_is_rejected() {
    let dir = TempDir::new().unwrap();
    let engine = farm(&dir);
    let cancel = CancellationToken::new();
    let err = engine.search("cat )", 0, 0, &cancel).unwrap_err();
    assert_eq!(err.kind, lexstone::ErrorKind::UnexpectedToken);
}

#[test]
fn tolerated_query_edges_return_results() {
    let dir = TempDir::new().unwrap();
    let engine = farm(&dir);
    assert_eq!(search(&engine, "cat AND"), vec![2, 3]);
    assert_eq!(search(&engine, "(cat OR cow"), vec![2, 3]);
}

#[test]
fn pagination_skips_and_limits_deterministically() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    for record in 1..=5u64 {
        engine.add_record(record, "shared marker word").unwrap();
    }
    let cancel = CancellationToken::new();

    let all = engine.simple_search("marker", &[], false, 0, 0, &cancel).unwrap();
    assert_eq!(all, vec![1, 2, 3, 4, 5]);

    let page = engine.simple_search("marker", &[], false, 1, 2, &cancel).unwrap();
    assert_eq!(page, vec![2, 3]);

    let tail = engine.simple_search("marker", &[], false, 4, 0, &cancel).unwrap();
    assert_eq!(tail, vec![5]);

    // Advanced executor paginates the same way.
    assert_eq!(engine.search("marker", 1, 2, &cancel).unwrap(), vec![2, 3]);
}

#[test]
fn cancellation_returns_a_prefix() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    for record in 1..=20u64 {
        engine.add_record(record, "needle in the stack").unwrap();
    }

    let full = engine
        .simple_search("needle", &[], false, 0, 0, &CancellationToken::new())
        .unwrap();
    assert_eq!(full.len(), 20);

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let partial = engine
        .simple_search("needle", &[], false, 0, 0, &cancelled)
        .unwrap();
    assert_eq!(partial, full[..partial.len()].to_vec());

    let via_query = engine.search("needle", 0, 0, &cancelled).unwrap();
    assert_eq!(via_query, full[..via_query.len()].to_vec());
}

#[test]
fn pure_negation_falls_back_to_full_scan() {
    let dir = TempDir::new().unwrap();
    let engine = menagerie(&dir);
    assert_eq!(search(&engine, "NOT cat"), vec![3, 4, 5]);
    assert_eq!(search(&engine, "NOT (cat OR dog)"), vec![5]);
}

#[test]
fn survives_eviction_and_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine");
    {
        let engine: SearchEngine<u64> =
            SearchEngine::open(IndexOptions::new(&path)).unwrap();
        engine.add_record(1, "persistent fox").unwrap();
        engine.add_record(2, "persistent cow").unwrap();
        engine.add_facet(2, "kind", "bovine").unwrap();
        engine.evict_to_disk().unwrap();
        engine.try_cancel_background_threads();
        engine.wait_for_background_threads();
    }

    let engine: SearchEngine<u64> = SearchEngine::open(IndexOptions::new(&path)).unwrap();
    assert_eq!(search(&engine, "persistent"), vec![1, 2]);
    assert_eq!(search(&engine, "kind:bovine"), vec![2]);
}
