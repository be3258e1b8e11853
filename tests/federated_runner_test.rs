mod common;

use std::sync::Arc;

use common::{ranked, repeated_term_index};
use semsearch::index::memory::TOKEN_FIELD;
use semsearch::prelude::*;
use semsearch::runner::federated::split_federated_document_id;

fn ranking_engine(index: MemoryIndex) -> Result<(Arc<QueryEngine>, Arc<MemoryIndex>)> {
    let index = Arc::new(index);
    let engine = QueryEngine::builder(index.clone())
        .scorer_source(HitCountScorer::source())
        .build()?;
    Ok((engine, index))
}

fn two_engines() -> Result<FederatedEngine> {
    let (first, _) = ranking_engine(repeated_term_index("fox", &[2, 0, 1]))?;
    let (second, _) = ranking_engine(repeated_term_index("fox", &[1, 3]))?;
    FederatedEngine::new(vec![first, second])
}

fn fox_query() -> Result<Arc<TokenQuery>> {
    Ok(Arc::new(TokenQuery::new("fox")))
}

#[test]
fn test_federated_ranks_merge_by_score() -> Result<()> {
    let federated = two_engines()?;
    let runner = federated.query_runner(fox_query()?)?;

    assert_eq!(runner.runner_count(), 2);
    assert_eq!(runner.documents_count_sync()?, 4);
    assert_eq!(runner.documents_count()?, 4);

    // the two 1.0 heads tie; the runner after the previous winner goes first
    assert_eq!(ranked(&runner), vec![(3, 3.0), (0, 2.0), (1, 1.0), (4, 1.0)]);
    assert_eq!(split_federated_document_id(3, 2), (1, 1));
    assert_eq!(runner.document_uri(0)?, "mem://doc/1");
    assert_eq!(runner.document_uri(1)?, "mem://doc/0");
    Ok(())
}

#[test]
fn test_federated_hits_carry_federated_ids() -> Result<()> {
    let federated = two_engines()?;
    let runner = federated.query_runner(fox_query()?)?;
    runner.documents_count_sync()?;

    let hits = runner.document_hits(0)?;
    assert_eq!(hits.len(), 3);
    assert!(hits.iter().all(|hit| hit.document_id == 3));

    let hits = runner.document_hits(3)?;
    assert_eq!(hits, vec![Binding::new(4, 0, 1)]);
    Ok(())
}

#[test]
fn test_federated_out_of_bounds_and_empty_sub_index() -> Result<()> {
    let (first, _) = ranking_engine(repeated_term_index("fox", &[1, 1]))?;
    let (empty, _) = ranking_engine(repeated_term_index("fox", &[0, 0, 0]))?;
    let federated = FederatedEngine::new(vec![empty, first])?;
    let runner = federated.query_runner(fox_query()?)?;

    assert_eq!(runner.documents_count_sync()?, 2);
    let ids = ranked(&runner).into_iter().map(|d| d.0).collect::<Vec<_>>();
    // sub-runner 1 of 2: federated ID is 2 * sub ID + 1, ties by ID desc
    assert_eq!(ids, vec![3, 1]);
    assert!(runner.document_id(2).unwrap_err().is_out_of_bounds());
    assert!(runner.document_id(-1).unwrap_err().is_out_of_bounds());
    Ok(())
}

#[test]
fn test_federated_close_closes_sub_runners() -> Result<()> {
    let federated = two_engines()?;
    let runner = federated.query_runner(fox_query()?)?;
    assert!(federated.engines().iter().all(|e| e.active_runners() == 1));

    runner.close()?;
    runner.close()?;
    assert!(runner.is_closed());
    assert!(runner.runners().iter().all(|r| r.is_closed()));
    assert!(federated.engines().iter().all(|e| e.active_runners() == 0));
    assert!(runner.document_id(0).unwrap_err().is_closed());
    Ok(())
}

#[test]
fn test_federated_engine_close() -> Result<()> {
    let federated = two_engines()?;
    let runner = federated.query_runner(fox_query()?)?;

    federated.close();
    assert!(federated.engines().iter().all(|e| e.is_closed()));
    assert!(runner.runners().iter().all(|r| r.is_closed()));
    assert!(federated.query_runner(fox_query()?).unwrap_err().is_closed());
    Ok(())
}

#[test]
fn test_federated_engine_requires_engines() {
    assert!(FederatedEngine::new(Vec::new()).is_err());
}

#[test]
fn test_federated_terms_merge_by_term_string() -> Result<()> {
    let federated = two_engines()?;
    let query = IndexTermsQuery::new(TOKEN_FIELD).with_counts(true);

    let result = federated.execute_terms(&query)?;
    assert_eq!(result.term_strings, vec!["filler", "fox", "text"]);
    assert_eq!(result.term_counts, Some(vec![5, 4, 5]));
    Ok(())
}

#[test]
fn test_federated_terms_group_by_description() -> Result<()> {
    let mut first = MemoryIndex::new();
    first.add_term_entries("entity", vec![TermEntry::new("Q64", 3).with_description("Berlin")]);
    let mut second = MemoryIndex::new();
    second.add_term_entries(
        "entity",
        vec![
            TermEntry::new("b:berlin", 4).with_description("Berlin"),
            TermEntry::new("b:rome", 1).with_description("Rome"),
        ],
    );
    let federated = FederatedEngine::new(vec![
        QueryEngine::new(Arc::new(first), EngineConfig::default())?,
        QueryEngine::new(Arc::new(second), EngineConfig::default())?,
    ])?;

    let query = IndexTermsQuery::new("entity")
        .with_counts(true)
        .with_descriptions(true);
    let result = federated.execute_terms(&query)?;

    assert_eq!(result.term_strings, vec!["Berlin", "Rome"]);
    assert_eq!(result.term_counts, Some(vec![7, 1]));
    let originals = result.original_term_strings.unwrap();
    assert_eq!(originals[0], vec![vec!["Q64".to_string()], vec!["b:berlin".to_string()]]);
    assert_eq!(originals[1], vec![Vec::<String>::new(), vec!["b:rome".to_string()]]);
    Ok(())
}
