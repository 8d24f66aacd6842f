//! Evaluation harness over an in-memory world.

mod helpers;

use std::sync::Arc;

use karbin_core::{RecommenderConfig, UserProfile};
use karbin_inference::mock::MockScorer;
use karbin_search::{EvaluationConfig, EvaluationHarness, IndexState, Variant};

use helpers::{job, open_prefs, World};

fn world() -> World {
    World::new()
        .user(
            open_prefs(),
            UserProfile::new(1).with_skills(["python"]),
            [1.0, 0.0, 0.0],
        )
        .user(
            open_prefs(),
            UserProfile::new(5).with_skills(["sql"]),
            [0.0, 1.0, 0.0],
        )
        .user(open_prefs(), UserProfile::new(10), [0.0, 0.0, 0.0])
        .job(job(100, "Python Dev", &["python"]), [1.0, 0.0, 0.0])
        .job(job(101, "Python Lead", &["python", "sql"]), [1.0, 0.0, 0.0])
        .job(job(102, "Analyst", &["sql"]), [0.0, 1.0, 0.0])
}

fn config() -> EvaluationConfig {
    EvaluationConfig {
        personas: vec![1, 5, 10],
        evaluate_k: 2,
        display_k: 1,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_baseline_reports_per_persona() {
    let engine = world().engine(RecommenderConfig::default()).await;
    let summary = EvaluationHarness::new(&engine, config()).run().await.unwrap();

    assert_eq!(summary.reports.len(), 3);
    assert_eq!(summary.variants.len(), 1);
    assert_eq!(summary.variants[0].variant, Variant::Baseline);
    assert_eq!(summary.variants[0].personas, 2);

    let python = &summary.reports[0];
    let metrics = python.metrics.as_ref().unwrap();
    assert_eq!(python.result_count, 2);
    assert_eq!(python.ground_truth_size, 2);
    assert_eq!(python.top.len(), 1);
    assert_eq!(metrics.precision, 1.0);
    assert_eq!(metrics.recall, Some(1.0));
    // Both python jobs share one vector.
    assert!(metrics.diversity.abs() < 1e-6);
    // Every result matched a skill.
    assert_eq!(metrics.serendipity, 0.0);

    let incomplete = &summary.reports[2];
    assert!(incomplete.incomplete_profile);
    assert!(incomplete.metrics.is_none());
}

#[tokio::test]
async fn test_novelty_reflects_popularity() {
    let engine = world().engine(RecommenderConfig::default()).await;
    let summary = EvaluationHarness::new(&engine, config()).run().await.unwrap();

    // Job 101 is shared by both skilled users (most popular), 100 and 102 by one.
    let sql = &summary.reports[1];
    assert_eq!(sql.result_count, 2);
    let novelty = sql.metrics.as_ref().unwrap().novelty;
    assert!((novelty - 0.5).abs() < 1e-9, "novelty = {novelty}");
}

#[tokio::test]
async fn test_reranked_variant_runs_when_scorer_attached() {
    let engine = world()
        .engine(RecommenderConfig::default())
        .await
        .with_scorer(Arc::new(MockScorer::new().with_default_score(0.9)));
    let summary = EvaluationHarness::new(&engine, config()).run().await.unwrap();

    assert_eq!(summary.reports.len(), 6);
    let variants: Vec<Variant> = summary.variants.iter().map(|v| v.variant).collect();
    assert_eq!(variants, vec![Variant::Baseline, Variant::Reranked]);
    assert!(summary
        .reports
        .iter()
        .filter(|r| r.variant == Variant::Reranked && !r.incomplete_profile)
        .all(|r| r.top.iter().all(|t| t.reranked)));
}

#[tokio::test]
async fn test_persona_without_matches_gets_no_metrics() {
    let engine = world()
        .user(
            open_prefs(),
            UserProfile::new(7).with_skills(["cobol"]),
            [0.0, 0.0, 1.0],
        )
        .engine(RecommenderConfig::default())
        .await;
    let summary = EvaluationHarness::new(
        &engine,
        EvaluationConfig {
            personas: vec![1, 7],
            ..config()
        },
    )
    .run()
    .await
    .unwrap();

    let cobol = &summary.reports[1];
    assert_eq!(cobol.user_id, 7);
    assert!(!cobol.incomplete_profile);
    assert_eq!(cobol.result_count, 0);
    assert!(cobol.metrics.is_none());
    assert!(cobol.error.is_none());

    let baseline = &summary.variants[0];
    assert_eq!(baseline.personas, 1);
    // Only the python persona's identical pair counts.
    assert!(baseline.diversity.abs() < 1e-6);
}

#[tokio::test]
async fn test_failing_persona_is_reported_and_run_continues() {
    let broken = UserProfile::new(5).with_skills(["sql"]);
    let engine = world()
        .failing_profile(&broken)
        .engine(RecommenderConfig::default())
        .await;
    let summary = EvaluationHarness::new(&engine, config()).run().await.unwrap();

    assert_eq!(summary.reports.len(), 3);
    let failed = &summary.reports[1];
    assert_eq!(failed.user_id, 5);
    assert!(failed.metrics.is_none());
    assert!(failed.error.as_deref().unwrap().contains("embedding"));

    assert!(summary.reports[0].metrics.is_some());
    assert_eq!(summary.variants[0].personas, 1);
}

#[tokio::test]
async fn test_unavailable_index_fails_evaluation() {
    let engine = world().engine_with_state(RecommenderConfig::default(), IndexState::NotLoaded);
    let err = EvaluationHarness::new(&engine, config())
        .run()
        .await
        .unwrap_err();
    assert!(err.is_unavailable());
}
