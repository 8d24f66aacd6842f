//! End-to-end tests of the recommendation pipeline over in-memory stores.

mod helpers;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use karbin_core::{JobId, Recommendations, RecommenderConfig, UserPreferences, UserProfile};
use karbin_inference::mock::MockScorer;
use karbin_search::{IndexState, SnapshotBuilder};

use helpers::{job, open_prefs, World};

fn data_engineer() -> UserProfile {
    UserProfile::new(1)
        .with_title("Data Engineer")
        .with_skills(["python", "sql"])
}

fn ids(outcome: &Recommendations) -> Vec<JobId> {
    outcome.results().iter().map(|r| r.job_id).collect()
}

/// Five python/sql jobs at decreasing similarity plus noise the filters drop.
fn world() -> World {
    let mut stale = job(90, "Old Python", &["python"]);
    stale.posted_at = chrono::Utc::now() - chrono::Duration::days(60);
    let mut inactive = job(91, "Closed Python", &["python"]);
    inactive.is_active = false;

    World::new()
        .user(open_prefs(), data_engineer(), [1.0, 0.0, 0.0])
        .job(job(10, "Python Developer", &["Python"]), [1.0, 0.1, 0.0])
        .job(job(11, "SQL Analyst", &["sql"]), [1.0, 0.5, 0.0])
        .job(job(12, "ETL Engineer", &["python", "sql"]), [1.0, 1.0, 0.0])
        .job(job(13, "BI Developer", &["SQL", "Tableau"]), [0.2, 1.0, 0.0])
        .job(job(14, "Backend Developer", &["python", "django"]), [0.0, 0.0, 1.0])
        .job(job(20, "Java Developer", &["java"]), [1.0, 0.0, 0.0])
        .job(job(21, "Generalist", &[]), [1.0, 0.0, 0.0])
        .job(stale, [1.0, 0.0, 0.0])
        .job(inactive, [1.0, 0.0, 0.0])
}

#[tokio::test]
async fn test_skill_gate_scenario() {
    let engine = World::new()
        .user(open_prefs(), data_engineer(), [1.0, 0.0, 0.0])
        .job(job(1, "A", &["python"]), [1.0, 0.0, 0.0])
        .job(job(2, "B", &["java"]), [1.0, 0.0, 0.0])
        .job(job(3, "C", &[]), [1.0, 0.0, 0.0])
        .engine(RecommenderConfig::default())
        .await;

    let candidates = engine.get_candidate_ids(1).await.unwrap();
    assert_eq!(candidates, HashSet::from([1]));

    let outcome = engine.recommend(1, 10, 50, false).await.unwrap();
    assert_eq!(ids(&outcome), vec![1]);
}

#[tokio::test]
async fn test_results_ordered_and_drawn_from_candidates() {
    let engine = world().engine(RecommenderConfig::default()).await;

    let candidates = engine.get_candidate_ids(1).await.unwrap();
    let outcome = engine.recommend(1, 10, 50, false).await.unwrap();
    let results = outcome.results();

    assert_eq!(ids(&outcome), vec![10, 11, 12, 13, 14]);
    assert!(results.iter().all(|r| candidates.contains(&r.job_id)));
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
        if pair[0].score == pair[1].score {
            assert!(pair[0].job_id < pair[1].job_id);
        }
    }
}

#[tokio::test]
async fn test_recommend_is_deterministic() {
    let engine = world().engine(RecommenderConfig::default()).await;

    let first = engine.recommend(1, 10, 50, false).await.unwrap();
    let second = engine.recommend(1, 10, 50, false).await.unwrap();

    assert_eq!(ids(&first), ids(&second));
    for (a, b) in first.results().iter().zip(second.results()) {
        assert!((a.score - b.score).abs() < 1e-6);
    }
}

#[tokio::test]
async fn test_equal_scores_break_ties_by_job_id() {
    let engine = World::new()
        .user(open_prefs(), data_engineer(), [1.0, 0.0, 0.0])
        .job(job(7, "Python Dev", &["python"]), [0.0, 1.0, 0.0])
        .job(job(3, "Python Eng", &["python"]), [0.0, 1.0, 0.0])
        .job(job(5, "Python Lead", &["python"]), [0.0, 1.0, 0.0])
        .engine(RecommenderConfig::default())
        .await;

    let outcome = engine.recommend(1, 10, 50, false).await.unwrap();
    assert_eq!(ids(&outcome), vec![3, 5, 7]);
}

#[tokio::test]
async fn test_top_k_truncates() {
    let engine = world().engine(RecommenderConfig::default()).await;
    let outcome = engine.recommend(1, 2, 50, false).await.unwrap();
    assert_eq!(ids(&outcome), vec![10, 11]);
}

#[tokio::test]
async fn test_exclusive_preferences_hold_in_output() {
    let mut remote = job(30, "Remote Python", &["python"]);
    remote.is_remote = true;
    let mut senior = job(31, "Senior Python", &["python"]);
    senior.min_experience = Some(8);
    let mut shiraz = job(32, "Shiraz Python", &["python"]);
    shiraz.province = Some("Fars".to_string());
    let onsite = job(33, "Onsite Python", &["python"]);

    let prefs = UserPreferences {
        preferred_provinces: vec!["Tehran".to_string()],
        wants_onsite: true,
        experience_level: Some(3),
        ..Default::default()
    };
    let engine = World::new()
        .user(prefs, data_engineer(), [1.0, 0.0, 0.0])
        .job(remote, [1.0, 0.0, 0.0])
        .job(senior, [1.0, 0.0, 0.0])
        .job(shiraz, [1.0, 0.0, 0.0])
        .job(onsite, [0.5, 0.5, 0.0])
        .engine(RecommenderConfig::default())
        .await;

    let outcome = engine.recommend(1, 10, 50, false).await.unwrap();
    assert_eq!(ids(&outcome), vec![33]);
}

#[tokio::test]
async fn test_sparse_profile_is_incomplete_not_empty() {
    let engine = world()
        .user(open_prefs(), UserProfile::new(2), [0.0, 0.0, 0.0])
        .engine(RecommenderConfig::default())
        .await;

    assert!(engine.get_user_vector(2).await.unwrap().is_none());
    let outcome = engine.recommend(2, 10, 50, false).await.unwrap();
    assert!(outcome.is_incomplete_profile());
}

#[tokio::test]
async fn test_user_without_profile_row_gets_empty_results() {
    let engine = world()
        .user_without_row(UserProfile::new(3).with_skills(["python"]))
        .engine(RecommenderConfig::default())
        .await;

    assert!(engine.get_candidate_ids(3).await.unwrap().is_empty());
    let outcome = engine.recommend(3, 10, 50, false).await.unwrap();
    assert_eq!(outcome, Recommendations::Results(vec![]));
}

#[tokio::test]
async fn test_unavailable_index_fails_fast() {
    let world = world();
    let engine = world.engine_with_state(
        RecommenderConfig::default(),
        IndexState::Failed("checksum mismatch".to_string()),
    );

    assert!(!engine.is_available());
    let err = engine.recommend(1, 10, 50, false).await.unwrap_err();
    assert!(err.is_unavailable());

    // Filtering does not depend on the index.
    assert_eq!(engine.get_candidate_ids(1).await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_storage_failure_is_not_an_empty_result() {
    let engine = world()
        .failing_job_store()
        .engine_with_state(
            RecommenderConfig::default(),
            IndexState::Ready(Arc::new(
                karbin_search::IndexSnapshot::new("m", 3, vec![1], vec![1.0, 0.0, 0.0])
                    .unwrap()
                    .into_index()
                    .unwrap(),
            )),
        );

    assert!(engine.recommend(1, 10, 50, false).await.is_err());
}

#[tokio::test]
async fn test_unembedded_candidates_are_dropped() {
    let engine = world()
        .unindexed_job(job(15, "Fresh Python", &["python"]))
        .engine(RecommenderConfig::default())
        .await;

    assert!(engine.get_candidate_ids(1).await.unwrap().contains(&15));
    let outcome = engine.recommend(1, 10, 50, false).await.unwrap();
    assert!(!ids(&outcome).contains(&15));
    assert_eq!(outcome.results().len(), 5);
}

#[tokio::test]
async fn test_explanations_name_matched_skills() {
    let engine = world().engine(RecommenderConfig::default()).await;
    let outcome = engine.recommend(1, 10, 50, false).await.unwrap();
    let etl = outcome
        .results()
        .iter()
        .find(|r| r.job_id == 12)
        .unwrap();

    assert_eq!(etl.matched_skills, vec!["python", "sql"]);
    assert_eq!(etl.reason, "Matches skills: python, sql");
    assert_eq!(etl.location, "Tehran, Tehran");
    assert_eq!(etl.link.as_deref(), Some("https://jobs.example/12"));
    assert!(!etl.reranked);
}

#[tokio::test]
async fn test_reranker_reorders_shortlist() {
    let scorer = MockScorer::new()
        .with_default_score(0.0)
        .with_score("Backend Developer at Company 14. Skills: python, django", 5.0);
    let engine = world()
        .engine(RecommenderConfig::default())
        .await
        .with_scorer(Arc::new(scorer));

    let outcome = engine.recommend(1, 3, 50, true).await.unwrap();
    let results = outcome.results();

    assert_eq!(results[0].job_id, 14);
    assert!(results.iter().all(|r| r.reranked));
    assert_eq!(results.len(), 3);
}

#[tokio::test]
async fn test_rerank_failure_for_one_candidate_keeps_cheap_order() {
    let scorer = MockScorer::new()
        .with_score("Python Developer at Company 10. Skills: Python", 0.1)
        .failing_on("SQL Analyst at Company 11. Skills: sql")
        .with_score("ETL Engineer at Company 12. Skills: python, sql", 0.3)
        .with_score("BI Developer at Company 13. Skills: SQL, Tableau", 0.4)
        .with_score("Backend Developer at Company 14. Skills: python, django", 0.5);
    let engine = world()
        .engine(RecommenderConfig::default())
        .await
        .with_scorer(Arc::new(scorer));

    let cheap = engine.recommend(1, 3, 50, false).await.unwrap();
    let outcome = engine.recommend(1, 3, 50, true).await.unwrap();
    let results = outcome.results();

    assert_eq!(outcome, cheap);
    assert_eq!(ids(&outcome), vec![10, 11, 12]);
    assert!(results.iter().all(|r| !r.reranked));
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn test_reranked_scores_never_increase() {
    let scorer = MockScorer::new()
        .with_score("Python Developer at Company 10. Skills: Python", 0.1)
        .with_score("SQL Analyst at Company 11. Skills: sql", 0.2)
        .with_score("ETL Engineer at Company 12. Skills: python, sql", 0.3)
        .with_score("BI Developer at Company 13. Skills: SQL, Tableau", 0.4)
        .with_score("Backend Developer at Company 14. Skills: python, django", 0.5);
    let engine = world()
        .engine(RecommenderConfig::default())
        .await
        .with_scorer(Arc::new(scorer));

    let outcome = engine.recommend(1, 5, 50, true).await.unwrap();
    let results = outcome.results();

    assert_eq!(ids(&outcome), vec![14, 13, 12, 11, 10]);
    assert!(results.iter().all(|r| r.reranked));
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn test_job_missing_summary_is_replaced_by_next_candidate() {
    let engine = world()
        .job_without_summary(job(15, "Deleted Python", &["python"]), [1.0, 0.0, 0.0])
        .engine(RecommenderConfig::default())
        .await;

    assert!(engine.get_candidate_ids(1).await.unwrap().contains(&15));
    let outcome = engine.recommend(1, 3, 50, false).await.unwrap();
    assert_eq!(ids(&outcome), vec![10, 11, 12]);
}

#[tokio::test]
async fn test_job_missing_summary_is_skipped_before_rerank() {
    let scorer = MockScorer::new().with_default_score(0.5);
    let engine = world()
        .job_without_summary(job(15, "Deleted Python", &["python"]), [1.0, 0.0, 0.0])
        .engine(RecommenderConfig::default())
        .await
        .with_scorer(Arc::new(scorer.clone()));

    let outcome = engine.recommend(1, 3, 3, true).await.unwrap();

    assert_eq!(outcome.results().len(), 3);
    assert!(outcome.results().iter().all(|r| r.reranked));
    assert!(!ids(&outcome).contains(&15));
    // Query plus three documents, none of them the missing job.
    assert_eq!(scorer.calls()[0].input.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_rerank_timeout_falls_back_to_cheap_order() {
    let scorer = MockScorer::new()
        .with_delay(Duration::from_secs(30))
        .with_default_score(1.0);
    let config = RecommenderConfig {
        rerank_timeout_ms: 50,
        ..Default::default()
    };
    let engine = world()
        .engine(config)
        .await
        .with_scorer(Arc::new(scorer));

    let cheap = engine.recommend(1, 3, 50, false).await.unwrap();
    let reranked = engine.recommend(1, 3, 50, true).await.unwrap();

    assert_eq!(reranked, cheap);
    assert_eq!(ids(&reranked), vec![10, 11, 12]);
}

#[tokio::test]
async fn test_rerank_outage_falls_back_to_cheap_order() {
    let engine = world()
        .engine(RecommenderConfig::default())
        .await
        .with_scorer(Arc::new(MockScorer::new().with_call_failure()));

    let cheap = engine.recommend(1, 4, 50, false).await.unwrap();
    let reranked = engine.recommend(1, 4, 50, true).await.unwrap();
    assert_eq!(reranked, cheap);
}

#[tokio::test]
async fn test_rerank_requested_without_scorer_uses_cheap_path() {
    let engine = world().engine(RecommenderConfig::default()).await;
    assert!(!engine.has_reranker());

    let cheap = engine.recommend(1, 4, 50, false).await.unwrap();
    let requested = engine.recommend(1, 4, 50, true).await.unwrap();
    assert_eq!(requested, cheap);
}

#[tokio::test]
async fn test_zero_overlap_threshold_widens_pool() {
    let config = RecommenderConfig {
        min_skill_overlap: 0,
        ..Default::default()
    };
    let engine = world().engine(config).await;

    let candidates = engine.get_candidate_ids(1).await.unwrap();
    assert_eq!(candidates, HashSet::from([10, 11, 12, 13, 14, 20, 21]));
}

#[tokio::test]
async fn test_snapshot_file_round_trip_serves_same_results() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("job_index.json");

    let reference = world().engine(RecommenderConfig::default()).await;
    let expected = reference.recommend(1, 10, 50, false).await.unwrap();

    let w = world();
    let builder = SnapshotBuilder::new(reference.job_store().clone(), Arc::new(w.embedder()));
    let snapshot = builder.build_to(None, &path).await.unwrap();
    assert_eq!(snapshot.count, 8);

    let config = RecommenderConfig {
        snapshot_path: path,
        ..Default::default()
    };
    let engine = w.engine_with_state(config, IndexState::NotLoaded).with_snapshot();

    assert!(engine.is_available());
    assert_eq!(engine.recommend(1, 10, 50, false).await.unwrap(), expected);
}
