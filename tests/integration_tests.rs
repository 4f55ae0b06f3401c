//! Integration tests for the match-hall matchmaking engine
//!
//! These tests validate the system working together, including:
//! - Queueing, grouping and the full match lifecycle
//! - Rank brackets backed by a shared rank system
//! - State published into the external registry
//! - Collaborator failures and recovery
//! - The service tick driver

mod fixtures;

use fixtures::{participants, run_ticks, FailingRegistry, TestBed};
use match_hall::config::{AppConfig, MatchTypeSettings, MatchmakingConfig};
use match_hall::matchmaking::MatchmakingEngine;
use match_hall::service::AppState;
use match_hall::{matchmaking_error, MatchmakingError, Notice, ParticipantDirectory};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

#[test]
fn test_five_waiting_four_per_match() {
    let bed = TestBed::new();
    let mut engine = bed.engine("Table", 4, 2);
    let players = participants("p", 5);
    bed.join_all(&mut engine, &players);

    run_ticks(&mut engine, 1, 20);

    let matches: Vec<_> = engine.matches().collect();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].players().len(), 4);
    assert_eq!(engine.waiting_participants().len(), 1);

    let left_over = &engine.waiting_participants()[0];
    assert!(!matches[0].has_player(left_over));
    assert_eq!(bed.published(&format!("{}:waiting", left_over)), Some(1));

    println!("✅ Five waiting with four per match test passed");
}

#[test]
fn test_full_match_lifecycle_publishes_state() {
    let bed = TestBed::new();
    let mut engine = bed.engine("Duel", 2, 2);
    let players = participants("duelist", 2);
    bed.join_all(&mut engine, &players);

    assert_eq!(bed.published("duelist0:waiting"), Some(1));

    // Grouping and countdown start share tick 20
    run_ticks(&mut engine, 1, 20);
    let match_id = engine.matches().next().unwrap().id().to_string();
    assert_eq!(bed.published("isStartMatch"), Some(1));
    for player in &players {
        assert_eq!(bed.published(&format!("{}:waiting", player)), Some(0));
        assert_eq!(bed.published(&format!("{}:player", player)), Some(0));
        assert!(bed.published(&format!("{}:matchId", player)).is_some());
        assert!(bed.directory.notices_for(player).contains(&Notice::MatchFormed {
            title: "Duel".to_string(),
            match_id: match_id.clone(),
            roster: engine.matches().next().unwrap().players().to_vec(),
        }));
    }

    // 10 seconds at 20 ticks per second
    run_ticks(&mut engine, 21, 219);
    assert!(engine.get_match(&match_id).is_some());
    engine.tick(220);
    assert!(engine.get_match(&match_id).is_none());
    assert_eq!(engine.stats().matches_started, 1);
    for player in &players {
        assert_eq!(bed.published(&format!("{}:matchId", player)), None);
        let started = bed
            .directory
            .notices_for(player)
            .iter()
            .filter(|notice| matches!(notice, Notice::MatchStarted { .. }))
            .count();
        assert_eq!(started, 1);
    }

    // Cleanup 60 ticks after the end
    run_ticks(&mut engine, 221, 279);
    assert_eq!(bed.published("isStartMatch"), Some(1));
    engine.tick(280);
    assert_eq!(bed.published("isStartMatch"), Some(0));
    for player in &players {
        assert_eq!(bed.published(&format!("{}:player", player)), None);
    }

    println!("✅ Full match lifecycle test passed");
}

#[test]
fn test_players_can_requeue_after_match() {
    let bed = TestBed::new();
    let mut engine = bed.engine("Duel", 2, 2);
    let players = participants("again", 2);
    bed.join_all(&mut engine, &players);

    run_ticks(&mut engine, 1, 20);
    let err = engine.join("again0").unwrap_err();
    assert!(matches!(
        matchmaking_error(&err),
        Some(MatchmakingError::AlreadyInMatch { .. })
    ));

    run_ticks(&mut engine, 21, 220);
    engine.join("again0").unwrap();
    assert!(engine.is_waiting("again0"));
    assert_eq!(bed.published("again0:waiting"), Some(1));
}

#[test]
fn test_rank_brackets_keep_tiers_apart() {
    let bed = TestBed::new();
    let mut engine = bed.ranked_engine("Ranked Duel", 2, 2);

    for (player, score) in [("b1", 10), ("b2", 60), ("g1", 180), ("g2", 300)] {
        bed.score(player, score);
    }
    let queue: Vec<String> = ["b1", "g1", "b2", "g2"]
        .iter()
        .map(|p| p.to_string())
        .collect();
    bed.join_all(&mut engine, &queue);

    run_ticks(&mut engine, 1, 20);

    let mut formed: Vec<(String, Vec<String>)> = engine
        .matches()
        .map(|m| {
            let mut players = m.players().to_vec();
            players.sort();
            (m.rank_group().unwrap_or_default().to_string(), players)
        })
        .collect();
    formed.sort();

    assert_eq!(
        formed,
        vec![
            ("high".to_string(), vec!["g1".to_string(), "g2".to_string()]),
            ("low".to_string(), vec!["b1".to_string(), "b2".to_string()]),
        ]
    );
}

#[test]
fn test_unranked_participants_leave_the_queue() {
    let bed = TestBed::new();
    let mut engine = bed.ranked_engine("Ranked Duel", 2, 2);
    engine.remove_rank_group("high", None).unwrap();

    bed.score("veteran", 250);
    bed.score("rookie", 20);
    bed.join_all(&mut engine, &["veteran".to_string(), "rookie".to_string()]);

    run_ticks(&mut engine, 1, 20);

    assert!(!engine.is_waiting("veteran"));
    assert!(engine.match_of("veteran").is_none());
    assert_eq!(bed.published("veteran:waiting"), Some(0));
    assert!(engine.is_waiting("rookie"));
    assert_eq!(engine.stats().participants_dropped_unranked, 1);
}

#[test]
fn test_force_end_is_idempotent() {
    let bed = TestBed::new();
    let mut engine = bed.engine("Duel", 2, 2);
    bed.join_all(&mut engine, &participants("f", 2));
    bed.directory.connect("admin");

    run_ticks(&mut engine, 1, 25);
    let match_id = engine.matches().next().unwrap().id().to_string();

    engine.force_end(&match_id, Some("admin")).unwrap();
    let snapshot = bed.registry.snapshot();

    let err = engine.force_end(&match_id, Some("admin")).unwrap_err();
    assert_eq!(
        matchmaking_error(&err),
        Some(&MatchmakingError::MatchNotFound {
            match_id: match_id.clone()
        })
    );
    assert_eq!(bed.registry.snapshot(), snapshot);
    assert_eq!(
        bed.directory.notices_for("admin"),
        vec![
            Notice::MatchForceEnded {
                match_id: match_id.clone()
            },
            Notice::MatchNotFound { match_id },
        ]
    );
    assert_eq!(engine.stats().matches_force_ended, 1);
    assert_eq!(engine.stats().matches_started, 0);
}

#[test]
fn test_failing_registry_key_does_not_stop_matchmaking() {
    let registry = Arc::new(FailingRegistry::new(":matchId"));
    let bed = TestBed::new();
    let mut engine = MatchmakingEngine::new(
        "Duel",
        MatchmakingConfig::with_sizes(2, 2),
        None,
        registry.clone(),
        bed.directory.clone(),
    )
    .unwrap()
    .with_seed(3);

    for player in participants("r", 2) {
        bed.directory.connect(&player);
        engine.join(&player).unwrap();
    }
    run_ticks(&mut engine, 1, 220);

    assert_eq!(engine.stats().matches_started, 1);
    assert!(registry.failures() > 0);

    use match_hall::ExternalRegistry;
    assert_eq!(registry.get("r0:waiting").unwrap(), Some(0));
    assert_eq!(registry.get("r0:matchId").unwrap(), None);
}

#[test]
fn test_directory_outage_keeps_engine_state() {
    let bed = TestBed::new();
    let mut engine = bed.engine("Duel", 2, 2);
    bed.join_all(&mut engine, &participants("d", 2));

    bed.directory.set_available(false);
    run_ticks(&mut engine, 1, 20);
    assert_eq!(engine.matches().count(), 1);
    assert!(bed.directory.reachable().is_err());

    bed.directory.set_available(true);
    assert!(bed.directory.notices_for("d0").iter().all(|notice| !matches!(
        notice,
        Notice::MatchFormed { .. }
    )));
}

#[test]
fn test_rank_group_admin_round_trip() {
    let bed = TestBed::new();
    let mut engine = bed.ranked_engine("Ranked Duel", 2, 2);
    bed.directory.connect("admin");

    let err = engine
        .add_rank_group("low", "Bronze", "Gold", Some("admin"))
        .unwrap_err();
    assert!(matches!(
        matchmaking_error(&err),
        Some(MatchmakingError::ValidationError { .. })
    ));

    engine
        .set_rank_group("low", "Bronze", "Bronze", Some("admin"))
        .unwrap();
    let removed = engine.remove_rank_group("high", Some("admin")).unwrap();
    assert_eq!(removed.start_tier, "Silver");

    let groups = engine.list_rank_groups(Some("admin"));
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].end_tier, "Bronze");

    let notices = bed.directory.notices_for("admin");
    assert!(matches!(notices[0], Notice::RankGroupRejected { .. }));
    assert_eq!(
        notices.last(),
        Some(&Notice::RankGroupUpdated {
            title: "Ranked Duel".to_string(),
            detail: "Rank groups: low: Bronze - Bronze".to_string(),
        })
    );
}

#[test]
fn test_service_reconciles_external_score_edits() {
    let state = AppState::new(AppConfig::default()).unwrap();
    let ranked = state.rank_system("Ranked").unwrap();
    let directory = state.directory();

    directory.connect("alice");
    ranked.set_score("alice", 50);
    assert!(directory
        .labels("alice")
        .unwrap()
        .contains(&"ranked:Bronze".to_string()));

    // Another system edits the stored score directly
    use match_hall::ExternalRegistry;
    state.registry().set("ranked:alice", 150).unwrap();

    for _ in 0..20 {
        state.tick_once();
    }

    let labels = directory.labels("alice").unwrap();
    assert!(labels.contains(&"ranked:Silver".to_string()));
    assert!(!labels.contains(&"ranked:Bronze".to_string()));
    assert!(directory.notices_for("alice").contains(&Notice::TierChanged {
        title: "Ranked".to_string(),
        from: "Bronze".to_string(),
        to: "Silver".to_string(),
    }));
}

#[tokio::test]
async fn test_concurrent_joins_through_shared_engine() {
    let mut config = AppConfig::default();
    config.match_types.push(MatchTypeSettings {
        title: "Squad".to_string(),
        rank_system: None,
        matchmaking: MatchmakingConfig::with_sizes(4, 2),
        rank_groups: Vec::new(),
    });
    let state = Arc::new(AppState::new(config).unwrap());

    let mut handles = Vec::new();
    for i in 0..12 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            let engine = state.engine("Squad").unwrap();
            let participant = format!("squad{}", i);
            state.directory().connect(&participant);
            let joined = engine.lock().unwrap().join(&participant);
            joined
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for _ in 0..20 {
        state.tick_once();
    }

    let all_stats = state.engine_stats();
    let stats = &all_stats["Squad"];
    assert_eq!(stats.participants_queued, 12);
    assert_eq!(stats.matches_formed, 3);
    assert_eq!(stats.participants_waiting, 0);

    println!("✅ Concurrent joins test passed");
}

proptest! {
    #[test]
    fn prop_waiting_and_matches_stay_disjoint(count in 0usize..40, max in 1usize..6) {
        let bed = TestBed::new();
        let mut engine = bed.engine("Prop", max, 1);
        bed.join_all(&mut engine, &participants("x", count));

        run_ticks(&mut engine, 1, 20);

        prop_assert_eq!(engine.matches().count(), count / max);
        prop_assert_eq!(engine.waiting_participants().len(), count % max);

        let mut seen = HashSet::new();
        for m in engine.matches() {
            prop_assert_eq!(m.players().len(), max);
            for player in m.players() {
                prop_assert!(seen.insert(player.clone()));
                prop_assert!(!engine.is_waiting(player));
            }
        }
        for player in engine.waiting_participants() {
            prop_assert!(seen.insert(player));
        }
        prop_assert_eq!(seen.len(), count);
    }
}
