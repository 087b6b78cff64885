use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

use supporter_alloc::allocation::planner::{NO_SUPPORTERS, REACH_SHORTFALL, SPLIT_CAMPAIGN};
use supporter_alloc::user::{generate_synthetic_pool, generate_synthetic_targets};
use supporter_alloc::{
    AllocationStrategy, CreditCostRule, EngineConfig, GenreProfile, GreedyBlendedScore,
    ReachModel, Supporter, SupporterPool, SupporterStatus, Target,
};

fn house() -> GenreProfile {
    GenreProfile::family("house")
}

fn queue_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 17).unwrap()
}

#[test]
fn single_large_supporter_covers_target() {
    let target = Target::new("t1", "owner", house(), 5_000);
    let pool = SupporterPool::new(vec![Supporter::new("s1", 200_000, house(), 10)]);

    let proposal = GreedyBlendedScore::default().plan(&target, &pool);

    assert_eq!(proposal.entries.len(), 1);
    assert_eq!(proposal.entries[0].supporter_id, "s1");
    assert_eq!(proposal.total_reach, 12_000);
    assert_eq!(proposal.total_credits, 1);
    assert!((proposal.entries[0].compatibility_score - 1.0).abs() < 1e-6);
    assert!(proposal.conflicts.is_empty());
    assert!(proposal.recommendations.is_empty());
}

#[test]
fn owner_is_never_selected() {
    let target = Target::new("t1", "owner", house(), 50_000);
    let pool = SupporterPool::new(vec![
        Supporter::new("owner", 1_000_000, house(), 500),
        Supporter::new("s1", 1_000, house(), 5),
    ]);
    let strategy = GreedyBlendedScore::default();

    let proposal = strategy.plan(&target, &pool);
    assert_eq!(proposal.supporter_ids().collect::<Vec<_>>(), vec!["s1"]);
    assert!(proposal.conflicts.iter().all(|conflict| !conflict.contains("owner")));

    let assignments = strategy.allocate_day(queue_date(), &[target], &pool);
    assert!(assignments.iter().all(|a| a.supporter_id != "owner"));
}

#[test]
fn plan_stops_at_supporter_cap() {
    let supporters: Vec<Supporter> = (0..60)
        .map(|idx| Supporter::new(&format!("s{:02}", idx), 1_000, house(), 5))
        .collect();
    let pool = SupporterPool::new(supporters);
    let target = Target::new("t1", "owner", house(), 10_000_000);

    let proposal = GreedyBlendedScore::default().plan(&target, &pool);

    assert_eq!(proposal.entries.len(), 50);
    assert_eq!(proposal.total_reach, 50 * 60);
    assert!(proposal.has_recommendation(SPLIT_CAMPAIGN));
    assert!(proposal.has_recommendation(REACH_SHORTFALL));
}

#[test]
fn zero_credit_and_inactive_supporters_become_conflicts() {
    let mut paused = Supporter::new("paused", 50_000, house(), 20);
    paused.status = SupporterStatus::Inactive;
    let pool = SupporterPool::new(vec![
        Supporter::new("broke", 90_000, house(), 0),
        paused,
        Supporter::new("ok", 10_000, house(), 3),
    ]);
    let target = Target::new("t1", "owner", house(), 100);

    let proposal = GreedyBlendedScore::default().plan(&target, &pool);

    assert_eq!(proposal.supporter_ids().collect::<Vec<_>>(), vec!["ok"]);
    assert_eq!(proposal.conflicts.len(), 2);
    assert!(proposal.conflicts.iter().any(|c| c.contains("broke")));
    assert!(proposal.conflicts.iter().any(|c| c.contains("paused")));
}

#[test]
fn empty_pool_recommends_nothing_available() {
    let target = Target::new("t1", "owner", house(), 1_000);
    let proposal = GreedyBlendedScore::default().plan(&target, &SupporterPool::default());

    assert!(proposal.is_empty());
    assert_eq!(proposal.total_reach, 0);
    assert!(proposal.has_recommendation(NO_SUPPORTERS));
}

#[test]
fn configured_adjacency_drives_compatibility() {
    let config = EngineConfig::from_toml(
        r#"
[adjacency.house]
techno = 0.5

[adjacency.techno]
house = 0.5
"#,
    )
    .unwrap();
    let strategy = GreedyBlendedScore::from_config(&config);
    let target = Target::new("t1", "owner", house(), 1_000);
    let techno = GenreProfile::family("techno");
    let pool = SupporterPool::new(vec![Supporter::new("s1", 100_000, techno, 4)]);

    let proposal = strategy.plan(&target, &pool);

    assert_eq!(proposal.entries.len(), 1);
    assert!((proposal.entries[0].compatibility_score - 0.5).abs() < 1e-6);
    assert_eq!(proposal.entries[0].estimated_reach, 5_100);
}

#[test]
fn graduated_costing_is_shared_by_planner_and_batch() {
    let mut config = EngineConfig::default();
    config.costing = CreditCostRule::graduated();
    let strategy = GreedyBlendedScore::from_config(&config);

    let pool = SupporterPool::new(vec![
        Supporter::new("rich", 10_000, house(), 90),
        Supporter::new("poor", 20_000, house(), 30),
    ]);
    let target = Target::new("t1", "owner", house(), 100);

    let proposal = strategy.plan(&target, &pool);
    assert_eq!(proposal.supporter_ids().collect::<Vec<_>>(), vec!["rich"]);
    assert_eq!(proposal.total_credits, 63);
    assert!(proposal.conflicts.iter().any(|c| c.contains("poor")));

    let assignments = strategy.allocate_day(queue_date(), &[target], &pool);
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].supporter_id, "rich");
    assert_eq!(assignments[0].credits_allocated, 63);
}

#[test]
fn batch_runs_are_repeatable_and_leave_pool_untouched() {
    let (pool, _) = SupporterPool::from_records(&generate_synthetic_pool(120, 11));
    let targets = generate_synthetic_targets(12, 120, 11);
    let snapshot = pool.clone();
    let strategy = GreedyBlendedScore::default();

    let first = strategy.allocate_day(queue_date(), &targets, &pool);
    let second = strategy.allocate_day(queue_date(), &targets, &pool);

    assert!(!first.is_empty());
    assert_eq!(first, second);
    assert_eq!(pool, snapshot);
}

#[test]
fn strategy_is_usable_as_trait_object() {
    let strategy: Box<dyn AllocationStrategy> = Box::new(GreedyBlendedScore::default());
    assert_eq!(strategy.name(), "greedy_blended_score");

    let pool = SupporterPool::new(vec![Supporter::new("s1", 200_000, house(), 10)]);
    let proposal = strategy.plan(&Target::new("t1", "owner", house(), 5_000), &pool);
    assert_eq!(proposal.total_reach, 12_000);
}

#[test]
fn planner_properties_hold_on_synthetic_pools() {
    let strategy = GreedyBlendedScore::default();

    for seed in [1u64, 7, 19, 42, 99] {
        let (pool, _) = SupporterPool::from_records(&generate_synthetic_pool(150, seed));
        for target in generate_synthetic_targets(6, 150, seed) {
            let proposal = strategy.plan(&target, &pool);

            assert!(proposal.entries.len() <= 50);
            let ids: HashSet<&str> = proposal.supporter_ids().collect();
            assert_eq!(ids.len(), proposal.entries.len());
            assert!(!ids.contains(target.owner_member_id.as_str()));

            for entry in &proposal.entries {
                let supporter = pool.get(&entry.supporter_id).unwrap();
                assert!(supporter.is_eligible());
                assert!(entry.credits_required <= supporter.credit_balance);
                assert!((0.0..=1.0).contains(&entry.compatibility_score));
            }
            let reach: u64 = proposal.entries.iter().map(|e| e.estimated_reach).sum();
            let credits: i64 = proposal.entries.iter().map(|e| e.credits_required).sum();
            assert_eq!(proposal.total_reach, reach);
            assert_eq!(proposal.total_credits, credits);
        }
    }
}

#[test]
fn batch_properties_hold_on_synthetic_pools() {
    let strategy = GreedyBlendedScore::default();

    for seed in [3u64, 8, 21, 64] {
        let (pool, _) = SupporterPool::from_records(&generate_synthetic_pool(80, seed));
        let targets = generate_synthetic_targets(25, 80, seed);
        let assignments = strategy.allocate_day(queue_date(), &targets, &pool);

        let positions: Vec<u64> = assignments.iter().map(|a| a.position).collect();
        let expected: Vec<u64> = (1..=assignments.len() as u64).collect();
        assert_eq!(positions, expected);

        let mut per_supporter: HashMap<&str, (usize, i64)> = HashMap::new();
        let mut pairs = HashSet::new();
        for assignment in &assignments {
            assert_eq!(assignment.queue_date, queue_date());
            let pair = (assignment.target_id.as_str(), assignment.supporter_id.as_str());
            assert!(pairs.insert(pair));

            let target = targets.iter().find(|t| t.id == assignment.target_id).unwrap();
            assert_ne!(target.owner_member_id, assignment.supporter_id);

            let entry = per_supporter.entry(assignment.supporter_id.as_str()).or_default();
            entry.0 += 1;
            entry.1 += assignment.credits_allocated;
        }

        for (supporter_id, (count, spent)) in per_supporter {
            let supporter = pool.get(supporter_id).unwrap();
            assert!(supporter.is_active());
            assert!(count <= 3);
            assert!(spent <= supporter.credit_balance);
        }
    }
}

#[test]
fn reach_band_is_ordered_and_monotonic() {
    let model = ReachModel::default();
    let mut previous = 0u64;

    for followers in [1.0, 10.0, 250.0, 4_000.0, 90_000.0, 250_000.0, 1_200_000.0, 9_000_000.0] {
        let estimate = model.estimate(followers, None, 1).unwrap();
        assert!(estimate.conservative <= estimate.median);
        assert!(estimate.median <= estimate.aggressive);
        assert!(estimate.median >= previous);
        previous = estimate.median;
    }
}
