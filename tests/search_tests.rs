use pokemon_line_finder::battle::BattleState;
use pokemon_line_finder::gauntlet::{run_gauntlet, Trainer};
use pokemon_line_finder::model::{Move, MoveCategory, PokemonInstance, Stats};
use pokemon_line_finder::risk::{replay_worst_case, RiskKind};
use pokemon_line_finder::search::{
    find_lines, find_lines_with_cancel, CancelToken, SearchMode, SearchOptions,
};
use pokemon_line_finder::types::Type;
use pretty_assertions::assert_eq;

fn make_move(name: &str, move_type: Type, category: MoveCategory, power: u32, accuracy: Option<u8>) -> Move {
    let mut mv = Move::new(name, move_type, category, power);
    mv.accuracy = accuracy;
    mv
}

fn make_mon(name: &str, level: u8, types: &[Type], stats: Stats, moves: Vec<Move>) -> PokemonInstance {
    let mut mon = PokemonInstance::new(name, types.to_vec(), stats, moves);
    mon.level = level;
    mon
}

fn charizard() -> PokemonInstance {
    make_mon(
        "Charizard",
        50,
        &[Type::Fire, Type::Flying],
        Stats {
            hp: 153,
            atk: 104,
            def: 98,
            spa: 129,
            spd: 105,
            spe: 120,
        },
        vec![make_move("Flamethrower", Type::Fire, MoveCategory::Special, 90, Some(100))],
    )
}

fn venusaur() -> PokemonInstance {
    make_mon(
        "Venusaur",
        48,
        &[Type::Grass, Type::Poison],
        Stats {
            hp: 150,
            atk: 95,
            def: 96,
            spa: 115,
            spd: 115,
            spe: 90,
        },
        vec![
            make_move("Sludge Bomb", Type::Poison, MoveCategory::Special, 90, Some(100)),
            make_move("Giga Drain", Type::Grass, MoveCategory::Special, 75, Some(100)),
        ],
    )
}

fn worst_case() -> SearchOptions {
    SearchOptions {
        search_mode: SearchMode::WorstCase,
        ..SearchOptions::default()
    }
}

fn balanced_stats() -> Stats {
    Stats {
        hp: 100,
        atk: 120,
        def: 80,
        spa: 120,
        spd: 80,
        spe: 100,
    }
}

/// Strong single-hit attacker whose only move is 80% accurate, against a target that does nothing.
fn accuracy_scenario() -> (Vec<PokemonInstance>, Vec<PokemonInstance>) {
    let attacker = make_mon(
        "Gambler",
        50,
        &[Type::Normal],
        balanced_stats(),
        vec![make_move("Risky Blast", Type::Normal, MoveCategory::Special, 250, Some(80))],
    );
    let mut slow = balanced_stats();
    slow.spe = 20;
    let target = make_mon(
        "Dummy",
        50,
        &[Type::Normal],
        slow,
        vec![make_move("Splash", Type::Normal, MoveCategory::Status, 0, None)],
    );
    (vec![attacker], vec![target])
}

#[test]
fn type_advantage_yields_a_guaranteed_short_line() {
    let options = worst_case();
    let lines = find_lines(vec![charizard()], vec![venusaur()], &options).unwrap();
    assert!(!lines.is_empty());
    let best = &lines[0];
    assert!(best.victory);
    assert!(best.guaranteed_success);
    assert_eq!(best.success_probability, 100.0);
    assert!((1..=3).contains(&best.turn_count()));
    assert!(best.player_casualties.is_empty());
    assert_eq!(best.opponent_casualties, vec!["Venusaur".to_string()]);
}

#[test]
fn guaranteed_lines_replay_to_victory() {
    let initial = BattleState::new(vec![charizard()], vec![venusaur()]).unwrap();
    for mode in [SearchMode::WorstCase, SearchMode::Probabilistic, SearchMode::Random] {
        let options = SearchOptions {
            search_mode: mode,
            seed: 11,
            ..SearchOptions::default()
        };
        let lines = find_lines(vec![charizard()], vec![venusaur()], &options).unwrap();
        for line in lines.iter().filter(|l| l.guaranteed_success) {
            assert!(replay_worst_case(&initial, &line.actions(), &options.ai));
        }
    }
}

#[test]
fn worst_case_search_output_is_byte_identical() {
    let options = worst_case();
    let first = find_lines(vec![charizard()], vec![venusaur()], &options).unwrap();
    let second = find_lines(vec![charizard()], vec![venusaur()], &options).unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn seeded_random_search_is_reproducible() {
    let options = SearchOptions {
        seed: 42,
        ..SearchOptions::default()
    };
    let first = find_lines(vec![charizard()], vec![venusaur()], &options).unwrap();
    let second = find_lines(vec![charizard()], vec![venusaur()], &options).unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn accuracy_dependent_lines_are_filtered() {
    let (player, opponent) = accuracy_scenario();
    let options = SearchOptions {
        search_mode: SearchMode::Probabilistic,
        allow_accuracy_dependence: false,
        ..SearchOptions::default()
    };
    let lines = find_lines(player, opponent, &options).unwrap();
    assert!(lines.is_empty());
}

#[test]
fn accuracy_dependent_lines_carry_their_hit_chance() {
    let (player, opponent) = accuracy_scenario();
    let options = SearchOptions {
        search_mode: SearchMode::Probabilistic,
        allow_accuracy_dependence: true,
        min_success_probability: 0.0,
        ..SearchOptions::default()
    };
    let lines = find_lines(player, opponent, &options).unwrap();
    assert!(!lines.is_empty());
    let line = &lines[0];
    assert!(!line.guaranteed_success);
    assert!(line.requires_hits);
    assert!((line.success_probability - 80.0).abs() < 1e-9);
    assert!(line
        .key_risks
        .iter()
        .all(|r| r.kind == RiskKind::AccuracyMiss));
}

#[test]
fn success_threshold_rejects_risky_lines() {
    let (player, opponent) = accuracy_scenario();
    let options = SearchOptions {
        search_mode: SearchMode::Probabilistic,
        allow_accuracy_dependence: true,
        min_success_probability: 90.0,
        ..SearchOptions::default()
    };
    assert!(find_lines(player, opponent, &options).unwrap().is_empty());
}

#[test]
fn no_solution_is_an_empty_list() {
    let mut weak = charizard();
    weak.moves = vec![make_move("Ember", Type::Fire, MoveCategory::Special, 1, Some(100))];
    weak.pp = Vec::new();
    let options = SearchOptions {
        max_depth: 2,
        ..worst_case()
    };
    let lines = find_lines(vec![weak], vec![venusaur()], &options).unwrap();
    assert!(lines.is_empty());
}

#[test]
fn cancelled_search_returns_what_it_has() {
    let token = CancelToken::new();
    token.cancel();
    let lines = find_lines_with_cancel(vec![charizard()], vec![venusaur()], &worst_case(), &token).unwrap();
    assert!(lines.is_empty());
}

#[test]
fn empty_roster_is_an_error() {
    assert!(find_lines(Vec::new(), vec![venusaur()], &worst_case()).is_err());
}

#[test]
fn gauntlet_keeps_trainer_order() {
    let trainers = vec![
        Trainer {
            id: "grass-gym".into(),
            team: vec![venusaur()],
        },
        Trainer {
            id: "empty".into(),
            team: Vec::new(),
        },
        Trainer {
            id: "grass-gym-rematch".into(),
            team: vec![venusaur(), venusaur()],
        },
    ];
    let entries = run_gauntlet(&[charizard()], &trainers, &worst_case(), &CancelToken::new());
    let ids: Vec<&str> = entries.iter().map(|e| e.trainer_id.as_str()).collect();
    assert_eq!(ids, vec!["grass-gym", "empty", "grass-gym-rematch"]);
    assert!(entries[0].guaranteed);
    assert!(entries[0].best_line.is_some());
    assert!(entries[1].error.is_some());
    assert_eq!(entries[1].line_count, 0);
}
