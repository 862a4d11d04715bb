use pokemon_line_finder::ai::AiConfig;
use pokemon_line_finder::battle::{legal_actions, simulate_turn, BattleAction, BattleState, Side};
use pokemon_line_finder::damage::hit_damage;
use pokemon_line_finder::error::EngineError;
use pokemon_line_finder::model::{
    BoostStat, Commitment, EffectTarget, LockReason, Move, MoveCategory, MultiTurn,
    PokemonInstance, StatChange, Stats, StatusCondition,
};
use pokemon_line_finder::rng::{RngMode, ScriptedRng};
use pokemon_line_finder::types::Type;
use pretty_assertions::assert_eq;

fn make_move(
    name: &str,
    move_type: Type,
    category: MoveCategory,
    power: u32,
    accuracy: Option<u8>,
    priority: i8,
) -> Move {
    let mut mv = Move::new(name, move_type, category, power);
    mv.accuracy = accuracy;
    mv.priority = priority;
    mv
}

fn splash() -> Move {
    make_move("Splash", Type::Normal, MoveCategory::Status, 0, None, 0)
}

fn tackle() -> Move {
    make_move("Tackle", Type::Normal, MoveCategory::Physical, 40, Some(100), 0)
}

fn make_mon(name: &str, types: &[Type], speed: u32, moves: Vec<Move>) -> PokemonInstance {
    PokemonInstance::new(
        name,
        types.to_vec(),
        Stats {
            hp: 100,
            atk: 120,
            def: 80,
            spa: 120,
            spd: 80,
            spe: speed,
        },
        moves,
    )
}

fn with_hp(mut mon: PokemonInstance, hp: u32) -> PokemonInstance {
    mon.stats.hp = hp;
    mon.current_hp = hp;
    mon
}

fn use_move(index: usize) -> BattleAction {
    BattleAction::Move {
        index,
        name: String::new(),
    }
}

fn ai() -> AiConfig {
    AiConfig::default()
}

#[test]
fn priority_moves_before_faster_opponent() {
    let quick = make_move("Quick Attack", Type::Normal, MoveCategory::Physical, 40, Some(100), 1);
    let state = BattleState::new(
        vec![make_mon("Slowpoke", &[Type::Water], 20, vec![quick])],
        vec![make_mon("Jolteon", &[Type::Electric], 200, vec![tackle()])],
    )
    .unwrap();
    let outcome = simulate_turn(&state, &use_move(0), &mut RngMode::WorstCase, &ai()).unwrap();
    assert_eq!(outcome.first, Side::Player);
    assert_eq!(outcome.log[0], "Slowpoke used Quick Attack!");
}

#[test]
fn faster_side_moves_first_without_priority() {
    let state = BattleState::new(
        vec![make_mon("Slowpoke", &[Type::Water], 20, vec![tackle()])],
        vec![make_mon("Jolteon", &[Type::Electric], 200, vec![tackle()])],
    )
    .unwrap();
    let outcome = simulate_turn(&state, &use_move(0), &mut RngMode::MostLikely, &ai()).unwrap();
    assert_eq!(outcome.first, Side::Opponent);
    assert_eq!(outcome.turn, 1);
    assert_eq!(outcome.state.turn, 2);
}

#[test]
fn speed_ties_go_to_the_opponent_in_worst_case() {
    let state = BattleState::new(
        vec![make_mon("Twin", &[Type::Water], 100, vec![tackle()])],
        vec![make_mon("Twin", &[Type::Water], 100, vec![tackle()])],
    )
    .unwrap();
    let outcome = simulate_turn(&state, &use_move(0), &mut RngMode::WorstCase, &ai()).unwrap();
    assert_eq!(outcome.first, Side::Opponent);
    assert!(outcome
        .risks
        .iter()
        .any(|r| r.kind == pokemon_line_finder::risk::RiskKind::SpeedTie));
}

#[test]
fn charge_move_deals_nothing_then_full_damage() {
    let mut beam = make_move("Solar Beam", Type::Grass, MoveCategory::Special, 120, Some(100), 0);
    beam.multi_turn = Some(MultiTurn::Charge);
    let state = BattleState::new(
        vec![make_mon("Venusaur", &[Type::Grass], 150, vec![beam.clone(), tackle()])],
        vec![with_hp(make_mon("Snorlax", &[Type::Normal], 30, vec![splash()]), 400)],
    )
    .unwrap();

    let first = simulate_turn(&state, &use_move(0), &mut RngMode::MostLikely, &ai()).unwrap();
    assert_eq!(first.player_damage.as_ref().map(|d| d.damage), Some(0));
    assert_eq!(first.state.active(Side::Opponent).current_hp, 400);
    assert_eq!(
        first.state.active(Side::Player).commitment,
        Commitment::Charging { move_index: 0 }
    );
    assert_eq!(legal_actions(&first.state, Side::Player), vec![BattleAction::Move {
        index: 0,
        name: "Solar Beam".into()
    }]);

    let expected = hit_damage(
        first.state.active(Side::Player),
        first.state.active(Side::Opponent),
        &beam,
        &first.state.damage_field(Side::Opponent),
        false,
        92,
    )
    .unwrap();
    // the requested tackle is overridden by the charge commitment
    let second = simulate_turn(&first.state, &use_move(1), &mut RngMode::MostLikely, &ai()).unwrap();
    assert_eq!(second.player_damage.as_ref().map(|d| d.damage), Some(expected));
    assert_eq!(second.state.active(Side::Opponent).current_hp, 400 - expected);
    assert_eq!(second.state.active(Side::Player).commitment, Commitment::Free);
    assert_eq!(second.state.active(Side::Player).pp[0], 9);
}

#[test]
fn focus_sash_leaves_one_hp_only_from_full_health() {
    let blast = make_move("Mega Blast", Type::Normal, MoveCategory::Special, 250, Some(100), 0);
    let mut target = make_mon("Blissey", &[Type::Normal], 10, vec![splash()]);
    target.item = Some("Focus Sash".into());

    let state = BattleState::new(
        vec![make_mon("Attacker", &[Type::Normal], 150, vec![blast.clone()])],
        vec![target.clone()],
    )
    .unwrap();
    let outcome = simulate_turn(&state, &use_move(0), &mut RngMode::MostLikely, &ai()).unwrap();
    let survivor = outcome.state.active(Side::Opponent);
    assert_eq!(survivor.current_hp, 1);
    assert!(survivor.item_consumed);
    assert!(!outcome.opponent_fainted);

    target.current_hp = 99;
    let state = BattleState::new(
        vec![make_mon("Attacker", &[Type::Normal], 150, vec![blast])],
        vec![target],
    )
    .unwrap();
    let outcome = simulate_turn(&state, &use_move(0), &mut RngMode::MostLikely, &ai()).unwrap();
    assert!(outcome.opponent_fainted);
    assert_eq!(outcome.state.winner(), Some(Side::Player));
}

#[test]
fn toxic_damage_grows_each_turn() {
    let mut poisoned = make_mon("Gengar", &[Type::Ghost], 110, vec![splash()]);
    poisoned.status = Some(StatusCondition::BadlyPoisoned);
    let mut state = BattleState::new(
        vec![poisoned],
        vec![make_mon("Chansey", &[Type::Normal], 50, vec![splash()])],
    )
    .unwrap();

    let mut losses = Vec::new();
    for _ in 0..3 {
        let before = state.active(Side::Player).current_hp;
        let outcome = simulate_turn(&state, &use_move(0), &mut RngMode::WorstCase, &ai()).unwrap();
        state = outcome.state;
        losses.push(before - state.active(Side::Player).current_hp);
    }
    assert_eq!(losses, vec![6, 12, 18]);
    assert_eq!(state.active(Side::Player).toxic_counter, 3);
}

#[test]
fn toxic_counter_caps_at_fifteen() {
    let mut poisoned = with_hp(make_mon("Gengar", &[Type::Ghost], 110, vec![splash()]), 3200);
    poisoned.status = Some(StatusCondition::BadlyPoisoned);
    poisoned.toxic_counter = 15;
    let state = BattleState::new(
        vec![poisoned],
        vec![make_mon("Chansey", &[Type::Normal], 50, vec![splash()])],
    )
    .unwrap();
    let outcome = simulate_turn(&state, &use_move(0), &mut RngMode::WorstCase, &ai()).unwrap();
    let mon = outcome.state.active(Side::Player);
    assert_eq!(mon.toxic_counter, 15);
    assert_eq!(mon.current_hp, 3200 - 3000);
}

#[test]
fn stat_stages_clamp_after_any_change() {
    let mut drum = make_move("Belly Drum", Type::Normal, MoveCategory::Status, 0, None, 0);
    drum.stat_changes = vec![StatChange {
        target: EffectTarget::User,
        stat: BoostStat::Atk,
        stages: 12,
        chance: 100,
    }];
    let state = BattleState::new(
        vec![make_mon("Azumarill", &[Type::Water], 60, vec![drum])],
        vec![make_mon("Chansey", &[Type::Normal], 50, vec![splash()])],
    )
    .unwrap();
    let first = simulate_turn(&state, &use_move(0), &mut RngMode::WorstCase, &ai()).unwrap();
    assert_eq!(first.state.active(Side::Player).stages.atk, 6);
    let second = simulate_turn(&first.state, &use_move(0), &mut RngMode::WorstCase, &ai()).unwrap();
    assert_eq!(second.state.active(Side::Player).stages.atk, 6);
    assert!(second.log.iter().any(|l| l.contains("won't go any further")));
}

#[test]
fn worst_case_turns_are_deterministic() {
    let mut hurricane = make_move("Hurricane", Type::Flying, MoveCategory::Special, 110, Some(70), 0);
    hurricane.flinch_chance = 30;
    let build = || {
        BattleState::new(
            vec![make_mon("Pidgeot", &[Type::Normal, Type::Flying], 101, vec![hurricane.clone(), tackle()])],
            vec![make_mon("Machamp", &[Type::Fighting], 55, vec![tackle()])],
        )
        .unwrap()
    };
    let a = simulate_turn(&build(), &use_move(0), &mut RngMode::WorstCase, &ai()).unwrap();
    let b = simulate_turn(&build(), &use_move(0), &mut RngMode::WorstCase, &ai()).unwrap();
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
    // worst case: a 70% move never lands for the player
    assert_eq!(a.player_damage.as_ref().map(|d| d.hit), Some(false));
}

#[test]
fn scripted_draws_drive_random_turns() {
    let inaccurate = make_move("Focus Blast", Type::Fighting, MoveCategory::Special, 120, Some(70), 0);
    let state = BattleState::new(
        vec![make_mon("Lucario", &[Type::Fighting], 90, vec![inaccurate])],
        vec![with_hp(make_mon("Snorlax", &[Type::Normal], 30, vec![splash()]), 500)],
    )
    .unwrap();
    // first draw is the accuracy roll
    let mut hit_rng = ScriptedRng::new(vec![0.1, 0.9, 0.5]);
    let hit = simulate_turn(&state, &use_move(0), &mut RngMode::Random(&mut hit_rng), &ai()).unwrap();
    assert!(hit.player_damage.unwrap().hit);
    let mut miss_rng = ScriptedRng::new(vec![0.95]);
    let miss = simulate_turn(&state, &use_move(0), &mut RngMode::Random(&mut miss_rng), &ai()).unwrap();
    assert!(!miss.player_damage.unwrap().hit);
}

#[test]
fn stealth_rock_hits_on_switch_in() {
    let mut state = BattleState::new(
        vec![
            make_mon("Blastoise", &[Type::Water], 78, vec![splash()]),
            make_mon("Charizard", &[Type::Fire, Type::Flying], 100, vec![splash()]),
        ],
        vec![make_mon("Chansey", &[Type::Normal], 50, vec![splash()])],
    )
    .unwrap();
    state.side_mut(Side::Player).hazards.stealth_rock = true;
    let outcome = simulate_turn(
        &state,
        &BattleAction::Switch { target: 1 },
        &mut RngMode::WorstCase,
        &ai(),
    )
    .unwrap();
    assert_eq!(outcome.first, Side::Player);
    assert_eq!(outcome.state.side(Side::Player).active, 1);
    assert_eq!(outcome.state.active(Side::Player).current_hp, 50);
}

#[test]
fn fainted_lead_is_replaced_without_a_turn() {
    let mut down = make_mon("Pikachu", &[Type::Electric], 90, vec![tackle()]);
    down.current_hp = 0;
    let state = BattleState::new(
        vec![down, make_mon("Raichu", &[Type::Electric], 110, vec![tackle()])],
        vec![make_mon("Geodude", &[Type::Rock, Type::Ground], 20, vec![tackle()])],
    )
    .unwrap();
    assert_eq!(
        legal_actions(&state, Side::Player),
        vec![BattleAction::Switch { target: 1 }]
    );
    let err = simulate_turn(&state, &use_move(0), &mut RngMode::WorstCase, &ai()).unwrap_err();
    assert!(matches!(err, EngineError::InvalidAction(_)));

    let outcome = simulate_turn(
        &state,
        &BattleAction::Switch { target: 1 },
        &mut RngMode::WorstCase,
        &ai(),
    )
    .unwrap();
    assert_eq!(outcome.opponent_action, None);
    assert_eq!(outcome.state.turn, state.turn);
    assert_eq!(outcome.state.active(Side::Player).species, "Raichu");
}

#[test]
fn recharge_is_forced_after_hyper_beam() {
    let mut beam = make_move("Hyper Beam", Type::Normal, MoveCategory::Special, 150, Some(100), 0);
    beam.multi_turn = Some(MultiTurn::Recharge);
    let state = BattleState::new(
        vec![make_mon("Dragonite", &[Type::Dragon], 120, vec![beam, tackle()])],
        vec![with_hp(make_mon("Snorlax", &[Type::Normal], 30, vec![splash()]), 600)],
    )
    .unwrap();
    let outcome = simulate_turn(&state, &use_move(0), &mut RngMode::WorstCase, &ai()).unwrap();
    assert_eq!(outcome.state.active(Side::Player).commitment, Commitment::Recharging);
    assert_eq!(legal_actions(&outcome.state, Side::Player), vec![BattleAction::Recharge]);
    let next = simulate_turn(&outcome.state, &use_move(1), &mut RngMode::WorstCase, &ai()).unwrap();
    assert_eq!(next.player_action, BattleAction::Recharge);
    assert_eq!(next.state.active(Side::Player).commitment, Commitment::Free);
}

#[test]
fn empty_pp_moves_are_not_offered() {
    let mut mon = make_mon("Smeargle", &[Type::Normal], 75, vec![tackle(), splash()]);
    mon.pp = vec![0, 5];
    let state = BattleState::new(vec![mon], vec![make_mon("Chansey", &[Type::Normal], 50, vec![splash()])]).unwrap();
    assert_eq!(
        legal_actions(&state, Side::Player),
        vec![BattleAction::Move {
            index: 1,
            name: "Splash".into()
        }]
    );
    let err = simulate_turn(&state, &use_move(0), &mut RngMode::WorstCase, &ai()).unwrap_err();
    assert!(matches!(err, EngineError::InvalidAction(_)));
}

#[test]
fn rosters_are_validated() {
    let five = vec![tackle(), tackle(), tackle(), tackle(), tackle()];
    let err = BattleState::new(
        vec![make_mon("Mew", &[Type::Psychic], 100, five)],
        vec![make_mon("Chansey", &[Type::Normal], 50, vec![splash()])],
    )
    .unwrap_err();
    assert!(matches!(err, EngineError::InvalidMoveSet { .. }));
    let err = BattleState::new(vec![], vec![make_mon("Chansey", &[Type::Normal], 50, vec![splash()])]).unwrap_err();
    assert!(matches!(err, EngineError::InvalidTeam { side: Side::Player }));
}

#[test]
fn fainted_opponent_switches_in_before_the_player_attacks() {
    let mut down = make_mon("Fallen", &[Type::Normal], 10, vec![tackle()]);
    down.current_hp = 0;
    let state = BattleState::new(
        vec![make_mon("Hitter", &[Type::Normal], 100, vec![tackle()])],
        vec![down, make_mon("Healthy", &[Type::Normal], 10, vec![tackle()])],
    )
    .unwrap();
    let outcome = simulate_turn(&state, &use_move(0), &mut RngMode::WorstCase, &ai()).unwrap();
    assert_eq!(outcome.opponent_action, Some(BattleAction::Switch { target: 1 }));
    assert_eq!(outcome.first, Side::Opponent);
    assert_eq!(outcome.log[0], "Go! Opposing Healthy!");
    assert!(!outcome.log.iter().any(|l| l == "But there was no target..."));
    assert_eq!(outcome.player_damage.as_ref().map(|d| d.hit), Some(true));
    let healthy = outcome.state.active(Side::Opponent);
    assert_eq!(healthy.species, "Healthy");
    assert!(healthy.current_hp < 100);
}

#[test]
fn replacements_keep_coming_until_one_survives_the_hazards() {
    let mut weakling = make_mon("Weakling", &[Type::Normal], 10, vec![tackle()]);
    weakling.current_hp = 1;
    let blast = make_move("Mega Blast", Type::Normal, MoveCategory::Special, 250, Some(100), 0);
    let mut glass = make_mon("Glass", &[Type::Normal], 200, vec![blast]);
    glass.current_hp = 1;
    let mut state = BattleState::new(
        vec![make_mon("Hitter", &[Type::Normal], 100, vec![tackle()])],
        vec![weakling, glass, make_mon("Healthy", &[Type::Normal], 10, vec![tackle()])],
    )
    .unwrap();
    state.side_mut(Side::Opponent).hazards.stealth_rock = true;

    let outcome = simulate_turn(&state, &use_move(0), &mut RngMode::WorstCase, &ai()).unwrap();
    assert!(outcome.opponent_fainted);
    assert!(outcome.log.iter().any(|l| l == "Opposing Glass fainted!"));
    assert_eq!(outcome.state.side(Side::Opponent).active, 2);
    assert_eq!(outcome.state.active(Side::Opponent).current_hp, 88);

    let next = simulate_turn(&outcome.state, &use_move(0), &mut RngMode::WorstCase, &ai()).unwrap();
    assert!(matches!(next.opponent_action, Some(BattleAction::Move { .. })));
    assert_eq!(next.player_damage.as_ref().map(|d| d.hit), Some(true));
    assert!(next.state.active(Side::Opponent).current_hp < 88);
}

#[test]
fn sleep_counts_down_on_the_turn_it_would_act() {
    let mut sleeper = make_mon("Sleeper", &[Type::Normal], 100, vec![tackle()]);
    sleeper.status = Some(StatusCondition::Sleep);
    sleeper.sleep_turns = 2;
    let state = BattleState::new(
        vec![sleeper],
        vec![with_hp(make_mon("Chansey", &[Type::Normal], 50, vec![splash()]), 400)],
    )
    .unwrap();

    let first = simulate_turn(&state, &use_move(0), &mut RngMode::WorstCase, &ai()).unwrap();
    assert!(first.log.iter().any(|l| l == "Sleeper is fast asleep."));
    assert!(first.player_damage.is_none());
    assert_eq!(first.state.active(Side::Player).sleep_turns, 1);
    assert_eq!(first.state.active(Side::Player).status, Some(StatusCondition::Sleep));

    let second = simulate_turn(&first.state, &use_move(0), &mut RngMode::WorstCase, &ai()).unwrap();
    assert!(second.log.iter().any(|l| l == "Sleeper woke up!"));
    assert_eq!(second.state.active(Side::Player).status, None);
    assert_eq!(second.player_damage.as_ref().map(|d| d.hit), Some(true));
}

#[test]
fn fire_attacks_thaw_a_frozen_target() {
    let ember = make_move("Ember", Type::Fire, MoveCategory::Special, 40, Some(100), 0);
    let mut frozen = with_hp(make_mon("Lapras", &[Type::Water, Type::Ice], 10, vec![splash()]), 400);
    frozen.status = Some(StatusCondition::Freeze);
    let state = BattleState::new(
        vec![make_mon("Charmander", &[Type::Fire], 100, vec![ember])],
        vec![frozen],
    )
    .unwrap();
    // most likely: the 20% self-thaw never happens
    let outcome = simulate_turn(&state, &use_move(0), &mut RngMode::MostLikely, &ai()).unwrap();
    assert!(outcome.log.iter().any(|l| l == "Opposing Lapras thawed out!"));
    assert_eq!(outcome.state.active(Side::Opponent).status, None);
}

#[test]
fn worst_case_full_paralysis_only_stops_the_player() {
    let mut player = make_mon("Raichu", &[Type::Electric], 100, vec![tackle()]);
    player.status = Some(StatusCondition::Paralysis);
    let mut foe = make_mon("Snorlax", &[Type::Normal], 100, vec![tackle()]);
    foe.status = Some(StatusCondition::Paralysis);
    let state = BattleState::new(vec![player], vec![with_hp(foe, 400)]).unwrap();
    let outcome = simulate_turn(&state, &use_move(0), &mut RngMode::WorstCase, &ai()).unwrap();
    assert!(outcome.log.iter().any(|l| l == "Raichu is paralyzed! It can't move!"));
    assert!(!outcome.log.iter().any(|l| l == "Opposing Snorlax is paralyzed! It can't move!"));
    assert!(outcome.player_damage.is_none());
    assert_eq!(outcome.opponent_damage.as_ref().map(|d| d.hit), Some(true));
}

#[test]
fn choice_item_locks_the_move_until_switching_out() {
    let mut banded = make_mon("Machamp", &[Type::Fighting], 100, vec![tackle(), splash()]);
    banded.item = Some("Choice Band".into());
    let state = BattleState::new(
        vec![banded, make_mon("Bench", &[Type::Normal], 50, vec![tackle()])],
        vec![with_hp(make_mon("Chansey", &[Type::Normal], 10, vec![splash()]), 600)],
    )
    .unwrap();

    let first = simulate_turn(&state, &use_move(0), &mut RngMode::WorstCase, &ai()).unwrap();
    assert_eq!(
        first.state.active(Side::Player).commitment,
        Commitment::Locked {
            move_index: 0,
            reason: LockReason::ChoiceItem
        }
    );
    assert_eq!(
        legal_actions(&first.state, Side::Player),
        vec![
            BattleAction::Move {
                index: 0,
                name: "Tackle".into()
            },
            BattleAction::Switch { target: 1 },
        ]
    );
    let err = simulate_turn(&first.state, &use_move(1), &mut RngMode::WorstCase, &ai()).unwrap_err();
    assert!(matches!(err, EngineError::InvalidAction(_)));

    let swapped = simulate_turn(
        &first.state,
        &BattleAction::Switch { target: 1 },
        &mut RngMode::WorstCase,
        &ai(),
    )
    .unwrap();
    assert_eq!(swapped.state.side(Side::Player).roster[0].commitment, Commitment::Free);
}

#[test]
fn rampage_runs_three_turns_in_worst_case() {
    let mut outrage = make_move("Outrage", Type::Dragon, MoveCategory::Physical, 120, Some(100), 0);
    outrage.multi_turn = Some(MultiTurn::Rampage);
    let mut state = BattleState::new(
        vec![make_mon("Dragonite", &[Type::Dragon], 100, vec![outrage, tackle()])],
        vec![with_hp(make_mon("Blissey", &[Type::Normal], 10, vec![splash()]), 2000)],
    )
    .unwrap();
    let full_pp = state.active(Side::Player).pp[0];

    let mut commitments = Vec::new();
    for _ in 0..3 {
        // tackle requests are overridden while the rampage lasts
        let request = if commitments.is_empty() { use_move(0) } else { use_move(1) };
        let outcome = simulate_turn(&state, &request, &mut RngMode::WorstCase, &ai()).unwrap();
        assert!(matches!(outcome.player_action, BattleAction::Move { index: 0, .. }));
        state = outcome.state;
        commitments.push(state.active(Side::Player).commitment);
    }
    assert_eq!(
        commitments,
        vec![
            Commitment::Locked {
                move_index: 0,
                reason: LockReason::Rampage { turns_left: 2 }
            },
            Commitment::Locked {
                move_index: 0,
                reason: LockReason::Rampage { turns_left: 1 }
            },
            Commitment::Free,
        ]
    );
    assert_eq!(state.active(Side::Player).pp[0], full_pp - 1);
}
