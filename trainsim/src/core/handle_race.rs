use crate::core::engine::Engine;
use crate::core::player::Player;
use crate::core::track::Track;
use crate::interfaces::gui_interface::GuiLink;
use crate::post::race_result::RaceResult;
use crate::pre::read_sim_pars::SimPars;
use helpers::general::InputValueError;
use std::sync::Arc;

/// handle_race creates an engine on the basis of the inserted parameters and plays the configured
/// number of generations. After every generation but the last, all players are replaced by
/// children of the best player. Returns the result of the last generation played.
pub fn handle_race(
    sim_pars: &SimPars,
    track: Arc<Track>,
    gui: Option<GuiLink>,
    realtime_factor: f64,
) -> anyhow::Result<RaceResult> {
    let race_pars = &sim_pars.race_pars;

    sim_pars.validate()?;
    if realtime_factor <= 0.0 {
        return Err(InputValueError::new("realtime factor must be positive").into());
    }

    let mut engine = Engine::new(track, vec![], sim_pars.sim_consts, gui);
    engine.reseed(race_pars.seed);
    engine.max_turns = race_pars.max_turns;
    engine.realtime_factor = realtime_factor;

    for player_pars in sim_pars.player_pars_all.iter() {
        let player = player_pars.create_player(engine.rng_mut())?;
        engine.add_player(player);
    }

    let population = race_pars
        .population
        .unwrap_or(sim_pars.player_pars_all.len() as u32);
    let mut race_result = RaceResult::default();

    for generation in 1..=race_pars.generations {
        engine.generation = generation;
        race_result = engine.play(race_pars.stop_on_death)?;

        let best = match engine.get_best_player() {
            Some(player) => player,
            None => {
                tracing::warn!("Generation {} ended without players", generation);
                break;
            }
        };
        let best_id = best.id;
        tracing::info!(
            "Generation {} done after {} turns, best player {} ({}) with score {} ({})",
            generation,
            race_result.turns,
            best.id,
            best.name,
            best.score,
            best.status.label()
        );

        if generation == race_pars.generations || engine.gui_closed() {
            break;
        }

        let children: Vec<Player> = (0..population)
            .filter_map(|_| engine.give_birth(best_id))
            .collect();
        engine.remove_all_players(&[]);
        for child in children {
            engine.add_player(child);
        }
    }

    Ok(race_result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pre::read_sim_pars::{PlayerKind, PlayerPars, RacePars};
    use crate::core::engine::SimConstants;

    fn ring_track() -> Arc<Track> {
        Arc::new(
            Track::from_ascii(
                "ring",
                &[
                    "##############",
                    "#S...........#",
                    "#............#",
                    "#...######...#",
                    "#...######...#",
                    "#............#",
                    "#FFF.........#",
                    "##############",
                ],
            )
            .unwrap(),
        )
    }

    fn sim_pars(generations: u32, population: Option<u32>) -> SimPars {
        SimPars {
            race_pars: RacePars {
                track_name: String::from("ring"),
                max_turns: Some(60),
                generations,
                population,
                ..RacePars::default()
            },
            sim_consts: SimConstants::default(),
            player_pars_all: vec![
                PlayerPars::new(PlayerKind::RuleAi),
                PlayerPars::new(PlayerKind::RuleAi),
                PlayerPars::new(PlayerKind::NaiveAi),
            ],
        }
    }

    #[test]
    fn replaces_players_with_children_between_generations() {
        let result = handle_race(&sim_pars(3, Some(5)), ring_track(), None, 1.0).unwrap();

        assert_eq!(result.generation, 3);
        assert_eq!(result.player_results.len(), 5);
        // ids keep counting up across generations
        let ids: Vec<u32> = result.player_results.iter().map(|r| r.id).collect();
        assert!(ids.iter().all(|&id| id >= 8));
        assert!(result.turns >= 1 && result.turns <= 60);
    }

    #[test]
    fn single_generation_keeps_configured_players() {
        let result = handle_race(&sim_pars(1, None), ring_track(), None, 1.0).unwrap();

        let names: Vec<&str> = result
            .player_results
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["RuleAi", "RuleAi", "NaiveAi"]);
        assert_eq!(result.score_logs.len(), 3);
    }

    #[test]
    fn runs_are_reproducible_with_the_same_seed() {
        let first = handle_race(&sim_pars(2, None), ring_track(), None, 1.0).unwrap();
        let second = handle_race(&sim_pars(2, None), ring_track(), None, 1.0).unwrap();

        assert_eq!(first.player_results, second.player_results);
        assert_eq!(first.score_logs, second.score_logs);
    }

    #[test]
    fn zero_generations_are_rejected() {
        let err = handle_race(&sim_pars(0, None), ring_track(), None, 1.0).unwrap_err();
        assert!(err.downcast_ref::<InputValueError>().is_some());
    }

    #[test]
    fn out_of_range_time_step_is_rejected() {
        let mut pars = sim_pars(1, None);
        pars.sim_consts.seconds_per_frame = 5.0;

        let err = handle_race(&pars, ring_track(), None, 1.0).unwrap_err();
        assert!(err.downcast_ref::<InputValueError>().is_some());
    }
}
