use crate::model::PokemonInstance;
use crate::risk::LineOfPlay;
use crate::search::{find_lines_with_cancel, CancelToken, SearchOptions};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trainer {
    pub id: String,
    pub team: Vec<PokemonInstance>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GauntletEntry {
    pub trainer_id: String,
    pub line_count: usize,
    pub guaranteed: bool,
    pub best_line: Option<LineOfPlay>,
    /// Set when the trainer's roster could not be searched at all.
    pub error: Option<String>,
}

/// Searches `player` against every trainer in parallel. Entries keep input order.
pub fn run_gauntlet(
    player: &[PokemonInstance],
    trainers: &[Trainer],
    options: &SearchOptions,
    cancel: &CancelToken,
) -> Vec<GauntletEntry> {
    trainers
        .par_iter()
        .map(|trainer| {
            log::debug!("gauntlet: searching against {}", trainer.id);
            match find_lines_with_cancel(player.to_vec(), trainer.team.clone(), options, cancel) {
                Ok(lines) => GauntletEntry {
                    trainer_id: trainer.id.clone(),
                    line_count: lines.len(),
                    guaranteed: lines.first().map(|l| l.guaranteed_success).unwrap_or(false),
                    best_line: lines.into_iter().next(),
                    error: None,
                },
                Err(err) => {
                    log::warn!("gauntlet: {} skipped: {err}", trainer.id);
                    GauntletEntry {
                        trainer_id: trainer.id.clone(),
                        line_count: 0,
                        guaranteed: false,
                        best_line: None,
                        error: Some(err.to_string()),
                    }
                }
            }
        })
        .collect()
}
