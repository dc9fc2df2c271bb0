use anyhow::Context;
use helpers::general::{argsort, SortOrder};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// PlayerResult is one row of the results table.
/// * `status` - running, crashed or finished
/// * `completion_turn` - Turn in which the player crashed or finished, empty while running
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerResult {
    pub id: u32,
    pub name: String,
    pub status: String,
    pub score: u32,
    pub completion_turn: Option<u64>,
}

/// RaceResult contains all information about a played run that is required for post-processing.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RaceResult {
    pub track_name: String,
    pub generation: u32,
    pub turns: u64,
    pub player_results: Vec<PlayerResult>,
    pub score_logs: Vec<Vec<(u64, u32)>>,
}

impl RaceResult {
    /// ranking returns the indices of the player results sorted by score, lowest (best) first.
    /// Equal scores keep their insertion order.
    pub fn ranking(&self) -> Vec<usize> {
        let scores: Vec<u32> = self.player_results.iter().map(|r| r.score).collect();
        argsort(&scores, SortOrder::Ascending)
    }

    /// format_results renders the results table that is printed at the end of a run.
    pub fn format_results(&self) -> anyhow::Result<String> {
        let mut content = String::new();
        writeln!(
            &mut content,
            "RESULT: Track {}, generation {}, {} turns",
            self.track_name, self.generation, self.turns
        )?;
        writeln!(
            &mut content,
            "{:>4}, {:>4}, {:>10}, {:>9}, {:>6}, {:>5}",
            "pos", "id", "name", "status", "score", "turn"
        )?;

        for (pos, &idx) in self.ranking().iter().enumerate() {
            let result = &self.player_results[idx];
            let turn = result
                .completion_turn
                .map_or_else(|| String::from("-"), |t| t.to_string());
            writeln!(
                &mut content,
                "{:>4}, {:>4}, {:>10}, {:>9}, {:>6}, {:>5}",
                pos + 1,
                result.id,
                result.name,
                result.status,
                result.score,
                turn
            )?;
        }
        Ok(content)
    }

    /// print_results prints the results table to the console output.
    pub fn print_results(&self) -> anyhow::Result<()> {
        print!("{}", self.format_results()?);
        Ok(())
    }

    /// write_results_to_csv writes one row per player to a CSV file, `output/results.csv` if no
    /// path is given. Returns the path of the written file.
    pub fn write_results_to_csv(&self, path: Option<&Path>) -> anyhow::Result<PathBuf> {
        let out_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let out_dir = Path::new("output");
                std::fs::create_dir_all(out_dir)
                    .context("Failed to create output directory!")?;
                out_dir.join("results.csv")
            }
        };

        let mut wtr = csv::Writer::from_path(&out_path)
            .context(format!("Failed to create {}!", out_path.display()))?;
        for result in self.player_results.iter() {
            wtr.serialize(result)
                .context(format!("Failed to write {}!", out_path.display()))?;
        }
        wtr.flush()
            .context(format!("Failed to write {}!", out_path.display()))?;

        Ok(out_path)
    }
}
