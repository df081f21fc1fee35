//! Results of completed races and their aggregation.

use crate::metrics::VehicleReport;
use std::fmt;

/// The outcome of one race.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Winner {
    /// The entrant at this index won.
    Entrant(usize),
    /// Several entrants finished with identical times.
    Draw,
    /// Several entrants completed the most laps without reaching the target.
    None,
}

/// The results of a single race.
#[derive(Clone, Debug, PartialEq)]
pub struct RaceRecord {
    /// The race number, starting at 1.
    pub number: usize,
    /// The number of laps which completed the race.
    pub lap_target: u32,
    /// One report per entrant, in entrant order.
    pub results: Vec<VehicleReport>,
}

impl RaceRecord {
    /// Decides the winner. The entrant with the most laps wins outright; entrants tied
    /// on laps at or above the target are separated by time.
    pub fn winner(&self) -> Winner {
        let Some(most_laps) = self.results.iter().map(|r| r.laps).max() else {
            return Winner::None;
        };
        let leaders: Vec<usize> = (0..self.results.len())
            .filter(|&idx| self.results[idx].laps == most_laps)
            .collect();
        if let [idx] = leaders[..] {
            return Winner::Entrant(idx);
        }
        if most_laps < self.lap_target {
            return Winner::None;
        }
        let best = leaders
            .iter()
            .map(|&idx| self.results[idx].time_s)
            .fold(f64::INFINITY, f64::min);
        let fastest: Vec<usize> = leaders
            .into_iter()
            .filter(|&idx| self.results[idx].time_s == best)
            .collect();
        match fastest[..] {
            [idx] => Winner::Entrant(idx),
            _ => Winner::Draw,
        }
    }

    fn winner_label(&self) -> &str {
        match self.winner() {
            Winner::Entrant(idx) => &self.results[idx].label,
            Winner::Draw => "DRAW",
            Winner::None => "NONE",
        }
    }
}

/// Aggregated results for one entrant over several races.
#[derive(Clone, Debug, PartialEq)]
pub struct EntrantSummary {
    pub label: String,
    pub wins: usize,
    pub average_time: f64,
    pub total_collisions: u32,
}

/// Every race completed in a session.
#[derive(Clone, Debug, Default)]
pub struct RaceHistory {
    races: Vec<RaceRecord>,
}

impl RaceHistory {
    /// Creates an empty history.
    pub fn new() -> Self {
        Default::default()
    }

    /// Appends a race, numbering it after the previous one.
    pub fn record(&mut self, lap_target: u32, results: Vec<VehicleReport>) -> &RaceRecord {
        let number = self.races.len() + 1;
        self.races.push(RaceRecord {
            number,
            lap_target,
            results,
        });
        &self.races[number - 1]
    }

    /// The recorded races, oldest first.
    pub fn races(&self) -> &[RaceRecord] {
        &self.races
    }

    pub fn len(&self) -> usize {
        self.races.len()
    }

    pub fn is_empty(&self) -> bool {
        self.races.is_empty()
    }

    /// Summarises each entrant's results, following the entrant order of the first race.
    pub fn summary(&self) -> Vec<EntrantSummary> {
        let Some(first) = self.races.first() else {
            return vec![];
        };
        let count = self.races.len() as f64;
        (0..first.results.len())
            .map(|idx| {
                let results = self.races.iter().filter_map(|race| race.results.get(idx));
                EntrantSummary {
                    label: first.results[idx].label.clone(),
                    wins: self
                        .races
                        .iter()
                        .filter(|race| race.winner() == Winner::Entrant(idx))
                        .count(),
                    average_time: results.clone().map(|r| r.time_s).sum::<f64>() / count,
                    total_collisions: results.map(|r| r.collisions).sum(),
                }
            })
            .collect()
    }
}

impl fmt::Display for RaceHistory {
    /// Renders a results table followed by the summary.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.races.is_empty() {
            return writeln!(f, "No races completed.");
        }
        write!(f, "| Race |")?;
        for result in &self.races[0].results {
            write!(f, " {:<26} |", result.label)?;
        }
        writeln!(f, " Winner       |")?;
        write!(f, "|  No. |")?;
        for _ in &self.races[0].results {
            write!(f, " Time (s) | Laps | Crashes |")?;
        }
        writeln!(f, "              |")?;
        for race in &self.races {
            write!(f, "| {:>4} |", race.number)?;
            for r in &race.results {
                write!(f, " {:>8.2} | {:>4} | {:>7} |", r.time_s, r.laps, r.collisions)?;
            }
            writeln!(f, " {:<12} |", race.winner_label())?;
        }
        writeln!(f)?;
        writeln!(f, "Total races: {}", self.races.len())?;
        for entrant in self.summary() {
            writeln!(
                f,
                "{}: {} wins, average time {:.2}s, {} collisions",
                entrant.label, entrant.wins, entrant.average_time, entrant.total_collisions
            )?;
        }
        Ok(())
    }
}
