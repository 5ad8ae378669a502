use std::collections::BTreeMap;

use serde_json::Value;

use crate::{unwrap_payload, FormatError, PlayerId, Side, Snapshot};

/// How a game ended, judged by the final scores alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameOutcome {
    /// Several players share the best score.
    Draw { score: u32 },
    Won {
        winner: PlayerId,
        /// Known when the latest snapshot lists the winner.
        name: Option<String>,
        side: Option<Side>,
        score: u32,
        /// The best score among the other players.
        runner_up_score: u32,
    },
}

/// The result shown to the user when the authority ends the game.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameSummary {
    pub outcome: GameOutcome,
    pub scores: BTreeMap<PlayerId, u32>,
}

impl GameSummary {
    /// Reads a `done` payload, a mapping from player id to final score.
    pub fn from_json(payload: Value, latest: Option<&Snapshot>) -> Result<Self, FormatError> {
        let raw: BTreeMap<String, u32> = serde_json::from_value(unwrap_payload(payload)?)?;
        let scores = raw
            .into_iter()
            .map(|(id, score)| (PlayerId::from(id), score))
            .collect();
        Self::from_scores(scores, latest)
    }

    pub fn from_scores(
        scores: BTreeMap<PlayerId, u32>,
        latest: Option<&Snapshot>,
    ) -> Result<Self, FormatError> {
        let mut ranking: Vec<(&PlayerId, u32)> =
            scores.iter().map(|(id, &score)| (id, score)).collect();
        ranking.sort_by(|a, b| b.1.cmp(&a.1));
        let (&(winner, score), rest) = ranking.split_first().ok_or(FormatError::NoScores)?;
        let runner_up_score = rest.iter().map(|&(_, s)| s).max();

        let outcome = if runner_up_score == Some(score) {
            GameOutcome::Draw { score }
        } else {
            let known = latest.and_then(|snapshot| snapshot.player_by_id(winner));
            GameOutcome::Won {
                winner: winner.clone(),
                name: known.map(|(_, player)| player.name.clone()),
                side: known.map(|(side, _)| side),
                score,
                runner_up_score: runner_up_score.unwrap_or(0),
            }
        };
        Ok(Self { outcome, scores })
    }
}

impl std::fmt::Display for GameSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.outcome {
            GameOutcome::Draw { score } => write!(f, "Draw! Scores: {} - {}", score, score),
            GameOutcome::Won {
                winner,
                name,
                side,
                score,
                runner_up_score,
            } => {
                match (name, side) {
                    (Some(name), Some(side)) => write!(f, "{} ({})", name, side)?,
                    _ => write!(f, "Player {}", winner)?,
                }
                write!(
                    f,
                    " wins with {} points against {}",
                    score, runner_up_score
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::snapshot::tests::record;

    #[test]
    fn equal_scores_are_a_draw() {
        let summary = GameSummary::from_json(json!({"P1": 10, "P2": 10}), None).unwrap();
        assert_eq!(summary.outcome, GameOutcome::Draw { score: 10 });
        assert_eq!(summary.scores[&PlayerId::from("P1")], 10);
        assert_eq!(summary.scores[&PlayerId::from("P2")], 10);
        assert_eq!(summary.to_string(), "Draw! Scores: 10 - 10");
    }

    #[test]
    fn highest_score_wins() {
        let summary = GameSummary::from_json(json!({"P1": 12, "P2": 7}), None).unwrap();
        assert_eq!(
            summary.outcome,
            GameOutcome::Won {
                winner: PlayerId::from("P1"),
                name: None,
                side: None,
                score: 12,
                runner_up_score: 7,
            }
        );
        assert_eq!(summary.to_string(), "Player P1 wins with 12 points against 7");
    }

    #[test]
    fn runner_up_is_the_best_of_the_rest() {
        let summary =
            GameSummary::from_json(json!({"a": 3, "b": 12, "c": 9, "d": 1}), None).unwrap();
        let GameOutcome::Won {
            winner,
            runner_up_score,
            ..
        } = summary.outcome
        else {
            panic!("expected a winner");
        };
        assert_eq!(winner, PlayerId::from("b"));
        assert_eq!(runner_up_score, 9);
    }

    #[test]
    fn winner_is_named_from_the_latest_snapshot() {
        let latest = Snapshot::from_json(record("alice", json!({}))).unwrap();
        let summary =
            GameSummary::from_json(json!("{\"7\": 20, \"8\": 18}"), Some(&latest)).unwrap();
        assert_eq!(
            summary.to_string(),
            "alice (W) wins with 20 points against 18"
        );
    }

    #[test]
    fn empty_or_malformed_scores() {
        assert!(matches!(
            GameSummary::from_json(json!({}), None),
            Err(FormatError::NoScores)
        ));
        assert!(GameSummary::from_json(json!([1, 2]), None).is_err());
    }
}
