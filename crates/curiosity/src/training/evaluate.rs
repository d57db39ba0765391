//! Greedy evaluation of a trained agent.

use crate::agent::DqnAgent;
use crate::env::Env;
use crate::utils::tail_mean;
use crate::Result;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvalSummary {
    /// Extrinsic return of each episode
    pub returns: Vec<f64>,
    pub mean_return: f64,
    /// Environment steps taken across all episodes
    pub steps: u64,
}

/// Run `episodes` greedy episodes and average their extrinsic returns.
///
/// Episodes are cut after `max_steps` steps. With a seed, episode `i` resets
/// with `seed + i`.
pub fn evaluate<E: Env + ?Sized>(
    env: &mut E,
    agent: &mut DqnAgent,
    episodes: usize,
    max_steps: usize,
    seed: Option<u64>,
) -> Result<EvalSummary> {
    let mut returns = Vec::with_capacity(episodes);
    let mut steps = 0u64;

    for episode in 0..episodes {
        let (mut obs, _) = env.reset(seed.map(|s| s.wrapping_add(episode as u64)));
        let mut total = 0.0f64;
        for _ in 0..max_steps {
            let action = agent.act_one(&obs, true)?;
            let result = env.step(action);
            total += result.reward as f64;
            steps += 1;
            if result.done() {
                break;
            }
            obs = result.observation;
        }
        tracing::debug!(episode, ret = total, "evaluation episode");
        returns.push(total);
    }

    let mean_return = tail_mean(&returns, returns.len());
    tracing::info!(episodes, mean_return, "evaluation finished");
    Ok(EvalSummary {
        returns,
        mean_return,
        steps,
    })
}
