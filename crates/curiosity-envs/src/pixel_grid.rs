//! Grid navigation rendered as single-channel frames.

use curiosity::env::{Env, EnvInfo, StepResult};
use curiosity::spaces::{Box as BoxSpace, Discrete, DynSpace};
use curiosity::{CuriosityError, Result};
use ndarray::{ArrayD, IxDyn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const AGENT: f32 = 1.0;
const GOAL: f32 = 0.5;

/// An agent walks a `cells x cells` grid towards a goal cell.
///
/// Each cell is drawn as a `cell_px x cell_px` block, so observations are
/// `[1, cells * cell_px, cells * cell_px]` frames in `[0, 1]`: the agent at
/// full brightness, the goal at half.
///
/// Actions: 0 = up, 1 = down, 2 = left, 3 = right. Reaching the goal pays 1
/// and terminates; episodes are truncated after `max_steps`.
pub struct PixelGrid {
    cells: usize,
    cell_px: usize,
    max_steps: u32,
    agent: (usize, usize),
    goal: (usize, usize),
    steps: u32,
    rng: StdRng,
}

impl PixelGrid {
    /// Fails with `InvalidConfig` for fewer than 2x2 cells or empty cells.
    pub fn new(cells: usize, cell_px: usize) -> Result<Self> {
        if cells < 2 || cell_px == 0 {
            return Err(CuriosityError::InvalidConfig(format!(
                "pixel grid needs at least 2x2 cells of at least 1px, got {cells} cells of {cell_px}px"
            )));
        }
        Ok(Self::build(cells, cell_px))
    }

    fn build(cells: usize, cell_px: usize) -> Self {
        Self {
            cells,
            cell_px,
            max_steps: 100,
            agent: (0, 0),
            goal: (cells - 1, cells - 1),
            steps: 0,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Side length of a frame in pixels
    pub fn frame_size(&self) -> usize {
        self.cells * self.cell_px
    }

    pub fn agent(&self) -> (usize, usize) {
        self.agent
    }

    pub fn goal(&self) -> (usize, usize) {
        self.goal
    }

    fn random_cell(&mut self) -> (usize, usize) {
        (
            self.rng.gen_range(0..self.cells),
            self.rng.gen_range(0..self.cells),
        )
    }

    fn observation(&self) -> ArrayD<f32> {
        let px = self.cell_px;
        ArrayD::from_shape_fn(IxDyn(&[1, self.frame_size(), self.frame_size()]), |idx| {
            let cell = (idx[1] / px, idx[2] / px);
            if cell == self.agent {
                AGENT
            } else if cell == self.goal {
                GOAL
            } else {
                0.0
            }
        })
    }
}

impl Default for PixelGrid {
    /// 6x6 cells of 6 pixels: 36x36 frames
    fn default() -> Self {
        Self::build(6, 6)
    }
}

impl Env for PixelGrid {
    fn observation_space(&self) -> DynSpace {
        DynSpace::Box(BoxSpace::unit(&[1, self.frame_size(), self.frame_size()]))
    }

    fn action_space(&self) -> DynSpace {
        DynSpace::Discrete(Discrete::new(4))
    }

    fn reset(&mut self, seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
        if let Some(s) = seed {
            self.rng = StdRng::seed_from_u64(s);
        }
        self.goal = self.random_cell();
        self.agent = self.random_cell();
        while self.agent == self.goal {
            self.agent = self.random_cell();
        }
        self.steps = 0;
        (self.observation(), EnvInfo::new())
    }

    fn step(&mut self, action: usize) -> StepResult {
        let (row, col) = self.agent;
        let last = self.cells - 1;
        self.agent = match action {
            0 => (row.saturating_sub(1), col),
            1 => ((row + 1).min(last), col),
            2 => (row, col.saturating_sub(1)),
            3 => (row, (col + 1).min(last)),
            _ => (row, col),
        };
        self.steps += 1;

        let terminated = self.agent == self.goal;
        let truncated = !terminated && self.steps >= self.max_steps;
        let reward = if terminated { 1.0 } else { 0.0 };
        let info = if terminated || truncated {
            EnvInfo::new().with_episode_stats(reward, self.steps)
        } else {
            EnvInfo::new()
        };

        StepResult {
            observation: self.observation(),
            reward,
            terminated,
            truncated,
            info,
        }
    }

    fn render(&self) -> Option<String> {
        let mut out = String::new();
        for r in 0..self.cells {
            for c in 0..self.cells {
                out.push(if (r, c) == self.agent {
                    'A'
                } else if (r, c) == self.goal {
                    'G'
                } else {
                    '.'
                });
            }
            out.push('\n');
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_frame_shape() {
        let mut env = PixelGrid::default();
        let (obs, _) = env.reset(Some(1));
        assert_eq!(obs.shape(), &[1, 36, 36]);
        assert!(env.observation_space().contains(&obs));
        assert_ne!(env.agent(), env.goal());

        let lit = obs.iter().filter(|&&v| v == AGENT).count();
        assert_eq!(lit, 36);
    }

    #[test]
    fn test_walls_clamp_movement() {
        let mut env = PixelGrid::new(3, 2).unwrap();
        env.reset(Some(5));
        for _ in 0..5 {
            env.step(0);
            env.step(2);
        }
        assert_eq!(env.agent(), (0, 0));
    }

    #[test]
    fn test_reaching_goal_terminates() {
        let mut env = PixelGrid::new(4, 1).unwrap();
        env.reset(Some(9));
        let goal = env.goal();

        let mut result = None;
        while env.agent() != goal {
            let (r, c) = env.agent();
            let action = if r < goal.0 {
                1
            } else if r > goal.0 {
                0
            } else if c < goal.1 {
                3
            } else {
                2
            };
            result = Some(env.step(action));
        }
        let result = result.unwrap();
        assert!(result.terminated);
        assert_eq!(result.reward, 1.0);
        assert_eq!(result.info.episode_return, Some(1.0));
    }

    #[test]
    fn test_truncation() {
        let mut env = PixelGrid::new(5, 1).unwrap().with_max_steps(2);
        env.reset(Some(0));
        // an unknown action leaves the agent in place
        assert!(!env.step(7).done());
        let result = env.step(7);
        assert!(result.truncated);
        assert!(!result.terminated);
    }

    #[test]
    fn test_render_marks_agent_and_goal() {
        let mut env = PixelGrid::new(3, 1).unwrap();
        env.reset(Some(2));
        let text = env.render().unwrap();
        assert_eq!(text.matches('A').count(), 1);
        assert_eq!(text.matches('G').count(), 1);
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_rejects_degenerate_grids() {
        assert!(matches!(
            PixelGrid::new(1, 4),
            Err(CuriosityError::InvalidConfig(_))
        ));
        assert!(PixelGrid::new(4, 0).is_err());
        assert_eq!(PixelGrid::new(2, 1).unwrap().frame_size(), 2);
    }
}
