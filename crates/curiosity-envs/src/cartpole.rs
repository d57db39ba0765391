//! CartPole classic control environment.

use curiosity::env::{Env, EnvInfo, StepResult};
use curiosity::spaces::{Box as BoxSpace, Discrete, DynSpace};
use ndarray::{ArrayD, IxDyn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;

/// CartPole environment
///
/// A pole is attached to a cart on a frictionless track. The goal
/// is to balance the pole by applying forces to the cart.
///
/// Observation: [cart_pos, cart_vel, pole_angle, pole_vel]
/// Action: 0 = push left, 1 = push right
pub struct CartPole {
    gravity: f32,
    mass_pole: f32,
    total_mass: f32,
    length: f32, // half-pole length
    pole_mass_length: f32,
    force_mag: f32,
    tau: f32,

    theta_threshold: f32,
    x_threshold: f32,
    max_steps: u32,

    state: [f32; 4], // x, x_dot, theta, theta_dot
    steps: u32,
    episode_return: f32,
    rng: StdRng,
}

impl CartPole {
    pub fn new() -> Self {
        let mass_cart = 1.0;
        let mass_pole = 0.1;
        let length = 0.5;

        Self {
            gravity: 9.8,
            mass_pole,
            total_mass: mass_cart + mass_pole,
            length,
            pole_mass_length: mass_pole * length,
            force_mag: 10.0,
            tau: 0.02,
            theta_threshold: 12.0 * 2.0 * PI / 360.0,
            x_threshold: 2.4,
            max_steps: 500,
            state: [0.0; 4],
            steps: 0,
            episode_return: 0.0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Truncate episodes after `max_steps` steps
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    fn is_terminal(&self) -> bool {
        self.state[0].abs() > self.x_threshold || self.state[2].abs() > self.theta_threshold
    }

    fn observation(&self) -> ArrayD<f32> {
        ArrayD::from_shape_fn(IxDyn(&[4]), |idx| self.state[idx[0]])
    }
}

impl Default for CartPole {
    fn default() -> Self {
        Self::new()
    }
}

impl Env for CartPole {
    fn observation_space(&self) -> DynSpace {
        DynSpace::Box(BoxSpace::uniform(&[4], -4.8, 4.8))
    }

    fn action_space(&self) -> DynSpace {
        DynSpace::Discrete(Discrete::new(2))
    }

    fn reset(&mut self, seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
        if let Some(s) = seed {
            self.rng = StdRng::seed_from_u64(s);
        }
        for v in self.state.iter_mut() {
            *v = self.rng.gen_range(-0.05..0.05);
        }
        self.steps = 0;
        self.episode_return = 0.0;
        (self.observation(), EnvInfo::new())
    }

    fn step(&mut self, action: usize) -> StepResult {
        let [x, x_dot, theta, theta_dot] = self.state;
        // anything but 1 pushes left
        let force = if action == 1 {
            self.force_mag
        } else {
            -self.force_mag
        };

        let cos_theta = theta.cos();
        let sin_theta = theta.sin();
        let temp = (force + self.pole_mass_length * theta_dot * theta_dot * sin_theta)
            / self.total_mass;
        let theta_acc = (self.gravity * sin_theta - cos_theta * temp)
            / (self.length
                * (4.0 / 3.0 - self.mass_pole * cos_theta * cos_theta / self.total_mass));
        let x_acc = temp - self.pole_mass_length * theta_acc * cos_theta / self.total_mass;

        // Euler integration
        self.state[0] = x + self.tau * x_dot;
        self.state[1] = x_dot + self.tau * x_acc;
        self.state[2] = theta + self.tau * theta_dot;
        self.state[3] = theta_dot + self.tau * theta_acc;
        self.steps += 1;

        let terminated = self.is_terminal();
        let truncated = !terminated && self.steps >= self.max_steps;
        let reward = if terminated { 0.0 } else { 1.0 };
        self.episode_return += reward;

        let info = if terminated || truncated {
            EnvInfo::new().with_episode_stats(self.episode_return, self.steps)
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
        let [x, _, theta, _] = self.state;
        let cart_pos = (((x + 2.4) / 4.8 * 20.0) as i32).clamp(0, 20) as usize;

        let mut line = vec![' '; 21];
        line[cart_pos] = if theta.abs() < 0.1 { '|' } else { '/' };
        Some(format!("[{}]", line.iter().collect::<String>()))
    }
}
