//! Deep Q-learning with a frozen target network.

use crate::checkpoint::Checkpointable;
use crate::config::{DqnConfig, NanRewardPolicy, RewardPolicy};
use crate::network::{InputKind, QNetwork, TargetNetwork};
use crate::optim::{ClippedAdam, OptimizerSettings};
use crate::schedule::EpsilonSchedule;
use crate::{CuriosityError, Result};
use ndarray::ArrayD;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tch::{Device, Kind, Reduction, Tensor};

/// Epsilon-greedy DQN agent.
///
/// Owns the live Q-network, its frozen target copy and the optimizer. Each
/// `train` call is one gradient step; the target is re-synced every
/// `target_network_steps` steps and epsilon decays with the step count.
pub struct DqnAgent {
    network: QNetwork,
    target: TargetNetwork,
    optimizer: ClippedAdam,
    schedule: EpsilonSchedule,
    epsilon: f64,
    gamma: f64,
    target_network_steps: u64,
    reward_policy: RewardPolicy,
    train_steps: u64,
    losses: Vec<f64>,
    rng: StdRng,
}

#[derive(Serialize, Deserialize)]
struct AgentState {
    train_steps: u64,
    epsilon: f64,
    losses: Vec<f64>,
    optimizer: OptimizerSettings,
    network: Vec<u8>,
    target: Vec<u8>,
}

impl DqnAgent {
    pub fn new(
        obs_shape: &[usize],
        num_actions: usize,
        config: &DqnConfig,
        device: Device,
        seed: u64,
    ) -> Result<Self> {
        config.validate()?;
        let network = QNetwork::new(obs_shape, num_actions, &config.network, device)?;
        let target = network.snapshot()?;
        let optimizer =
            ClippedAdam::new(network.var_store(), config.learning_rate, config.max_grad_norm)?;
        let schedule = config.epsilon_schedule()?;

        tracing::debug!(
            parameters = network.num_parameters(),
            architecture = ?network.architecture(),
            "built DQN agent"
        );
        tracing::debug!(
            "epsilon at 20%: {:.4}, at 80%: {:.4}",
            schedule.value(config.train_steps / 5),
            schedule.value(config.train_steps * 4 / 5)
        );

        Ok(Self {
            network,
            target,
            optimizer,
            epsilon: schedule.value(0),
            schedule,
            gamma: config.gamma,
            target_network_steps: config.target_network_steps,
            reward_policy: config.reward_policy,
            train_steps: 0,
            losses: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Actions `[B]` (Int64) for a single state or a batch.
    ///
    /// Greedy when `eval_mode` is set or a uniform draw is at least epsilon,
    /// otherwise one uniformly random action per row.
    pub fn act(&mut self, state: &Tensor, eval_mode: bool) -> Result<Tensor> {
        let batch = match self.network.obs_shape().check_i64(&state.size())? {
            InputKind::Single => 1,
            InputKind::Batch(b) => b,
        };
        if eval_mode || self.rng.gen::<f64>() >= self.epsilon {
            let q = tch::no_grad(|| self.network.forward(state))?;
            return Ok(q.argmax(1, false));
        }
        let n = self.network.num_actions();
        let actions: Vec<i64> = (0..batch).map(|_| self.rng.gen_range(0..n)).collect();
        Ok(Tensor::from_slice(&actions))
    }

    /// `act` for one observation array
    pub fn act_one(&mut self, obs: &ArrayD<f32>, eval_mode: bool) -> Result<usize> {
        let state = crate::buffer::array_to_tensor(obs, self.network.device());
        let action = self.act(&state, eval_mode)?;
        Ok(action.int64_value(&[0]) as usize)
    }

    /// Live Q-values without a graph
    pub fn q_values(&self, state: &Tensor) -> Result<Tensor> {
        tch::no_grad(|| self.network.forward(state))
    }

    /// One Huber-loss gradient step toward
    /// `r + gamma * (1 - done) * max_a Q_target(s')`.
    ///
    /// Returns the loss, or `None` when the batch was skipped for NaN
    /// rewards under `NanRewardPolicy::Skip`.
    pub fn train(
        &mut self,
        s_t: &Tensor,
        a_t: &Tensor,
        r_t: &Tensor,
        s_tp1: &Tensor,
        done_t: &Tensor,
    ) -> Result<Option<f64>> {
        let batch = match self.network.obs_shape().check_i64(&s_t.size())? {
            InputKind::Batch(b) => b as i64,
            InputKind::Single => 1,
        };
        for t in [a_t, r_t, done_t] {
            if t.size() != [batch] {
                return Err(CuriosityError::ShapeMismatch {
                    expected: vec![batch as usize],
                    actual: t.size().iter().map(|&d| d as usize).collect(),
                });
            }
        }

        let device = self.network.device();
        let mut rewards = r_t.to_device(device).to_kind(Kind::Float);
        if rewards.isnan().any().int64_value(&[]) != 0 {
            match self.reward_policy.nan {
                NanRewardPolicy::Abort => {
                    return Err(CuriosityError::NanReward {
                        step: self.train_steps,
                    })
                }
                NanRewardPolicy::Skip => {
                    tracing::warn!(step = self.train_steps, "skipping batch with NaN reward");
                    return Ok(None);
                }
            }
        }
        if let Some(bound) = self.reward_policy.clip {
            rewards = rewards.clamp(-bound as f64, bound as f64);
        }

        let actions = a_t.to_device(device).to_kind(Kind::Int64);
        let not_done = done_t.to_device(device).to_kind(Kind::Float).neg() + 1.0;

        let q = self
            .network
            .forward(s_t)?
            .gather(1, &actions.unsqueeze(1), false)
            .squeeze_dim(1);
        let next_q = self.target.forward(s_tp1)?.max_dim(1, false).0;
        let target = (rewards + not_done * next_q * self.gamma).detach();

        let loss = q.smooth_l1_loss(&target, Reduction::Mean, 1.0);
        self.optimizer.minimize(&loss);
        let loss = loss.double_value(&[]);

        self.losses.push(loss);
        self.train_steps += 1;
        if self.train_steps % self.target_network_steps == 0 {
            self.sync_target()?;
        }
        self.epsilon = self.schedule.value(self.train_steps);
        Ok(Some(loss))
    }

    /// Copy live parameters into the target
    pub fn sync_target(&mut self) -> Result<()> {
        tracing::debug!(step = self.train_steps, "syncing target network");
        self.target.sync_from(&self.network)
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn train_steps(&self) -> u64 {
        self.train_steps
    }

    pub fn losses(&self) -> &[f64] {
        &self.losses
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn num_actions(&self) -> i64 {
        self.network.num_actions()
    }

    pub fn device(&self) -> Device {
        self.network.device()
    }

    pub fn network(&self) -> &QNetwork {
        &self.network
    }

    pub fn target(&self) -> &TargetNetwork {
        &self.target
    }
}

impl Checkpointable for DqnAgent {
    fn save_state(&self) -> Result<Vec<u8>> {
        let state = AgentState {
            train_steps: self.train_steps,
            epsilon: self.epsilon,
            losses: self.losses.clone(),
            optimizer: self.optimizer.settings(),
            network: self.network.params_to_bytes()?,
            target: self.target.params_to_bytes()?,
        };
        Ok(serde_json::to_vec(&state)?)
    }

    fn load_state(&mut self, data: &[u8]) -> Result<()> {
        let state: AgentState = serde_json::from_slice(data)?;
        self.network.params_from_bytes(&state.network)?;
        self.target.params_from_bytes(&state.target)?;
        self.optimizer.apply_settings(state.optimizer);
        self.train_steps = state.train_steps;
        self.epsilon = state.epsilon;
        self.losses = state.losses;
        Ok(())
    }
}

#[cfg(all(test, feature = "torch"))]
mod tests {
    use super::*;

    fn config(target_steps: u64) -> DqnConfig {
        DqnConfig {
            train_steps: 1000,
            target_network_steps: target_steps,
            ..Default::default()
        }
    }

    fn agent(target_steps: u64) -> DqnAgent {
        DqnAgent::new(&[4], 3, &config(target_steps), Device::Cpu, 7).unwrap()
    }

    fn batch(b: i64) -> (Tensor, Tensor, Tensor, Tensor, Tensor) {
        let opts = (Kind::Float, Device::Cpu);
        (
            Tensor::rand([b, 4], opts),
            Tensor::from_slice(&vec![1i64; b as usize]),
            Tensor::ones([b], opts),
            Tensor::rand([b, 4], opts),
            Tensor::zeros([b], opts),
        )
    }

    fn same_params(agent: &DqnAgent) -> bool {
        let target = agent.target().var_store().variables();
        agent
            .network()
            .var_store()
            .variables()
            .iter()
            .all(|(k, v)| v.equal(&target[k]))
    }

    #[test]
    fn test_eval_act_is_argmax() {
        let mut agent = agent(10);
        let states = Tensor::rand([16, 4], (Kind::Float, Device::Cpu));
        let greedy = agent.q_values(&states).unwrap().argmax(1, false);
        let acted = agent.act(&states, true).unwrap();
        assert!(acted.equal(&greedy));
    }

    #[test]
    fn test_exploration_shapes() {
        let mut agent = agent(10);
        assert_eq!(agent.epsilon(), 1.0);
        let single = agent.act(&Tensor::zeros([4], (Kind::Float, Device::Cpu)), false).unwrap();
        assert_eq!(single.size(), vec![1]);
        let batch = agent.act(&Tensor::zeros([6, 4], (Kind::Float, Device::Cpu)), false).unwrap();
        assert_eq!(batch.size(), vec![6]);
        let max = batch.max().int64_value(&[]);
        assert!((0..3).contains(&max));
    }

    #[test]
    fn test_target_syncs_on_interval() {
        let mut agent = agent(3);
        let (s, a, r, s2, d) = batch(8);
        assert!(same_params(&agent));

        agent.train(&s, &a, &r, &s2, &d).unwrap();
        assert!(!same_params(&agent));
        agent.train(&s, &a, &r, &s2, &d).unwrap();
        assert!(!same_params(&agent));
        agent.train(&s, &a, &r, &s2, &d).unwrap();
        assert!(same_params(&agent));

        assert_eq!(agent.train_steps(), 3);
        assert_eq!(agent.losses().len(), 3);
        assert!(agent.epsilon() < 1.0);
    }

    #[test]
    fn test_target_does_not_drift_between_syncs() {
        let mut agent = agent(3);
        let (s, a, r, s2, d) = batch(8);
        let frozen: Vec<(String, Tensor)> = agent
            .target()
            .var_store()
            .variables()
            .into_iter()
            .map(|(k, v)| (k, v.copy()))
            .collect();
        let unchanged = |agent: &DqnAgent| {
            let current = agent.target().var_store().variables();
            frozen.iter().all(|(k, v)| v.equal(&current[k]))
        };

        agent.train(&s, &a, &r, &s2, &d).unwrap();
        assert!(unchanged(&agent));
        agent.train(&s, &a, &r, &s2, &d).unwrap();
        assert!(unchanged(&agent));

        // third step resyncs to the trained live network
        agent.train(&s, &a, &r, &s2, &d).unwrap();
        assert!(!unchanged(&agent));
        assert!(same_params(&agent));
    }

    #[test]
    fn test_rank_checks() {
        let mut agent = agent(10);
        let (s, a, r, s2, d) = batch(8);
        let bad_rewards = r.unsqueeze(1);
        let err = agent.train(&s, &a, &bad_rewards, &s2, &d).unwrap_err();
        assert!(matches!(err, CuriosityError::ShapeMismatch { .. }));
        assert_eq!(agent.train_steps(), 0);
    }

    #[test]
    fn test_nan_policy() {
        let (s, a, _, s2, d) = batch(4);
        let r = Tensor::from_slice(&[0.0f32, f32::NAN, 1.0, 0.0]);

        let mut abort = agent(10);
        let err = abort.train(&s, &a, &r, &s2, &d).unwrap_err();
        assert!(matches!(err, CuriosityError::NanReward { step: 0 }));

        let mut cfg = config(10);
        cfg.reward_policy.nan = NanRewardPolicy::Skip;
        let mut skip = DqnAgent::new(&[4], 3, &cfg, Device::Cpu, 7).unwrap();
        assert_eq!(skip.train(&s, &a, &r, &s2, &d).unwrap(), None);
        assert_eq!(skip.train_steps(), 0);
    }

    #[test]
    fn test_checkpoint_restores_state() {
        let mut trained = agent(2);
        let (s, a, r, s2, d) = batch(8);
        for _ in 0..5 {
            trained.train(&s, &a, &r, &s2, &d).unwrap();
        }
        let blob = trained.save_state().unwrap();

        let mut fresh = DqnAgent::new(&[4], 3, &config(2), Device::Cpu, 99).unwrap();
        fresh.load_state(&blob).unwrap();
        assert_eq!(fresh.train_steps(), 5);
        assert!((fresh.epsilon() - trained.epsilon()).abs() < 1e-12);
        assert_eq!(fresh.losses().len(), 5);
        for (x, y) in fresh.losses().iter().zip(trained.losses()) {
            assert!((x - y).abs() < 1e-12);
        }

        let inputs = Tensor::rand([3, 4], (Kind::Float, Device::Cpu));
        assert!(fresh
            .q_values(&inputs)
            .unwrap()
            .allclose(&trained.q_values(&inputs).unwrap(), 1e-6, 1e-6, false));
    }
}
