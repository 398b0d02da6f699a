//! Training algorithm selection and the learning rate schedule.
//!
//! Each algorithm variant maps to an engine optimizer. AdaDelta is the
//! one the engine does not ship, so it is implemented here as a
//! [`SimpleOptimizer`] and wrapped by the same adaptor the built in
//! optimizers use. An attached optimizer owns its step scheduler and can
//! be reset to the freshly attached state without rebuilding the model.

use burn::config::Config;
use burn::lr_scheduler::step::{StepLrScheduler, StepLrSchedulerConfig};
use burn::lr_scheduler::LrScheduler;
use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{
    AdaGradConfig, AdamConfig, GradientsParams, Optimizer, RmsPropConfig, SgdConfig,
    SimpleOptimizer,
};
use burn::record::Record;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;
use burn::LearningRate;

use crate::domain::algorithm::TrainingAlgorithm;
use crate::domain::error::{ModelError, ModelResult};
use crate::domain::schedule::LrSchedule;
use crate::ml::network::SoftmaxNetwork;

/// Object safe face of the engine's [`Optimizer`] trait, so one field
/// can hold whichever algorithm was attached.
pub trait NetworkOptimizer<B: AutodiffBackend>: Send {
    fn step(
        &mut self,
        lr: LearningRate,
        network: SoftmaxNetwork<B>,
        grads: GradientsParams,
    ) -> SoftmaxNetwork<B>;
}

impl<B, O> NetworkOptimizer<B> for O
where
    B: AutodiffBackend,
    O: Optimizer<SoftmaxNetwork<B>, B>,
{
    fn step(
        &mut self,
        lr: LearningRate,
        network: SoftmaxNetwork<B>,
        grads: GradientsParams,
    ) -> SoftmaxNetwork<B> {
        Optimizer::step(self, lr, network, grads)
    }
}

fn build<B: AutodiffBackend>(algorithm: TrainingAlgorithm) -> Box<dyn NetworkOptimizer<B>> {
    match algorithm {
        TrainingAlgorithm::GradientDescent => {
            Box::new(SgdConfig::new().init::<B, SoftmaxNetwork<B>>())
        }
        TrainingAlgorithm::RmsProp => Box::new(RmsPropConfig::new().init::<B, SoftmaxNetwork<B>>()),
        TrainingAlgorithm::Adam => Box::new(AdamConfig::new().init::<B, SoftmaxNetwork<B>>()),
        TrainingAlgorithm::AdaGrad => Box::new(AdaGradConfig::new().init::<B, SoftmaxNetwork<B>>()),
        TrainingAlgorithm::AdaDelta => {
            Box::new(AdaDeltaConfig::new().init::<B, SoftmaxNetwork<B>>())
        }
    }
}

fn scheduler_for(schedule: &LrSchedule) -> ModelResult<StepLrScheduler> {
    StepLrSchedulerConfig::new(schedule.initial_lr, schedule.decay_step)
        .with_gamma(schedule.decay_rate)
        .init()
        .map_err(ModelError::InvalidConfig)
}

/// A training algorithm bound to a model, with its schedule state.
pub struct AttachedOptimizer<B: AutodiffBackend> {
    algorithm: TrainingAlgorithm,
    schedule: LrSchedule,
    scheduler: StepLrScheduler,
    optimizer: Box<dyn NetworkOptimizer<B>>,
    last_lr: LearningRate,
}

impl<B: AutodiffBackend> AttachedOptimizer<B> {
    pub fn attach(algorithm: TrainingAlgorithm, schedule: LrSchedule) -> ModelResult<Self> {
        let scheduler = scheduler_for(&schedule)?;
        Ok(Self {
            algorithm,
            scheduler,
            optimizer: build(algorithm),
            last_lr: schedule.initial_lr,
            schedule,
        })
    }

    /// Drop all accumulated optimizer and schedule state, as if the
    /// algorithm had just been attached.
    pub fn reset(&mut self) -> ModelResult<()> {
        self.scheduler = scheduler_for(&self.schedule)?;
        self.optimizer = build::<B>(self.algorithm);
        self.last_lr = self.schedule.initial_lr;
        Ok(())
    }

    /// One parameter update at the next scheduled learning rate.
    pub fn step(
        &mut self,
        network: SoftmaxNetwork<B>,
        grads: GradientsParams,
    ) -> SoftmaxNetwork<B> {
        let lr = LrScheduler::step(&mut self.scheduler);
        self.last_lr = lr;
        self.optimizer.step(lr, network, grads)
    }

    pub fn algorithm(&self) -> TrainingAlgorithm {
        self.algorithm
    }

    /// The rate most recently handed to the optimizer, or the initial
    /// rate before the first step.
    pub fn last_lr(&self) -> LearningRate {
        self.last_lr
    }
}

/// AdaDelta configuration, defaults from the paper
/// [ADADELTA: An Adaptive Learning Rate Method](https://arxiv.org/abs/1212.5701).
#[derive(Config, Debug)]
pub struct AdaDeltaConfig {
    /// Decay factor over the accumulated squared values.
    #[config(default = 0.95)]
    rho: f32,
    /// A value required for numerical stability.
    #[config(default = 1e-8)]
    epsilon: f32,
}

impl AdaDeltaConfig {
    /// Initialize AdaDelta behind the shared optimizer adaptor.
    pub fn init<B: AutodiffBackend, M: AutodiffModule<B>>(
        &self,
    ) -> OptimizerAdaptor<AdaDelta, M, B> {
        OptimizerAdaptor::from(AdaDelta {
            rho: self.rho,
            epsilon: self.epsilon,
        })
    }
}

/// AdaDelta optimizer. The learning rate scales each computed delta,
/// matching common implementations rather than the paper's unit step.
#[derive(Clone)]
pub struct AdaDelta {
    rho: f32,
    epsilon: f32,
}

/// AdaDelta state: running averages of squared gradients and squared
/// deltas.
#[derive(Record, Clone)]
pub struct AdaDeltaState<B: Backend, const D: usize> {
    pub squared_grad: Tensor<B, D>,
    pub squared_delta: Tensor<B, D>,
}

impl<B: Backend> SimpleOptimizer<B> for AdaDelta {
    type State<const D: usize> = AdaDeltaState<B, D>;

    fn step<const D: usize>(
        &self,
        lr: LearningRate,
        tensor: Tensor<B, D>,
        grad: Tensor<B, D>,
        state: Option<Self::State<D>>,
    ) -> (Tensor<B, D>, Option<Self::State<D>>) {
        let (squared_grad, squared_delta) = match state {
            Some(state) => (state.squared_grad, state.squared_delta),
            None => (grad.zeros_like(), grad.zeros_like()),
        };

        let squared_grad = squared_grad
            .mul_scalar(self.rho)
            .add(grad.clone().powf_scalar(2.0).mul_scalar(1.0 - self.rho));
        let delta = grad
            .mul(squared_delta.clone().add_scalar(self.epsilon).sqrt())
            .div(squared_grad.clone().add_scalar(self.epsilon).sqrt());
        let squared_delta = squared_delta
            .mul_scalar(self.rho)
            .add(delta.clone().powf_scalar(2.0).mul_scalar(1.0 - self.rho));

        let tensor = tensor.sub(delta.mul_scalar(lr));
        let state = AdaDeltaState {
            squared_grad,
            squared_delta,
        };
        (tensor, Some(state))
    }

    fn to_device<const D: usize>(mut state: Self::State<D>, device: &B::Device) -> Self::State<D> {
        state.squared_grad = state.squared_grad.to_device(device);
        state.squared_delta = state.squared_delta.to_device(device);
        state
    }
}
