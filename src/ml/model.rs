//! The model lifecycle: loss, accuracy, and the training surface.
//!
//! A [`DigitClassifier`] wraps a network with everything training needs:
//! an optional weight penalty, an attached training algorithm, and the
//! initializer snapshot that `initialize` restores. The lifecycle is
//! strict on purpose. Training demands an attached algorithm and an
//! initialized model, and every inspection of a live model demands
//! initialization first, so a misconfigured experiment fails loudly
//! instead of reporting numbers from an undefined state.

use burn::module::AutodiffModule;
use burn::optim::GradientsParams;
use burn::tensor::activation::log_softmax;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor, TensorData};

use crate::domain::algorithm::TrainingAlgorithm;
use crate::domain::error::{ModelError, ModelResult};
use crate::domain::network::{LayerKind, MaskPolicy};
use crate::domain::schedule::LrSchedule;
use crate::ml::network::SoftmaxNetwork;
use crate::ml::optimizer::AttachedOptimizer;
use crate::ml::regularizer::{Regularizer, ResolvedPenalty};

/// Mean softmax cross entropy between raw scores and one hot targets.
pub fn softmax_cross_entropy<B: Backend>(
    logit: Tensor<B, 2>,
    targets: Tensor<B, 2>,
) -> Tensor<B, 1> {
    (targets * log_softmax(logit, 1)).sum_dim(1).neg().mean()
}

/// Fraction of rows where prediction and target pick the same class.
pub fn classification_accuracy<B: Backend>(output: Tensor<B, 2>, targets: Tensor<B, 2>) -> f64 {
    let [batch_size, _] = output.dims();
    let correct = output
        .argmax(1)
        .equal(targets.argmax(1))
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>();
    correct as f64 / batch_size as f64
}

/// A digit classification model with its full training lifecycle.
///
/// The happy path is: build a network, [`attach_optimizer`], optionally
/// [`add_regularizer`], then [`create_initializer`] and [`initialize`],
/// and finally alternate [`train`] with [`compute_accuracy`].
///
/// [`attach_optimizer`]: DigitClassifier::attach_optimizer
/// [`add_regularizer`]: DigitClassifier::add_regularizer
/// [`create_initializer`]: DigitClassifier::create_initializer
/// [`initialize`]: DigitClassifier::initialize
/// [`train`]: DigitClassifier::train
/// [`compute_accuracy`]: DigitClassifier::compute_accuracy
pub struct DigitClassifier<B: AutodiffBackend> {
    network: SoftmaxNetwork<B>,
    penalty: Option<ResolvedPenalty>,
    optimizer: Option<AttachedOptimizer<B>>,
    snapshot: Option<SoftmaxNetwork<B>>,
    mask_policy: MaskPolicy,
    initialized: bool,
}

impl<B: AutodiffBackend> DigitClassifier<B> {
    pub fn new(network: SoftmaxNetwork<B>) -> Self {
        Self {
            network,
            penalty: None,
            optimizer: None,
            snapshot: None,
            mask_policy: MaskPolicy::default(),
            initialized: false,
        }
    }

    pub fn with_mask_policy(mut self, policy: MaskPolicy) -> Self {
        self.mask_policy = policy;
        self
    }

    /// Resolve a weight penalty against this network. Replaces any
    /// penalty set earlier.
    pub fn add_regularizer(&mut self, regularizer: Regularizer) -> ModelResult<()> {
        self.penalty = Some(regularizer.resolve(self.network.layers.len())?);
        Ok(())
    }

    /// Bind a training algorithm and learning rate schedule. Replaces
    /// any algorithm attached earlier, dropping its accumulated state.
    pub fn attach_optimizer(
        &mut self,
        algorithm: TrainingAlgorithm,
        schedule: LrSchedule,
    ) -> ModelResult<()> {
        self.optimizer = Some(AttachedOptimizer::attach(algorithm, schedule)?);
        Ok(())
    }

    /// [`attach_optimizer`](Self::attach_optimizer) by name or ordinal,
    /// as accepted by [`TrainingAlgorithm::from_selector`].
    pub fn attach_optimizer_by_selector(
        &mut self,
        selector: &str,
        schedule: LrSchedule,
    ) -> ModelResult<()> {
        self.attach_optimizer(TrainingAlgorithm::from_selector(selector)?, schedule)
    }

    /// Capture the current parameter values as the initializer state.
    pub fn create_initializer(&mut self) {
        self.snapshot = Some(self.network.clone());
    }

    /// Restore the initializer snapshot and restart the attached
    /// algorithm's schedule and state.
    pub fn initialize(&mut self) -> ModelResult<()> {
        let snapshot = match &self.snapshot {
            Some(snapshot) => snapshot.clone(),
            None => return Err(ModelError::NotReady("the initializer has not been created")),
        };
        self.network = snapshot;
        if let Some(optimizer) = self.optimizer.as_mut() {
            optimizer.reset()?;
        }
        self.initialized = true;
        Ok(())
    }

    /// One optimization step over a batch. Returns the batch loss, the
    /// weight penalty included when one is configured.
    pub fn train(
        &mut self,
        images: Tensor<B, 2>,
        targets: Tensor<B, 2>,
        keep_prob: f64,
    ) -> ModelResult<f64> {
        let Some(optimizer) = self.optimizer.as_mut() else {
            return Err(ModelError::NotReady("the training algorithm has not been set"));
        };
        if !self.initialized {
            return Err(ModelError::NotReady(
                "the model has not been created and initialized",
            ));
        }
        if !(keep_prob > 0.0 && keep_prob <= 1.0) {
            return Err(ModelError::InvalidConfig(format!(
                "keep probability {keep_prob} is outside (0, 1]"
            )));
        }

        let pass = self.network.forward(images, keep_prob);
        let mut loss = softmax_cross_entropy(pass.logit, targets);
        if let Some(penalty) = &self.penalty {
            if let Some(term) = self.network.penalty_term(penalty) {
                loss = loss + term;
            }
        }
        let loss_value = loss.clone().into_scalar().elem::<f64>();

        let grads = GradientsParams::from_grads(loss.backward(), &self.network);
        let mut network = optimizer.step(self.network.clone(), grads);
        if self.mask_policy == MaskPolicy::ReapplyAfterStep {
            network = network.reapply_masks();
        }
        self.network = network;
        Ok(loss_value)
    }

    /// Classification accuracy over a batch, dropout disabled.
    pub fn compute_accuracy(
        &self,
        images: Tensor<B::InnerBackend, 2>,
        targets: Tensor<B::InnerBackend, 2>,
    ) -> ModelResult<f64> {
        self.ensure_initialized()?;
        let pass = self.network.valid().forward(images, 1.0);
        Ok(classification_accuracy(pass.output, targets))
    }

    /// Every layer input the forward pass produced for this batch, with
    /// the final logit and output appended.
    pub fn get_fw_signals(
        &self,
        images: Tensor<B::InnerBackend, 2>,
    ) -> ModelResult<Vec<TensorData>> {
        self.ensure_initialized()?;
        let pass = self.network.valid().forward(images, 1.0);
        Ok(pass.into_signal_data())
    }

    /// Stored weight values per layer, unmasked.
    pub fn get_weights(&self) -> ModelResult<Vec<TensorData>> {
        self.ensure_initialized()?;
        Ok(self.network.weights())
    }

    /// Stored bias values per layer, unmasked.
    pub fn get_biases(&self) -> ModelResult<Vec<TensorData>> {
        self.ensure_initialized()?;
        Ok(self.network.biases())
    }

    pub fn get_layer_types(&self) -> Vec<LayerKind> {
        self.network.layer_kinds()
    }

    /// The learning rate most recently applied by [`train`], or the
    /// schedule's initial rate before the first step.
    ///
    /// [`train`]: DigitClassifier::train
    pub fn learning_rate(&self) -> ModelResult<f64> {
        match &self.optimizer {
            Some(optimizer) => Ok(optimizer.last_lr()),
            None => Err(ModelError::NotReady("the training algorithm has not been set")),
        }
    }

    pub fn algorithm(&self) -> Option<TrainingAlgorithm> {
        self.optimizer.as_ref().map(AttachedOptimizer::algorithm)
    }

    pub fn network(&self) -> &SoftmaxNetwork<B> {
        &self.network
    }

    fn ensure_initialized(&self) -> ModelResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(ModelError::NotReady(
                "the model has not been created and initialized",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::layer::Layer;
    use crate::ml::network::NetworkBuilder;
    use crate::ml::regularizer::PenaltyWeights;

    type TestBackend = burn::backend::NdArray<f32>;
    type TestAutodiffBackend = burn::backend::Autodiff<TestBackend>;

    fn device() -> <TestAutodiffBackend as Backend>::Device {
        Default::default()
    }

    /// One dense softmax layer with an identity weight and zero bias.
    fn identity_network(
        device: &<TestAutodiffBackend as Backend>::Device,
    ) -> SoftmaxNetwork<TestAutodiffBackend> {
        let weight = Tensor::from_data(TensorData::from([[1.0f32, 0.0], [0.0, 1.0]]), device);
        let bias = Tensor::from_data(TensorData::from([0.0f32, 0.0]), device);
        NetworkBuilder::new().dense(weight, bias).finish().unwrap()
    }

    /// One dense softmax layer keeping only the diagonal weights.
    fn masked_network(
        device: &<TestAutodiffBackend as Backend>::Device,
    ) -> SoftmaxNetwork<TestAutodiffBackend> {
        let weight = Tensor::from_data(TensorData::from([[0.5f32, 0.5], [0.5, 0.5]]), device);
        let bias = Tensor::from_data(TensorData::from([0.0f32, 0.0]), device);
        let weight_mask = Tensor::from_data(TensorData::from([[1.0f32, 0.0], [0.0, 1.0]]), device);
        let bias_mask = Tensor::from_data(TensorData::from([1.0f32, 1.0]), device);
        NetworkBuilder::new()
            .masked_dense(weight, bias, weight_mask, bias_mask)
            .finish()
            .unwrap()
    }

    fn separable_batch(
        device: &<TestAutodiffBackend as Backend>::Device,
    ) -> (Tensor<TestAutodiffBackend, 2>, Tensor<TestAutodiffBackend, 2>) {
        let images = Tensor::from_data(TensorData::from([[1.0f32, 0.0], [0.0, 1.0]]), device);
        let targets = Tensor::from_data(TensorData::from([[1.0f32, 0.0], [0.0, 1.0]]), device);
        (images, targets)
    }

    fn ready_classifier(
        device: &<TestAutodiffBackend as Backend>::Device,
        algorithm: TrainingAlgorithm,
        schedule: LrSchedule,
    ) -> DigitClassifier<TestAutodiffBackend> {
        let mut classifier = DigitClassifier::new(identity_network(device));
        classifier.attach_optimizer(algorithm, schedule).unwrap();
        classifier.create_initializer();
        classifier.initialize().unwrap();
        classifier
    }

    const FLAT_SCHEDULE: LrSchedule = LrSchedule {
        initial_lr: 0.5,
        decay_rate: 1.0,
        decay_step: 100,
    };

    #[test]
    fn cross_entropy_on_uniform_logits_is_ln_of_class_count() {
        let device = Default::default();
        let logit = Tensor::<TestBackend, 2>::zeros([2, 4], &device);
        let targets = Tensor::<TestBackend, 2>::from_data(
            TensorData::from([[1.0f32, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0]]),
            &device,
        );

        let loss = softmax_cross_entropy(logit, targets).into_scalar();

        assert!((loss - 4.0f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn accuracy_counts_argmax_agreement() {
        let device = Default::default();
        let output = Tensor::<TestBackend, 2>::from_data(
            TensorData::from([[0.9f32, 0.1], [0.2, 0.8], [0.6, 0.4]]),
            &device,
        );
        let targets = Tensor::<TestBackend, 2>::from_data(
            TensorData::from([[1.0f32, 0.0], [1.0, 0.0], [1.0, 0.0]]),
            &device,
        );

        let accuracy = classification_accuracy(output, targets);

        assert!((accuracy - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn train_before_attaching_an_algorithm_is_not_ready() {
        let device = device();
        let mut classifier = DigitClassifier::new(identity_network(&device));
        classifier.create_initializer();
        classifier.initialize().unwrap();
        let weights_before = classifier.get_weights().unwrap();
        let (images, targets) = separable_batch(&device);

        let err = classifier.train(images, targets, 1.0).unwrap_err();

        assert!(err.to_string().contains("training algorithm"));
        assert_eq!(classifier.get_weights().unwrap(), weights_before);
    }

    #[test]
    fn train_before_initialize_is_not_ready() {
        let device = device();
        let mut classifier = DigitClassifier::new(identity_network(&device));
        classifier
            .attach_optimizer(TrainingAlgorithm::Adam, LrSchedule::default())
            .unwrap();
        let (images, targets) = separable_batch(&device);

        let err = classifier.train(images, targets, 1.0).unwrap_err();

        assert!(err.to_string().contains("created and initialized"));
    }

    #[test]
    fn initialize_without_creating_the_initializer_is_not_ready() {
        let device = device();
        let mut classifier = DigitClassifier::new(identity_network(&device));

        let err = classifier.initialize().unwrap_err();

        assert!(err.to_string().contains("initializer"));
    }

    #[test]
    fn inspection_before_initialize_is_not_ready() {
        let device = device();
        let classifier = DigitClassifier::new(identity_network(&device));
        let images = Tensor::<TestBackend, 2>::ones([1, 2], &device);

        assert!(classifier.get_fw_signals(images).is_err());
        assert!(classifier.get_weights().is_err());
        assert!(classifier.get_biases().is_err());
    }

    #[test]
    fn unknown_selector_is_invalid_and_leaves_the_model_usable() {
        let device = device();
        let mut classifier = DigitClassifier::new(identity_network(&device));

        let err = classifier
            .attach_optimizer_by_selector("Foo", LrSchedule::default())
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidConfig(_)));

        classifier
            .attach_optimizer_by_selector("4", LrSchedule::default())
            .unwrap();
        assert_eq!(classifier.algorithm(), Some(TrainingAlgorithm::AdaDelta));

        classifier.create_initializer();
        classifier.initialize().unwrap();
        let images =
            Tensor::<TestBackend, 2>::from_data(TensorData::from([[1.0f32, 0.0]]), &device);
        let targets =
            Tensor::<TestBackend, 2>::from_data(TensorData::from([[1.0f32, 0.0]]), &device);
        let accuracy = classifier.compute_accuracy(images, targets).unwrap();
        assert!((accuracy - 1.0).abs() < 1e-9);
    }

    #[test]
    fn reattaching_replaces_the_algorithm() {
        let device = device();
        let mut classifier = DigitClassifier::new(identity_network(&device));

        classifier
            .attach_optimizer_by_selector("1", LrSchedule::default())
            .unwrap();
        assert_eq!(classifier.algorithm(), Some(TrainingAlgorithm::RmsProp));

        classifier
            .attach_optimizer_by_selector("GD", FLAT_SCHEDULE)
            .unwrap();
        assert_eq!(classifier.algorithm(), Some(TrainingAlgorithm::GradientDescent));
    }

    #[test]
    fn identity_network_reports_its_signals() {
        let device = device();
        let mut classifier = DigitClassifier::new(identity_network(&device));
        classifier.create_initializer();
        classifier.initialize().unwrap();
        let input = TensorData::from([[0.25f32, 0.75]]);
        let images = Tensor::<TestBackend, 2>::from_data(input.clone(), &device);

        let signals = classifier.get_fw_signals(images).unwrap();

        // Layer input, logit, output. The identity weight and zero bias
        // make the logit equal to the input exactly.
        assert_eq!(signals.len(), 3);
        assert_eq!(signals[0], input);
        assert_eq!(signals[1], input);
        signals[2].assert_approx_eq(&TensorData::from([[0.37754f32, 0.62246]]), 4);
    }

    #[test]
    fn initialize_restores_the_snapshot_and_restarts_the_schedule() {
        let device = device();
        let mut classifier = ready_classifier(
            &device,
            TrainingAlgorithm::GradientDescent,
            LrSchedule::new(0.4, 0.5, 1),
        );
        let weights_before = classifier.get_weights().unwrap();
        let (images, targets) = separable_batch(&device);

        classifier
            .train(images.clone(), targets.clone(), 1.0)
            .unwrap();
        assert_eq!(classifier.learning_rate().unwrap(), 0.4);
        assert_ne!(classifier.get_weights().unwrap(), weights_before);

        classifier.train(images.clone(), targets.clone(), 1.0).unwrap();
        assert_eq!(classifier.learning_rate().unwrap(), 0.2);

        classifier.initialize().unwrap();
        assert_eq!(classifier.get_weights().unwrap(), weights_before);
        assert_eq!(classifier.learning_rate().unwrap(), 0.4);

        classifier.train(images, targets, 1.0).unwrap();
        assert_eq!(classifier.learning_rate().unwrap(), 0.4);
    }

    #[test]
    fn reapply_policy_zeroes_stored_parameters_after_steps() {
        let device = device();
        let mut classifier = DigitClassifier::new(masked_network(&device));
        classifier
            .attach_optimizer(TrainingAlgorithm::Adam, LrSchedule::default())
            .unwrap();
        // A per tensor penalty reaches the single layer; a uniform one
        // would leave the first two tensors alone.
        classifier
            .add_regularizer(Regularizer::new(
                PenaltyWeights::None,
                PenaltyWeights::PerTensor(vec![0.7]),
            ))
            .unwrap();
        classifier.create_initializer();
        classifier.initialize().unwrap();
        let (images, targets) = separable_batch(&device);

        for _ in 0..5 {
            classifier
                .train(images.clone(), targets.clone(), 1.0)
                .unwrap();
        }

        let weights = classifier.get_weights().unwrap();
        let values = weights[0].to_vec::<f32>().unwrap();
        // Row major [[w00, w01], [w10, w11]]; the mask keeps the diagonal.
        assert_eq!(values[1], 0.0);
        assert_eq!(values[2], 0.0);
        assert!(values[0] != 0.0);
        assert!(values[3] != 0.0);
    }

    #[test]
    fn forward_only_policy_lets_stored_parameters_drift() {
        let device = device();
        let mut classifier = DigitClassifier::new(masked_network(&device))
            .with_mask_policy(MaskPolicy::ForwardOnly);
        classifier
            .attach_optimizer(TrainingAlgorithm::GradientDescent, FLAT_SCHEDULE)
            .unwrap();
        classifier
            .add_regularizer(Regularizer::new(
                PenaltyWeights::None,
                PenaltyWeights::PerTensor(vec![0.5]),
            ))
            .unwrap();
        classifier.create_initializer();
        classifier.initialize().unwrap();
        let (images, targets) = separable_batch(&device);

        for _ in 0..3 {
            classifier
                .train(images.clone(), targets.clone(), 1.0)
                .unwrap();
        }

        // Masked entries receive only the l2 pull toward zero:
        // w <- w * (1 - lr * 0.5) per step, so 0.5 * 0.875^3.
        let weights = classifier.get_weights().unwrap();
        let values = weights[0].to_vec::<f32>().unwrap();
        assert!((values[1] - 0.5 * 0.75f32.powi(3)).abs() < 1e-5);
        assert!((values[2] - 0.5 * 0.75f32.powi(3)).abs() < 1e-5);

        // The mask still silences them in every forward pass.
        match &classifier.network().layers[0] {
            Layer::Dense(dense) => {
                let effective = dense.effective_weight().into_data().to_vec::<f32>().unwrap();
                assert_eq!(effective[1], 0.0);
                assert_eq!(effective[2], 0.0);
            }
            Layer::Conv(_) => panic!("the test network is dense"),
        }
    }

    #[test]
    fn uniform_penalty_exempts_a_single_layer_network() {
        let device = device();
        let (images, targets) = separable_batch(&device);

        let mut plain = ready_classifier(
            &device,
            TrainingAlgorithm::GradientDescent,
            FLAT_SCHEDULE,
        );
        let mut penalized = ready_classifier(
            &device,
            TrainingAlgorithm::GradientDescent,
            FLAT_SCHEDULE,
        );
        penalized.add_regularizer(Regularizer::l2(0.9)).unwrap();

        plain.train(images.clone(), targets.clone(), 1.0).unwrap();
        penalized.train(images, targets, 1.0).unwrap();

        // Both tensors of the single layer fall inside the exempt
        // prefix, so the penalized run must match the plain one.
        assert_eq!(plain.get_weights().unwrap(), penalized.get_weights().unwrap());
    }

    #[test]
    fn mismatched_per_tensor_penalty_is_rejected() {
        let device = device();
        let mut classifier = DigitClassifier::new(identity_network(&device));

        let err = classifier
            .add_regularizer(Regularizer::new(
                PenaltyWeights::PerTensor(vec![0.1, 0.2]),
                PenaltyWeights::None,
            ))
            .unwrap_err();

        assert!(matches!(err, ModelError::InvalidConfig(_)));
    }

    #[test]
    fn training_reduces_the_loss_on_a_separable_batch() {
        let device = device();
        let mut classifier = ready_classifier(
            &device,
            TrainingAlgorithm::GradientDescent,
            FLAT_SCHEDULE,
        );
        let (images, targets) = separable_batch(&device);

        let first = classifier
            .train(images.clone(), targets.clone(), 1.0)
            .unwrap();
        let mut last = first;
        for _ in 0..29 {
            last = classifier
                .train(images.clone(), targets.clone(), 1.0)
                .unwrap();
        }

        assert!(last < first);

        let inner_images = Tensor::<TestBackend, 2>::from_data(
            TensorData::from([[1.0f32, 0.0], [0.0, 1.0]]),
            &device,
        );
        let inner_targets = Tensor::<TestBackend, 2>::from_data(
            TensorData::from([[1.0f32, 0.0], [0.0, 1.0]]),
            &device,
        );
        let accuracy = classifier
            .compute_accuracy(inner_images, inner_targets)
            .unwrap();
        assert!((accuracy - 1.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_keep_probability_is_rejected() {
        let device = device();
        let mut classifier = ready_classifier(
            &device,
            TrainingAlgorithm::Adam,
            LrSchedule::default(),
        );
        let (images, targets) = separable_batch(&device);

        let err = classifier
            .train(images.clone(), targets.clone(), 0.0)
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidConfig(_)));

        let err = classifier.train(images, targets, 1.5).unwrap_err();
        assert!(err.to_string().contains("keep probability"));
    }

    #[test]
    fn learning_rate_before_attachment_is_not_ready() {
        let device = device();
        let mut classifier = DigitClassifier::new(identity_network(&device));
        classifier.create_initializer();
        classifier.initialize().unwrap();

        let err = classifier.learning_rate().unwrap_err();

        assert!(matches!(err, ModelError::NotReady(_)));
    }
}
