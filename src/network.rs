use ndarray::{concatenate, s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activations::Activation;
use crate::error::{DqnError, Result};
use crate::estimator::ValueEstimator;
use crate::layers::{DenseLayer, WeightInit};
use crate::optimizer::{Adam, Optimizer, OptimizerWrapper};

/// Dueling Q-network.
///
/// A dense ReLU trunk produces `feature_width` features. The first half of
/// the features feeds the advantage head, the second half the value head, and
/// the two are recombined as `Q = V + (A - mean(A))`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DuelingNetwork {
    pub trunk: Vec<DenseLayer>,
    pub advantage_head: DenseLayer,
    pub value_head: DenseLayer,
    pub optimizer: OptimizerWrapper,
    pub learning_rate: f32,
}

struct ForwardPass {
    features: Array2<f32>,
    q_values: Array2<f32>,
}

impl DuelingNetwork {
    /// Create a network for `input_size` inputs and `action_count` actions.
    ///
    /// `hidden_sizes` lists the trunk widths; the last one is the feature
    /// width and must be even so it splits into two equal streams.
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        hidden_sizes: &[usize],
        action_count: usize,
        optimizer: OptimizerWrapper,
        learning_rate: f32,
        rng: &mut R,
    ) -> Result<Self> {
        if input_size == 0 || action_count == 0 {
            return Err(DqnError::invalid_config(
                "network",
                "input size and action count must be > 0",
            ));
        }
        let feature_width = *hidden_sizes.last().ok_or_else(|| {
            DqnError::invalid_config("hidden_sizes", "at least one trunk layer is required")
        })?;
        if feature_width == 0 || feature_width % 2 != 0 {
            return Err(DqnError::invalid_config(
                "feature_width".to_string(),
                format!("must be a positive even number, got {}", feature_width),
            ));
        }
        if hidden_sizes.iter().any(|&size| size == 0) {
            return Err(DqnError::invalid_config("hidden_sizes", "layer widths must be > 0"));
        }

        let mut trunk = Vec::with_capacity(hidden_sizes.len());
        let mut fan_in = input_size;
        for &width in hidden_sizes {
            trunk.push(DenseLayer::new(fan_in, width, Activation::Relu, WeightInit::HeUniform, rng));
            fan_in = width;
        }

        let stream_width = feature_width / 2;
        let advantage_head = DenseLayer::new(stream_width, action_count, Activation::Linear, WeightInit::XavierUniform, rng);
        let value_head = DenseLayer::new(stream_width, 1, Activation::Linear, WeightInit::XavierUniform, rng);

        Ok(DuelingNetwork {
            trunk,
            advantage_head,
            value_head,
            optimizer,
            learning_rate,
        })
    }

    pub fn feature_width(&self) -> usize {
        self.trunk.last().map(|layer| layer.output_size()).unwrap_or(0)
    }

    /// All layers in a fixed order: trunk, advantage head, value head.
    pub fn layers(&self) -> impl Iterator<Item = &DenseLayer> {
        self.trunk.iter().chain([&self.advantage_head, &self.value_head])
    }

    fn layers_mut(&mut self) -> impl Iterator<Item = &mut DenseLayer> {
        self.trunk.iter_mut().chain([&mut self.advantage_head, &mut self.value_head])
    }

    fn check_input(&self, columns: usize) -> Result<()> {
        if columns != self.input_size() {
            return Err(DqnError::dimension_mismatch(
                format!("state of length {}", self.input_size()),
                format!("state of length {}", columns),
            ));
        }
        Ok(())
    }

    fn combine(advantages: &Array2<f32>, values: &Array2<f32>) -> Array2<f32> {
        let mean = advantages
            .mean_axis(Axis(1))
            .unwrap_or_else(|| Array1::zeros(advantages.nrows()));
        advantages - &mean.insert_axis(Axis(1)) + values
    }

    fn infer(&self, states: ArrayView2<f32>) -> Array2<f32> {
        let mut features = states.to_owned();
        for layer in &self.trunk {
            features = layer.infer_batch(features.view());
        }
        let half = features.ncols() / 2;
        let advantages = self.advantage_head.infer_batch(features.slice(s![.., ..half]));
        let values = self.value_head.infer_batch(features.slice(s![.., half..]));
        Self::combine(&advantages, &values)
    }

    fn forward_cached(&mut self, states: ArrayView2<f32>) -> ForwardPass {
        let mut features = states.to_owned();
        for layer in &mut self.trunk {
            features = layer.forward_batch(features.view());
        }
        let half = features.ncols() / 2;
        let advantages = self.advantage_head.forward_batch(features.slice(s![.., ..half]));
        let values = self.value_head.forward_batch(features.slice(s![.., half..]));
        let q_values = Self::combine(&advantages, &values);
        ForwardPass { features, q_values }
    }

    /// Gradients for every layer, in [`layers`](Self::layers) order, given
    /// the loss gradient with respect to the Q-values.
    fn backward(&self, q_errors: &Array2<f32>, feature_columns: usize) -> Result<Vec<(Array2<f32>, Array1<f32>)>> {
        let action_count = q_errors.ncols() as f32;
        // dQ/dV = 1 for every action, dQ/dA_j = δ_ij - 1/n
        let value_errors = q_errors.sum_axis(Axis(1)).insert_axis(Axis(1));
        let mean_error = q_errors.sum_axis(Axis(1)) / action_count;
        let advantage_errors = q_errors - &mean_error.insert_axis(Axis(1));

        let (adv_adjusted, adv_wg, adv_bg) = self.advantage_head.backward_batch(advantage_errors.view());
        let (val_adjusted, val_wg, val_bg) = self.value_head.backward_batch(value_errors.view());

        let adv_input_error = adv_adjusted.dot(&self.advantage_head.weights.t());
        let val_input_error = val_adjusted.dot(&self.value_head.weights.t());
        let mut current_error = concatenate(Axis(1), &[adv_input_error.view(), val_input_error.view()])
            .map_err(|e| DqnError::dimension_mismatch(format!("{} feature columns", feature_columns), e.to_string()))?;

        let mut gradients: Vec<(Array2<f32>, Array1<f32>)> = Vec::with_capacity(self.trunk.len() + 2);
        for (i, layer) in self.trunk.iter().enumerate().rev() {
            let (adjusted_error, weight_gradients, bias_gradients) = layer.backward_batch(current_error.view());
            gradients.push((weight_gradients, bias_gradients));
            if i != 0 {
                current_error = adjusted_error.dot(&layer.weights.t());
            }
        }
        gradients.reverse();
        gradients.push((adv_wg, adv_bg));
        gradients.push((val_wg, val_bg));
        Ok(gradients)
    }
}

impl ValueEstimator for DuelingNetwork {
    fn input_size(&self) -> usize {
        self.trunk.first().map(|layer| layer.input_size()).unwrap_or(0)
    }

    fn action_count(&self) -> usize {
        self.advantage_head.output_size()
    }

    fn predict_values(&self, state: ArrayView1<f32>) -> Result<Array1<f32>> {
        self.check_input(state.len())?;
        let q_values = self.infer(state.insert_axis(Axis(0)));
        Ok(q_values.row(0).to_owned())
    }

    fn predict_values_batch(&self, states: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_input(states.ncols())?;
        Ok(self.infer(states))
    }

    fn update(&mut self, states: ArrayView2<f32>, actions: &[usize], targets: ArrayView1<f32>) -> Result<f32> {
        self.check_input(states.ncols())?;
        let batch_size = states.nrows();
        if actions.len() != batch_size || targets.len() != batch_size {
            return Err(DqnError::dimension_mismatch(
                format!("{} actions and targets", batch_size),
                format!("{} actions, {} targets", actions.len(), targets.len()),
            ));
        }
        if batch_size == 0 {
            return Err(DqnError::InsufficientData { requested: 1, available: 0 });
        }
        let action_count = self.action_count();
        if let Some(&action) = actions.iter().find(|&&a| a >= action_count) {
            return Err(DqnError::InvalidAction { action, action_count });
        }
        if targets.iter().any(|t| !t.is_finite()) {
            return Err(DqnError::Numerical("non-finite target value".to_string()));
        }

        let pass = self.forward_cached(states);
        let mut q_errors = Array2::<f32>::zeros(pass.q_values.dim());
        let mut loss = 0.0;
        for (i, &action) in actions.iter().enumerate() {
            let diff = pass.q_values[[i, action]] - targets[i];
            loss += diff * diff;
            q_errors[[i, action]] = 2.0 * diff / batch_size as f32;
        }
        loss /= batch_size as f32;
        if !loss.is_finite() {
            return Err(DqnError::Numerical(format!("loss is {}", loss)));
        }

        let gradients = self.backward(&q_errors, pass.features.ncols())?;
        let finite = gradients
            .iter()
            .all(|(wg, bg)| wg.iter().chain(bg.iter()).all(|g| g.is_finite()));
        if !finite {
            return Err(DqnError::Numerical("non-finite gradient".to_string()));
        }

        let DuelingNetwork { trunk, advantage_head, value_head, optimizer, learning_rate } = self;
        optimizer.begin_step();
        let layers = trunk.iter_mut().chain([advantage_head, value_head]);
        for (slot, (layer, (weight_gradients, bias_gradients))) in layers.zip(gradients).enumerate() {
            optimizer.update(2 * slot, &mut layer.weights, &weight_gradients, *learning_rate);
            optimizer.update(2 * slot + 1, &mut layer.biases, &bias_gradients, *learning_rate);
            layer.clear_cache();
        }

        Ok(loss)
    }

    fn soft_sync_from(&mut self, source: &Self, tau: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&tau) {
            return Err(DqnError::invalid_config("tau".to_string(), format!("must be in [0, 1], got {}", tau)));
        }
        let compatible = self.trunk.len() == source.trunk.len()
            && self.layers().zip(source.layers()).all(|(a, b)| a.same_shape(b));
        if !compatible {
            return Err(DqnError::dimension_mismatch("identical network layouts", "differing layouts"));
        }
        for (target, online) in self.layers_mut().zip(source.layers()) {
            target.blend_from(online, tau);
        }
        Ok(())
    }

    fn parameter_distance(&self, other: &Self) -> Result<f32> {
        let compatible = self.trunk.len() == other.trunk.len()
            && self.layers().zip(other.layers()).all(|(a, b)| a.same_shape(b));
        if !compatible {
            return Err(DqnError::dimension_mismatch("identical network layouts", "differing layouts"));
        }
        let squared: f32 = self
            .layers()
            .zip(other.layers())
            .map(|(a, b)| {
                let w: f32 = a.weights.iter().zip(b.weights.iter()).map(|(x, y)| (x - y).powi(2)).sum();
                let bias: f32 = a.biases.iter().zip(b.biases.iter()).map(|(x, y)| (x - y).powi(2)).sum();
                w + bias
            })
            .sum();
        Ok(squared.sqrt())
    }
}

/// Builder pattern for DuelingNetwork
pub struct DuelingNetworkBuilder {
    input_size: usize,
    hidden_sizes: Vec<usize>,
    action_count: usize,
    optimizer: Option<OptimizerWrapper>,
    learning_rate: f32,
}

impl DuelingNetworkBuilder {
    pub fn new(input_size: usize, action_count: usize) -> Self {
        DuelingNetworkBuilder {
            input_size,
            hidden_sizes: vec![256, 512],
            action_count,
            optimizer: None,
            learning_rate: 1e-4,
        }
    }

    pub fn hidden_sizes(mut self, sizes: &[usize]) -> Self {
        self.hidden_sizes = sizes.to_vec();
        self
    }

    pub fn optimizer(mut self, optimizer: OptimizerWrapper) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    pub fn learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn build<R: Rng + ?Sized>(self, rng: &mut R) -> Result<DuelingNetwork> {
        if !(self.learning_rate > 0.0) {
            return Err(DqnError::invalid_config(
                "learning_rate".to_string(),
                format!("must be > 0, got {}", self.learning_rate),
            ));
        }
        let optimizer = self
            .optimizer
            .unwrap_or_else(|| OptimizerWrapper::Adam(Adam::default()));
        DuelingNetwork::new(
            self.input_size,
            &self.hidden_sizes,
            self.action_count,
            optimizer,
            self.learning_rate,
            rng,
        )
    }
}
