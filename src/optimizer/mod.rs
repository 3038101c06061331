use ndarray::{Array, Dimension};
use serde::{Deserialize, Serialize};

/// Gradient-descent update rule.
///
/// Every parameter tensor is addressed by a stable `slot` index so stateful
/// optimizers can keep per-tensor moments. Callers invoke
/// [`begin_step`](Optimizer::begin_step) once per mini-batch before updating
/// the slots.
pub trait Optimizer {
    fn begin_step(&mut self) {}

    fn update<D: Dimension>(
        &mut self,
        slot: usize,
        params: &mut Array<f32, D>,
        gradients: &Array<f32, D>,
        learning_rate: f32,
    );
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum OptimizerWrapper {
    SGD(SGD),
    Adam(Adam),
}

impl Optimizer for OptimizerWrapper {
    fn begin_step(&mut self) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.begin_step(),
            OptimizerWrapper::Adam(optimizer) => optimizer.begin_step(),
        }
    }

    fn update<D: Dimension>(
        &mut self,
        slot: usize,
        params: &mut Array<f32, D>,
        gradients: &Array<f32, D>,
        learning_rate: f32,
    ) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.update(slot, params, gradients, learning_rate),
            OptimizerWrapper::Adam(optimizer) => optimizer.update(slot, params, gradients, learning_rate),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SGD;

impl SGD {
    pub fn new() -> SGD {
        SGD
    }
}

impl Default for SGD {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer for SGD {
    fn update<D: Dimension>(
        &mut self,
        _slot: usize,
        params: &mut Array<f32, D>,
        gradients: &Array<f32, D>,
        learning_rate: f32,
    ) {
        params.zip_mut_with(gradients, |w, &g| *w -= learning_rate * g);
    }
}

/// Adam with bias-corrected first and second moments.
///
/// Moments are stored flattened per slot and allocated lazily on the first
/// update of that slot.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Adam {
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    pub t: i32,
    m: Vec<Vec<f32>>,
    v: Vec<Vec<f32>>,
}

impl Adam {
    pub fn new(beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Adam {
            beta1,
            beta2,
            epsilon,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    fn ensure_slot(&mut self, slot: usize, len: usize) {
        while self.m.len() <= slot {
            self.m.push(Vec::new());
            self.v.push(Vec::new());
        }
        if self.m[slot].len() != len {
            self.m[slot] = vec![0.0; len];
            self.v[slot] = vec![0.0; len];
        }
    }
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(0.9, 0.999, 1e-8)
    }
}

impl Optimizer for Adam {
    fn begin_step(&mut self) {
        self.t += 1;
    }

    fn update<D: Dimension>(
        &mut self,
        slot: usize,
        params: &mut Array<f32, D>,
        gradients: &Array<f32, D>,
        learning_rate: f32,
    ) {
        self.ensure_slot(slot, params.len());
        let t = self.t.max(1);
        let correction1 = 1.0 - self.beta1.powi(t);
        let correction2 = 1.0 - self.beta2.powi(t);
        let (beta1, beta2, epsilon) = (self.beta1, self.beta2, self.epsilon);
        let m = &mut self.m[slot];
        let v = &mut self.v[slot];

        for (i, (w, &g)) in params.iter_mut().zip(gradients.iter()).enumerate() {
            m[i] = beta1 * m[i] + (1.0 - beta1) * g;
            v[i] = beta2 * v[i] + (1.0 - beta2) * g * g;
            let m_hat = m[i] / correction1;
            let v_hat = v[i] / correction2;
            *w -= learning_rate * m_hat / (v_hat.sqrt() + epsilon);
        }
    }
}
