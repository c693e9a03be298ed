//! LSTM sequence encoder
//!
//! Stacked LSTM without gate biases. Every layer returns the full hidden
//! sequence, which becomes the next layer's input.

use super::encoder::{self, SequenceEncoder};
use super::layers::sigmoid;
use super::params::{self, NamedParameters};
use crate::error::Result;
use ndarray::{s, Array2, Array3, ArrayView2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;

/// LSTM cell operating on a whole batch at once
#[derive(Debug, Clone)]
pub struct LstmCell {
    pub input_size: usize,
    pub hidden_size: usize,

    // Input gate
    w_ii: Array2<f64>,
    w_hi: Array2<f64>,

    // Forget gate
    w_if: Array2<f64>,
    w_hf: Array2<f64>,

    // Cell candidate
    w_ig: Array2<f64>,
    w_hg: Array2<f64>,

    // Output gate
    w_io: Array2<f64>,
    w_ho: Array2<f64>,
}

const LSTM_WEIGHTS: [&str; 8] = [
    "w_ii", "w_hi", "w_if", "w_hf", "w_ig", "w_hg", "w_io", "w_ho",
];

impl LstmCell {
    pub fn new(input_size: usize, hidden_size: usize, rng: &mut StdRng) -> Self {
        let limit = (1.0 / hidden_size as f64).sqrt();
        let dist = Uniform::new_inclusive(-limit, limit);
        let mut input = || Array2::random_using((hidden_size, input_size), dist, &mut *rng);
        let (w_ii, w_if, w_ig, w_io) = (input(), input(), input(), input());
        let mut hidden = || Array2::random_using((hidden_size, hidden_size), dist, &mut *rng);
        let (w_hi, w_hf, w_hg, w_ho) = (hidden(), hidden(), hidden(), hidden());

        Self {
            input_size,
            hidden_size,
            w_ii,
            w_hi,
            w_if,
            w_hf,
            w_ig,
            w_hg,
            w_io,
            w_ho,
        }
    }

    /// One timestep for all batch rows
    ///
    /// # Arguments
    ///
    /// * `x` - Inputs [batch, input_size]
    /// * `h_prev` - Previous hidden state [batch, hidden_size]
    /// * `c_prev` - Previous cell state [batch, hidden_size]
    pub fn forward(
        &self,
        x: &ArrayView2<f64>,
        h_prev: &Array2<f64>,
        c_prev: &Array2<f64>,
    ) -> (Array2<f64>, Array2<f64>) {
        let gate = |w_x: &Array2<f64>, w_h: &Array2<f64>| x.dot(&w_x.t()) + h_prev.dot(&w_h.t());

        let i_gate = gate(&self.w_ii, &self.w_hi).mapv(sigmoid);
        let f_gate = gate(&self.w_if, &self.w_hf).mapv(sigmoid);
        let g = gate(&self.w_ig, &self.w_hg).mapv(f64::tanh);
        let o_gate = gate(&self.w_io, &self.w_ho).mapv(sigmoid);

        let c_next = &f_gate * c_prev + &i_gate * &g;
        let h_next = &o_gate * &c_next.mapv(f64::tanh);

        (h_next, c_next)
    }

    fn weights(&self) -> [&Array2<f64>; 8] {
        [
            &self.w_ii, &self.w_hi, &self.w_if, &self.w_hf, &self.w_ig, &self.w_hg, &self.w_io,
            &self.w_ho,
        ]
    }

    fn weights_mut(&mut self) -> [&mut Array2<f64>; 8] {
        [
            &mut self.w_ii,
            &mut self.w_hi,
            &mut self.w_if,
            &mut self.w_hf,
            &mut self.w_ig,
            &mut self.w_hg,
            &mut self.w_io,
            &mut self.w_ho,
        ]
    }

    /// Runs the cell over a full sequence from a zero state
    fn run(&self, x: &Array3<f64>) -> Array3<f64> {
        let (batch, steps, _) = x.dim();
        let mut outputs = Array3::zeros((batch, steps, self.hidden_size));
        let mut h = Array2::zeros((batch, self.hidden_size));
        let mut c = Array2::zeros((batch, self.hidden_size));

        for t in 0..steps {
            let (h_next, c_next) = self.forward(&x.slice(s![.., t, ..]), &h, &c);
            outputs.slice_mut(s![.., t, ..]).assign(&h_next);
            h = h_next;
            c = c_next;
        }

        outputs
    }
}

/// Stacked LSTM encoder
#[derive(Debug, Clone)]
pub struct LstmEncoder {
    cells: Vec<LstmCell>,
    dropout: f64,
}

impl LstmEncoder {
    pub fn new(
        input_size: usize,
        hidden_size: usize,
        num_layers: usize,
        dropout: f64,
        rng: &mut StdRng,
    ) -> Self {
        let mut cells = Vec::with_capacity(num_layers);
        cells.push(LstmCell::new(input_size, hidden_size, rng));
        for _ in 1..num_layers {
            cells.push(LstmCell::new(hidden_size, hidden_size, rng));
        }

        Self { cells, dropout }
    }
}

impl SequenceEncoder for LstmEncoder {
    fn input_size(&self) -> usize {
        self.cells[0].input_size
    }

    fn hidden_size(&self) -> usize {
        self.cells[0].hidden_size
    }

    fn num_layers(&self) -> usize {
        self.cells.len()
    }

    fn forward(&self, x: &Array3<f64>, mut rng: Option<&mut StdRng>) -> Result<Array3<f64>> {
        encoder::check_input(x, self.input_size())?;

        let last = self.cells.len() - 1;
        let mut layer_input = self.cells[0].run(x);
        if let (true, Some(rng)) = (last > 0, rng.as_deref_mut()) {
            encoder::dropout(&mut layer_input, self.dropout, rng);
        }

        for (idx, cell) in self.cells.iter().enumerate().skip(1) {
            layer_input = cell.run(&layer_input);
            if let (true, Some(rng)) = (idx < last, rng.as_deref_mut()) {
                encoder::dropout(&mut layer_input, self.dropout, rng);
            }
        }

        Ok(layer_input)
    }

    fn export(&self, prefix: &str, out: &mut NamedParameters) {
        for (idx, cell) in self.cells.iter().enumerate() {
            let layer = params::join(prefix, &format!("layers.{}", idx));
            for (name, weight) in LSTM_WEIGHTS.iter().zip(cell.weights()) {
                params::export(out, &layer, name, weight);
            }
        }
    }

    fn restore(&mut self, prefix: &str, source: &NamedParameters) -> Result<()> {
        for (idx, cell) in self.cells.iter_mut().enumerate() {
            let layer = params::join(prefix, &format!("layers.{}", idx));
            for (name, weight) in LSTM_WEIGHTS.iter().zip(cell.weights_mut()) {
                params::restore(source, &layer, name, weight)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_lstm_cell() {
        let mut rng = StdRng::seed_from_u64(0);
        let cell = LstmCell::new(5, 10, &mut rng);
        let x = Array2::zeros((3, 5));
        let h = Array2::zeros((3, 10));
        let c = Array2::zeros((3, 10));

        let (h_next, c_next) = cell.forward(&x.view(), &h, &c);

        assert_eq!(h_next.dim(), (3, 10));
        assert_eq!(c_next.dim(), (3, 10));
        // no biases: a zero input from a zero state stays at zero
        assert!(h_next.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_encoder_shape() {
        let mut rng = StdRng::seed_from_u64(0);
        let encoder = LstmEncoder::new(2, 8, 2, 0.2, &mut rng);
        let x = Array3::from_elem((3, 7, 2), 0.5);

        let eval = encoder.forward(&x, None).unwrap();
        assert_eq!(eval.dim(), (3, 7, 8));

        let train = encoder.forward(&x, Some(&mut rng)).unwrap();
        assert_eq!(train.dim(), (3, 7, 8));
    }

    #[test]
    fn test_encoder_is_causal() {
        let mut rng = StdRng::seed_from_u64(3);
        let encoder = LstmEncoder::new(1, 4, 1, 0.0, &mut rng);
        let mut x = Array3::from_elem((1, 6, 1), 0.3);
        let before = encoder.forward(&x, None).unwrap();

        x[[0, 5, 0]] = -2.0;
        let after = encoder.forward(&x, None).unwrap();

        assert_eq!(before.slice(s![.., ..5, ..]), after.slice(s![.., ..5, ..]));
        assert_ne!(before.slice(s![.., 5, ..]), after.slice(s![.., 5, ..]));
    }

    #[test]
    fn test_batch_rows_are_independent() {
        let mut rng = StdRng::seed_from_u64(5);
        let encoder = LstmEncoder::new(1, 4, 1, 0.0, &mut rng);
        let mut x = Array3::from_elem((2, 4, 1), 0.3);
        let before = encoder.forward(&x, None).unwrap();

        x[[1, 0, 0]] = 1.5;
        let after = encoder.forward(&x, None).unwrap();
        assert_eq!(before.slice(s![0, .., ..]), after.slice(s![0, .., ..]));
    }

    #[test]
    fn test_wrong_input_size() {
        let mut rng = StdRng::seed_from_u64(0);
        let encoder = LstmEncoder::new(3, 4, 1, 0.0, &mut rng);
        assert!(encoder.forward(&Array3::zeros((1, 2, 2)), None).is_err());
    }

    #[test]
    fn test_parameter_names() {
        let mut rng = StdRng::seed_from_u64(0);
        let encoder = LstmEncoder::new(3, 4, 2, 0.0, &mut rng);
        let mut out = NamedParameters::new();
        encoder.export("encoder", &mut out);

        assert_eq!(out.len(), 16);
        assert_eq!(out["encoder.layers.0.w_ii"].shape(), &[4, 3]);
        assert_eq!(out["encoder.layers.1.w_ii"].shape(), &[4, 4]);
        assert_eq!(out["encoder.layers.1.w_ho"].shape(), &[4, 4]);
    }
}
