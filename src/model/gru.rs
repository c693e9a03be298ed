//! GRU sequence encoder
//!
//! GRU uses two gates instead of three (update and reset) and keeps a
//! single hidden state, so it has fewer parameters than the LSTM.

use super::encoder::{self, SequenceEncoder};
use super::layers::sigmoid;
use super::params::{self, NamedParameters};
use crate::error::Result;
use ndarray::{s, Array1, Array2, Array3, ArrayView2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;

/// GRU cell operating on a whole batch at once
#[derive(Debug, Clone)]
pub struct GruCell {
    pub input_size: usize,
    pub hidden_size: usize,

    // Update gate
    w_iz: Array2<f64>,
    w_hz: Array2<f64>,
    b_z: Array1<f64>,

    // Reset gate
    w_ir: Array2<f64>,
    w_hr: Array2<f64>,
    b_r: Array1<f64>,

    // Candidate hidden state
    w_in: Array2<f64>,
    w_hn: Array2<f64>,
    b_n: Array1<f64>,
}

impl GruCell {
    pub fn new(input_size: usize, hidden_size: usize, rng: &mut StdRng) -> Self {
        let limit = (1.0 / hidden_size as f64).sqrt();
        let dist = Uniform::new_inclusive(-limit, limit);

        Self {
            input_size,
            hidden_size,
            w_iz: Array2::random_using((hidden_size, input_size), dist, rng),
            w_hz: Array2::random_using((hidden_size, hidden_size), dist, rng),
            b_z: Array1::zeros(hidden_size),
            w_ir: Array2::random_using((hidden_size, input_size), dist, rng),
            w_hr: Array2::random_using((hidden_size, hidden_size), dist, rng),
            b_r: Array1::zeros(hidden_size),
            w_in: Array2::random_using((hidden_size, input_size), dist, rng),
            w_hn: Array2::random_using((hidden_size, hidden_size), dist, rng),
            b_n: Array1::zeros(hidden_size),
        }
    }

    /// One timestep for all batch rows
    ///
    /// `x` is [batch, input_size], `h_prev` is [batch, hidden_size].
    pub fn forward(&self, x: &ArrayView2<f64>, h_prev: &Array2<f64>) -> Array2<f64> {
        // z = σ(W_iz x + W_hz h + b_z)
        let z_gate = (x.dot(&self.w_iz.t()) + h_prev.dot(&self.w_hz.t()) + &self.b_z).mapv(sigmoid);

        // r = σ(W_ir x + W_hr h + b_r)
        let r_gate = (x.dot(&self.w_ir.t()) + h_prev.dot(&self.w_hr.t()) + &self.b_r).mapv(sigmoid);

        // n = tanh(W_in x + W_hn (r ⊙ h) + b_n)
        let reset_hidden = &r_gate * h_prev;
        let n = (x.dot(&self.w_in.t()) + reset_hidden.dot(&self.w_hn.t()) + &self.b_n)
            .mapv(f64::tanh);

        // h = (1 - z) ⊙ n + z ⊙ h_prev
        let one_minus_z = z_gate.mapv(|v| 1.0 - v);
        &one_minus_z * &n + &z_gate * h_prev
    }

    fn run(&self, x: &Array3<f64>) -> Array3<f64> {
        let (batch, steps, _) = x.dim();
        let mut outputs = Array3::zeros((batch, steps, self.hidden_size));
        let mut h = Array2::zeros((batch, self.hidden_size));

        for t in 0..steps {
            h = self.forward(&x.slice(s![.., t, ..]), &h);
            outputs.slice_mut(s![.., t, ..]).assign(&h);
        }

        outputs
    }

    fn export(&self, prefix: &str, out: &mut NamedParameters) {
        params::export(out, prefix, "w_iz", &self.w_iz);
        params::export(out, prefix, "w_hz", &self.w_hz);
        params::export(out, prefix, "b_z", &self.b_z);
        params::export(out, prefix, "w_ir", &self.w_ir);
        params::export(out, prefix, "w_hr", &self.w_hr);
        params::export(out, prefix, "b_r", &self.b_r);
        params::export(out, prefix, "w_in", &self.w_in);
        params::export(out, prefix, "w_hn", &self.w_hn);
        params::export(out, prefix, "b_n", &self.b_n);
    }

    fn restore(&mut self, prefix: &str, source: &NamedParameters) -> Result<()> {
        params::restore(source, prefix, "w_iz", &mut self.w_iz)?;
        params::restore(source, prefix, "w_hz", &mut self.w_hz)?;
        params::restore(source, prefix, "b_z", &mut self.b_z)?;
        params::restore(source, prefix, "w_ir", &mut self.w_ir)?;
        params::restore(source, prefix, "w_hr", &mut self.w_hr)?;
        params::restore(source, prefix, "b_r", &mut self.b_r)?;
        params::restore(source, prefix, "w_in", &mut self.w_in)?;
        params::restore(source, prefix, "w_hn", &mut self.w_hn)?;
        params::restore(source, prefix, "b_n", &mut self.b_n)
    }
}

/// Stacked GRU encoder
#[derive(Debug, Clone)]
pub struct GruEncoder {
    cells: Vec<GruCell>,
    dropout: f64,
}

impl GruEncoder {
    pub fn new(
        input_size: usize,
        hidden_size: usize,
        num_layers: usize,
        dropout: f64,
        rng: &mut StdRng,
    ) -> Self {
        let cells = (0..num_layers)
            .map(|layer| {
                let in_size = if layer == 0 { input_size } else { hidden_size };
                GruCell::new(in_size, hidden_size, rng)
            })
            .collect();

        Self { cells, dropout }
    }
}

impl SequenceEncoder for GruEncoder {
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
        let mut hidden = x.clone();
        for (idx, cell) in self.cells.iter().enumerate() {
            hidden = cell.run(&hidden);
            if idx < last {
                if let Some(rng) = rng.as_deref_mut() {
                    encoder::dropout(&mut hidden, self.dropout, rng);
                }
            }
        }

        Ok(hidden)
    }

    fn export(&self, prefix: &str, out: &mut NamedParameters) {
        for (idx, cell) in self.cells.iter().enumerate() {
            cell.export(&params::join(prefix, &format!("layers.{}", idx)), out);
        }
    }

    fn restore(&mut self, prefix: &str, source: &NamedParameters) -> Result<()> {
        for (idx, cell) in self.cells.iter_mut().enumerate() {
            cell.restore(&params::join(prefix, &format!("layers.{}", idx)), source)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_gru_cell() {
        let mut rng = StdRng::seed_from_u64(0);
        let cell = GruCell::new(5, 10, &mut rng);
        let x = Array2::zeros((2, 5));
        let h = Array2::zeros((2, 10));

        let h_next = cell.forward(&x.view(), &h);
        assert_eq!(h_next.dim(), (2, 10));
    }

    #[test]
    fn test_gru_encoder() {
        let mut rng = StdRng::seed_from_u64(0);
        let encoder = GruEncoder::new(3, 6, 3, 0.1, &mut rng);
        let x = Array3::from_elem((2, 9, 3), 0.1);

        let out = encoder.forward(&x, None).unwrap();
        assert_eq!(out.dim(), (2, 9, 6));
        assert_eq!(encoder.num_layers(), 3);

        let mut exported = NamedParameters::new();
        encoder.export("encoder", &mut exported);
        assert_eq!(exported.len(), 27);
        assert_eq!(exported["encoder.layers.2.w_in"].shape(), &[6, 6]);
    }

    #[test]
    fn test_gru_restore_round_trip() {
        let mut rng = StdRng::seed_from_u64(0);
        let source = GruEncoder::new(2, 4, 1, 0.0, &mut rng);
        let mut target = GruEncoder::new(2, 4, 1, 0.0, &mut rng);
        let x = Array3::from_elem((1, 5, 2), 0.4);

        let mut exported = NamedParameters::new();
        source.export("enc", &mut exported);
        target.restore("enc", &exported).unwrap();

        assert_eq!(source.forward(&x, None).unwrap(), target.forward(&x, None).unwrap());
    }
}
