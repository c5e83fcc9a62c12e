use std::num::NonZeroUsize;
use std::sync::Arc;

use ca_models::VariantSpec;
use driver::{MemorySink, Session, TrainingConfig};
use em_core::DataSet;
use ndarray::Array2;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::StandardNormal;

fn nz(v: usize) -> NonZeroUsize {
    NonZeroUsize::new(v).unwrap()
}

/// Synthetic binary sparse coding data: two ground-truth causes plus
/// Gaussian noise.
fn synthetic_bsc(n: usize, seed: u64) -> DataSet {
    let fields = [[2.0, 0.0, 0.0, 0.0], [0.0, 0.0, 2.0, 0.0]];
    let mut rng = StdRng::seed_from_u64(seed);

    let mut data = Array2::zeros((n, 4));
    for mut row in data.rows_mut() {
        for field in &fields {
            if rng.random_bool(0.3) {
                for (dst, v) in row.iter_mut().zip(field) {
                    *dst += v;
                }
            }
        }
        for dst in row.iter_mut() {
            let noise: f64 = rng.sample(StandardNormal);
            *dst += 0.1 * noise;
        }
    }

    DataSet::from_array(data).unwrap()
}

fn main() {
    env_logger::init();

    let config = TrainingConfig {
        latents: nz(2),
        hprime: nz(2),
        gamma: nz(2),
        states_budget: nz(16),
        tolerance: 1e-6,
        patience: nz(3),
        max_iterations: nz(60),
        seed: 7,
        shuffle: Some(7),
        variant: VariantSpec::Bsc,
        workers: nz(4),
    };

    let dataset = Arc::new(synthetic_bsc(400, 11));
    let sink = Arc::new(Mutex::new(MemorySink::new()));

    let session = Session::new().unwrap();
    let report = session.run(&config, dataset, sink.clone()).unwrap();

    println!(
        "run {} after {} iterations (bound {:.4})",
        report.outcome.as_str(),
        report.iterations,
        report.bound
    );
    println!("pi = {:.4}, sigma = {:.4}", report.params.pi, report.params.sigma);
    println!("W =\n{:.3}", report.params.weights);
    println!("recorded {} snapshots", sink.lock().snapshots().len());
}
