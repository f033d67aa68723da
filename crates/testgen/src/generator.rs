use std::collections::HashMap;

use adya_core::history::{Mop, Transaction};
use chrono::{DateTime, Duration, Local};
use rand::distr::{Distribution, Uniform};
use rand::RngExt;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// How transactions pick the key they touch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum KeyDist {
    /// Every active key equally likely.
    Uniform,
    /// Geometrically skewed toward low-indexed active keys.
    Exponential,
}

#[derive(Clone, Debug, Deserialize, Serialize, TypedBuilder)]
pub struct GeneratorParams {
    #[builder(default = KeyDist::Exponential)]
    pub key_dist: KeyDist,
    /// Base of the exponential key distribution.
    #[builder(default = 2.0)]
    pub key_dist_base: f64,
    /// Size of the active key pool; defaults to 10 for the exponential
    /// distribution and 3 for the uniform one.
    #[builder(default, setter(strip_option))]
    pub key_count: Option<u64>,
    #[builder(default = 1)]
    pub min_txn_length: usize,
    #[builder(default = 2)]
    pub max_txn_length: usize,
    /// Writes a key absorbs before it is retired from the pool.
    #[builder(default = 32)]
    pub max_writes_per_key: u64,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl GeneratorParams {
    #[must_use]
    pub fn effective_key_count(&self) -> u64 {
        self.key_count.unwrap_or(match self.key_dist {
            KeyDist::Exponential => 10,
            KeyDist::Uniform => 3,
        })
    }
}

/// Total probability mass of the exponential key distribution over
/// `count` keys: `b * (b^count - 1) / (b - 1)`.
fn exponential_scale(base: f64, count: usize) -> f64 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let count = count as i32;
    base * (base.powi(count) - 1.0) / (base - 1.0)
}

/// Key index for a draw `u` in `[0, scale)`: `floor(log_b(u + b) - 1)`.
fn exponential_index(base: f64, count: usize, u: f64) -> usize {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let index = ((u + base).log(base) - 1.0).floor() as usize;
    index.min(count - 1)
}

/// Emits synthetic read/write transactions over a pool of active keys.
///
/// Reads are unversioned (`k ==?`), to be filled in by whatever system
/// executes the workload. Writes take a per-key version that starts at 1
/// and grows monotonically, so every written (key, version) pair is
/// unique across the history. A key that has absorbed
/// `max_writes_per_key` writes is retired: its pool slot is replaced by
/// `max(active) + 1`, which keeps key names fresh forever.
#[derive(Debug)]
pub struct Generator {
    params: GeneratorParams,
    active: Vec<u64>,
    writes: HashMap<u64, u64>,
    versions: HashMap<u64, u64>,
    next_id: u64,
}

impl Generator {
    /// # Panics
    ///
    /// Panics on meaningless parameters: an empty key pool, a zero
    /// minimum transaction length, an inverted length range, or an
    /// exponential base not greater than 1.
    #[must_use]
    pub fn new(params: GeneratorParams) -> Self {
        let key_count = params.effective_key_count();
        assert!(key_count > 0, "key pool cannot be empty");
        assert!(
            params.min_txn_length >= 1,
            "transactions need at least one mop"
        );
        assert!(
            params.min_txn_length <= params.max_txn_length,
            "inverted transaction length range"
        );
        if params.key_dist == KeyDist::Exponential {
            assert!(
                params.key_dist_base > 1.0,
                "exponential key distribution needs a base > 1"
            );
        }

        Self {
            active: (0..key_count).collect(),
            params,
            writes: HashMap::new(),
            versions: HashMap::new(),
            next_id: 0,
        }
    }

    #[must_use]
    pub fn active_keys(&self) -> &[u64] {
        &self.active
    }

    fn pick_index<R: RngExt>(&self, rng: &mut R) -> usize {
        let count = self.active.len();
        match self.params.key_dist {
            KeyDist::Uniform => Uniform::new(0, count).unwrap().sample(rng),
            KeyDist::Exponential => {
                let base = self.params.key_dist_base;
                let scale = exponential_scale(base, count);
                let u = Uniform::new(0.0, scale).unwrap().sample(rng);
                exponential_index(base, count, u)
            }
        }
    }

    fn write_mop(&mut self, index: usize) -> Mop<u64, u64> {
        let mut key = self.active[index];
        if self.writes.get(&key).copied().unwrap_or(0) >= self.params.max_writes_per_key {
            let fresh = self.active.iter().max().copied().unwrap_or(0) + 1;
            self.active[index] = fresh;
            key = fresh;
        }

        let version = self.versions.entry(key).or_insert(0);
        *version += 1;
        *self.writes.entry(key).or_insert(0) += 1;
        Mop::write(key, *version)
    }

    /// Emit one committed transaction for `process`.
    pub fn next_transaction<R: RngExt>(
        &mut self,
        rng: &mut R,
        process: u64,
    ) -> Transaction<u64, u64> {
        let length = Uniform::new_inclusive(self.params.min_txn_length, self.params.max_txn_length)
            .unwrap()
            .sample(rng);

        let mops = (0..length)
            .map(|_| {
                let index = self.pick_index(rng);
                if rng.random::<bool>() {
                    Mop::read_empty(self.active[index])
                } else {
                    self.write_mop(index)
                }
            })
            .collect();

        let id = self.next_id;
        self.next_id += 1;
        Transaction::ok(id, process, mops)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, TypedBuilder)]
pub struct WorkloadParams {
    pub id: u64,
    pub n_txn: u64,
    pub n_process: u64,
    #[builder(default)]
    pub generator: GeneratorParams,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct History {
    params: WorkloadParams,
    info: String,
    start: DateTime<Local>,
    end: DateTime<Local>,
    data: Vec<Transaction<u64, u64>>,
}

impl History {
    #[must_use]
    pub const fn get_id(&self) -> u64 {
        self.params.id
    }

    #[must_use]
    pub const fn get_data(&self) -> &Vec<Transaction<u64, u64>> {
        &self.data
    }

    #[must_use]
    pub const fn get_params(&self) -> &WorkloadParams {
        &self.params
    }

    #[must_use]
    pub fn get_duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Generate one history of `n_txn` transactions spread round-robin over
/// `n_process` logical clients.
#[must_use]
pub fn generate_history(
    params: &GeneratorParams,
    n_txn: u64,
    n_process: u64,
) -> Vec<Transaction<u64, u64>> {
    let mut generator = Generator::new(params.clone());
    let mut rng = rand::rng();
    (0..n_txn)
        .map(|i| generator.next_transaction(&mut rng, i % n_process.max(1)))
        .collect()
}

#[must_use]
pub fn generate_mult_histories(
    n_hist: u64,
    n_txn: u64,
    n_process: u64,
    params: &GeneratorParams,
) -> Vec<History> {
    (0..n_hist)
        .into_par_iter()
        .map(|i_hist| {
            let start_time = Local::now();
            let data = generate_history(params, n_txn, n_process);
            let end_time = Local::now();
            History {
                params: WorkloadParams {
                    id: i_hist,
                    n_txn,
                    n_process,
                    generator: params.clone(),
                },
                info: "generated".to_string(),
                start: start_time,
                end: end_time,
                data,
            }
        })
        .collect()
}
