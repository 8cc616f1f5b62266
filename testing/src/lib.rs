//! Deterministic distributions for unit tests of the packet simulation.

#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::default_trait_access)]

use std::cell::Cell;

use rand::distributions::Distribution;

/// This distribution always produces the same value, no matter the random number generator.
///
/// # Examples
///
/// ```
/// # use rand::distributions::Distribution;
/// # use testing::Constant;
/// let mut rng = rand::rngs::mock::StepRng::new(0, 1);
/// let dist = Constant::new(0.5);
/// assert_eq!(dist.sample(&mut rng), 0.5);
/// assert_eq!(dist.sample(&mut rng), 0.5);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Constant<T>(T);

impl<T> Constant<T> {
    /// Constructs a distribution that always returns `value`.
    pub fn new(value: T) -> Self {
        Self(value)
    }
}

impl<T: Copy> Distribution<T> for Constant<T> {
    fn sample<R: rand::Rng + ?Sized>(&self, _: &mut R) -> T {
        self.0
    }
}

/// This distribution replays the given values in order, starting over after the last one.
///
/// Together with [`Constant`], it is meant to produce predictable arrival streams, e.g.,
/// strictly alternating priority classes.
///
/// ```
/// # use rand::distributions::Distribution;
/// # use testing::Sequence;
/// let mut rng = rand::rngs::mock::StepRng::new(0, 1);
/// let dist = Sequence::new(vec![0_usize, 1]);
/// let values: Vec<usize> = (0..5).map(|_| dist.sample(&mut rng)).collect();
/// assert_eq!(values, vec![0, 1, 0, 1, 0]);
/// ```
#[derive(Debug)]
pub struct Sequence<T> {
    values: Vec<T>,
    next: Cell<usize>,
}

impl<T> Sequence<T> {
    /// Constructs a distribution cycling through `values`.
    ///
    /// # Panics
    ///
    /// Panics if `values` is empty.
    pub fn new(values: Vec<T>) -> Self {
        assert!(!values.is_empty(), "sequence must contain at least one value");
        Self {
            values,
            next: Cell::new(0),
        }
    }
}

impl<T: Copy> Distribution<T> for Sequence<T> {
    fn sample<R: rand::Rng + ?Sized>(&self, _: &mut R) -> T {
        let idx = self.next.get();
        self.next.set((idx + 1) % self.values.len());
        self.values[idx]
    }
}
