pub mod gaussian_hmm;

pub use gaussian_hmm::{FitReport, GaussianHMM};
