//! Concrete platforms. Each one bundles detection with an ordered stage list.

pub mod strixhalo;

pub use strixhalo::StrixHaloPlatform;
