mod apikey;
mod basic;
mod error;
mod jwt;
mod layer;

pub use layer::AuthLayer;
