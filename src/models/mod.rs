pub mod batch;
pub mod driver;
pub mod order;
pub mod verification;
pub mod zone;
