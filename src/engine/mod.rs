pub mod assignment;
pub mod claims;
pub mod handoff;
pub mod lifecycle;
pub mod status;
