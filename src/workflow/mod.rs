pub mod seed_ctx;
pub mod seed_flow;

pub use seed_ctx::SeedCtx;
pub use seed_flow::SeedFlow;
