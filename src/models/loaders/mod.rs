pub mod seed_loader;

pub use seed_loader::{load_all_seeds, load_csv_seeds, load_toml_seeds};
