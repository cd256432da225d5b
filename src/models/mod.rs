pub mod loaders;
pub mod page_state;
pub mod record;
pub mod seed;
pub mod summary;

pub use loaders::{load_all_seeds, load_csv_seeds, load_toml_seeds};
pub use page_state::{NavEvent, PageState};
pub use record::{Record, RecordKey};
pub use seed::Seed;
pub use summary::{RunSummary, SeedOutcome, SeedProgress, SeedStats, SeedStatus};
