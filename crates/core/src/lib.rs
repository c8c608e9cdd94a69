pub mod extracted;
pub mod item;
pub mod money;

pub use extracted::ExtractedFields;
pub use item::{days_held, CostType, DraftError, Item, ItemDraft, MergePolicy, Summary};
pub use money::Money;
