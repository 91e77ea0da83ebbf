pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    change, entity_deleted, entity_saved, error, header, muted, section, status, success,
    summary_row, warn,
};
pub use table::{TableBuilder, relationship_table, service_table, stats_table};
pub use theme::{Theme, theme};
