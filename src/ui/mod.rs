pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    dim, error, header, record_created, record_deleted, record_updated,
    section, status, success, summary_row, warn,
};
pub use table::{TableBuilder, authors_table, entries_table, stats_table};
pub use theme::{Theme, theme};
