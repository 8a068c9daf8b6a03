mod expr;
mod set_expr;
mod table;

use compact_str::CompactString;
pub use expr::{contains_subquery, extract_columns_from_expr, extract_function_names, is_literal};
use indexmap::IndexSet;
pub use set_expr::extract_from_set_expr;
pub use table::extract_from_table_factor;

use crate::config::SetOperationKind;

use super::WindowFunction;

/// Context threaded through a single set-expression walk, accumulating
/// extracted metadata across the whole (possibly nested) query body.
pub struct ExtractionContext<'a> {
    pub tables:       &'a mut IndexSet<CompactString>,
    pub where_cols:   &'a mut IndexSet<CompactString>,
    pub join_cols:    &'a mut IndexSet<CompactString>,
    pub group_cols:   &'a mut IndexSet<CompactString>,
    pub having_cols:  &'a mut IndexSet<CompactString>,
    pub window_funcs: &'a mut Vec<WindowFunction>,
    pub has_union:    &'a mut bool,
    pub set_operator: &'a mut Option<SetOperationKind>,
    pub has_distinct: &'a mut bool,
    pub has_subquery: &'a mut bool
}
