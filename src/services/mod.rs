// Directory
pub mod customers;
pub mod providers;
pub mod users;

// Dispatch
pub mod notes;
pub mod resources;
pub mod work_orders;

// Billing
pub mod invoices;

// Live tracking
pub mod locations;

use std::str::FromStr;

use sea_orm::sea_query::{Expr, IntoColumnRef, LikeExpr, SimpleExpr};

use crate::errors::ServiceError;

const LIKE_ESCAPE: char = '\\';

/// Parses a wire value into one of the strum-backed column enums.
pub(crate) fn parse_enum<T: FromStr>(field: &str, value: &str) -> Result<T, ServiceError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ServiceError::InvalidInput(format!("unknown {} '{}'", field, value)))
}

/// Clamps pagination input to sane bounds.
pub(crate) fn page_window(page: u64, per_page: u64) -> (u64, u64) {
    (page.max(1), per_page.clamp(1, 100))
}

/// `%term%` with the LIKE wildcards in `term` escaped by [`LIKE_ESCAPE`].
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_') || c == LIKE_ESCAPE {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Substring match on `column` that treats `term` as plain text.
pub(crate) fn column_contains(column: impl IntoColumnRef, term: &str) -> SimpleExpr {
    Expr::col(column).like(LikeExpr::new(contains_pattern(term)).escape(LIKE_ESCAPE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkOrderStatus;
    use assert_matches::assert_matches;

    #[test]
    fn enum_parsing_reports_the_field() {
        let parsed: WorkOrderStatus = parse_enum("status", " in_progress ").unwrap();
        assert_eq!(parsed, WorkOrderStatus::InProgress);
        assert_matches!(
            parse_enum::<WorkOrderStatus>("status", "done"),
            Err(ServiceError::InvalidInput(msg)) if msg.contains("status")
        );
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(contains_pattern("wo-7"), "%wo-7%");
        assert_eq!(contains_pattern(r"50%_off\"), r"%50\%\_off\\%");
    }

    #[test]
    fn page_window_is_clamped() {
        assert_eq!(page_window(0, 0), (1, 1));
        assert_eq!(page_window(3, 500), (3, 100));
    }
}
