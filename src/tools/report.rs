//! Performance-report SQL construction.
//!
//! Date validation and the stored-procedure call template live here so the
//! batch text is assembled in exactly one place.

use chrono::NaiveDate;

use crate::error::{DbaError, DbaResult};

/// Stored procedure called when the caller does not name one.
pub const DEFAULT_PROCEDURE_NAME: &str = "sp_GeneratePerformanceReport";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a report boundary date, strictly `YYYY-MM-DD`.
pub fn parse_report_date(value: &str) -> DbaResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| DbaError::InvalidDateFormat)
}

/// Build the stored-procedure batch.
///
/// Arguments are interpolated as T-SQL literals. Callers must hand in dates
/// that came through [`parse_report_date`]; product names and the procedure
/// name are trusted as given.
pub fn build_report_sql(
    procedure_name: &str,
    from_date: NaiveDate,
    to_date: NaiveDate,
    products: &[String],
) -> String {
    let product_names = products.join(",");
    format!(
        "EXEC {procedure_name}\n    @FromDate = '{from}',\n    @ToDate = '{to}',\n    @ProductNames = '{product_names}'",
        from = from_date.format(DATE_FORMAT),
        to = to_date.format(DATE_FORMAT),
    )
}
