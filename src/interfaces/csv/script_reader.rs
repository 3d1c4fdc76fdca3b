use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One ledger operation in a batch script.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    RegisterMerchant,
    RegisterUser,
    Link,
    Credit,
    Debit,
    Purchase,
    Delink,
}

/// A script row. Which columns are required depends on `op`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ScriptRow {
    pub op: Operation,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub pin: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Reads script rows from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// so trailing optional columns may be left off.
pub struct ScriptReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ScriptReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes rows; a malformed row yields an error and the
    /// stream continues.
    pub fn rows(self) -> impl Iterator<Item = Result<ScriptRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "op, merchant, user, amount, pin, description\n\
                    register_merchant, M1, , , ,\n\
                    credit, M1, U1, 10.50, , coffee beans\n\
                    link, M1, U1, , 1234";
        let rows: Vec<Result<ScriptRow>> = ScriptReader::new(data.as_bytes()).rows().collect();

        assert_eq!(rows.len(), 3);
        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.op, Operation::RegisterMerchant);
        assert_eq!(first.user, None);

        let credit = rows[1].as_ref().unwrap();
        assert_eq!(credit.amount, Some(dec!(10.50)));
        assert_eq!(credit.description.as_deref(), Some("coffee beans"));

        let link = rows[2].as_ref().unwrap();
        assert_eq!(link.pin.as_deref(), Some("1234"));
        assert_eq!(link.description, None);
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "op, merchant, user, amount\nrefund, M1, U1, 1.0\ncredit, M1, U1, abc\ncredit, M1, U1, 1";
        let rows: Vec<Result<ScriptRow>> = ScriptReader::new(data.as_bytes()).rows().collect();

        assert!(rows[0].is_err());
        assert!(rows[1].is_err());
        assert!(rows[2].is_ok());
    }
}
