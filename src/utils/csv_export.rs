use std::path::Path;

use crate::domain::model::Transaction;
use crate::utils::error::Result;

/// Write transactions to a CSV file, one row per transaction, in the
/// order given (portal order, newest first).
pub fn write_transactions_csv(path: &Path, transactions: &[Transaction]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for transaction in transactions {
        writer.serialize(transaction)?;
    }
    writer.flush()?;
    tracing::info!(path = %path.display(), rows = transactions.len(), "wrote CSV export");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn transaction(id: &str, amount: Decimal) -> Transaction {
        Transaction {
            id: id.to_string(),
            timestamp: NaiveDate::from_ymd_opt(2026, 8, 21)
                .unwrap()
                .and_hms_opt(12, 5, 0)
                .unwrap(),
            amount,
            location: "Mensa Mitte".to_string(),
            kind: "Zahlung".to_string(),
            point_of_sale: "Kasse 1".to_string(),
        }
    }

    #[test]
    fn export_writes_a_header_and_one_row_per_transaction() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("transactions.csv");
        let rows = vec![
            transaction("2", Decimal::new(-350, 2)),
            transaction("1", Decimal::new(2000, 2)),
        ];
        write_transactions_csv(&path, &rows).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("timestamp"));
        assert!(lines[0].contains("amount"));
        assert!(lines[1].contains("-3.50"));
        assert!(lines[2].contains("20.00"));
    }

    #[test]
    fn export_of_no_transactions_still_produces_a_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");
        write_transactions_csv(&path, &[]).unwrap();
        assert!(path.exists());
    }
}
