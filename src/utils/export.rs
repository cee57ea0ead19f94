use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::errors::EngineError;
use crate::models::result::BasketSnapshot;
use crate::models::trade::RealizedTrade;

/// Write realized trades to a CSV file. P&L is in price units times volume.
pub fn write_trades_csv(trades: &[RealizedTrade], path: &Path) -> Result<(), EngineError> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| EngineError::FileWrite(format!("Cannot create CSV: {}", e)))?;

    wtr.write_record([
        "Id",
        "Direction",
        "Opened At",
        "Entry Price",
        "Closed At",
        "Exit Price",
        "Volume",
        "P&L",
        "Close Reason",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.id,
            &format!("{:?}", t.direction),
            &t.opened_at.to_rfc3339(),
            &t.entry_price.to_string(),
            &t.closed_at.to_rfc3339(),
            &t.exit_price.to_string(),
            &t.volume.to_string(),
            &t.pnl.to_string(),
            &format!("{:?}", t.reason),
        ])?;
    }

    wtr.flush()
        .map_err(|e| EngineError::FileWrite(e.to_string()))?;
    Ok(())
}

/// Write a basket snapshot as pretty-printed JSON.
pub fn write_snapshot_json(snapshot: &BasketSnapshot, path: &Path) -> Result<(), EngineError> {
    let file = File::create(path)
        .map_err(|e| EngineError::FileWrite(format!("Cannot create JSON: {}", e)))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, snapshot)?;
    writer
        .flush()
        .map_err(|e| EngineError::FileWrite(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::models::order::Direction;
    use crate::models::trade::CloseReason;

    fn trade(pnl: Decimal) -> RealizedTrade {
        RealizedTrade {
            id: "t-1".into(),
            direction: Direction::Long,
            entry_price: dec!(1.1000),
            exit_price: dec!(1.1020),
            volume: dec!(0.1),
            pnl,
            opened_at: Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap(),
            closed_at: Utc.with_ymd_and_hms(2024, 1, 2, 11, 30, 0).unwrap(),
            reason: CloseReason::TakeProfit,
        }
    }

    #[test]
    fn test_write_trades_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.csv");
        write_trades_csv(&[trade(dec!(0.0002)), trade(dec!(-0.0001))], &path).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(&headers[7], "P&L");
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][1], "Long");
        assert_eq!(&rows[0][7], "0.0002");
        assert_eq!(&rows[1][8], "TakeProfit");
    }

    #[test]
    fn test_write_trades_csv_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("trades.csv");
        let err = write_trades_csv(&[], &path).unwrap_err();
        assert!(matches!(err, EngineError::FileWrite(_)));
    }

    #[test]
    fn test_write_snapshot_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let snapshot = BasketSnapshot {
            time: None,
            long_volume: dec!(0.3),
            short_volume: Decimal::ZERO,
            long_average_price: Some(dec!(1.0950)),
            short_average_price: None,
            entry_count: 2,
            hedged: false,
            floating_pnl: dec!(-12.5),
            floating_pips: dec!(-4.2),
            basket_realized_pnl: Decimal::ZERO,
            session_realized_pnl: dec!(61),
            layer_index: 1,
            ladder_exhausted: false,
            equity_lock: None,
            orders_in_flight: 0,
            next_long_volume: dec!(0.1),
            next_short_volume: dec!(0.1),
        };
        write_snapshot_json(&snapshot, &path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let back: BasketSnapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, snapshot);
        assert!(!raw.contains("short_average_price"));
    }
}
