//! Immutable instrument reference catalog.
//!
//! Fifteen NSE instruments with a seed market price each. The catalog is
//! initialized once and only read afterwards; lookup by id is the hot
//! operation.

use std::sync::OnceLock;

use crate::models::price_to_ticks;

#[derive(Debug, Clone)]
pub struct Instrument {
    pub id: u32,
    pub name: &'static str,
    pub symbol: &'static str,
    /// Seed market price in ticks of 1/100.
    pub seed_price: u64,
}

impl Instrument {
    fn new(id: u32, name: &'static str, symbol: &'static str, seed: f64) -> Self {
        Self {
            id,
            name,
            symbol,
            seed_price: price_to_ticks(seed),
        }
    }
}

pub struct InstrumentCatalog {
    instruments: Vec<Instrument>,
}

impl InstrumentCatalog {
    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn get(&self, id: u32) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.id == id)
    }
}

/// Process-wide catalog instance.
pub fn catalog() -> &'static InstrumentCatalog {
    static CATALOG: OnceLock<InstrumentCatalog> = OnceLock::new();
    CATALOG.get_or_init(|| InstrumentCatalog {
        instruments: vec![
            Instrument::new(1, "Reliance Industries", "RELIANCE (NSE)", 1577.0),
            Instrument::new(2, "Tata Consultancy Services", "TCS (NSE)", 3213.0),
            Instrument::new(3, "Dixon Technologies", "DIXON (NSE)", 12055.0),
            Instrument::new(4, "HDFC Bank", "HDFCBANK (NSE)", 987.5),
            Instrument::new(5, "Tata Motors", "TATAMOTORS (NSE)", 373.55),
            Instrument::new(6, "Tata Power", "TATAPOWER (NSE)", 388.0),
            Instrument::new(7, "Adani Enterprises", "ADANIENT (NSE)", 2279.0),
            Instrument::new(8, "Adani Green Energy", "ADANIGREEN (NSE)", 1028.8),
            Instrument::new(9, "Adani Power", "ADANIPOWER (NSE)", 146.0),
            Instrument::new(10, "Tanla Platforms", "TANLA (NSE)", 524.0),
            Instrument::new(11, "Nifty 50 Index", "NIFTY 50", 26250.3),
            Instrument::new(12, "Bank Nifty Index", "BANKNIFTY", 60044.2),
            Instrument::new(13, "FinNifty", "FINNIFTY", 27851.45),
            Instrument::new(14, "Sensex", "SENSEX", 84961.14),
            Instrument::new(15, "Nifty Next 50 Index", "NIFTY NEXT 50", 70413.4),
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_fifteen_instruments() {
        assert_eq!(catalog().instruments().len(), 15);
    }

    #[test]
    fn test_lookup_by_id() {
        let reliance = catalog().get(1).unwrap();
        assert_eq!(reliance.name, "Reliance Industries");
        assert_eq!(reliance.seed_price, 157_700);

        let tatamotors = catalog().get(5).unwrap();
        assert_eq!(tatamotors.seed_price, 37_355);

        assert!(catalog().get(0).is_none());
        assert!(catalog().get(16).is_none());
    }

    #[test]
    fn test_ids_are_contiguous() {
        let ids: Vec<u32> = catalog().instruments().iter().map(|i| i.id).collect();
        assert_eq!(ids, (1..=15).collect::<Vec<u32>>());
    }
}
