//! Published per-system carrier frequencies, Hz, grounded on
//! `original_source/src/ProceFrame/CombinationOptions.cpp`'s frequency
//! table. Band numbers follow RINEX convention (1, 2, 5, 6, 7, 8, 9).

/// Looks up the carrier frequency (Hz) for `(system, band)`. Returns
/// `None` for bands the system does not broadcast.
pub fn frequency_hz(system: char, band: u8) -> Option<f64> {
    match (system, band) {
        // GPS: L1, L2, L5
        ('G', 1) => Some(1_575_420_000.0),
        ('G', 2) => Some(1_227_600_000.0),
        ('G', 5) => Some(1_176_450_000.0),
        // Galileo: E1, E5a, E5b, E5(a+b), E6
        ('E', 1) => Some(1_575_420_000.0),
        ('E', 5) => Some(1_176_450_000.0), // E5a
        ('E', 7) => Some(1_207_140_000.0), // E5b
        ('E', 8) => Some(1_191_795_000.0), // E5(a+b) wideband
        ('E', 6) => Some(1_278_750_000.0),
        // BeiDou: B1, B2, B3
        ('C', 2) => Some(1_561_098_000.0), // B1I
        ('C', 1) => Some(1_575_420_000.0), // B1C
        ('C', 7) => Some(1_207_140_000.0), // B2I/B2b
        ('C', 5) => Some(1_176_450_000.0), // B2a
        ('C', 6) => Some(1_268_520_000.0), // B3
        // GLONASS FDMA nominal (channel 0); callers needing the exact
        // per-satellite FDMA frequency must offset by the channel number.
        ('R', 1) => Some(1_602_000_000.0),
        ('R', 2) => Some(1_246_000_000.0),
        // QZSS mirrors GPS bands.
        ('J', 1) => Some(1_575_420_000.0),
        ('J', 2) => Some(1_227_600_000.0),
        ('J', 5) => Some(1_176_450_000.0),
        _ => None,
    }
}

pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

pub fn wavelength_m(system: char, band: u8) -> Option<f64> {
    frequency_hz(system, band).map(|f| SPEED_OF_LIGHT / f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gps_l1_matches_published_value() {
        assert_eq!(frequency_hz('G', 1), Some(1_575_420_000.0));
    }

    #[test]
    fn unknown_band_is_none() {
        assert_eq!(frequency_hz('G', 9), None);
    }
}
