use crate::data::Pollutant;

/// One bracket of a breakpoint table: concentrations `[c_low, c_high]` map
/// linearly onto index values `[i_low, i_high]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    pub c_low: f64,
    pub c_high: f64,
    pub i_low: u16,
    pub i_high: u16,
}

const fn bp(c_low: f64, c_high: f64, i_low: u16, i_high: u16) -> Breakpoint {
    Breakpoint { c_low, c_high, i_low, i_high }
}

/// µg/m³, 24-hour
const PM25: [Breakpoint; 6] = [
    bp(0.0, 12.0, 0, 50),
    bp(12.1, 35.4, 51, 100),
    bp(35.5, 55.4, 101, 150),
    bp(55.5, 150.4, 151, 200),
    bp(150.5, 250.4, 201, 300),
    bp(250.5, 500.4, 301, 500),
];

/// µg/m³, 24-hour
const PM10: [Breakpoint; 6] = [
    bp(0.0, 54.0, 0, 50),
    bp(55.0, 154.0, 51, 100),
    bp(155.0, 254.0, 101, 150),
    bp(255.0, 354.0, 151, 200),
    bp(355.0, 424.0, 201, 300),
    bp(425.0, 604.0, 301, 500),
];

/// ppm; 8-hour brackets up to 0.200, 1-hour brackets above
const O3: [Breakpoint; 7] = [
    bp(0.000, 0.054, 0, 50),
    bp(0.055, 0.070, 51, 100),
    bp(0.071, 0.085, 101, 150),
    bp(0.086, 0.105, 151, 200),
    bp(0.106, 0.200, 201, 300),
    bp(0.201, 0.404, 301, 400),
    bp(0.405, 0.604, 401, 500),
];

/// ppb, 1-hour
const NO2: [Breakpoint; 6] = [
    bp(0.0, 53.0, 0, 50),
    bp(54.0, 100.0, 51, 100),
    bp(101.0, 360.0, 101, 150),
    bp(361.0, 649.0, 151, 200),
    bp(650.0, 1249.0, 201, 300),
    bp(1250.0, 2049.0, 301, 500),
];

/// ppb, 1-hour
const SO2: [Breakpoint; 6] = [
    bp(0.0, 35.0, 0, 50),
    bp(36.0, 75.0, 51, 100),
    bp(76.0, 185.0, 101, 150),
    bp(186.0, 304.0, 151, 200),
    bp(305.0, 604.0, 201, 300),
    bp(605.0, 1004.0, 301, 500),
];

/// ppm, 8-hour
const CO: [Breakpoint; 6] = [
    bp(0.0, 4.4, 0, 50),
    bp(4.5, 9.4, 51, 100),
    bp(9.5, 12.4, 101, 150),
    bp(12.5, 15.4, 151, 200),
    bp(15.5, 30.4, 201, 300),
    bp(30.5, 50.4, 301, 500),
];

pub const AQI_MAX: u16 = 500;

pub fn breakpoints(pollutant: Pollutant) -> &'static [Breakpoint] {
    match pollutant {
        Pollutant::Pm25 => &PM25,
        Pollutant::Pm10 => &PM10,
        Pollutant::O3 => &O3,
        Pollutant::No2 => &NO2,
        Pollutant::So2 => &SO2,
        Pollutant::Co => &CO,
    }
}

/// Sub-index of one concentration, before rounding.
///
/// Inside a bracket this is the standard linear interpolation. The small
/// gaps between one bracket's `c_high` and the next `c_low` are bridged
/// linearly, so the curve is continuous and non-decreasing. Below the table
/// the lowest index applies; above it the index is pinned at 500.
pub fn sub_index(pollutant: Pollutant, concentration: f64) -> f64 {
    let table = breakpoints(pollutant);
    let first = table[0];
    if concentration <= first.c_low {
        return first.i_low as f64;
    }

    let mut prev: Option<Breakpoint> = None;
    for bracket in table {
        if let Some(p) = prev {
            if concentration < bracket.c_low {
                return interpolate(concentration, p.c_high, bracket.c_low, p.i_high as f64, bracket.i_low as f64);
            }
        }
        if concentration <= bracket.c_high {
            return interpolate(
                concentration,
                bracket.c_low,
                bracket.c_high,
                bracket.i_low as f64,
                bracket.i_high as f64,
            );
        }
        prev = Some(*bracket);
    }
    AQI_MAX as f64
}

fn interpolate(c: f64, c_low: f64, c_high: f64, i_low: f64, i_high: f64) -> f64 {
    (i_high - i_low) / (c_high - c_low) * (c - c_low) + i_low
}
