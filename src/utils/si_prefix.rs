//! Rendering numbers with SI prefixes, e.g. 1,023,404 bytes as `999.4kB`.
//!
//! Byte counts always use binary prefixes (1k = 1024). The IEC spelling
//! (`Ki`, `Mi`, ...) is available but off by default because almost nobody
//! reads it.

const NEGATIVE_PREFIXES: [&str; 8] = ["m", "μ", "n", "p", "f", "a", "z", "y"];
const POSITIVE_SI_PREFIXES: [&str; 8] = ["k", "M", "G", "T", "P", "E", "Z", "Y"];
const POSITIVE_IEC_PREFIXES: [&str; 8] = ["Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "Zi", "Yi"];

/// Options for [`si_prefix_string`]
#[derive(Debug, Clone, Copy)]
pub struct SiFormat {
    /// Switch to the next prefix once the value reaches this many times it
    pub threshold: f64,
    /// Digits right of the decimal point
    pub precision: usize,
    /// Base 1024 instead of 1000
    pub binary: bool,
    /// With `binary`, use `Ki`/`Mi` instead of `k`/`M`
    pub iec: bool,
    /// Never go below the unprefixed unit (no milli-bytes)
    pub integral: bool,
}

impl Default for SiFormat {
    fn default() -> Self {
        Self {
            threshold: 1.1,
            precision: 1,
            binary: false,
            iec: false,
            integral: false,
        }
    }
}

/// Render `value` with an SI prefix.
///
/// Values beyond the defined prefixes fall back to `1.5 << 90` (binary) or
/// `1.5e27` (decimal) notation.
pub fn si_prefix_string(value: f64, format: SiFormat) -> String {
    let base = if format.binary { 1024.0 } else { 1000.0 };
    let sign = if value < 0.0 { "-" } else { "" };
    let (mut exponent, mut coefficient) = si_exponent(value.abs(), base, format.threshold);
    if format.integral && exponent < 0 {
        exponent = 0;
        coefficient = value.abs();
    }

    match prefix(exponent, format.binary && format.iec) {
        Some(prefix) => format!(
            "{}{:.*}{}",
            sign, format.precision, coefficient, prefix
        ),
        None if format.binary => format!(
            "{}{:.*} << {}",
            sign,
            format.precision,
            coefficient,
            10 * exponent
        ),
        None => format!(
            "{}{:.*}e{}",
            sign,
            format.precision,
            coefficient,
            3 * exponent
        ),
    }
}

/// Render a byte count, e.g. `bytes_string(1536.0) == "1.5kB"`
pub fn bytes_string(value: f64) -> String {
    let format = SiFormat {
        binary: true,
        integral: true,
        ..SiFormat::default()
    };
    format!("{}B", si_prefix_string(value, format))
}

/// Split `value` into `(e, p)` with `value == p * base^e` and `p >= threshold`
fn si_exponent(value: f64, base: f64, threshold: f64) -> (i32, f64) {
    if value == 0.0 || !value.is_finite() {
        return (0, value);
    }
    let exponent = ((value / threshold).ln() / base.ln()).floor() as i32;
    (exponent, value * base.powi(-exponent))
}

fn prefix(power: i32, iec: bool) -> Option<&'static str> {
    let index = power.unsigned_abs() as usize;
    match power {
        0 => Some(""),
        p if p > 0 && iec => POSITIVE_IEC_PREFIXES.get(index - 1).copied(),
        p if p > 0 => POSITIVE_SI_PREFIXES.get(index - 1).copied(),
        _ => NEGATIVE_PREFIXES.get(index - 1).copied(),
    }
}
