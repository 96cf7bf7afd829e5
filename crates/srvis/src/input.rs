//! Parsing of free-text bound entries (filter limits, colour scale limits).

use log::warn;

use srvis_core::FilterRange;

/// Text that could not be read as a bound.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("'{0}' is not a number, 'auto', 'min' or 'max'")]
pub struct InvalidRange(pub String);

/// Read one bound: empty, `auto`, `min` and `max` (any case) leave it unset,
/// a number sets it.
pub fn try_parse_bound(text: &str) -> Result<Option<f64>, InvalidRange> {
    let text = text.trim();
    if text.is_empty()
        || ["auto", "min", "max"]
            .iter()
            .any(|k| text.eq_ignore_ascii_case(k))
    {
        return Ok(None);
    }
    match text.parse::<f64>() {
        Ok(v) if !v.is_nan() => Ok(Some(v)),
        _ => Err(InvalidRange(text.to_string())),
    }
}

/// Like [`try_parse_bound`], but malformed text is logged and `previous` is
/// kept.
pub fn parse_bound(text: &str, previous: Option<f64>) -> Option<f64> {
    match try_parse_bound(text) {
        Ok(bound) => bound,
        Err(e) => {
            warn!("ignoring bound: {e}");
            previous
        }
    }
}

/// Update both ends of `previous` from two entry fields.
pub fn parse_filter_range(min: &str, max: &str, previous: FilterRange) -> FilterRange {
    FilterRange {
        min: parse_bound(min, previous.min),
        max: parse_bound(max, previous.max),
        relative: previous.relative,
    }
}

/// Parse a `column=min:max` command-line filter. Either side of the colon may
/// be empty. A trailing `%` marks a bound as a percentage of the column
/// maximum and makes the whole range relative.
pub fn parse_filter_arg(arg: &str) -> Result<(String, FilterRange), InvalidRange> {
    let invalid = || InvalidRange(arg.to_string());
    let (column, bounds) = arg.split_once('=').ok_or_else(invalid)?;
    let (lo, hi) = bounds.split_once(':').ok_or_else(invalid)?;
    let column = column.trim();
    if column.is_empty() {
        return Err(invalid());
    }

    let (min, lo_pct) = parse_percent_bound(lo)?;
    let (max, hi_pct) = parse_percent_bound(hi)?;
    let range = if lo_pct || hi_pct {
        FilterRange::relative(min, max)
    } else {
        FilterRange::new(min, max)
    };
    Ok((column.to_string(), range))
}

/// A bound with a trailing `%` comes back as a fraction, flagged.
fn parse_percent_bound(text: &str) -> Result<(Option<f64>, bool), InvalidRange> {
    let text = text.trim();
    match text.strip_suffix('%') {
        Some(pct) => Ok((try_parse_bound(pct)?.map(|v| v / 100.0), true)),
        None => Ok((try_parse_bound(text)?, false)),
    }
}
