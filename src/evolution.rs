//! Analyses layered on the KPI catalog: period-over-period evolution,
//! month-by-month breakdowns and the INDOA composite score.

use crate::catalog::{self, Direction, KpiOutcome, KpiSymbol};
use crate::error::{FleetKpiError, Result};
use crate::goals;
use crate::period::last_day_of_month;
use crate::schema::{EvolutionRequest, KpiRequest, MonthlyRequest};
use crate::store::TableCache;
use crate::text::format_thousands;
use chrono::{Local, NaiveDate};
use log::{info, warn};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Improved,
    Worsened,
    Stable,
}

/// Classifies a change between two period values by the KPI's registered
/// direction. A relative change below 0.01% is always stable, and so is
/// any change from a zero base (the percent change is undefined there).
pub fn classify_change(direction: Direction, previous: f64, current: f64) -> Verdict {
    let delta = current - previous;
    let pct = if previous != 0.0 {
        delta / previous * 100.0
    } else {
        0.0
    };
    if pct.abs() < 0.01 {
        return Verdict::Stable;
    }
    match direction {
        Direction::HigherIsBetter => {
            if delta > 0.0 {
                Verdict::Improved
            } else {
                Verdict::Worsened
            }
        }
        Direction::LowerIsBetter => {
            if delta < 0.0 {
                Verdict::Improved
            } else {
                Verdict::Worsened
            }
        }
    }
}

fn validate_period(label: &str, start: NaiveDate, end: NaiveDate) -> Result<()> {
    if end < start {
        return Err(FleetKpiError::DateError(format!(
            "{} period ends {} before it starts {}",
            label, end, start
        )));
    }
    Ok(())
}

/// Compares one indicator between two periods and reports whether it
/// improved or worsened.
pub fn evolution(cache: &mut TableCache, req: &EvolutionRequest) -> Result<String> {
    let symbol = KpiSymbol::resolve(&req.indicator)
        .ok_or_else(|| FleetKpiError::UnknownIndicator(req.indicator.clone()))?;
    validate_period("previous", req.previous_start, req.previous_end)?;
    validate_period("current", req.current_start, req.current_end)?;

    info!(
        "evolution analysis [{}]: {}..{} against {}..{}",
        symbol.name(),
        req.previous_start,
        req.previous_end,
        req.current_start,
        req.current_end
    );

    let filters = KpiRequest {
        filter_column: req.filter_column.clone(),
        filter_value: req.filter_value.clone(),
        start_date: None,
        end_date: None,
    };
    let previous = catalog::compute(
        cache,
        symbol,
        &KpiRequest {
            start_date: Some(req.previous_start),
            end_date: Some(req.previous_end),
            ..filters.clone()
        },
    );
    let current = catalog::compute(
        cache,
        symbol,
        &KpiRequest {
            start_date: Some(req.current_start),
            end_date: Some(req.current_end),
            ..filters
        },
    );

    let (Some(previous_value), Some(current_value)) = (previous.value, current.value) else {
        return Ok(format!(
            "Could not compare the periods numerically.\nPrevious: {}\nCurrent: {}",
            previous.message, current.message
        ));
    };

    let delta = current_value - previous_value;
    let pct = if previous_value != 0.0 {
        delta / previous_value * 100.0
    } else {
        0.0
    };
    let verdict = match classify_change(symbol.direction(), previous_value, current_value) {
        Verdict::Stable => "remained STABLE".to_string(),
        Verdict::Improved => format!("IMPROVED (went {})", if delta > 0.0 { "up" } else { "down" }),
        Verdict::Worsened => format!("WORSENED (went {})", if delta > 0.0 { "up" } else { "down" }),
    };

    let delta_sign = if delta < 0.0 { "-" } else { "+" };
    let pct_sign = if pct < 0.0 { "-" } else { "+" };
    Ok(format!(
        "Evolution analysis - {}:\n\
         - previous period: {}\n\
         - current period: {}\n\
         - change: {}{} ({}{:.1}%)\n\
         - result: the indicator {}.",
        symbol.name(),
        format_thousands(previous_value, 2),
        format_thousands(current_value, 2),
        delta_sign,
        format_thousands(delta.abs(), 2),
        pct_sign,
        pct.abs(),
        verdict
    ))
}

/// Computes one indicator for every month of a year and reports the best
/// and worst month per its direction. Months where the value could not be
/// obtained are skipped, not treated as zero.
pub fn monthly_breakdown(cache: &mut TableCache, req: &MonthlyRequest) -> Result<String> {
    let symbol = KpiSymbol::resolve(&req.indicator)
        .ok_or_else(|| FleetKpiError::UnknownIndicator(req.indicator.clone()))?;
    info!("monthly breakdown [{}] for {}", symbol.name(), req.year);

    let mut results: Vec<(usize, f64)> = Vec::new();
    for month in 1..=12u32 {
        // Out-of-range years produce no computable months.
        let Some(start) = NaiveDate::from_ymd_opt(req.year, month, 1) else {
            continue;
        };
        let end = last_day_of_month(req.year, month);
        let mut month_req = KpiRequest::period(start, end);
        month_req.filter_column = req.filter_column.clone();
        month_req.filter_value = req.filter_value.clone();

        let outcome = catalog::compute(cache, symbol, &month_req);
        if let Some(value) = outcome.value {
            results.push((month as usize - 1, value));
        }
    }

    if results.is_empty() {
        return Ok(format!(
            "No data available to compute {} for the months of {}.",
            symbol.name(),
            req.year
        ));
    }

    let mut text = format!("{} by month in {}:\n", symbol.name(), req.year);
    for (month_idx, value) in &results {
        text.push_str(&format!(
            "- {}: {}\n",
            MONTH_NAMES[*month_idx],
            format_thousands(*value, 2)
        ));
    }

    fn by_value(a: &(usize, f64), b: &(usize, f64)) -> std::cmp::Ordering {
        a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal)
    }
    let highest = results.iter().max_by(|a, b| by_value(a, b)).unwrap();
    let lowest = results.iter().min_by(|a, b| by_value(a, b)).unwrap();
    let (best, worst) = match symbol.direction() {
        Direction::HigherIsBetter => (highest, lowest),
        Direction::LowerIsBetter => (lowest, highest),
    };

    text.push_str(&format!(
        "\nBest month: {} ({})\n",
        MONTH_NAMES[best.0],
        format_thousands(best.1, 2)
    ));
    text.push_str(&format!(
        "Worst month: {} ({})\n",
        MONTH_NAMES[worst.0],
        format_thousands(worst.1, 2)
    ));
    Ok(text)
}

/// The six INDOA components with their goal comparison sense.
const INDOA_PARTS: [(KpiSymbol, bool); 6] = [
    (KpiSymbol::Oemcp, true),
    (KpiSymbol::Oempp, true),
    (KpiSymbol::Cdtdm, true),
    (KpiSymbol::Qett, false),
    (KpiSymbol::Qetg, false),
    (KpiSymbol::Iavlit, false),
];

/// Composite operational score: each component earns 100 points when it
/// meets the company's monthly goal, and the result is the average over
/// the six components.
pub fn indoa(cache: &mut TableCache, req: &KpiRequest) -> Result<KpiOutcome> {
    let company = match (&req.filter_column, &req.filter_value) {
        (Some(column), Some(value)) if column.to_lowercase().contains("empresa") => value.clone(),
        _ => "Leblon".to_string(),
    };
    let reference = req
        .start_date
        .unwrap_or_else(|| Local::now().date_naive());

    let mut points = 0.0;
    let mut details = Vec::new();
    for (symbol, lower_is_better) in INDOA_PARTS {
        let outcome = catalog::compute(cache, symbol, req);
        let goal = match goals::lookup_goal(cache, symbol.name(), &company, reference) {
            Ok(goal) => Some(goal),
            Err(e) => {
                warn!("goal lookup for {} failed: {}", symbol.name(), e);
                None
            }
        };
        match (outcome.value, goal) {
            (Some(value), Some(goal)) => {
                let met = if lower_is_better {
                    value <= goal
                } else {
                    value >= goal
                };
                if met {
                    points += 100.0;
                }
                details.push(format!(
                    "{}: {} (goal: {}) {}",
                    symbol.name(),
                    format_thousands(value, 2),
                    format_thousands(goal, 2),
                    if met { "met" } else { "missed" }
                ));
            }
            _ => details.push(format!("{}: value or goal unavailable", symbol.name())),
        }
    }

    let score = points / 6.0;
    let message = format!(
        "INDOA is {} points.\nBreakdown:\n   {}\n(Score: points achieved / 6, maximum 100. Remember: the higher, the better.)",
        format_thousands(score, 2),
        details.join("\n   ")
    );
    Ok(KpiOutcome::defined(score, message))
}
