//! The KPI catalog: a fixed registry of metric symbols, each with a compute
//! function and a direction of improvement decided at registration time.
//!
//! Every compute takes the same request shape, applies the period filter
//! and then the optional categorical filter, identifies its columns by
//! normalized substring search and returns a [`KpiOutcome`]: the formatted
//! result string plus the structured value it embeds (absent when the
//! metric is undefined for the slice).

use crate::error::{FleetKpiError, Result};
use crate::period::filter_by_period;
use crate::schema::KpiRequest;
use crate::store::TableCache;
use crate::table::{filter_by_value, Cell, Table, ValueFilter};
use crate::text::{format_thousands, normalize};
use log::{debug, error, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Whether higher or lower values of a KPI are considered better.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

/// Every registered KPI symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum KpiSymbol {
    Icmq,
    Idf,
    Imp,
    Oemcp,
    Oempp,
    KmFalhas,
    Qetg,
    Qett,
    Cdtdm,
    To,
    Topp,
    PreventivasLiquidadas,
    Iavlit,
    Pcv,
    Ioalo,
    Indoa,
    Caiefo,
    Qva,
    Qvv,
    Tic,
    Tia,
}

impl KpiSymbol {
    /// Registration order; the fuzzy lookup walks it front to back.
    pub const ALL: [KpiSymbol; 21] = [
        KpiSymbol::Icmq,
        KpiSymbol::Idf,
        KpiSymbol::Imp,
        KpiSymbol::Oemcp,
        KpiSymbol::Oempp,
        KpiSymbol::KmFalhas,
        KpiSymbol::Qetg,
        KpiSymbol::Qett,
        KpiSymbol::Cdtdm,
        KpiSymbol::To,
        KpiSymbol::Topp,
        KpiSymbol::PreventivasLiquidadas,
        KpiSymbol::Iavlit,
        KpiSymbol::Pcv,
        KpiSymbol::Ioalo,
        KpiSymbol::Indoa,
        KpiSymbol::Caiefo,
        KpiSymbol::Qva,
        KpiSymbol::Qvv,
        KpiSymbol::Tic,
        KpiSymbol::Tia,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            KpiSymbol::Icmq => "ICMQ",
            KpiSymbol::Idf => "IDF",
            KpiSymbol::Imp => "IMP",
            KpiSymbol::Oemcp => "OEMCP",
            KpiSymbol::Oempp => "OEMPP",
            KpiSymbol::KmFalhas => "KMFALHAS",
            KpiSymbol::Qetg => "QETG",
            KpiSymbol::Qett => "QETT",
            KpiSymbol::Cdtdm => "CDTDM",
            KpiSymbol::To => "TO",
            KpiSymbol::Topp => "TOPP",
            KpiSymbol::PreventivasLiquidadas => "PREVENTIVAS LIQUIDADAS",
            KpiSymbol::Iavlit => "IAVLIT",
            KpiSymbol::Pcv => "PCV",
            KpiSymbol::Ioalo => "IOALO",
            KpiSymbol::Indoa => "INDOA",
            KpiSymbol::Caiefo => "CAIEFO",
            KpiSymbol::Qva => "QVA",
            KpiSymbol::Qvv => "QVV",
            KpiSymbol::Tic => "TIC",
            KpiSymbol::Tia => "TIA",
        }
    }

    /// Direction of improvement, fixed at registration. The manual survey
    /// symbols default to lower-is-better (penalty scores).
    pub fn direction(&self) -> Direction {
        match self {
            KpiSymbol::Idf
            | KpiSymbol::Imp
            | KpiSymbol::KmFalhas
            | KpiSymbol::Qetg
            | KpiSymbol::Qett
            | KpiSymbol::PreventivasLiquidadas
            | KpiSymbol::Iavlit
            | KpiSymbol::Pcv
            | KpiSymbol::Ioalo
            | KpiSymbol::Indoa => Direction::HigherIsBetter,
            KpiSymbol::Icmq
            | KpiSymbol::Oemcp
            | KpiSymbol::Oempp
            | KpiSymbol::Cdtdm
            | KpiSymbol::To
            | KpiSymbol::Topp
            | KpiSymbol::Caiefo
            | KpiSymbol::Qva
            | KpiSymbol::Qvv
            | KpiSymbol::Tic
            | KpiSymbol::Tia => Direction::LowerIsBetter,
        }
    }

    /// Bounded fuzzy lookup: exact symbol name first, then the first
    /// registered symbol that is a substring of, or contains, the
    /// requested name.
    pub fn resolve(requested: &str) -> Option<KpiSymbol> {
        let wanted = requested.trim().to_uppercase();
        if wanted.is_empty() {
            return None;
        }
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.name() == wanted)
            .or_else(|| {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|s| wanted.contains(s.name()) || s.name().contains(wanted.as_str()))
            })
    }
}

/// Result of one KPI computation. The message alone crosses the public
/// boundary; the value feeds the evolution/monthly/composite layers
/// without re-parsing prose.
#[derive(Debug, Clone)]
pub struct KpiOutcome {
    pub value: Option<f64>,
    pub message: String,
}

impl KpiOutcome {
    pub fn defined(value: f64, message: String) -> Self {
        Self {
            value: Some(value),
            message,
        }
    }

    pub fn undefined(message: String) -> Self {
        Self {
            value: None,
            message,
        }
    }
}

/// Computes one KPI. Total: internal errors are logged and folded into the
/// outcome message.
pub fn compute(cache: &mut TableCache, symbol: KpiSymbol, req: &KpiRequest) -> KpiOutcome {
    info!(
        "computing {} ({:?} to {:?})",
        symbol.name(),
        req.start_date,
        req.end_date
    );
    let result = match symbol {
        KpiSymbol::Icmq => icmq(cache, req),
        KpiSymbol::Idf => idf(cache, req),
        KpiSymbol::Imp => imp(cache, req),
        KpiSymbol::Oemcp => pending_orders(cache, req, "OEMCP", &["corretiva"]),
        KpiSymbol::Oempp => pending_orders(cache, req, "OEMPP", &["preventiva", "inspecao"]),
        KpiSymbol::KmFalhas => km_falhas(cache, req),
        KpiSymbol::Qetg => swaps_per_km(cache, req, "QETG", "garagem"),
        KpiSymbol::Qett => swaps_per_km(cache, req, "QETT", "terminal"),
        KpiSymbol::Cdtdm => cdtdm(cache, req),
        KpiSymbol::To => prefix_indicator(cache, req, "TO", 2),
        KpiSymbol::Topp => prefix_indicator(cache, req, "TOPP", 4),
        KpiSymbol::PreventivasLiquidadas => preventivas_liquidadas(cache, req),
        KpiSymbol::Iavlit => iavlit(cache, req),
        KpiSymbol::Pcv => pcv(cache, req),
        KpiSymbol::Ioalo => ioalo(cache, req),
        KpiSymbol::Indoa => crate::evolution::indoa(cache, req),
        KpiSymbol::Caiefo => prefix_indicator(cache, req, "CAIEFO", 6),
        KpiSymbol::Qva => prefix_indicator(cache, req, "QVA", 3),
        KpiSymbol::Qvv => prefix_indicator(cache, req, "QVV", 3),
        KpiSymbol::Tic => prefix_indicator(cache, req, "TIC", 3),
        KpiSymbol::Tia => prefix_indicator(cache, req, "TIA", 3),
    };
    result.unwrap_or_else(|e| {
        error!("{} failed: {}", symbol.name(), e);
        KpiOutcome::undefined(format!("{}: {}", symbol.name(), e))
    })
}

fn load_period(cache: &mut TableCache, name: &str, req: &KpiRequest) -> Result<(Table, String)> {
    let table = cache
        .load(name)
        .ok_or_else(|| FleetKpiError::TableNotFound(name.to_string()))?;
    Ok(filter_by_period(&table, name, req.start_date, req.end_date))
}

/// Applies the optional categorical filter. A filter whose column cannot
/// be resolved leaves the table untouched; a filter that matched zero rows
/// empties it.
fn apply_value_filter(table: Table, req: &KpiRequest) -> Table {
    let (Some(column), Some(value)) = (&req.filter_column, &req.filter_value) else {
        return table;
    };
    match filter_by_value(&table, column, value) {
        ValueFilter::Matched { table, .. } => table,
        ValueFilter::Empty(empty) => empty,
        ValueFilter::NoColumn => table,
    }
}

fn required_column(table: &Table, term: &str) -> Result<String> {
    table
        .first_matching_column(term)
        .ok_or_else(|| FleetKpiError::ColumnsNotFound {
            table: table.name.clone(),
            details: term.to_string(),
        })
}

fn required_index(table: &Table, term: &str) -> Result<usize> {
    table
        .first_matching_column(term)
        .and_then(|c| table.column_index(&c))
        .ok_or_else(|| FleetKpiError::ColumnsNotFound {
            table: table.name.clone(),
            details: term.to_string(),
        })
}

/// Order status column: situacaodocumento, then status, then any situacao
/// column that is not a date/time field.
fn status_column(table: &Table) -> Option<usize> {
    table
        .first_matching_column("situacaodocumento")
        .or_else(|| table.first_matching_column("status"))
        .or_else(|| {
            table
                .columns
                .iter()
                .find(|c| {
                    let n = normalize(c);
                    n.contains("situacao")
                        && !n.contains("dt")
                        && !n.contains("hr")
                        && !n.contains("data")
                })
                .cloned()
        })
        .and_then(|c| table.column_index(&c))
}

fn service_detail_column(table: &Table) -> Result<usize> {
    table
        .columns
        .iter()
        .position(|c| {
            let n = normalize(c);
            n.contains("detalhesservico") || n.contains("tipo")
        })
        .ok_or_else(|| FleetKpiError::ColumnsNotFound {
            table: table.name.clone(),
            details: "detalhesservico/tipo".to_string(),
        })
}

fn distinct_where<F>(table: &Table, id_idx: usize, pred: F) -> usize
where
    F: Fn(&[Cell]) -> bool,
{
    let mut seen = HashSet::new();
    for row in table.rows.iter().filter(|r| pred(r)) {
        if !row[id_idx].is_null() {
            seen.insert(row[id_idx].to_string());
        }
    }
    seen.len()
}

/// Maintenance cost per kilometer driven.
fn icmq(cache: &mut TableCache, req: &KpiRequest) -> Result<KpiOutcome> {
    let (costs, _) = load_period(cache, "CTM", req)?;
    let (kms, _) = load_period(cache, "IND003", req)?;
    if costs.is_empty() && kms.is_empty() {
        return Ok(KpiOutcome::undefined(
            "ICMQ: no data for the requested period.".to_string(),
        ));
    }
    let costs = apply_value_filter(costs, req);
    let kms = apply_value_filter(kms, req);

    let cost_col = required_column(&costs, "valorgasto")?;
    let km_col = required_column(&kms, "kmrodado")?;

    let total_cost = costs.sum_numeric(&cost_col);
    let total_km = kms.sum_numeric(&km_col);

    if total_km == 0.0 {
        return Ok(KpiOutcome::undefined(format!(
            "ICMQ: undefined (km = 0). Cost: R$ {}",
            format_thousands(total_cost, 2)
        )));
    }
    let icmq = total_cost / total_km;
    Ok(KpiOutcome::defined(
        icmq,
        format!(
            "ICMQ is R$ {}/km (remember: the lower, the better).",
            format_thousands(icmq, 4)
        ),
    ))
}

/// Failure index: share of scheduled departures that did not require a
/// part swap.
fn idf(cache: &mut TableCache, req: &KpiRequest) -> Result<KpiOutcome> {
    let (departures, _) = load_period(cache, "MANT004", req)?;
    let (swaps, _) = load_period(cache, "MANT001", req)?;
    let departures = apply_value_filter(departures, req);
    let swaps = apply_value_filter(swaps, req);

    let scheduled = departures
        .first_matching_column("oidfcvprogramada")
        .map(|c| departures.distinct_count(&c))
        .unwrap_or(0);
    let swapped = swaps
        .first_matching_column("oiddocumento")
        .map(|c| swaps.distinct_count(&c))
        .unwrap_or(0);

    if scheduled == 0 {
        return Ok(KpiOutcome::undefined(
            "IDF: undefined (0 scheduled departures).".to_string(),
        ));
    }
    let idf = (scheduled as f64 - swapped as f64) / scheduled as f64 * 100.0;
    Ok(KpiOutcome::defined(
        idf,
        format!("IDF is {:.2}% (remember: the higher, the better).", idf),
    ))
}

/// Share of distinct preventive/inspection work orders over all
/// preventive plus corrective orders.
fn imp(cache: &mut TableCache, req: &KpiRequest) -> Result<KpiOutcome> {
    let (orders, _) = load_period(cache, "MANT002", req)?;
    let orders = apply_value_filter(orders, req);

    let type_idx = required_index(&orders, "tipomanutencao")?;
    let id_idx = required_index(&orders, "oiddocumento")?;

    let preventive = distinct_where(&orders, id_idx, |row| {
        let kind = normalize(&row[type_idx].to_string());
        kind.contains("preventiva") || kind.contains("inspecao")
    });
    let corrective = distinct_where(&orders, id_idx, |row| {
        normalize(&row[type_idx].to_string()).contains("corretiva")
    });

    let total = preventive + corrective;
    if total == 0 {
        return Ok(KpiOutcome::undefined("IMP: undefined.".to_string()));
    }
    let imp = preventive as f64 / total as f64 * 100.0;
    Ok(KpiOutcome::defined(
        imp,
        format!("IMP is {:.2}% (remember: the higher, the better).", imp),
    ))
}

const PENDING_STATUSES: [&str; 4] = ["aguardando liberacao", "parado", "liberado", "em execucao"];

/// Distinct open work orders of the given maintenance types (OEMCP for
/// corrective, OEMPP for preventive/inspection).
fn pending_orders(
    cache: &mut TableCache,
    req: &KpiRequest,
    name: &str,
    type_patterns: &[&str],
) -> Result<KpiOutcome> {
    let (orders, suffix) = load_period(cache, "MANT002", req)?;
    if orders.is_empty() {
        return Ok(KpiOutcome::undefined(format!(
            "{}: no data for the requested period.{}",
            name, suffix
        )));
    }
    let orders = apply_value_filter(orders, req);

    let type_idx = required_index(&orders, "tipomanutencao")?;
    let id_idx = required_index(&orders, "oiddocumento")?;
    let status_idx = status_column(&orders).ok_or_else(|| FleetKpiError::ColumnsNotFound {
        table: orders.name.clone(),
        details: "situacao/status".to_string(),
    })?;

    let count = distinct_where(&orders, id_idx, |row| {
        let kind = normalize(&row[type_idx].to_string());
        let status = normalize(&row[status_idx].to_string());
        type_patterns.iter().any(|p| kind.contains(p))
            && PENDING_STATUSES.iter().any(|s| status.contains(s))
    });

    Ok(KpiOutcome::defined(
        count as f64,
        format!(
            "{} is {} orders (remember: the lower, the better).",
            name, count
        ),
    ))
}

/// Distinct preventive/inspection work orders already liquidated.
fn preventivas_liquidadas(cache: &mut TableCache, req: &KpiRequest) -> Result<KpiOutcome> {
    let (orders, suffix) = load_period(cache, "MANT002", req)?;
    if orders.is_empty() {
        return Ok(KpiOutcome::defined(
            0.0,
            format!("Preventivas Liquidadas: 0 orders (no data).{}", suffix),
        ));
    }
    let orders = apply_value_filter(orders, req);

    let type_idx = required_index(&orders, "tipomanutencao")?;
    let id_idx = required_index(&orders, "oiddocumento")?;
    let status_idx = status_column(&orders).ok_or_else(|| FleetKpiError::ColumnsNotFound {
        table: orders.name.clone(),
        details: "situacao/status".to_string(),
    })?;

    let count = distinct_where(&orders, id_idx, |row| {
        let kind = normalize(&row[type_idx].to_string());
        let status = normalize(&row[status_idx].to_string());
        (kind.contains("preventiva") || kind.contains("inspecao")) && status.contains("liquidado")
    });

    Ok(KpiOutcome::defined(
        count as f64,
        format!(
            "Preventivas Liquidadas: {} orders (remember: the higher, the better).",
            count
        ),
    ))
}

/// Kilometers driven per breakdown occurrence.
fn km_falhas(cache: &mut TableCache, req: &KpiRequest) -> Result<KpiOutcome> {
    let (kms, _) = load_period(cache, "IND003", req)?;
    let (occurrences, _) = load_period(cache, "MANT001", req)?;
    let kms = apply_value_filter(kms, req);
    let occurrences = apply_value_filter(occurrences, req);

    let km_col = required_column(&kms, "kmrodado")?;
    let detail_idx = service_detail_column(&occurrences)?;

    let total_km = kms.sum_numeric(&km_col);
    let breakdowns = occurrences
        .rows
        .iter()
        .filter(|row| normalize(&row[detail_idx].to_string()).contains("quebra"))
        .count();

    if breakdowns == 0 {
        return Ok(KpiOutcome::undefined(format!(
            "KmFalhas: undefined (0 breakdowns). Km: {}",
            total_km
        )));
    }
    let ratio = total_km / breakdowns as f64;
    Ok(KpiOutcome::defined(
        ratio,
        format!(
            "KmFalhas is {} km/breakdown (remember: the higher, the better).",
            format_thousands(ratio, 2)
        ),
    ))
}

/// Kilometers driven per distinct swap occurrence at the given location
/// (QETG for garage swaps, QETT for terminal swaps).
fn swaps_per_km(
    cache: &mut TableCache,
    req: &KpiRequest,
    name: &str,
    location: &str,
) -> Result<KpiOutcome> {
    let (kms, _) = load_period(cache, "IND003", req)?;
    let (occurrences, _) = load_period(cache, "MANT001", req)?;
    let kms = apply_value_filter(kms, req);
    let occurrences = apply_value_filter(occurrences, req);

    let km_col = required_column(&kms, "kmrodado")?;
    let detail_idx = service_detail_column(&occurrences)?;
    let id_idx = required_index(&occurrences, "oiddocumento")?;

    let total_km = kms.sum_numeric(&km_col);
    let swaps = distinct_where(&occurrences, id_idx, |row| {
        normalize(&row[detail_idx].to_string()).contains(location)
    });

    if swaps == 0 {
        return Ok(KpiOutcome::undefined(format!(
            "{}: undefined. Km: {}",
            name, total_km
        )));
    }
    let ratio = total_km / swaps as f64;
    Ok(KpiOutcome::defined(
        ratio,
        format!(
            "{} is {} km/swap (remember: the higher, the better).",
            name,
            format_thousands(ratio, 2)
        ),
    ))
}

fn manual_table(cache: &mut TableCache, req: &KpiRequest) -> Result<Table> {
    let (table, _) = load_period(cache, "INDMANTMANUAL", req)?;
    Ok(apply_value_filter(table, req))
}

/// Accumulated score of a manually surveyed indicator, matched by a fixed
/// prefix of the description field.
fn prefix_indicator(
    cache: &mut TableCache,
    req: &KpiRequest,
    name: &str,
    chars: usize,
) -> Result<KpiOutcome> {
    let table = manual_table(cache, req)?;
    let value_idx = required_index(&table, "valor")?;
    let desc_idx = required_index(&table, "descricao")?;

    let wanted = name.to_uppercase();
    let total: f64 = table
        .rows
        .iter()
        .filter(|row| {
            let desc = row[desc_idx].to_string();
            desc.trim().to_uppercase().chars().take(chars).collect::<String>() == wanted
        })
        .map(|row| row[value_idx].as_f64().unwrap_or(0.0))
        .sum();

    let message = if matches!(name, "TO" | "TOPP") {
        format!(
            "Accumulated {} index: {} points (remember: the lower, the better).",
            name,
            format_thousands(total, 2)
        )
    } else {
        format!(
            "Accumulated {} index: {} points.",
            name,
            format_thousands(total, 2)
        )
    };
    Ok(KpiOutcome::defined(total, message))
}

/// Accumulated demerit score of rows whose symbol field is exactly CDTDML.
fn cdtdm(cache: &mut TableCache, req: &KpiRequest) -> Result<KpiOutcome> {
    let table = manual_table(cache, req)?;
    let value_idx = required_index(&table, "valor")?;
    let symbol_idx = required_index(&table, "simbolo")?;

    let total: f64 = table
        .rows
        .iter()
        .filter(|row| {
            let symbol = row[symbol_idx].to_string();
            symbol.trim().to_uppercase() == "CDTDML"
        })
        .map(|row| row[value_idx].as_f64().unwrap_or(0.0))
        .sum();

    Ok(KpiOutcome::defined(
        total,
        format!(
            "Total CDTDM score is {} points (remember: the lower, the better).",
            format_thousands(total, 2)
        ),
    ))
}

/// Sum of rows matched by exact symbol OR fixed-length description prefix.
fn symbol_sum(
    table: &Table,
    value_idx: usize,
    symbol_idx: Option<usize>,
    desc_idx: Option<usize>,
    symbol: &str,
    chars: usize,
) -> f64 {
    let wanted = symbol.to_uppercase();
    table
        .rows
        .iter()
        .filter(|row| {
            let by_symbol = symbol_idx
                .is_some_and(|i| row[i].to_string().trim().to_uppercase() == wanted);
            let by_desc = desc_idx.is_some_and(|i| {
                let desc = row[i].to_string();
                desc.trim().to_uppercase().chars().take(chars).collect::<String>() == wanted
            });
            by_symbol || by_desc
        })
        .map(|row| row[value_idx].as_f64().unwrap_or(0.0))
        .sum()
}

fn optional_column(table: &Table, term: &str) -> Option<usize> {
    table
        .first_matching_column(term)
        .and_then(|c| table.column_index(&c))
}

/// Approved vehicles over inspected vehicles.
fn iavlit(cache: &mut TableCache, req: &KpiRequest) -> Result<KpiOutcome> {
    let table = manual_table(cache, req)?;
    let value_idx = required_index(&table, "valor")?;
    let symbol_idx = optional_column(&table, "simbolo");
    let desc_idx = optional_column(&table, "descricao");

    let qva = symbol_sum(&table, value_idx, symbol_idx, desc_idx, "QVA", 3);
    let qvv = symbol_sum(&table, value_idx, symbol_idx, desc_idx, "QVV", 3);
    debug!("IAVLIT components: QVA {} / QVV {}", qva, qvv);

    if qva == 0.0 && qvv == 0.0 {
        return Ok(KpiOutcome::defined(
            1.0,
            "IAVLIT is 1.00 (QVA and QVV are both zero).".to_string(),
        ));
    }
    if qvv == 0.0 {
        return Ok(KpiOutcome::undefined(format!(
            "IAVLIT: undefined (QVA: {}).",
            qva
        )));
    }
    let ratio = qva / qvv;
    Ok(KpiOutcome::defined(
        ratio,
        format!(
            "IAVLIT is {} (QVA: {} / QVV: {}) (remember: the higher, the better).",
            format_thousands(ratio, 4),
            format_thousands(qva, 0),
            format_thousands(qvv, 0)
        ),
    ))
}

/// Conforming items against a 66% target of evaluated items, capped at 1.
fn pcv(cache: &mut TableCache, req: &KpiRequest) -> Result<KpiOutcome> {
    let table = manual_table(cache, req)?;
    let value_idx = required_index(&table, "valor")?;
    let symbol_idx = optional_column(&table, "simbolo");
    let desc_idx = optional_column(&table, "descricao");

    let tic = symbol_sum(&table, value_idx, symbol_idx, desc_idx, "TIC", 3);
    let tia = symbol_sum(&table, value_idx, symbol_idx, desc_idx, "TIA", 3);

    let target = tia * 0.66;
    if target == 0.0 {
        return Ok(KpiOutcome::defined(
            100.0,
            "PCV: 100.00% (zero TIA base).".to_string(),
        ));
    }
    let shown = (tic / target).min(1.0) * 100.0;
    Ok(KpiOutcome::defined(
        shown,
        format!(
            "PCV is {:.2}% (TIC: {} / target: {:.1}) (remember: the higher, the better).",
            shown, tic, target
        ),
    ))
}

/// Approved garage inspections over performed garage inspections.
fn ioalo(cache: &mut TableCache, req: &KpiRequest) -> Result<KpiOutcome> {
    let table = manual_table(cache, req)?;
    let value_idx = required_index(&table, "valor")?;
    let symbol_idx = optional_column(&table, "simbolo");
    let desc_idx = optional_column(&table, "descricao");

    let approved = symbol_sum(&table, value_idx, symbol_idx, desc_idx, "CAIEMF", 6);
    let inspected = symbol_sum(&table, value_idx, symbol_idx, desc_idx, "CAIEFO", 6);

    if inspected == 0.0 {
        return Ok(KpiOutcome::undefined("IOALO: undefined.".to_string()));
    }
    let shown = approved / inspected * 100.0;
    Ok(KpiOutcome::defined(
        shown,
        format!(
            "IOALO is {:.2}% ({} / {}) (remember: the higher, the better).",
            shown, approved, inspected
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    fn seeded_cache() -> TableCache {
        let store = SqliteStore::in_memory().unwrap();
        store
            .connection()
            .execute_batch(
                "CREATE TABLE CTM (DtGasto TEXT, ValorGasto REAL, Onibus TEXT);
                 INSERT INTO CTM VALUES
                   ('2024-01-10', 100.0, 'B 1151'),
                   ('2024-01-20', 200.0, 'B 2040'),
                   ('2024-02-05', 900.0, 'B 1151');
                 CREATE TABLE IND003 (DtOperacao TEXT, KmRodado REAL, Onibus TEXT);
                 INSERT INTO IND003 VALUES
                   ('2024-01-15', 300.0, 'B 1151'),
                   ('2024-02-10', 450.0, 'B 2040');
                 CREATE TABLE MANT002 (DtManutencao TEXT, TipoManutencao TEXT, SituacaoDocumento TEXT, OidDocumento INTEGER);
                 INSERT INTO MANT002 VALUES
                   ('2024-01-05', 'Corretiva', 'Aguardando Liberação', 1),
                   ('2024-01-06', 'Corretiva', 'Parado', 1),
                   ('2024-01-07', 'Corretiva', 'Em Execução', 2),
                   ('2024-01-08', 'Corretiva', 'Liquidado', 3),
                   ('2024-01-09', 'Preventiva', 'Liberado', 4),
                   ('2024-01-10', 'Inspeção', 'Liquidado', 5);
                 CREATE TABLE INDMANTMANUAL (DtMovimento TEXT, Simbolo TEXT, Descricao TEXT, Valor REAL);
                 INSERT INTO INDMANTMANUAL VALUES
                   ('2024-01-03', 'QVA', 'QVA - aprovados', 8.0),
                   ('2024-01-03', 'QVV', 'QVV - vistoriados', 10.0),
                   ('2024-01-04', NULL, 'TOPndencias', 7.0),
                   ('2024-01-04', 'CDTDML', 'demerito', 3.5),
                   ('2024-01-05', 'CDTDML', 'demerito', 1.5);",
            )
            .unwrap();
        TableCache::new(Box::new(store))
    }

    fn january() -> KpiRequest {
        KpiRequest::period(
            chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
    }

    #[test]
    fn test_icmq_cost_over_km() {
        let mut cache = seeded_cache();
        let outcome = compute(&mut cache, KpiSymbol::Icmq, &january());
        assert_eq!(outcome.value, Some(1.0));
        assert!(outcome.message.contains("1.0000"));
    }

    #[test]
    fn test_icmq_zero_km_is_undefined() {
        let mut cache = seeded_cache();
        // Filter down to a slice with costs but no km rows.
        let req = january().with_filter("onibus", "b 2040");
        let outcome = compute(&mut cache, KpiSymbol::Icmq, &req);
        assert!(outcome.value.is_none());
        assert!(outcome.message.contains("undefined"));
        assert!(!outcome.message.contains("NaN"));
        assert!(!outcome.message.contains("inf"));
    }

    #[test]
    fn test_oemcp_counts_distinct_pending_corrective() {
        let mut cache = seeded_cache();
        let outcome = compute(&mut cache, KpiSymbol::Oemcp, &january());
        // Docs 1 and 2 are pending corrective; doc 3 is liquidated.
        assert_eq!(outcome.value, Some(2.0));
    }

    #[test]
    fn test_oempp_and_liquidated_preventives() {
        let mut cache = seeded_cache();
        let pending = compute(&mut cache, KpiSymbol::Oempp, &january());
        assert_eq!(pending.value, Some(1.0));
        let liquidated = compute(&mut cache, KpiSymbol::PreventivasLiquidadas, &january());
        assert_eq!(liquidated.value, Some(1.0));
    }

    #[test]
    fn test_imp_preventive_share() {
        let mut cache = seeded_cache();
        let outcome = compute(&mut cache, KpiSymbol::Imp, &january());
        // 2 distinct preventive/inspection, 3 distinct corrective.
        assert_eq!(outcome.value, Some(2.0 / 5.0 * 100.0));
    }

    #[test]
    fn test_prefix_indicator_matches_description_prefix() {
        let mut cache = seeded_cache();
        let outcome = compute(&mut cache, KpiSymbol::To, &january());
        // "TOPndencias" starts with "TO"; the QVA/QVV rows do not.
        assert_eq!(outcome.value, Some(7.0));
    }

    #[test]
    fn test_cdtdm_exact_symbol() {
        let mut cache = seeded_cache();
        let outcome = compute(&mut cache, KpiSymbol::Cdtdm, &january());
        assert_eq!(outcome.value, Some(5.0));
    }

    #[test]
    fn test_iavlit_ratio_and_zero_cases() {
        let mut cache = seeded_cache();
        let outcome = compute(&mut cache, KpiSymbol::Iavlit, &january());
        assert_eq!(outcome.value, Some(0.8));

        // February has no manual rows at all: both sums are zero.
        let feb = KpiRequest::period(
            chrono::NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
        );
        let outcome = compute(&mut cache, KpiSymbol::Iavlit, &feb);
        assert_eq!(outcome.value, Some(1.0));
    }

    #[test]
    fn test_missing_table_reports_not_found() {
        let store = SqliteStore::in_memory().unwrap();
        let mut cache = TableCache::new(Box::new(store));
        let outcome = compute(&mut cache, KpiSymbol::Icmq, &january());
        assert!(outcome.value.is_none());
        assert!(outcome.message.contains("not found"));
    }

    #[test]
    fn test_resolve_exact_and_fuzzy() {
        assert_eq!(KpiSymbol::resolve("ICMQ"), Some(KpiSymbol::Icmq));
        assert_eq!(KpiSymbol::resolve("kmfalhas"), Some(KpiSymbol::KmFalhas));
        assert_eq!(
            KpiSymbol::resolve("Preventivas Liquidadas"),
            Some(KpiSymbol::PreventivasLiquidadas)
        );
        // Substring either way: a decorated request still resolves.
        assert_eq!(KpiSymbol::resolve("indice ICMQ"), Some(KpiSymbol::Icmq));
        assert_eq!(KpiSymbol::resolve("QET"), Some(KpiSymbol::Qetg));
        assert_eq!(KpiSymbol::resolve("unknown metric"), None);
    }

    #[test]
    fn test_direction_registry() {
        assert_eq!(KpiSymbol::Icmq.direction(), Direction::LowerIsBetter);
        assert_eq!(KpiSymbol::Idf.direction(), Direction::HigherIsBetter);
        assert_eq!(KpiSymbol::To.direction(), Direction::LowerIsBetter);
        assert_eq!(KpiSymbol::Indoa.direction(), Direction::HigherIsBetter);
    }
}
