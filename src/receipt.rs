//! Receipt
//!
//! Tables comparing the tested candidates and summarising a committed checkout.

use std::io;

use rusty_money::MoneyError;
use tabled::{
    builder::Builder,
    settings::{
        Alignment, Color, Style,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    basket::CommitResult,
    catalog::Catalog,
    compositions::Composition,
    money::{MoneyConversionError, line_total},
    optimiser::{CandidateOutcome, CandidateResult},
};

/// Errors that can occur when writing a receipt.
#[derive(Debug, Error)]
pub enum ReceiptError {
    /// Wrapper for money errors.
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// A line total could not be computed.
    #[error(transparent)]
    Conversion(#[from] MoneyConversionError),

    /// IO error
    #[error("IO error")]
    IO,
}

/// Write a table of every tested candidate, highlighting the winner.
///
/// # Errors
///
/// Returns an error if the table cannot be written.
pub fn write_candidates(
    mut out: impl io::Write,
    candidates: &[CandidateResult],
    winner: Option<&Composition>,
) -> Result<(), ReceiptError> {
    let mut builder = Builder::default();

    builder.push_record(["#", "Composition", "Coupon", "Subtotal", "Total", "Result"]);

    let mut winner_row = None;

    for (idx, candidate) in candidates.iter().enumerate() {
        let [coupon, subtotal, total, result] = outcome_cells(&candidate.outcome);

        if winner_row.is_none() && winner == Some(&candidate.composition) {
            winner_row = Some(idx + 1);
        }

        builder.push_record([
            (idx + 1).to_string(),
            candidate.composition.to_string(),
            coupon,
            subtotal,
            total,
            result,
        ]);
    }

    let mut table = builder.build();

    table.with(Style::modern_rounded());
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(3..5), Alignment::right());

    if let Some(row) = winner_row {
        table.modify(Rows::one(row), Color::FG_GREEN);
    }

    writeln!(out, "\n{table}").map_err(|_err| ReceiptError::IO)
}

fn outcome_cells(outcome: &CandidateOutcome) -> [String; 4] {
    match outcome {
        CandidateOutcome::Priced {
            coupon,
            subtotal,
            total,
            ..
        } => [
            coupon.clone().unwrap_or_else(|| "-".to_string()),
            subtotal.to_string(),
            total.to_string(),
            "priced".to_string(),
        ],
        CandidateOutcome::Rejected { detail } => [
            "-".to_string(),
            String::new(),
            String::new(),
            format!("rejected: {detail}"),
        ],
        CandidateOutcome::CouponRejected { code, detail } => [
            code.clone(),
            String::new(),
            String::new(),
            format!("coupon rejected: {detail}"),
        ],
        CandidateOutcome::OverBudget { total, budget } => [
            "-".to_string(),
            String::new(),
            total.to_string(),
            format!("over budget {budget}"),
        ],
    }
}

/// Write the committed basket and its totals.
///
/// # Errors
///
/// Returns an error if a line total cannot be computed or the receipt cannot be written.
pub fn write_commit(mut out: impl io::Write, commit: &CommitResult) -> Result<(), ReceiptError> {
    let mut builder = Builder::default();

    builder.push_record(["Item", "Qty", "Unit Price", "Line Total"]);

    for line in &commit.lines {
        let (unit_price, amount) = match &line.unit_price {
            Some(price) => (price.to_string(), line_total(price, line.quantity)?.to_string()),
            None => (String::new(), String::new()),
        };

        builder.push_record([
            line.sku.to_string(),
            line.quantity.to_string(),
            unit_price,
            amount,
        ]);
    }

    let mut table = builder.build();

    table.with(Style::modern_rounded());
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(1..4), Alignment::right());

    writeln!(out, "\n{table}").map_err(|_err| ReceiptError::IO)?;

    let savings = commit.subtotal.sub(commit.total)?;

    writeln!(out, " Subtotal: {}", commit.subtotal).map_err(|_err| ReceiptError::IO)?;
    writeln!(
        out,
        " Coupon:   {}",
        commit.coupon.as_deref().unwrap_or("none")
    )
    .map_err(|_err| ReceiptError::IO)?;
    writeln!(out, " Discount: {}", commit.discount).map_err(|_err| ReceiptError::IO)?;
    writeln!(out, " \x1b[1mTotal:    {}\x1b[0m", commit.total).map_err(|_err| ReceiptError::IO)?;
    writeln!(out, " Savings:  {savings}\n").map_err(|_err| ReceiptError::IO)
}

/// Write the fetched catalog.
///
/// # Errors
///
/// Returns an error if the table cannot be written.
pub fn write_catalog(mut out: impl io::Write, catalog: &Catalog) -> Result<(), ReceiptError> {
    let mut builder = Builder::default();

    builder.push_record(["SKU", "Name", "Price", "Available"]);

    for product in catalog.products() {
        builder.push_record([
            product.sku.to_string(),
            product.name.clone(),
            product.price.to_string(),
            product.available.to_string(),
        ]);
    }

    let mut table = builder.build();

    table.with(Style::modern_rounded());
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(2..4), Alignment::right());

    writeln!(out, "\n{table}").map_err(|_err| ReceiptError::IO)?;

    if let Some(error) = catalog.incomplete_reason() {
        writeln!(out, " Incomplete listing: {error}").map_err(|_err| ReceiptError::IO)?;
    }

    Ok(())
}
