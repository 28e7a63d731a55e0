use super::ui;
use crate::core::Rate;
use crate::service::RateService;
use anyhow::Result;
use comfy_table::Cell;

/// Renders a saved batch, sorted by currency.
pub fn display_as_table(rates: &[Rate]) -> String {
    let mut sorted: Vec<&Rate> = rates.iter().collect();
    sorted.sort_by(|a, b| a.currency.cmp(&b.currency));

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Currency"), ui::header_cell("Rate")]);
    for rate in &sorted {
        table.add_row(vec![Cell::new(&rate.currency), ui::value_cell(rate.value)]);
    }

    let as_of = sorted
        .first()
        .map_or("-".to_string(), |r| r.date.to_rfc3339());
    format!(
        "{}\n\n{}\n{}",
        ui::style_text("Saved rates", ui::StyleType::Title),
        table,
        ui::style_text(&format!("As of {as_of}"), ui::StyleType::Subtle)
    )
}

/// One fetch-and-save cycle.
pub async fn run(service: &RateService) -> Result<()> {
    let pb = ui::new_spinner("Fetching rates...");
    let result = service.fetch_and_save().await;
    pb.finish_and_clear();

    let rates = result?;
    println!("{}", display_as_table(&rates));
    Ok(())
}
