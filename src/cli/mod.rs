//! Terminal rendering of a metrics report for `contactdesk_report`.

mod table;

pub use table::{terminal_width, Table};

use crate::metrics::{DerivedMetrics, FormattedMetrics};

/// Summary plus one table per dashboard chart, in dashboard order.
pub fn report_tables(metrics: &DerivedMetrics, formatted: &FormattedMetrics) -> Vec<Table> {
    let mut summary = Table::new(format!("Resumen {}", metrics.reference_date), &["métrica", "valor"]);
    summary.push_row(vec!["Contactos hoy".into(), formatted.today_count.clone()]);
    summary.push_row(vec!["Total de contactos".into(), formatted.total_count.clone()]);
    summary.push_row(vec!["Motivo más frecuente".into(), formatted.most_frequent_reason.clone()]);
    summary.push_row(vec!["Sin calificar".into(), formatted.unrated_count.clone()]);

    let mut types = Table::new("Tipos de requerimiento", &["#", "tipo", "total", "%"]);
    for slice in &formatted.top_requirement_types {
        types.push_row(vec![
            slice.palette_slot.to_string(),
            slice.label.clone(),
            slice.formatted_count.clone(),
            format!("{}%", slice.percent),
        ]);
    }

    let mut satisfaction = Table::new("Nivel de satisfacción", &["nivel", "total"]);
    for bucket in &formatted.satisfaction_histogram {
        satisfaction.push_row(vec![bucket.key.clone(), bucket.formatted_count.clone()]);
    }

    let mut daily = Table::new("Últimos 7 días", &["día", "fecha", "total"]);
    for (bucket, day) in formatted.daily_series.iter().zip(&metrics.daily_series) {
        daily.push_row(vec![bucket.key.clone(), day.date.to_string(), bucket.formatted_count.clone()]);
    }

    vec![summary, types, satisfaction, daily]
}

pub fn print_report(metrics: &DerivedMetrics, formatted: &FormattedMetrics, color: bool) {
    let termw = terminal_width();
    crate::tprintln!("[cli] detected terminal width={} columns", termw);
    for table in report_tables(metrics, formatted) {
        for line in table.render(termw, color) {
            println!("{}", line);
        }
        println!();
    }
}
