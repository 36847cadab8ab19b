//! Text rendering of one table page for CLI output.

use crate::model::RecordKind;
use crate::table::{Page, SortDirection, ViewState};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

fn sort_label(view: &ViewState) -> String {
    match (view.sort.key, view.sort.direction) {
        (Some(key), SortDirection::Asc) => format!("{} asc", key.label()),
        (Some(key), SortDirection::Desc) => format!("{} desc", key.label()),
        _ => "none".to_string(),
    }
}

pub(crate) fn build_text_summary(kind: RecordKind, view: &ViewState, page: &Page) -> TextSummary {
    let mut lines = Vec::new();

    let mut header = format!("{}: {}", kind.title(), page.range_label());
    if !view.filter.is_empty() {
        header.push_str(&format!(" (filter: {:?})", view.filter));
    }
    header.push_str(&format!(", sort: {}", sort_label(view)));
    lines.push(header);

    let name_w = page
        .rows
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(4);
    lines.push(format!(
        "{:>6}  {:<name_w$}  {:>12}  {:>10}",
        "ID", "Name", "Price", "Amount"
    ));
    for r in &page.rows {
        lines.push(format!(
            "{:>6}  {:<name_w$}  {:>12}  {:>10}",
            r.id, r.name, r.price, r.amount
        ));
    }
    if page.rows.is_empty() {
        lines.push("(no records)".to_string());
    }

    TextSummary { lines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;
    use crate::table::{render_page, SortKey, SortState};

    #[test]
    fn renders_header_and_rows() {
        let data = vec![
            Record {
                id: 1,
                name: "A".into(),
                price: "10.0000".into(),
                amount: "5".into(),
            },
            Record {
                id: 2,
                name: "Bravo".into(),
                price: "20.0000".into(),
                amount: "3".into(),
            },
        ];
        let view = ViewState {
            sort: SortState::new(SortKey::Price, SortDirection::Desc),
            ..Default::default()
        };
        let page = render_page(&data, &view);
        let s = build_text_summary(RecordKind::Stocks, &view, &page);

        assert_eq!(s.lines[0], "Stocks: 1 - 2 of 2, sort: Price desc");
        assert!(s.lines[1].contains("Name"));
        assert!(s.lines[2].contains("Bravo"));
        assert!(s.lines[3].trim_start().starts_with('1'));
    }

    #[test]
    fn empty_page_says_so() {
        let view = ViewState {
            filter: "zzz".into(),
            ..Default::default()
        };
        let page = render_page(&[], &view);
        let s = build_text_summary(RecordKind::Brokers, &view, &page);
        assert!(s.lines[0].contains("filter: \"zzz\""));
        assert!(s.lines.iter().all(|l| l.is_ascii()));
        assert_eq!(s.lines.last().map(String::as_str), Some("(no records)"));
    }
}
