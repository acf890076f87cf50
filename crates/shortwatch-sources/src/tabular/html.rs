//! HTML tables and link discovery.

use super::Table;
use scraper::{ElementRef, Html, Selector};
use shortwatch_browser::PageLink;
use shortwatch_core::normalize::collapse_whitespace;
use shortwatch_core::RawValue;
use std::sync::OnceLock;
use url::Url;

/// Elements before a table searched for a heading.
const HEADING_LOOKBEHIND: usize = 5;

/// One `<tr>` with its cell text and the links inside it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HtmlRow {
    /// Text of each `<td>`/`<th>`, whitespace-collapsed
    pub cells: Vec<String>,
    /// Raw `href` values of anchors in the row
    pub links: Vec<String>,
}

/// A table found in a page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HtmlTable {
    /// Caption, or text of the closest preceding elements
    pub heading: String,
    /// Rows in document order, header rows included
    pub rows: Vec<HtmlRow>,
}

impl HtmlTable {
    /// Convert to a [`Table`] named after the heading.
    #[must_use]
    pub fn to_table(&self) -> Table {
        let rows = self
            .rows
            .iter()
            .map(|row| row.cells.iter().map(|cell| RawValue::text(cell.as_str())).collect())
            .collect();
        Table::new(self.heading.clone(), rows)
    }
}

fn selector(cell: &'static OnceLock<Selector>, css: &str) -> &'static Selector {
    cell.get_or_init(|| Selector::parse(css).expect("valid selector"))
}

fn element_text(element: &ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Extract every `<table>` in the document.
#[must_use]
pub fn parse_html_tables(html: &str) -> Vec<HtmlTable> {
    static TABLE: OnceLock<Selector> = OnceLock::new();
    static ROW: OnceLock<Selector> = OnceLock::new();
    static CELL: OnceLock<Selector> = OnceLock::new();
    static ANCHOR: OnceLock<Selector> = OnceLock::new();

    let document = Html::parse_document(html);
    let mut tables = Vec::new();

    for table in document.select(selector(&TABLE, "table")) {
        let rows = table
            .select(selector(&ROW, "tr"))
            .map(|row| HtmlRow {
                cells: row.select(selector(&CELL, "th, td")).map(|c| element_text(&c)).collect(),
                links: row
                    .select(selector(&ANCHOR, "a[href]"))
                    .filter_map(|a| a.value().attr("href").map(str::to_string))
                    .collect(),
            })
            .filter(|row| !row.cells.is_empty())
            .collect();

        tables.push(HtmlTable {
            heading: table_heading(&table),
            rows,
        });
    }

    tables
}

fn table_heading(table: &ElementRef) -> String {
    static CAPTION: OnceLock<Selector> = OnceLock::new();

    if let Some(caption) = table.select(selector(&CAPTION, "caption")).next() {
        let text = element_text(&caption);
        if !text.is_empty() {
            return text;
        }
    }

    let preceding = |element: &ElementRef| -> String {
        element
            .prev_siblings()
            .filter_map(ElementRef::wrap)
            .take(HEADING_LOOKBEHIND)
            .map(|sibling| element_text(&sibling))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    };

    let own = preceding(table);
    if !own.is_empty() {
        return own;
    }

    // Tables wrapped in a container take their heading from the container
    table
        .parent()
        .and_then(ElementRef::wrap)
        .map(|parent| preceding(&parent))
        .unwrap_or_default()
}

/// Every anchor in the document, resolved against `base_url`.
///
/// Anchors whose `href` cannot be resolved are skipped.
#[must_use]
pub fn find_links(html: &str, base_url: &str) -> Vec<PageLink> {
    static ANCHOR: OnceLock<Selector> = OnceLock::new();

    let base = Url::parse(base_url).ok();
    let document = Html::parse_document(html);

    document
        .select(selector(&ANCHOR, "a[href]"))
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?.trim();
            let resolved = match &base {
                Some(base) => base.join(href).ok()?,
                None => Url::parse(href).ok()?,
            };
            Some(PageLink {
                text: element_text(&anchor),
                href: resolved.to_string(),
            })
        })
        .collect()
}

/// One `<input>` or `<select>` of a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormInput {
    /// Field name
    pub name: String,
    /// Current value (selected option for selects)
    pub value: String,
    /// `type` attribute, `select` for select elements
    pub input_type: String,
    /// Whether a checkbox or radio is checked
    pub checked: bool,
}

/// A `<form>` with its action resolved to an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlForm {
    /// Absolute submit URL
    pub action: String,
    /// Named inputs in document order
    pub inputs: Vec<FormInput>,
}

/// Find the first form whose action contains one of `action_keywords`
/// (case-insensitive).
#[must_use]
pub fn find_form(html: &str, base_url: &str, action_keywords: &[&str]) -> Option<HtmlForm> {
    static FORM: OnceLock<Selector> = OnceLock::new();
    static INPUT: OnceLock<Selector> = OnceLock::new();
    static SELECT: OnceLock<Selector> = OnceLock::new();
    static SELECTED: OnceLock<Selector> = OnceLock::new();

    let document = Html::parse_document(html);
    let form = document.select(selector(&FORM, "form")).find(|form| {
        let action = form.value().attr("action").unwrap_or_default().to_lowercase();
        action_keywords.iter().any(|k| action.contains(&k.to_lowercase()))
    })?;

    let action = resolve_url(base_url, form.value().attr("action").unwrap_or_default())?;

    let mut inputs: Vec<FormInput> = form
        .select(selector(&INPUT, "input[name]"))
        .filter_map(|input| {
            let element = input.value();
            Some(FormInput {
                name: element.attr("name")?.to_string(),
                value: element.attr("value").unwrap_or_default().to_string(),
                input_type: element.attr("type").unwrap_or("text").to_lowercase(),
                checked: element.attr("checked").is_some(),
            })
        })
        .collect();

    for select in form.select(selector(&SELECT, "select[name]")) {
        let Some(name) = select.value().attr("name") else {
            continue;
        };
        let value = select
            .select(selector(&SELECTED, "option[selected]"))
            .next()
            .and_then(|option| option.value().attr("value"))
            .unwrap_or_default();
        inputs.push(FormInput {
            name: name.to_string(),
            value: value.to_string(),
            input_type: "select".to_string(),
            checked: false,
        });
    }

    Some(HtmlForm { action, inputs })
}

/// Resolve `href` against `base_url`.
#[must_use]
pub fn resolve_url(base_url: &str, href: &str) -> Option<String> {
    Url::parse(base_url)
        .ok()?
        .join(href.trim())
        .ok()
        .map(|url| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <h2>Active positions</h2>
          <table>
            <tr><th>Position holder</th><th>Short position</th><th>Date</th></tr>
            <tr><td>Acme  Capital</td><td>0,62 %</td><td>01.03.2024</td></tr>
          </table>
          <div>
            <h3>Historical positions</h3>
            <div class="wrapper"><table>
              <tr><td>Old Fund</td><td>0,41 %</td><td>01.02.2023</td></tr>
            </table></div>
          </div>
          <table>
            <caption>Overview</caption>
            <tr><td><a href="/ssr/details?id=42">Equinor ASA</a></td><td>NO0010096985</td></tr>
          </table>
        </body></html>
    "#;

    #[test]
    fn test_tables_and_headings() {
        let tables = parse_html_tables(PAGE);
        assert_eq!(tables.len(), 3);

        assert_eq!(tables[0].heading, "Active positions");
        assert_eq!(tables[0].rows.len(), 2);
        assert_eq!(tables[0].rows[1].cells, vec!["Acme Capital", "0,62 %", "01.03.2024"]);

        assert_eq!(tables[1].heading, "Historical positions");
        assert_eq!(tables[2].heading, "Overview");
        assert_eq!(tables[2].rows[0].links, vec!["/ssr/details?id=42"]);
    }

    #[test]
    fn test_to_table() {
        let table = parse_html_tables(PAGE)[0].to_table();
        assert_eq!(table.name, "Active positions");
        assert_eq!(table.row_text(0)[0], "Position holder");
    }

    #[test]
    fn test_find_links_resolves_relative() {
        let html = r#"<a href="/static/file.csv"> Download as CSV </a><a href="https://other.org/x">x</a>"#;
        let links = find_links(html, "https://www.bundesanzeiger.de/pub/en/nlp?4");

        assert_eq!(links.len(), 2);
        assert_eq!(links[0].text, "Download as CSV");
        assert_eq!(links[0].href, "https://www.bundesanzeiger.de/static/file.csv");
        assert_eq!(links[1].href, "https://other.org/x");
    }

    #[test]
    fn test_find_form() {
        let html = r#"
            <form action="/search"><input name="q"></form>
            <form action="./nlp?1-1.-filter~form">
              <input type="hidden" name="token" value="abc">
              <input type="checkbox" name="isHistorical">
              <input type="checkbox" name="onlyMine" checked>
              <select name="sort"><option value="a">A</option><option value="d" selected>D</option></select>
            </form>"#;

        let form = find_form(html, "https://www.bundesanzeiger.de/pub/en/nlp?4", &["filter"]).unwrap();
        assert_eq!(form.action, "https://www.bundesanzeiger.de/pub/en/nlp?1-1.-filter~form");
        assert_eq!(form.inputs.len(), 4);
        assert_eq!(form.inputs[0].value, "abc");
        assert!(!form.inputs[1].checked);
        assert!(form.inputs[2].checked);
        assert_eq!(form.inputs[3].value, "d");

        assert!(find_form(html, "https://x.org/", &["missing"]).is_none());
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("https://ssr.finanstilsynet.no/", "Home/Details?id=1").as_deref(),
            Some("https://ssr.finanstilsynet.no/Home/Details?id=1")
        );
        assert_eq!(resolve_url("not a url", "x"), None);
    }
}
