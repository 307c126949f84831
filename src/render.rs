use crate::metadata::DocumentHead;
use crate::page::{ContentView, PageController, PageView, SubView};
use crate::trends::TrendEntry;

pub const LOADING_MESSAGE: &str = "Carregando dados...";
pub const TRENDS_HEADING: &str = "Tendências Mapeadas para Criptomoedas";
pub const NO_TRENDS_MESSAGE: &str = "Nenhuma tendência mapeada no momento.";
pub const PRICE_UNAVAILABLE: &str = "Indisponível";

/// Full HTML document for the page's current state, head included.
pub fn render_document(page: &PageController<DocumentHead>) -> Result<String, serde_json::Error> {
    let head = page.metadata();
    let mut out = String::with_capacity(4096);
    out.push_str("<!DOCTYPE html>\n<html lang=\"pt-BR\">\n<head>\n<meta charset=\"utf-8\">\n<title>");
    html_escape_into(&mut out, head.title());
    out.push_str("</title>\n");
    if let Some(description) = head.description() {
        out.push_str("<meta name=\"description\" content=\"");
        html_escape_into(&mut out, description);
        out.push_str("\">\n");
    }
    out.push_str("</head>\n<body>\n");
    out.push_str(&render_body(&page.view())?);
    out.push_str("</body>\n</html>\n");
    Ok(out)
}

pub fn render_body(view: &PageView<'_>) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    match view {
        PageView::Loading => {
            out.push_str("<p style=\"text-align: center\">");
            out.push_str(LOADING_MESSAGE);
            out.push_str("</p>\n");
        }
        PageView::Error(message) => {
            out.push_str("<p style=\"text-align: center; color: red; font-weight: bold\">");
            html_escape_into(&mut out, message);
            out.push_str("</p>\n");
        }
        PageView::Content(content) => render_content(&mut out, content)?,
    }
    Ok(out)
}

fn render_content(out: &mut String, content: &ContentView<'_>) -> Result<(), serde_json::Error> {
    out.push_str("<script type=\"application/ld+json\">");
    out.push_str(&content.schema.to_script_json()?);
    out.push_str("</script>\n");
    for view in SubView::ALL {
        out.push_str("<section data-view=\"");
        out.push_str(view.name());
        out.push_str("\" data-moeda=\"");
        html_escape_into(out, content.route.as_str());
        if view.takes_price() {
            out.push_str("\" data-price=\"");
            html_escape_into(out, &content.quote.price.to_string());
        }
        out.push_str("\"></section>\n");
    }
    render_trends(out, content.trends);
    Ok(())
}

pub fn render_trends(out: &mut String, trends: &[TrendEntry]) {
    out.push_str("<section style=\"padding: 20px; background-color: #f9f9f9\">\n");
    out.push_str("<h2 style=\"text-align: center; color: #333\">");
    out.push_str(TRENDS_HEADING);
    out.push_str("</h2>\n<div style=\"max-width: 800px; margin: 0 auto\">\n");
    if trends.is_empty() {
        out.push_str("<p style=\"text-align: center; color: #777\">");
        out.push_str(NO_TRENDS_MESSAGE);
        out.push_str("</p>\n");
    }
    for entry in trends {
        out.push_str(
            "<div style=\"padding: 10px; margin-bottom: 10px; background-color: #fff; \
             border: 1px solid #ddd; border-radius: 8px\">\n<h3>",
        );
        html_escape_into(out, &entry.trend);
        out.push_str("</h3>\n<p>Criptomoeda: ");
        html_escape_into(out, &entry.coin_label());
        out.push_str("</p>\n<p>Preço Atual: R$ ");
        html_escape_into(out, &trend_price_label(entry));
        out.push_str("</p>\n<p>Fonte: ");
        html_escape_into(out, &entry.source);
        out.push_str("</p>\n<p><a href=\"");
        html_escape_into(out, &entry.url);
        out.push_str("\" style=\"color: #2563eb\">Acessar página</a></p>\n</div>\n");
    }
    out.push_str("</div>\n</section>\n");
}

pub fn trend_price_label(entry: &TrendEntry) -> String {
    entry
        .display_price()
        .map(|price| price.to_string())
        .unwrap_or_else(|| PRICE_UNAVAILABLE.to_string())
}

fn html_escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}
