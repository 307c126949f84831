use serde::Serialize;

use crate::page::RouteId;
use crate::price::PriceValue;

pub const DEFAULT_SITE_BASE: &str = "https://www.cotacaohoje.site";
pub const DEFAULT_FALLBACK_ICON: &str = "https://www.binance.com/favicon.ico";
pub const LOCAL_CURRENCY: &str = "BRL";
const DEFAULT_TITLE: &str = "Cotação Hoje";
const DEFAULT_DESCRIPTION: &str = "Cotações de criptomoedas em reais (BRL), atualizadas em tempo real.";

/// Where the page's document-level SEO fields are written.
pub trait PageMetadata {
    fn set_title(&mut self, title: &str);

    /// Returns false when the document has no description tag to update.
    fn set_description(&mut self, content: &str) -> bool;
}

/// In-memory stand-in for the hosting document's `<head>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHead {
    title: String,
    description: Option<String>,
}

impl DocumentHead {
    pub fn new() -> Self {
        DocumentHead {
            title: DEFAULT_TITLE.to_string(),
            description: Some(DEFAULT_DESCRIPTION.to_string()),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl Default for DocumentHead {
    fn default() -> Self {
        DocumentHead::new()
    }
}

impl PageMetadata for DocumentHead {
    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn set_description(&mut self, content: &str) -> bool {
        match &mut self.description {
            Some(description) => {
                *description = content.to_string();
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    pub site_base: String,
    pub fallback_icon: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        SiteConfig {
            site_base: DEFAULT_SITE_BASE.to_string(),
            fallback_icon: DEFAULT_FALLBACK_ICON.to_string(),
        }
    }
}

impl SiteConfig {
    pub fn quote_url(&self, route: &RouteId) -> String {
        format!("{}/cotacao/{}", self.site_base, route.lower())
    }

    pub fn purchase_url(&self, route: &RouteId) -> String {
        format!("{}/comprar/{}", self.site_base, route.lower())
    }
}

pub fn page_title(route: &RouteId, price: &PriceValue) -> String {
    format!(
        "Cotação do {} Hoje: R$ {} | Acompanhe em Tempo Real",
        route.upper(),
        price
    )
}

pub fn page_description(route: &RouteId, price: &PriceValue) -> String {
    format!(
        "Veja a cotação do {} hoje em tempo real: R$ {}.",
        route.upper(),
        price
    )
}

/// schema.org `FinancialService` block emitted as JSON-LD.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeoSchema {
    #[serde(rename = "@context")]
    pub context: &'static str,
    #[serde(rename = "@type")]
    pub kind: &'static str,
    pub name: String,
    pub url: String,
    pub description: String,
    pub logo: String,
    pub offers: SeoOffer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoOffer {
    #[serde(rename = "@type")]
    pub kind: &'static str,
    pub price_currency: &'static str,
    pub price: Option<PriceValue>,
    pub availability: &'static str,
    pub url: String,
}

impl SeoSchema {
    pub fn build(route: &RouteId, icon: &str, price: Option<&PriceValue>, site: &SiteConfig) -> Self {
        SeoSchema {
            context: "https://schema.org",
            kind: "FinancialService",
            name: format!("{} Hoje", route.upper()),
            url: site.quote_url(route),
            description: format!(
                "Veja a cotação do {} hoje em tempo real e descubra o valor atualizado em reais ({}).",
                route.upper(),
                LOCAL_CURRENCY
            ),
            logo: icon.to_string(),
            offers: SeoOffer {
                kind: "Offer",
                price_currency: LOCAL_CURRENCY,
                price: price.cloned(),
                availability: "https://schema.org/InStock",
                url: site.purchase_url(route),
            },
        }
    }

    /// JSON text safe to embed inside a `<script>` element.
    pub fn to_script_json(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(json.replace("</", "<\\/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn title_and_description_use_uppercased_route() {
        let route = RouteId::parse("btc").unwrap();
        let price = PriceValue::from(100);
        assert_eq!(
            page_title(&route, &price),
            "Cotação do BTC Hoje: R$ 100 | Acompanhe em Tempo Real"
        );
        assert_eq!(
            page_description(&route, &price),
            "Veja a cotação do BTC hoje em tempo real: R$ 100."
        );
    }

    #[test]
    fn description_only_updates_existing_tag() {
        let mut head = DocumentHead::new();
        assert!(head.set_description("nova"));
        assert_eq!(head.description(), Some("nova"));

        let mut bare = DocumentHead {
            title: DEFAULT_TITLE.to_string(),
            description: None,
        };
        assert!(!bare.set_description("nova"));
        assert_eq!(bare.description(), None);
    }

    #[test]
    fn schema_serializes_with_linked_data_keys() {
        let route = RouteId::parse("ETH").unwrap();
        let schema = SeoSchema::build(
            &route,
            "https://icons.example/eth.png",
            Some(&PriceValue::from("17000.5")),
            &SiteConfig::default(),
        );
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["@context"], "https://schema.org");
        assert_eq!(value["@type"], "FinancialService");
        assert_eq!(value["name"], "ETH Hoje");
        assert_eq!(value["url"], "https://www.cotacaohoje.site/cotacao/eth");
        assert_eq!(value["logo"], "https://icons.example/eth.png");
        assert_eq!(value["offers"]["@type"], "Offer");
        assert_eq!(value["offers"]["priceCurrency"], "BRL");
        assert_eq!(value["offers"]["price"], "17000.5");
        assert_eq!(value["offers"]["availability"], "https://schema.org/InStock");
        assert_eq!(value["offers"]["url"], "https://www.cotacaohoje.site/comprar/eth");
    }

    #[test]
    fn script_json_cannot_close_the_script_element() {
        let route = RouteId::parse("x</script>").unwrap();
        let schema = SeoSchema::build(&route, "icon", None, &SiteConfig::default());
        let json = schema.to_script_json().unwrap();
        assert!(!json.contains("</script>"));
        assert!(json.contains("\"price\":null"));
    }
}
