use std::fmt;

use crate::fetch::FetchError;
use crate::metadata::{PageMetadata, SeoSchema, SiteConfig, page_description, page_title};
use crate::price::PriceQuote;
use crate::trends::TrendEntry;

/// Coin symbol taken from the page route. Never blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteId(String);

impl RouteId {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(RouteId(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn upper(&self) -> String {
        self.0.to_uppercase()
    }

    pub fn lower(&self) -> String {
        self.0.to_lowercase()
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Price fetch the caller must run; the outcome is handed back with the
/// same generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRequest {
    pub generation: u64,
    pub route: RouteId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PagePhase {
    Loading,
    Failed(String),
    Ready(PriceQuote),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceApplied {
    Applied,
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrendsState {
    NotRequested,
    Pending,
    Settled,
}

/// Presentational sections rendered around the quote, in page order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubView {
    Header,
    Hero,
    ChartSection,
    Converter,
    ConversionTable,
    EducationalSection,
    Faq,
    Footer,
}

impl SubView {
    pub const ALL: [SubView; 8] = [
        SubView::Header,
        SubView::Hero,
        SubView::ChartSection,
        SubView::Converter,
        SubView::ConversionTable,
        SubView::EducationalSection,
        SubView::Faq,
        SubView::Footer,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SubView::Header => "header",
            SubView::Hero => "hero",
            SubView::ChartSection => "chart-section",
            SubView::Converter => "converter",
            SubView::ConversionTable => "conversion-table",
            SubView::EducationalSection => "educational-section",
            SubView::Faq => "faq",
            SubView::Footer => "footer",
        }
    }

    pub fn takes_price(&self) -> bool {
        matches!(self, SubView::Converter | SubView::ConversionTable)
    }
}

pub enum PageView<'a> {
    Loading,
    Error(&'a str),
    Content(ContentView<'a>),
}

pub struct ContentView<'a> {
    pub route: &'a RouteId,
    pub quote: &'a PriceQuote,
    pub icon: &'a str,
    pub schema: SeoSchema,
    pub trends: &'a [TrendEntry],
}

pub fn not_found_message(route: &RouteId) -> String {
    format!(
        "A moeda \"{}\" não foi encontrada ou os dados estão indisponíveis no momento.",
        route
    )
}

/// Owns every piece of page state. Fetches happen elsewhere; the controller
/// hands out requests and folds their outcomes back in.
pub struct PageController<M: PageMetadata> {
    site: SiteConfig,
    metadata: M,
    route: Option<RouteId>,
    phase: PagePhase,
    last_quote: Option<PriceQuote>,
    trends: Vec<TrendEntry>,
    trends_state: TrendsState,
    generation: u64,
    price_in_flight: bool,
}

impl<M: PageMetadata> PageController<M> {
    pub fn new(site: SiteConfig, metadata: M) -> Self {
        PageController {
            site,
            metadata,
            route: None,
            phase: PagePhase::Loading,
            last_quote: None,
            trends: Vec::new(),
            trends_state: TrendsState::NotRequested,
            generation: 0,
            price_in_flight: false,
        }
    }

    /// True exactly once: the caller should start the trends fetch.
    pub fn mount(&mut self) -> bool {
        if self.trends_state != TrendsState::NotRequested {
            return false;
        }
        self.trends_state = TrendsState::Pending;
        true
    }

    /// Switches to a new route. A missing or blank identifier is ignored.
    pub fn navigate(&mut self, raw: Option<&str>) -> Option<PriceRequest> {
        let route = raw.and_then(RouteId::parse)?;
        self.route = Some(route);
        self.begin_price_fetch()
    }

    pub fn reload(&mut self) -> Option<PriceRequest> {
        self.route.as_ref()?;
        self.begin_price_fetch()
    }

    fn begin_price_fetch(&mut self) -> Option<PriceRequest> {
        let route = self.route.clone()?;
        self.generation += 1;
        self.price_in_flight = true;
        self.phase = PagePhase::Loading;
        Some(PriceRequest {
            generation: self.generation,
            route,
        })
    }

    pub fn apply_price(
        &mut self,
        generation: u64,
        outcome: Result<PriceQuote, FetchError>,
    ) -> PriceApplied {
        if generation != self.generation {
            log::debug!(
                "dropping superseded price response (generation {generation}, latest {})",
                self.generation
            );
            return PriceApplied::Stale;
        }
        self.price_in_flight = false;
        let Some(route) = self.route.clone() else {
            return PriceApplied::Stale;
        };
        match outcome {
            Ok(quote) => {
                self.metadata.set_title(&page_title(&route, &quote.price));
                self.metadata
                    .set_description(&page_description(&route, &quote.price));
                self.last_quote = Some(quote.clone());
                self.phase = PagePhase::Ready(quote);
            }
            Err(err) => {
                log::warn!("price fetch for {route} failed: {err}");
                self.phase = PagePhase::Failed(not_found_message(&route));
            }
        }
        PriceApplied::Applied
    }

    pub fn apply_trends(&mut self, outcome: Result<Vec<TrendEntry>, FetchError>) {
        self.trends_state = TrendsState::Settled;
        match outcome {
            Ok(entries) => self.trends = entries,
            Err(err) => log::warn!("trend mapping fetch failed: {err}"),
        }
    }

    pub fn view(&self) -> PageView<'_> {
        match &self.phase {
            PagePhase::Loading => PageView::Loading,
            PagePhase::Failed(message) => PageView::Error(message),
            PagePhase::Ready(quote) => match &self.route {
                Some(route) => {
                    let icon = quote.icon_or(&self.site.fallback_icon);
                    PageView::Content(ContentView {
                        route,
                        quote,
                        icon,
                        schema: SeoSchema::build(route, icon, Some(&quote.price), &self.site),
                        trends: &self.trends,
                    })
                }
                None => PageView::Loading,
            },
        }
    }

    /// No fetch is outstanding.
    pub fn is_settled(&self) -> bool {
        !self.price_in_flight && self.trends_state != TrendsState::Pending
    }

    pub fn route(&self) -> Option<&RouteId> {
        self.route.as_ref()
    }

    pub fn phase(&self) -> &PagePhase {
        &self.phase
    }

    pub fn last_quote(&self) -> Option<&PriceQuote> {
        self.last_quote.as_ref()
    }

    pub fn trends(&self) -> &[TrendEntry] {
        &self.trends
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, PagePhase::Loading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::DocumentHead;
    use crate::price::PriceValue;
    use crate::trends::TrendCoin;
    use pretty_assertions::assert_eq;

    fn controller() -> PageController<DocumentHead> {
        PageController::new(SiteConfig::default(), DocumentHead::new())
    }

    fn quote(price: i64, icon: Option<&str>) -> PriceQuote {
        PriceQuote {
            price: PriceValue::from(price),
            icon: icon.map(str::to_string),
        }
    }

    fn trend(name: &str) -> TrendEntry {
        TrendEntry {
            trend: format!("{name} em alta"),
            coin: TrendCoin {
                name: name.to_string(),
                symbol: name[..3].to_string(),
            },
            price: None,
            source: "Google Trends".to_string(),
            url: format!("https://trends.example/{name}"),
        }
    }

    #[test]
    fn successful_price_reaches_content() {
        let mut page = controller();
        let request = page.navigate(Some("btc")).expect("request");
        assert!(page.is_loading());
        assert_eq!(
            page.apply_price(request.generation, Ok(quote(100, Some("x")))),
            PriceApplied::Applied
        );
        match page.view() {
            PageView::Content(content) => {
                assert_eq!(content.quote.price, PriceValue::from(100));
                assert_eq!(content.icon, "x");
                assert_eq!(content.schema.logo, "x");
            }
            _ => panic!("expected content"),
        }
        assert!(page.metadata().title().contains("BTC"));
        assert!(page.metadata().title().contains("100"));
        assert_eq!(
            page.metadata().description(),
            Some("Veja a cotação do BTC hoje em tempo real: R$ 100.")
        );
    }

    #[test]
    fn missing_price_reaches_error() {
        let mut page = controller();
        let request = page.navigate(Some("xyz")).expect("request");
        page.apply_price(request.generation, Err(FetchError::PriceMissing));
        match page.view() {
            PageView::Error(message) => assert!(message.contains("\"xyz\"")),
            _ => panic!("expected error"),
        }
        assert_eq!(page.metadata(), &DocumentHead::new());
    }

    #[test]
    fn absent_route_issues_no_request_and_keeps_loading() {
        let mut page = controller();
        assert_eq!(page.navigate(None), None);
        assert_eq!(page.navigate(Some("   ")), None);
        assert_eq!(page.reload(), None);
        assert!(matches!(page.view(), PageView::Loading));
        assert!(page.is_settled());
    }

    #[test]
    fn icon_falls_back_when_missing() {
        let mut page = controller();
        let request = page.navigate(Some("eth")).unwrap();
        page.apply_price(request.generation, Ok(quote(5, None)));
        match page.view() {
            PageView::Content(content) => {
                assert_eq!(content.icon, "https://www.binance.com/favicon.ico")
            }
            _ => panic!("expected content"),
        }
    }

    #[test]
    fn failure_keeps_last_quote() {
        let mut page = controller();
        let first = page.navigate(Some("btc")).unwrap();
        page.apply_price(first.generation, Ok(quote(100, Some("x"))));
        let second = page.navigate(Some("nope")).unwrap();
        page.apply_price(second.generation, Err(FetchError::Transport("refused".into())));
        assert!(matches!(page.phase(), PagePhase::Failed(_)));
        assert_eq!(page.last_quote(), Some(&quote(100, Some("x"))));
    }

    #[test]
    fn stale_response_is_dropped() {
        let mut page = controller();
        let first = page.navigate(Some("btc")).unwrap();
        let second = page.navigate(Some("eth")).unwrap();
        assert!(second.generation > first.generation);

        assert_eq!(
            page.apply_price(second.generation, Ok(quote(17_000, None))),
            PriceApplied::Applied
        );
        assert_eq!(
            page.apply_price(first.generation, Ok(quote(350_000, None))),
            PriceApplied::Stale
        );
        match page.view() {
            PageView::Content(content) => {
                assert_eq!(content.route.as_str(), "eth");
                assert_eq!(content.quote.price, PriceValue::from(17_000));
            }
            _ => panic!("expected content"),
        }
        assert!(page.metadata().title().contains("ETH"));
    }

    #[test]
    fn stale_failure_does_not_clobber_pending_load() {
        let mut page = controller();
        let first = page.navigate(Some("btc")).unwrap();
        let _second = page.navigate(Some("eth")).unwrap();
        page.apply_price(first.generation, Err(FetchError::PriceMissing));
        assert!(page.is_loading());
        assert!(!page.is_settled());
    }

    #[test]
    fn trends_requested_once_per_mount() {
        let mut page = controller();
        assert!(page.mount());
        assert!(!page.mount());
        assert!(!page.is_settled());
        page.apply_trends(Ok(vec![trend("bitcoin"), trend("ethereum")]));
        assert!(page.is_settled());
        assert!(!page.mount());
        assert_eq!(page.trends()[1].coin.name, "ethereum");
    }

    #[test]
    fn trends_failure_keeps_previous_list_and_phase() {
        let mut page = controller();
        page.mount();
        page.apply_trends(Ok(vec![trend("bitcoin")]));
        page.apply_trends(Err(FetchError::Transport("timeout".into())));
        assert_eq!(page.trends().len(), 1);
        assert!(page.is_loading());
    }

    #[test]
    fn reload_starts_new_generation_for_same_route() {
        let mut page = controller();
        let first = page.navigate(Some("sol")).unwrap();
        page.apply_price(first.generation, Ok(quote(900, None)));
        let again = page.reload().unwrap();
        assert_eq!(again.route, first.route);
        assert_eq!(again.generation, first.generation + 1);
        assert!(page.is_loading());
    }

    #[test]
    fn price_sub_views_are_converter_and_table() {
        let priced: Vec<_> = SubView::ALL
            .iter()
            .filter(|view| view.takes_price())
            .map(|view| view.name())
            .collect();
        assert_eq!(priced, vec!["converter", "conversion-table"]);
    }
}
