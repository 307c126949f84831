use crate::fetch::FetchError;
use crate::page::RouteId;
use crate::price::PriceQuote;
use crate::trends::TrendEntry;

#[derive(Debug, Clone)]
pub enum Command {
    PriceSettled {
        generation: u64,
        route: RouteId,
        outcome: Result<PriceQuote, FetchError>,
    },
    TrendsSettled(Result<Vec<TrendEntry>, FetchError>),
    Error(String),
    Exit,
}
