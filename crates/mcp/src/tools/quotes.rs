use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use toolwire_core::{InputSchema, Property, ToolDescriptor, ToolError, ToolHandler, ToolOutput};

use super::HttpSource;
use crate::config::QuoteConfig;

pub const NAME: &str = "stock_quote";

const SYMBOL_PATTERN: &str = r"^[A-Za-z0-9.\-^=]{1,15}$";

pub fn definition() -> Result<ToolDescriptor, regex::Error> {
    Ok(ToolDescriptor::new(
        NAME,
        "Get the latest price for an equity, index, or currency symbol (e.g. AAPL, ^GSPC, 0700.HK)",
        InputSchema::object()
            .required(
                "symbol",
                Property::string("Ticker symbol").matching(SYMBOL_PATTERN)?,
            )
            .optional(
                "range",
                Property::string("Chart range used for the previous-close comparison")
                    .one_of(["1d", "5d", "1mo"])
                    .with_default("1d"),
            ),
    ))
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: String,
    currency: Option<String>,
    exchange_name: Option<String>,
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
    previous_close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct QuoteArgs {
    symbol: String,
    range: String,
}

pub struct QuoteTool {
    http: HttpSource,
    base_url: String,
}

impl QuoteTool {
    pub fn new(http: HttpSource, config: &QuoteConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ToolHandler for QuoteTool {
    async fn call(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let args: QuoteArgs = serde_json::from_value(arguments)?;
        let symbol = args.symbol.to_uppercase();

        let url = format!("{}/{}", self.base_url, urlencoding::encode(&symbol));
        let request = self
            .http
            .get(&url)
            .query(&[("range", args.range.as_str()), ("interval", "1d")]);

        let response: ChartResponse = self.http.fetch_json(request).await?;

        if let Some(err) = response.chart.error {
            let detail = err
                .description
                .or(err.code)
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(ToolError::upstream(detail));
        }

        let meta = response
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .map(|r| r.meta)
            .ok_or_else(|| ToolError::failed(format!("No quote found for {}", symbol)))?;

        Ok(ToolOutput::text(format_quote(&meta)?))
    }
}

fn format_quote(meta: &ChartMeta) -> Result<String, ToolError> {
    let price = meta
        .regular_market_price
        .ok_or_else(|| ToolError::upstream(format!("no price reported for {}", meta.symbol)))?;
    let currency = meta.currency.as_deref().unwrap_or("");

    let mut output = match &meta.exchange_name {
        Some(exchange) => format!("{} ({})\n", meta.symbol, exchange),
        None => format!("{}\n", meta.symbol),
    };
    let price_line = format!("Price: {:.2} {}", price, currency);
    output.push_str(price_line.trim_end());

    if let Some(prev) = meta.previous_close.or(meta.chart_previous_close) {
        if prev != 0.0 {
            let change = price - prev;
            let pct = change / prev * 100.0;
            output.push_str(&format!(
                "\nChange: {:+.2} ({:+.2}%) vs previous close {:.2}",
                change, pct, prev
            ));
        }
    }

    Ok(output)
}
