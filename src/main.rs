use std::env;
use std::fs;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use folio_rs::FolioConfig;
use folio_rs::ForecastEngine;
use folio_rs::ForecastRequest;
use folio_rs::InMemoryProvider;
use folio_rs::OptimizationRequest;
use folio_rs::Period;
use folio_rs::PortfolioEngine;
use prettytable::row;
use prettytable::Cell;
use prettytable::Table;

/// `folio <fixture.json> [config.json]`
///
/// The fixture maps tickers to `[{"date": "YYYY-MM-DD", "price": f64}]`.
fn main() -> Result<()> {
  let args: Vec<String> = env::args().skip(1).collect();
  let Some(fixture) = args.first() else {
    bail!("usage: folio <fixture.json> [config.json]");
  };

  let raw = fs::read_to_string(fixture).with_context(|| format!("reading {fixture}"))?;
  let provider = InMemoryProvider::from_json_str(&raw)?;
  let config = match args.get(1) {
    Some(path) => {
      let raw = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
      FolioConfig::from_json_str(&raw)?
    }
    None => FolioConfig::default(),
  };

  let tickers = provider.tickers();
  if tickers.is_empty() {
    bail!("fixture {fixture} holds no tickers");
  }

  if tickers.len() >= 2 {
    let request = OptimizationRequest {
      period: Period::Max,
      ..OptimizationRequest::new(tickers.clone())
    };
    let res = PortfolioEngine::new(config.clone())
      .optimize(&provider, &request)
      .context("portfolio optimization")?;

    let mut stats = Table::new();
    stats.add_row(row!["ticker", "return %", "volatility %"]);
    for s in &res.asset_stats {
      stats.add_row(row![s.ticker, format!("{:.2}", s.annual_return), format!("{:.2}", s.volatility)]);
    }
    stats.printstd();

    let mut frontier = Table::new();
    let mut header = row!["risk %", "return %", "sharpe"];
    for t in &res.tickers {
      header.add_cell(Cell::new(t));
    }
    frontier.add_row(header);
    for p in res.frontier.iter().chain(std::iter::once(&res.optimal)) {
      let mut r = row![
        format!("{:.2}", p.risk),
        format!("{:.2}", p.expected_return),
        p.sharpe.map_or("-".to_string(), |s| format!("{s:.3}"))
      ];
      for w in &p.weights {
        r.add_cell(Cell::new(&format!("{:.1}", w * 100.0)));
      }
      frontier.add_row(r);
    }
    frontier.printstd();
    if let Some(ridge) = res.ridge_applied {
      println!("covariance regularized with ridge {ridge:.3e}");
    }
    for e in &res.errors {
      println!("skipped {}: {}", e.ticker, e.error);
    }
  }

  let request = ForecastRequest {
    period: Period::Max,
    exog_tickers: tickers.iter().skip(1).take(1).cloned().collect(),
    ..ForecastRequest::new(tickers[0].clone())
  };
  let res = ForecastEngine::new(config)
    .forecast(&provider, &request)
    .with_context(|| format!("forecasting {}", request.ticker))?;

  let mut table = Table::new();
  table.add_row(row!["date", "lower", "forecast", "upper"]);
  for i in 0..res.dates.len() {
    table.add_row(row![
      res.dates[i],
      format!("{:.2}", res.lower_ci[i]),
      format!("{:.2}", res.forecast[i]),
      format!("{:.2}", res.upper_ci[i])
    ]);
  }
  table.printstd();
  println!(
    "SARIMAX{:?}x{:?} aic={:.2} mape={:.2}% ({:?}){}",
    res.params.order,
    res.params.seasonal_order,
    res.metrics.aic,
    res.metrics.mape,
    res.metrics.quality,
    if res.interval_degraded { " (degraded interval)" } else { "" }
  );
  if let Some(h) = &res.holdout {
    println!(
      "holdout {}/{}: rmse={:.4} mape={:.2}% ({:?})",
      h.train_size, h.test_size, h.rmse, h.mape, h.quality
    );
  }

  Ok(())
}
