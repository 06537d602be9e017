use chrono::NaiveDate;
use folio_rs::data::PricePoint;
use folio_rs::error::ErrorKind;
use folio_rs::forecast::SearchSpace;
use folio_rs::forecast::SearchStrategy;
use folio_rs::FolioConfig;
use folio_rs::FolioError;
use folio_rs::ForecastEngine;
use folio_rs::ForecastRequest;
use folio_rs::InMemoryProvider;
use folio_rs::Interval;
use folio_rs::OptimizationRequest;
use folio_rs::Period;
use folio_rs::PortfolioEngine;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;
use rand_distr::Normal;

const DAYS: usize = 500;

/// One-factor daily prices: `r = alpha + beta * m + e`.
fn market() -> InMemoryProvider {
  let mut rng = StdRng::seed_from_u64(2024);
  let factor = Normal::new(0.0004, 0.01).unwrap();
  let idio = Normal::new(0.0, 0.008).unwrap();
  let dates = Interval::Daily.future_dates(NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(), DAYS);

  let assets = [
    ("AAPL", 180.0, 0.0003, 1.2),
    ("MSFT", 350.0, 0.0002, 1.0),
    ("GOOG", 140.0, 0.0001, 1.1),
    ("AMZN", 150.0, 0.0000, 1.4),
    ("SPY", 450.0, 0.0000, 1.0),
  ];
  let mut prices: Vec<Vec<PricePoint>> = vec![Vec::with_capacity(DAYS); assets.len()];
  let mut levels: Vec<f64> = assets.iter().map(|a| a.1).collect();
  for date in &dates {
    let m = factor.sample(&mut rng);
    for (i, (_, _, alpha, beta)) in assets.iter().enumerate() {
      let noise = if i == 4 { 0.0 } else { idio.sample(&mut rng) };
      levels[i] *= 1.0 + alpha + beta * m + noise;
      prices[i].push(PricePoint::new(*date, levels[i]));
    }
  }

  let mut provider = InMemoryProvider::new();
  for ((ticker, ..), series) in assets.iter().zip(prices) {
    provider.insert(*ticker, series);
  }
  provider
}

fn tickers(names: &[&str]) -> Vec<String> {
  names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn four_asset_frontier() {
  let engine = PortfolioEngine::default();
  let request = OptimizationRequest {
    risk_free_rate: 0.03,
    period: Period::TwoYears,
    interval: Interval::Daily,
    ..OptimizationRequest::new(tickers(&["AAPL", "MSFT", "GOOG", "AMZN"]))
  };
  let res = engine.optimize(&market(), &request).unwrap();

  assert_eq!(res.frontier.len(), engine.config().frontier.resolution);
  assert_eq!(res.tickers, request.tickers);
  for p in &res.frontier {
    let total: f64 = p.weights.iter().sum();
    assert!((total - 1.0).abs() <= 1e-4, "weights sum to {total}");
    assert!(p.weights.iter().all(|w| *w >= -1e-9));
  }
  for p in &res.frontier {
    assert!(res.min_variance.risk <= p.risk + 1e-9);
    if p.risk > 1e-9 {
      assert!(res.optimal.sharpe >= p.sharpe);
    }
  }
  assert!(res.errors.is_empty());
}

#[test]
fn duplicated_asset_is_regularized_or_rejected() {
  let mut provider = market();
  let aapl = folio_rs::MarketDataProvider::fetch(&provider, "AAPL", Period::Max, Interval::Daily).unwrap();
  provider.insert("AAPL.COPY", aapl);

  let request = OptimizationRequest::new(tickers(&["AAPL", "AAPL.COPY", "MSFT"]));
  match PortfolioEngine::default().optimize(&provider, &request) {
    Ok(res) => {
      assert!(res.ridge_applied.is_some());
      for p in &res.frontier {
        assert!((p.weights.iter().sum::<f64>() - 1.0).abs() <= 1e-4);
      }
    }
    Err(err) => assert!(matches!(err, FolioError::SingularCovariance { .. })),
  }
}

#[test]
fn invalid_ticker_is_reported_alongside_results() {
  let request = OptimizationRequest::new(tickers(&["AAPL", "ZZZZINVALID", "MSFT", "GOOG"]));
  let res = PortfolioEngine::default().optimize(&market(), &request).unwrap();
  assert_eq!(res.tickers, tickers(&["AAPL", "MSFT", "GOOG"]));
  assert_eq!(res.errors.len(), 1);
  assert_eq!(res.errors[0].ticker, "ZZZZINVALID");
  assert_eq!(res.errors[0].kind, ErrorKind::DataUnavailable);
}

#[test]
fn seasonal_forecast_with_regressor() {
  let request = ForecastRequest {
    exog_tickers: tickers(&["SPY"]),
    horizon: Some(30),
    ..ForecastRequest::new("AAPL")
  };
  let res = ForecastEngine::default().forecast(&market(), &request).unwrap();

  assert_eq!(res.params.order, [1, 1, 1]);
  assert_eq!(res.params.seasonal_order, [0, 1, 1, 12]);
  assert_eq!(res.dates.len(), 30);
  assert_eq!(res.forecast.len(), 30);
  assert_eq!(res.upper_ci.len(), 30);
  assert_eq!(res.lower_ci.len(), 30);
  for i in 0..30 {
    assert!(res.upper_ci[i] >= res.forecast[i]);
    assert!(res.forecast[i] >= res.lower_ci[i]);
  }
  let widths: Vec<f64> = res.upper_ci.iter().zip(&res.lower_ci).map(|(u, l)| u - l).collect();
  for w in widths.windows(2) {
    assert!(w[1] >= w[0] - 1e-9);
  }
  assert!(res.dates[0] > res.history.last().unwrap().date);
  assert!(res.metrics.aic.is_finite());
}

#[test]
fn grid_auto_fit_selects_minimum_aic() {
  let mut config = FolioConfig::default();
  config.forecast.search.strategy = SearchStrategy::Grid;
  config.forecast.search.space = SearchSpace {
    max_p: 1,
    max_d: 1,
    max_q: 1,
    max_seasonal_p: 0,
    max_seasonal_d: 0,
    max_seasonal_q: 0,
  };
  let request = ForecastRequest {
    auto_fit: true,
    s: 0,
    horizon: Some(5),
    ..ForecastRequest::new("MSFT")
  };
  let res = ForecastEngine::new(config).forecast(&market(), &request).unwrap();
  let search = res.search.unwrap();

  assert_eq!(search.evaluated.len(), 8);
  for aic in search.evaluated.iter().filter_map(|c| c.aic) {
    assert!(search.best_aic <= aic);
  }
  assert_eq!(res.params.order, search.best.order());
}

#[test]
fn wide_market_with_mixed_sign_drifts_solves_every_point() {
  let mut rng = StdRng::seed_from_u64(7);
  let factor = Normal::new(0.0, 0.01).unwrap();
  let idio = Normal::new(0.0, 0.006).unwrap();
  let dates = Interval::Daily.future_dates(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 14);
  let names: Vec<String> = (0..9).map(|i| format!("W{i}")).collect();

  let mut provider = InMemoryProvider::new();
  let mut levels = vec![100.0; 9];
  let mut series: Vec<Vec<PricePoint>> = vec![Vec::new(); 9];
  for date in &dates {
    let m = factor.sample(&mut rng);
    for i in 0..9 {
      let drift = if i % 2 == 0 { 0.003 } else { -0.003 };
      levels[i] *= 1.0 + drift + (0.5 + 0.1 * i as f64) * m + idio.sample(&mut rng);
      series[i].push(PricePoint::new(*date, levels[i]));
    }
  }
  for (name, s) in names.iter().zip(series) {
    provider.insert(name.as_str(), s);
  }

  let request = OptimizationRequest {
    period: Period::Max,
    ..OptimizationRequest::new(names.clone())
  };
  let engine = PortfolioEngine::default();
  let res = engine.optimize(&provider, &request).unwrap();
  assert_eq!(res.frontier.len(), engine.config().frontier.resolution);
  let max_risk = res.frontier.iter().map(|p| p.risk).fold(0.0, f64::max);
  for pair in res.frontier.windows(2) {
    assert!(pair[1].risk >= pair[0].risk - 1e-6 * max_risk);
  }
  for p in &res.frontier {
    assert!((p.weights.iter().sum::<f64>() - 1.0).abs() <= 1e-4);
    assert!(p.weights.iter().all(|w| *w >= -1e-9));
  }
}
