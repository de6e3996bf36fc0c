use chrono::NaiveDateTime;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use tplus_domain::entities::metrics::PerformanceMetrics;
use tplus_domain::repositories::artifacts::{BatchSummaryRow, ComparisonRow};
use tplus_domain::services::audit::AuditEvent;
use tplus_domain::value_objects::closed_trade::ClosedTrade;
use tplus_domain::value_objects::execution::ExecutionRecord;
use tplus_domain::value_objects::history_point::HistoryPoint;
use tplus_domain::value_objects::side::Side;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn format_datetime(datetime: &NaiveDateTime) -> String {
    datetime.format(DATETIME_FORMAT).to_string()
}

fn parse_datetime(raw: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
        .map_err(|err| format!("invalid datetime '{}': {}", raw, err))
}

pub fn write_audit_jsonl(path: &Path, events: &[AuditEvent]) -> Result<(), String> {
    let mut file =
        fs::File::create(path).map_err(|err| format!("failed to create logs: {}", err))?;
    for event in events {
        let line = serde_json::to_string(event)
            .map_err(|err| format!("failed to serialize audit event: {}", err))?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .map_err(|err| format!("failed to write audit event: {}", err))?;
    }
    Ok(())
}

pub fn write_history_csv(path: &Path, points: &[HistoryPoint]) -> Result<(), String> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|err| format!("failed to create history csv {}: {}", path.display(), err))?;
    wtr.write_record(["datetime", "cash", "position", "close", "total_assets"])
        .map_err(|err| format!("failed to write history csv header: {}", err))?;

    for point in points {
        wtr.write_record([
            format_datetime(&point.datetime),
            point.cash.to_string(),
            point.position.to_string(),
            point.close.to_string(),
            point.total_assets.to_string(),
        ])
        .map_err(|err| format!("failed to write history row: {}", err))?;
    }

    wtr.flush()
        .map_err(|err| format!("failed to flush history csv: {}", err))
}

pub fn write_trades_csv(path: &Path, trades: &[ClosedTrade]) -> Result<(), String> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|err| format!("failed to create trades csv {}: {}", path.display(), err))?;
    wtr.write_record([
        "datetime",
        "entry_price",
        "exit_price",
        "quantity",
        "pnl",
        "return_pct",
    ])
    .map_err(|err| format!("failed to write trades csv header: {}", err))?;

    for trade in trades {
        wtr.write_record([
            format_datetime(&trade.datetime),
            trade.entry_price.to_string(),
            trade.exit_price.to_string(),
            trade.quantity.to_string(),
            trade.pnl.to_string(),
            trade.return_pct.to_string(),
        ])
        .map_err(|err| format!("failed to write trades row: {}", err))?;
    }

    wtr.flush()
        .map_err(|err| format!("failed to flush trades csv: {}", err))
}

pub fn write_executions_csv(path: &Path, executions: &[ExecutionRecord]) -> Result<(), String> {
    let mut wtr = csv::Writer::from_path(path).map_err(|err| {
        format!(
            "failed to create executions csv {}: {}",
            path.display(),
            err
        )
    })?;
    wtr.write_record(["datetime", "side", "price", "quantity", "commission"])
        .map_err(|err| format!("failed to write executions csv header: {}", err))?;

    for fill in executions {
        wtr.write_record([
            format_datetime(&fill.datetime),
            fill.side.to_string(),
            fill.price.to_string(),
            fill.quantity.to_string(),
            fill.commission.to_string(),
        ])
        .map_err(|err| format!("failed to write executions row: {}", err))?;
    }

    wtr.flush()
        .map_err(|err| format!("failed to flush executions csv: {}", err))
}

pub fn write_batch_summary_csv(path: &Path, rows: &[BatchSummaryRow]) -> Result<(), String> {
    let mut wtr = csv::Writer::from_path(path).map_err(|err| {
        format!(
            "failed to create batch summary csv {}: {}",
            path.display(),
            err
        )
    })?;
    for row in rows {
        wtr.serialize(row)
            .map_err(|err| format!("failed to write batch summary row: {}", err))?;
    }
    wtr.flush()
        .map_err(|err| format!("failed to flush batch summary csv: {}", err))
}

pub fn write_comparison_summary_csv(path: &Path, rows: &[ComparisonRow]) -> Result<(), String> {
    let mut wtr = csv::Writer::from_path(path).map_err(|err| {
        format!(
            "failed to create comparison summary csv {}: {}",
            path.display(),
            err
        )
    })?;
    for row in rows {
        wtr.serialize(row)
            .map_err(|err| format!("failed to write comparison row: {}", err))?;
    }
    wtr.flush()
        .map_err(|err| format!("failed to flush comparison summary csv: {}", err))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMeta {
    pub run_id: String,
    pub symbol: String,
    pub strategy: String,
    pub start: String,
    pub end: String,
}

pub fn write_summary_json(
    path: &Path,
    metrics: Option<&PerformanceMetrics>,
    meta: Option<&SummaryMeta>,
    config_snapshot: Option<&serde_json::Value>,
) -> Result<(), String> {
    let formatted: Option<serde_json::Map<String, serde_json::Value>> = metrics.map(|metrics| {
        metrics
            .report_rows()
            .into_iter()
            .map(|(label, value)| (label.to_string(), serde_json::Value::String(value)))
            .collect()
    });

    let json = serde_json::json!({
        "meta": meta,
        "config_snapshot": config_snapshot,
        "metrics": metrics,
        "formatted": formatted,
    });
    let json = serde_json::to_string_pretty(&json)
        .map_err(|err| format!("failed to serialize summary: {}", err))?;
    let mut file =
        fs::File::create(path).map_err(|err| format!("failed to create summary: {}", err))?;
    file.write_all(json.as_bytes())
        .map_err(|err| format!("failed to write summary: {}", err))
}

pub fn write_summary_html(
    path: &Path,
    metrics: Option<&PerformanceMetrics>,
    meta: Option<&SummaryMeta>,
) -> Result<(), String> {
    let (run_id, symbol, strategy, start, end) = match meta {
        Some(meta) => (
            meta.run_id.as_str(),
            meta.symbol.as_str(),
            meta.strategy.as_str(),
            meta.start.as_str(),
            meta.end.as_str(),
        ),
        None => ("unknown", "unknown", "unknown", "unknown", "unknown"),
    };

    let rows = match metrics {
        Some(metrics) => metrics
            .report_rows()
            .into_iter()
            .map(|(label, value)| format!("    <tr><th>{label}</th><td>{value}</td></tr>"))
            .collect::<Vec<_>>()
            .join("\n"),
        None => "    <tr><td>no bars processed</td></tr>".to_string(),
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8"/>
  <title>tplus summary</title>
  <style>
    body {{ font-family: ui-sans-serif, system-ui; padding: 24px; }}
    table {{ border-collapse: collapse; width: 520px; }}
    th, td {{ border: 1px solid #ddd; padding: 8px; }}
    th {{ background: #f6f6f6; text-align: left; }}
    code {{ background: #f2f2f2; padding: 2px 6px; border-radius: 4px; }}
  </style>
</head>
<body>
  <h1>tplus summary</h1>
  <p><strong>run_id:</strong> <code>{run_id}</code></p>
  <p><strong>symbol:</strong> <code>{symbol}</code></p>
  <p><strong>strategy:</strong> <code>{strategy}</code></p>
  <p><strong>start:</strong> <code>{start}</code></p>
  <p><strong>end:</strong> <code>{end}</code></p>
  <h2>Metrics</h2>
  <table>
{rows}
  </table>
</body>
</html>"#
    );

    let mut file =
        fs::File::create(path).map_err(|err| format!("failed to create html: {}", err))?;
    file.write_all(html.as_bytes())
        .map_err(|err| format!("failed to write html: {}", err))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct DashboardPoint {
    datetime: String,
    close: f64,
    equity: f64,
    drawdown: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct DashboardTrade {
    datetime: String,
    side: String,
    price: f64,
    quantity: u64,
    commission: f64,
    /// Index into the series of the bar the fill belongs to.
    index: Option<usize>,
}

fn dashboard_series(history: &[HistoryPoint]) -> Vec<DashboardPoint> {
    let mut peak = f64::NEG_INFINITY;
    history
        .iter()
        .map(|point| {
            peak = peak.max(point.total_assets);
            let drawdown = if peak > 0.0 {
                (point.total_assets - peak) / peak
            } else {
                0.0
            };
            DashboardPoint {
                datetime: format_datetime(&point.datetime),
                close: point.close,
                equity: point.total_assets,
                drawdown,
            }
        })
        .collect()
}

fn dashboard_trades(
    history: &[HistoryPoint],
    executions: &[ExecutionRecord],
) -> Vec<DashboardTrade> {
    executions
        .iter()
        .map(|fill| {
            let after = history.partition_point(|point| point.datetime <= fill.datetime);
            DashboardTrade {
                datetime: format_datetime(&fill.datetime),
                side: fill.side.to_string(),
                price: fill.price,
                quantity: fill.quantity,
                commission: fill.commission,
                index: after.checked_sub(1),
            }
        })
        .collect()
}

/// Self-contained HTML page with equity, drawdown and price charts plus every
/// fill. The series are embedded as JSON and drawn on canvases.
pub fn write_dashboard_html(
    path: &Path,
    metrics: Option<&PerformanceMetrics>,
    meta: Option<&SummaryMeta>,
    history: &[HistoryPoint],
    executions: &[ExecutionRecord],
) -> Result<(), String> {
    let (run_id, symbol, strategy, start, end) = match meta {
        Some(meta) => (
            meta.run_id.as_str(),
            meta.symbol.as_str(),
            meta.strategy.as_str(),
            meta.start.as_str(),
            meta.end.as_str(),
        ),
        None => ("unknown", "unknown", "unknown", "unknown", "unknown"),
    };

    let rows = match metrics {
        Some(metrics) => metrics
            .report_rows()
            .into_iter()
            .map(|(label, value)| format!("          <tr><th>{label}</th><td>{value}</td></tr>"))
            .collect::<Vec<_>>()
            .join("\n"),
        None => "          <tr><td>no bars processed</td></tr>".to_string(),
    };

    let series_json = serde_json::to_string(&dashboard_series(history))
        .map_err(|err| format!("failed to serialize series: {err}"))?;
    let trades_json = serde_json::to_string(&dashboard_trades(history, executions))
        .map_err(|err| format!("failed to serialize trades: {err}"))?;

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8"/>
  <title>tplus dashboard</title>
  <style>
    body {{ font-family: ui-sans-serif, system-ui; padding: 24px; }}
    code {{ background: #f2f2f2; padding: 2px 6px; border-radius: 4px; }}
    .grid {{ display: grid; grid-template-columns: 1fr 1fr; gap: 16px; align-items: start; }}
    .card {{ border: 1px solid #ddd; border-radius: 10px; padding: 16px; background: #fff; }}
    canvas {{ width: 100%; height: 240px; border: 1px solid #eee; border-radius: 8px; }}
    table {{ border-collapse: collapse; width: 100%; }}
    th, td {{ border: 1px solid #eee; padding: 6px; font-size: 12px; }}
    th {{ background: #fafafa; text-align: left; }}
    .muted {{ color: #666; }}
  </style>
</head>
<body>
  <h1>tplus dashboard</h1>
  <p class="muted">
    run_id: <code>{run_id}</code> symbol: <code>{symbol}</code> strategy: <code>{strategy}</code>
    start: <code>{start}</code> end: <code>{end}</code>
  </p>

  <div class="grid">
    <div class="card">
      <h2>Equity</h2>
      <canvas id="equity"></canvas>
    </div>
    <div class="card">
      <h2>Drawdown</h2>
      <canvas id="drawdown"></canvas>
    </div>
    <div class="card">
      <h2>Price with trades</h2>
      <canvas id="price"></canvas>
    </div>
    <div class="card">
      <h2>Metrics</h2>
      <table>
{rows}
      </table>
    </div>
  </div>

  <div class="card">
    <h2>Fills</h2>
    <table id="trades_table">
      <thead>
        <tr><th>datetime</th><th>side</th><th>price</th><th>quantity</th><th>commission</th></tr>
      </thead>
      <tbody></tbody>
    </table>
  </div>

  <script>
    const series = {series_json};
    const trades = {trades_json};

    function frame(canvas) {{
      const ctx = canvas.getContext('2d');
      const w = canvas.width = canvas.clientWidth * window.devicePixelRatio;
      const h = canvas.height = canvas.clientHeight * window.devicePixelRatio;
      ctx.clearRect(0, 0, w, h);
      const pad = 20 * window.devicePixelRatio;
      return {{ ctx, x0: pad, y0: pad, x1: w - pad, y1: h - pad }};
    }}

    function scales(f, values) {{
      const minV = Math.min(...values);
      const maxV = Math.max(...values);
      const x = i => f.x0 + (i / Math.max(values.length - 1, 1)) * (f.x1 - f.x0);
      const y = v => {{
        if (maxV === minV) return (f.y0 + f.y1) / 2;
        return f.y1 - ((v - minV) / (maxV - minV)) * (f.y1 - f.y0);
      }};
      return {{ x, y }};
    }}

    function drawLine(canvas, key, color) {{
      const f = frame(canvas);
      if (series.length < 2) {{
        f.ctx.fillStyle = '#666';
        f.ctx.fillText('not enough data', 10, 20);
        return null;
      }}
      const values = series.map(p => p[key]);
      const s = scales(f, values);
      f.ctx.strokeStyle = color;
      f.ctx.lineWidth = 2 * window.devicePixelRatio;
      f.ctx.beginPath();
      f.ctx.moveTo(s.x(0), s.y(values[0]));
      for (let i = 1; i < values.length; i++) {{
        f.ctx.lineTo(s.x(i), s.y(values[i]));
      }}
      f.ctx.stroke();
      return {{ f, s }};
    }}

    function drawMarkers(chart) {{
      if (!chart) return;
      const r = 4 * window.devicePixelRatio;
      for (const t of trades) {{
        if (t.index === null) continue;
        chart.f.ctx.fillStyle = t.side === 'buy' ? '#2f855a' : '#c53030';
        chart.f.ctx.beginPath();
        chart.f.ctx.arc(chart.s.x(t.index), chart.s.y(series[t.index].close), r, 0, 2 * Math.PI);
        chart.f.ctx.fill();
      }}
    }}

    function renderTrades(tableId) {{
      const tbody = document.querySelector(`#${{tableId}} tbody`);
      tbody.innerHTML = '';
      for (const t of trades) {{
        const tr = document.createElement('tr');
        tr.innerHTML = `
          <td>${{t.datetime}}</td>
          <td>${{t.side}}</td>
          <td>${{t.price}}</td>
          <td>${{t.quantity}}</td>
          <td>${{t.commission}}</td>
        `;
        tbody.appendChild(tr);
      }}
    }}

    function render() {{
      drawLine(document.getElementById('equity'), 'equity', '#2b6cb0');
      drawLine(document.getElementById('drawdown'), 'drawdown', '#c53030');
      drawMarkers(drawLine(document.getElementById('price'), 'close', '#4a5568'));
    }}

    render();
    renderTrades('trades_table');
    window.addEventListener('resize', render);
  </script>
</body>
</html>"#
    );

    let mut file =
        fs::File::create(path).map_err(|err| format!("failed to create dashboard: {}", err))?;
    file.write_all(html.as_bytes())
        .map_err(|err| format!("failed to write dashboard: {}", err))
}

#[derive(Debug, Clone, serde::Deserialize)]
struct HistoryRecord {
    datetime: String,
    cash: f64,
    position: u64,
    close: f64,
    total_assets: f64,
}

pub fn read_history_csv(path: &Path) -> Result<Vec<HistoryPoint>, String> {
    let mut rdr = csv::Reader::from_path(path)
        .map_err(|err| format!("failed to open history csv {}: {}", path.display(), err))?;
    let mut points = Vec::new();
    for result in rdr.deserialize::<HistoryRecord>() {
        let record = result.map_err(|err| format!("failed to parse history record: {}", err))?;
        points.push(HistoryPoint {
            datetime: parse_datetime(&record.datetime)?,
            cash: record.cash,
            position: record.position,
            close: record.close,
            total_assets: record.total_assets,
        });
    }
    Ok(points)
}

#[derive(Debug, Clone, serde::Deserialize)]
struct TradeRecord {
    datetime: String,
    entry_price: f64,
    exit_price: f64,
    quantity: u64,
    pnl: f64,
    return_pct: f64,
}

pub fn read_trades_csv(path: &Path) -> Result<Vec<ClosedTrade>, String> {
    let mut rdr = csv::Reader::from_path(path)
        .map_err(|err| format!("failed to open trades csv {}: {}", path.display(), err))?;
    let mut trades = Vec::new();
    for result in rdr.deserialize::<TradeRecord>() {
        let record = result.map_err(|err| format!("failed to parse trade record: {}", err))?;
        trades.push(ClosedTrade {
            datetime: parse_datetime(&record.datetime)?,
            entry_price: record.entry_price,
            exit_price: record.exit_price,
            quantity: record.quantity,
            pnl: record.pnl,
            return_pct: record.return_pct,
        });
    }
    Ok(trades)
}

#[derive(Debug, Clone, serde::Deserialize)]
struct ExecutionCsvRecord {
    datetime: String,
    side: String,
    price: f64,
    quantity: u64,
    commission: f64,
}

pub fn read_executions_csv(path: &Path) -> Result<Vec<ExecutionRecord>, String> {
    let mut rdr = csv::Reader::from_path(path).map_err(|err| {
        format!("failed to open executions csv {}: {}", path.display(), err)
    })?;
    let mut executions = Vec::new();
    for result in rdr.deserialize::<ExecutionCsvRecord>() {
        let record =
            result.map_err(|err| format!("failed to parse execution record: {}", err))?;
        let side = match record.side.to_lowercase().as_str() {
            "buy" => Side::Buy,
            "sell" => Side::Sell,
            other => return Err(format!("invalid side '{}'", other)),
        };
        executions.push(ExecutionRecord {
            datetime: parse_datetime(&record.datetime)?,
            side,
            price: record.price,
            quantity: record.quantity,
            commission: record.commission,
        });
    }
    Ok(executions)
}
