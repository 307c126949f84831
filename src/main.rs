mod command;
mod config;
mod error_log;
mod fetch;
mod metadata;
mod page;
mod price;
mod render;
mod session;
mod trends;
mod tui;

use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::Parser;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;

use crate::command::Command;
use crate::config::{CliParams, TrendsLocation};
use crate::metadata::DocumentHead;
use crate::page::PageController;
use crate::price::{HttpPriceSource, PriceSource};
use crate::session::PageSession;
use crate::trends::{FileTrendSource, HttpTrendSource, TrendSource};
use crate::tui::TuiApp;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let param = CliParams::parse();
    if !param.tui {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let client = fetch::build_http_client(param.request_timeout())?;
    let prices: Arc<dyn PriceSource> =
        Arc::new(HttpPriceSource::new(client.clone(), param.api_base()));
    let trends: Arc<dyn TrendSource> = match param.trends_location() {
        TrendsLocation::Url(url) => Arc::new(HttpTrendSource::new(client, url)),
        TrendsLocation::File(path) => Arc::new(FileTrendSource::new(path)),
    };

    let (tx, rx) = broadcast::channel::<Command>(16);
    let page = PageController::new(param.site_config(), DocumentHead::new());
    let session = PageSession::new(
        page,
        prices,
        trends,
        Some(param.error_log_store()),
        tx.clone(),
    );

    if param.tui {
        run_preview(session, &param, tx, rx).await
    } else {
        render_once(session, &param, rx).await
    }
}

async fn render_once(
    mut session: PageSession<DocumentHead>,
    param: &CliParams,
    mut rx: broadcast::Receiver<Command>,
) -> Result<(), anyhow::Error> {
    session.mount();
    if !session.navigate(param.moeda.as_deref()) {
        log::warn!("no coin symbol given; rendering the loading page");
    }
    tokio::select! {
        result = session.run_until_settled(&mut rx) => result?,
        _ = tokio::signal::ctrl_c() => return Err(anyhow!("interrupted before the page settled")),
    }

    let html = render::render_document(session.page()).context("rendering page")?;
    match &param.output {
        Some(path) => tokio::fs::write(path, html)
            .await
            .with_context(|| format!("writing {}", path.display()))?,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(html.as_bytes()).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

async fn run_preview(
    session: PageSession<DocumentHead>,
    param: &CliParams,
    tx: broadcast::Sender<Command>,
    mut rx: broadcast::Receiver<Command>,
) -> Result<(), anyhow::Error> {
    let mut app = TuiApp::new(session);
    app.start(param.moeda.as_deref());
    let app_result = tokio::select! {
        result = app.run(&mut rx) => result,
        _ = tokio::signal::ctrl_c() => Ok(()),
    };
    let _ = tx.send(Command::Exit);
    app.dispose();
    app_result.map_err(|err| anyhow!(err.to_string()))?;
    Ok(())
}
